use crate::measurement::Measurement;
use crate::stats::RevolutionStats;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Measurements collected during one full rotation of the sensor, in capture
/// order. The length varies from one revolution to the next and may be zero.
#[derive(Clone, Debug, Default, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Revolution {
    pub measurements: Vec<Measurement>,
}

impl Revolution {
    pub fn new() -> Revolution {
        Revolution {
            measurements: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Revolution {
        Revolution {
            measurements: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    /// Samples carrying a real echo.
    pub fn valid(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.iter().filter(|m| m.is_valid())
    }

    /// `true` when every sample carries a quality value, as in standard mode.
    /// An empty revolution has no quality to report and returns `false`.
    pub fn has_quality(&self) -> bool {
        !self.is_empty() && self.measurements.iter().all(|m| m.quality.is_some())
    }

    pub fn stats(&self) -> RevolutionStats {
        RevolutionStats::from_measurements(&self.measurements)
    }
}

impl From<Vec<Measurement>> for Revolution {
    fn from(measurements: Vec<Measurement>) -> Self {
        Revolution { measurements }
    }
}

impl FromIterator<Measurement> for Revolution {
    fn from_iter<I: IntoIterator<Item = Measurement>>(iter: I) -> Self {
        Revolution {
            measurements: iter.into_iter().collect(),
        }
    }
}

impl Extend<Measurement> for Revolution {
    fn extend<I: IntoIterator<Item = Measurement>>(&mut self, iter: I) {
        self.measurements.extend(iter);
    }
}

impl IntoIterator for Revolution {
    type Item = Measurement;
    type IntoIter = std::vec::IntoIter<Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Revolution {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_skips_sentinel() {
        let revolution: Revolution = vec![
            Measurement::new(Some(10), 0.0, 0.0),
            Measurement::new(Some(10), 90.0, 500.0),
            Measurement::new(None, 180.0, 1500.0),
        ]
        .into();
        assert_eq!(revolution.len(), 3);
        assert_eq!(revolution.valid().count(), 2);
    }

    #[test]
    fn test_has_quality() {
        assert!(!Revolution::new().has_quality());

        let standard: Revolution = vec![Measurement::new(Some(3), 1.0, 10.0)].into();
        assert!(standard.has_quality());

        let express: Revolution = vec![
            Measurement::new(Some(3), 1.0, 10.0),
            Measurement::new(None, 2.0, 10.0),
        ]
        .into();
        assert!(!express.has_quality());
    }
}
