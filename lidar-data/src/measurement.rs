#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Highest quality value a sensor reports.
pub const MAX_QUALITY: u8 = 15;

/// One sample taken at one angular position during a revolution.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    /// Confidence of the returned signal, `0..=MAX_QUALITY`.
    /// Express scans do not report it.
    pub quality: Option<u8>,
    /// Direction of the sample in degrees.
    pub angle: f32,
    /// Distance in millimeters. `0.0` means the sensor got no valid echo.
    pub distance: f32,
}

impl Measurement {
    pub fn new(quality: Option<u8>, angle: f32, distance: f32) -> Measurement {
        Measurement {
            quality,
            angle,
            distance,
        }
    }

    /// `false` for the "no echo" sentinel. Invalid samples must be kept out
    /// of any distance aggregate.
    pub fn is_valid(&self) -> bool {
        self.distance > 0.0
    }
}

impl From<(Option<u8>, f32, f32)> for Measurement {
    fn from((quality, angle, distance): (Option<u8>, f32, f32)) -> Self {
        Measurement::new(quality, angle, distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance_is_invalid() {
        assert!(!Measurement::new(Some(10), 0.0, 0.0).is_valid());
        assert!(Measurement::new(Some(10), 90.0, 500.0).is_valid());
        assert!(Measurement::new(None, 180.0, 0.25).is_valid());
    }
}
