//! Helpers for splitting a revolution by distance, angle sector or quality.
//! Zero-distance samples never count as "in range".

use crate::measurement::Measurement;
use crate::revolution::Revolution;

/// Result of [`by_distance`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistanceSplit {
    pub in_range: Revolution,
    pub too_close: Revolution,
    pub too_far: Revolution,
}

/// Splits valid samples by `[min, max]` millimeters. Invalid samples are
/// dropped.
pub fn by_distance(revolution: &Revolution, min: f32, max: f32) -> DistanceSplit {
    let mut split = DistanceSplit::default();
    for m in revolution.valid() {
        if m.distance < min {
            split.too_close.push(*m);
        } else if m.distance > max {
            split.too_far.push(*m);
        } else {
            split.in_range.push(*m);
        }
    }
    split
}

/// Maps any angle into `[0, 360)`.
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if a >= 360. {
        0.
    } else {
        a
    }
}

/// Inclusive sector test. A sector whose start is greater than its end wraps
/// through 0 degrees, e.g. `350..=10`.
pub fn in_sector(angle: f32, start: f32, end: f32) -> bool {
    let angle = normalize_angle(angle);
    let start = normalize_angle(start);
    let end = normalize_angle(end);
    if start <= end {
        start <= angle && angle <= end
    } else {
        angle >= start || angle <= end
    }
}

/// Returns `(inside, outside)` for the sector. Invalid samples are dropped.
pub fn by_sector(revolution: &Revolution, start: f32, end: f32) -> (Revolution, Revolution) {
    revolution
        .valid()
        .copied()
        .partition(|m| in_sector(m.angle, start, end))
}

/// Returns `(kept, discarded)`. Samples without a quality value are kept when
/// they are valid, since express scans cannot be filtered by quality.
pub fn by_quality(revolution: &Revolution, min_quality: u8) -> (Revolution, Revolution) {
    revolution
        .iter()
        .copied()
        .partition(|m| m.is_valid() && m.quality.map_or(true, |q| q >= min_quality))
}

/// Closest valid sample, if any.
pub fn closest(revolution: &Revolution) -> Option<Measurement> {
    revolution
        .valid()
        .copied()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revolution(points: &[(Option<u8>, f32, f32)]) -> Revolution {
        points.iter().map(|p| Measurement::from(*p)).collect()
    }

    #[test]
    fn test_by_distance() {
        let r = revolution(&[
            (Some(15), 45.0, 300.0),
            (Some(15), 90.0, 100.0),
            (Some(15), 135.0, 6000.0),
            (Some(15), 180.0, 0.0),
        ]);
        let split = by_distance(&r, 200., 5000.);
        assert_eq!(split.in_range.len(), 1);
        assert_eq!(split.too_close.len(), 1);
        assert_eq!(split.too_far.len(), 1);
    }

    #[test]
    fn test_sector_wraps_through_zero() {
        let r = revolution(&[
            (Some(15), 5.0, 1000.0),
            (Some(15), 90.0, 1500.0),
            (Some(15), 350.0, 800.0),
        ]);
        let (inside, outside) = by_sector(&r, 350., 10.);
        assert_eq!(inside.len(), 2);
        assert_eq!(outside.len(), 1);
        assert!(in_sector(-5., 350., 10.));
        assert!(!in_sector(180., 350., 10.));
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(370.), 10.);
        assert_eq!(normalize_angle(-90.), 270.);
        assert_eq!(normalize_angle(0.), 0.);
        assert!(normalize_angle(-1e-9) < 360.);
    }

    #[test]
    fn test_by_quality() {
        let r = revolution(&[
            (Some(10), 45.5, 1200.0),
            (Some(3), 90.0, 800.0),
            (Some(12), 135.5, 1500.0),
            (None, 140.0, 900.0),
            (None, 150.0, 0.0),
        ]);
        let (kept, discarded) = by_quality(&r, 8);
        assert_eq!(kept.len(), 3);
        assert_eq!(discarded.len(), 2);
    }

    #[test]
    fn test_closest_ignores_sentinel() {
        let r = revolution(&[(None, 1.0, 0.0), (None, 2.0, 700.0), (None, 3.0, 400.0)]);
        assert_eq!(closest(&r), Some(Measurement::new(None, 3.0, 400.0)));
        assert_eq!(closest(&Revolution::new()), None);
    }
}
