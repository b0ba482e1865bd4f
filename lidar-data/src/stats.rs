use crate::measurement::Measurement;

/// Summary of one revolution. Distance and angle figures only look at valid
/// samples, so the zero-distance sentinel never leaks into min/max/mean.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RevolutionStats {
    pub total: usize,
    pub valid: usize,
    pub min_distance: Option<f32>,
    pub max_distance: Option<f32>,
    pub mean_distance: Option<f32>,
    /// `None` when no valid sample reports quality (express mode).
    pub mean_quality: Option<f32>,
    pub min_angle: Option<f32>,
    pub max_angle: Option<f32>,
}

impl RevolutionStats {
    pub fn from_measurements(measurements: &[Measurement]) -> RevolutionStats {
        let mut stats = RevolutionStats {
            total: measurements.len(),
            ..RevolutionStats::default()
        };

        let mut distance_sum = 0f64;
        let mut quality_sum = 0u64;
        let mut n_quality = 0usize;
        for m in measurements.iter().filter(|m| m.is_valid()) {
            stats.valid += 1;
            distance_sum += m.distance as f64;
            stats.min_distance = Some(stats.min_distance.map_or(m.distance, |d| d.min(m.distance)));
            stats.max_distance = Some(stats.max_distance.map_or(m.distance, |d| d.max(m.distance)));
            stats.min_angle = Some(stats.min_angle.map_or(m.angle, |a| a.min(m.angle)));
            stats.max_angle = Some(stats.max_angle.map_or(m.angle, |a| a.max(m.angle)));
            if let Some(q) = m.quality {
                quality_sum += q as u64;
                n_quality += 1;
            }
        }

        if stats.valid > 0 {
            stats.mean_distance = Some((distance_sum / stats.valid as f64) as f32);
        }
        if n_quality > 0 {
            stats.mean_quality = Some((quality_sum as f64 / n_quality as f64) as f32);
        }
        stats
    }

    /// Share of valid samples in `[0, 1]`.
    pub fn valid_ratio(&self) -> f32 {
        if self.total == 0 {
            return 0.;
        }
        self.valid as f32 / self.total as f32
    }

    /// Span between the smallest and largest valid angle, in degrees.
    pub fn angular_coverage(&self) -> f32 {
        match (self.min_angle, self.max_angle) {
            (Some(min), Some(max)) => max - min,
            _ => 0.,
        }
    }

    /// Valid samples per degree of coverage.
    pub fn density(&self) -> f32 {
        let coverage = self.angular_coverage();
        if coverage > 0. {
            self.valid as f32 / coverage
        } else {
            0.
        }
    }
}
