use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_RADIUS_METERS: f64 = 10.0;
pub const DEFAULT_MIN_SAMPLES: usize = 2;
pub const DEFAULT_NAME_THRESHOLD: f64 = 90.0;

/// Parameters of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum great-circle distance, in meters, for two retailers to be neighbours.
    pub radius_meters: f64,
    /// Neighbour count, including the point itself, that makes a core point.
    pub min_samples: usize,
    /// Minimum token-sort similarity (0-100) for a name pair to be flagged.
    pub name_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            radius_meters: DEFAULT_RADIUS_METERS,
            min_samples: DEFAULT_MIN_SAMPLES,
            name_threshold: DEFAULT_NAME_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    pub fn new(radius_meters: f64, min_samples: usize, name_threshold: f64) -> Self {
        AnalysisConfig {
            radius_meters,
            min_samples,
            name_threshold,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(EngineError::InvalidConfig {
                field: "radius_meters",
                reason: format!("must be a positive number, got {}", self.radius_meters),
            });
        }
        if self.min_samples < 1 {
            return Err(EngineError::InvalidConfig {
                field: "min_samples",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.name_threshold) {
            return Err(EngineError::InvalidConfig {
                field: "name_threshold",
                reason: format!("must be within 0-100, got {}", self.name_threshold),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.radius_meters, 10.0);
        assert_eq!(config.min_samples, 2);
        assert_eq!(config.name_threshold, 90.0);
    }

    #[test]
    fn rejects_non_positive_radius() {
        for radius in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let config = AnalysisConfig::new(radius, 2, 90.0);
            assert!(matches!(
                config.validate(),
                Err(EngineError::InvalidConfig {
                    field: "radius_meters",
                    ..
                })
            ));
        }
    }

    #[test]
    fn rejects_zero_min_samples() {
        let config = AnalysisConfig::new(10.0, 0, 90.0);
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig {
                field: "min_samples",
                ..
            })
        ));
    }

    #[test]
    fn threshold_bounds_are_inclusive() {
        assert!(AnalysisConfig::new(10.0, 2, 0.0).validate().is_ok());
        assert!(AnalysisConfig::new(10.0, 2, 100.0).validate().is_ok());
        assert!(AnalysisConfig::new(10.0, 2, 100.5).validate().is_err());
    }
}
