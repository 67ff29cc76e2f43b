//! Configuration for type inference

use serde::{Deserialize, Serialize};

use super::error::{InferenceError, InferenceResult};

/// Configuration for the type inference engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Maximum nesting depth of enhanced type trees
    pub max_depth: usize,

    /// Maximum number of sample values inspected per field (0 = all)
    pub max_samples: usize,

    /// Enhance fields of one schema in parallel
    pub parallel: bool,

    /// Share of samples that must match a value format to tag its pattern (0.0 - 1.0)
    pub pattern_match_threshold: f64,

    /// Share of date-like samples above which a STRING field becomes DATE/DATETIME
    pub type_flip_threshold: f64,

    /// Minimum number of uniformly keyed properties for an object to count as a map
    pub map_min_properties: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_samples: 100,
            parallel: true,
            pattern_match_threshold: 0.5,
            type_flip_threshold: 0.8,
            map_min_properties: 5,
        }
    }
}

impl InferenceConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> InferenceConfigBuilder {
        InferenceConfigBuilder::default()
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> InferenceResult<()> {
        for (name, value) in [
            ("pattern_match_threshold", self.pattern_match_threshold),
            ("type_flip_threshold", self.type_flip_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(InferenceError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.max_depth == 0 {
            return Err(InferenceError::InvalidConfig("max_depth must be at least 1".to_string()));
        }
        if self.map_min_properties == 0 {
            return Err(InferenceError::InvalidConfig(
                "map_min_properties must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for InferenceConfig
#[derive(Debug, Default)]
pub struct InferenceConfigBuilder {
    config: InferenceConfig,
}

impl InferenceConfigBuilder {
    /// Set the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth.max(1);
        self
    }

    /// Set the number of samples inspected per field (0 = all)
    pub fn max_samples(mut self, max: usize) -> Self {
        self.config.max_samples = max;
        self
    }

    /// Enable or disable parallel field enhancement
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set the pattern match threshold
    pub fn pattern_match_threshold(mut self, threshold: f64) -> Self {
        self.config.pattern_match_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the type flip threshold
    pub fn type_flip_threshold(mut self, threshold: f64) -> Self {
        self.config.type_flip_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the minimum property count for map detection
    pub fn map_min_properties(mut self, count: usize) -> Self {
        self.config.map_min_properties = count.max(1);
        self
    }

    /// Build the configuration
    pub fn build(self) -> InferenceConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.pattern_match_threshold, 0.5);
        assert_eq!(config.type_flip_threshold, 0.8);
        assert_eq!(config.map_min_properties, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = InferenceConfig::builder()
            .max_depth(4)
            .max_samples(20)
            .parallel(false)
            .map_min_properties(3)
            .build();

        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_samples, 20);
        assert!(!config.parallel);
        assert_eq!(config.map_min_properties, 3);
    }

    #[test]
    fn test_threshold_clamping() {
        let config = InferenceConfig::builder()
            .pattern_match_threshold(1.5) // Should clamp to 1.0
            .type_flip_threshold(-0.2)
            .build();

        assert_eq!(config.pattern_match_threshold, 1.0);
        assert_eq!(config.type_flip_threshold, 0.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = InferenceConfig {
            type_flip_threshold: 1.2,
            ..InferenceConfig::default()
        };
        assert!(matches!(config.validate(), Err(InferenceError::InvalidConfig(_))));
    }
}
