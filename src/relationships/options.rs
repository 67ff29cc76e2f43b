//! Options for relationship detection

use serde::{Deserialize, Serialize};

use super::error::{RelationshipError, RelationshipResult};

/// Options for one relationship detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionOptions {
    /// Relationships below this consolidated confidence are dropped (0.0 - 1.0)
    pub confidence_threshold: f64,

    /// Keep at most this many relationships, highest confidence first
    pub max_relationships: Option<usize>,

    /// Run type inference on the schemas before detection
    pub enhance_types: bool,

    /// Minimum field similarity for the structural strategy (0.0 - 1.0)
    pub min_similarity: f64,

    /// Structural comparison is skipped above this many schemas
    pub max_structural_schemas: usize,

    /// Structural comparison is skipped when a schema has more fields than this
    pub max_structural_fields: usize,

    /// Compare schema pairs in parallel
    pub parallel: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_relationships: None,
            enhance_types: true,
            min_similarity: 0.6,
            max_structural_schemas: 200,
            max_structural_fields: 500,
            parallel: true,
        }
    }
}

impl DetectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom options
    pub fn builder() -> DetectionOptionsBuilder {
        DetectionOptionsBuilder::default()
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> RelationshipResult<()> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("min_similarity", self.min_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RelationshipError::InvalidOptions(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.max_relationships == Some(0) {
            return Err(RelationshipError::InvalidOptions(
                "max_relationships must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for DetectionOptions
#[derive(Debug, Default)]
pub struct DetectionOptionsBuilder {
    options: DetectionOptions,
}

impl DetectionOptionsBuilder {
    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.options.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn max_relationships(mut self, max: usize) -> Self {
        self.options.max_relationships = Some(max.max(1));
        self
    }

    pub fn enhance_types(mut self, enhance: bool) -> Self {
        self.options.enhance_types = enhance;
        self
    }

    pub fn min_similarity(mut self, similarity: f64) -> Self {
        self.options.min_similarity = similarity.clamp(0.0, 1.0);
        self
    }

    pub fn max_structural_schemas(mut self, max: usize) -> Self {
        self.options.max_structural_schemas = max;
        self
    }

    pub fn max_structural_fields(mut self, max: usize) -> Self {
        self.options.max_structural_fields = max;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.options.parallel = parallel;
        self
    }

    pub fn build(self) -> DetectionOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DetectionOptions::default();
        assert_eq!(options.confidence_threshold, 0.5);
        assert_eq!(options.min_similarity, 0.6);
        assert!(options.enhance_types);
        assert!(options.max_relationships.is_none());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_builder_clamps() {
        let options = DetectionOptions::builder()
            .confidence_threshold(1.4)
            .min_similarity(-1.0)
            .max_relationships(0)
            .enhance_types(false)
            .build();
        assert_eq!(options.confidence_threshold, 1.0);
        assert_eq!(options.min_similarity, 0.0);
        assert_eq!(options.max_relationships, Some(1));
        assert!(!options.enhance_types);
    }

    #[test]
    fn test_validate() {
        let options = DetectionOptions {
            min_similarity: 2.0,
            ..DetectionOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(RelationshipError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_partial_deserialize() {
        let options: DetectionOptions =
            serde_json::from_str(r#"{"confidence_threshold": 0.7, "max_relationships": 10}"#).unwrap();
        assert_eq!(options.confidence_threshold, 0.7);
        assert_eq!(options.max_relationships, Some(10));
        assert_eq!(options.min_similarity, 0.6);
    }
}
