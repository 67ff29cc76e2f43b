//! Discovery configuration
//!
//! Settings for format detection, type inference and relationship detection,
//! loadable from TOML, YAML or JSON. Every section and field has a default, so
//! a configuration file only needs the values it changes:
//!
//! ```toml
//! keep_failed_files = true
//!
//! [detection]
//! confidence_threshold = 0.8
//! sql_dialect = "postgres"
//!
//! [relationships]
//! min_similarity = 0.7
//! max_relationships = 100
//! ```

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::inference::InferenceConfig;
use crate::relationships::DetectionOptions;

/// Format detection and parsing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum confidence for a detected format (0.0 - 1.0)
    pub confidence_threshold: f64,

    /// Sample records attached to a detection result (0 = none)
    pub sample_records: usize,

    /// Attach the parsed schema to a detection result
    pub include_schema_preview: bool,

    /// SQL dialect for DDL parsing (generic, postgres, mysql, sqlite, mssql, ...)
    pub sql_dialect: String,

    /// Maximum nesting depth followed by parsers
    pub max_depth: usize,

    /// Sample values kept per field
    pub max_field_samples: usize,

    /// Records scanned when inferring schemas from data files
    pub max_records: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            sample_records: 5,
            include_schema_preview: false,
            sql_dialect: "generic".to_string(),
            max_depth: 10,
            max_field_samples: 10,
            max_records: 1000,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> DiscoveryResult<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DiscoveryError::Config(format!(
                "detection.confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.max_depth == 0 {
            return Err(DiscoveryError::Config(
                "detection.max_depth must be at least 1".to_string(),
            ));
        }
        if self.max_records == 0 {
            return Err(DiscoveryError::Config(
                "detection.max_records must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete configuration of a discovery run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub detection: DetectionConfig,
    pub inference: InferenceConfig,
    pub relationships: DetectionOptions,
    /// Report unparseable files as schemas carrying `metadata.error`
    pub keep_failed_files: bool,
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("Failed to parse TOML configuration")
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        serde_yaml::from_str(input).context("Failed to parse YAML configuration")
    }

    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("Failed to parse JSON configuration")
    }

    /// Load a configuration file, choosing the syntax from its extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {:?}", path))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let config = match extension.as_str() {
            "toml" => Self::from_toml_str(&content),
            "yaml" | "yml" => Self::from_yaml_str(&content),
            "json" => Self::from_json_str(&content),
            other => bail!("Unsupported configuration file extension '{other}': {:?}", path),
        }
        .with_context(|| format!("Invalid configuration in {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {:?}", path))?;
        Ok(config)
    }

    /// Reject out-of-range values in any section
    pub fn validate(&self) -> DiscoveryResult<()> {
        self.detection.validate()?;
        self.inference
            .validate()
            .map_err(|e| DiscoveryError::Config(e.to_string()))?;
        self.relationships
            .validate()
            .map_err(|e| DiscoveryError::Config(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.detection.confidence_threshold, 0.7);
        assert_eq!(config.detection.sample_records, 5);
        assert_eq!(config.detection.sql_dialect, "generic");
        assert_eq!(config.relationships.min_similarity, 0.6);
        assert!(!config.keep_failed_files);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            keep_failed_files = true

            [detection]
            confidence_threshold = 0.8
            sql_dialect = "postgres"

            [inference]
            max_samples = 20

            [relationships]
            max_relationships = 50
            "#,
        )
        .unwrap();
        assert!(config.keep_failed_files);
        assert_eq!(config.detection.confidence_threshold, 0.8);
        assert_eq!(config.detection.sql_dialect, "postgres");
        assert_eq!(config.detection.max_depth, 10);
        assert_eq!(config.inference.max_samples, 20);
        assert_eq!(config.relationships.max_relationships, Some(50));
    }

    #[test]
    fn test_from_yaml_and_json() {
        let yaml = DiscoveryConfig::from_yaml_str("relationships:\n  min_similarity: 0.75\n").unwrap();
        assert_eq!(yaml.relationships.min_similarity, 0.75);

        let json = DiscoveryConfig::from_json_str(r#"{"detection": {"sample_records": 0}}"#).unwrap();
        assert_eq!(json.detection.sample_records, 0);
        assert_eq!(json.detection.confidence_threshold, 0.7);
    }

    #[test]
    fn test_validate_reports_section() {
        let mut config = DiscoveryConfig::default();
        config.detection.confidence_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("detection.confidence_threshold"));

        let mut config = DiscoveryConfig::default();
        config.inference.type_flip_threshold = -0.1;
        assert!(matches!(config.validate(), Err(DiscoveryError::Config(_))));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(DiscoveryConfig::from_toml_str("detection = 3").is_err());
    }
}
