//! End-to-end discovery over a set of files
//!
//! Detects the format of each input, extracts one schema per entity, enhances
//! field types and finally detects relationships across everything found.
//! Files are processed in parallel; a file that cannot be detected or parsed
//! is reported in [`DiscoveryReport::files`] and does not stop the run.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::formats::FormatRegistry;
use crate::inference::TypeInferenceEngine;
use crate::models::{SchemaDetails, SchemaRelationshipStore};
use crate::relationships::{DetectionOptions, RelationshipDetectionEngine, naming};

/// Format id recorded for files whose format could not be determined
const UNKNOWN_FORMAT: &str = "unknown";

/// One input document
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a file from disk, named by its path
    pub fn from_path(path: impl AsRef<Path>) -> DiscoveryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        Ok(Self::new(path.to_string_lossy(), content))
    }
}

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub filename: String,
    /// Detected format id
    pub format: Option<String>,
    pub schema_count: usize,
    pub error: Option<String>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Enhanced schemas in input order
    pub schemas: Vec<SchemaDetails>,
    /// Absent when no file produced a usable schema
    pub relationships: Option<SchemaRelationshipStore>,
    pub files: Vec<FileOutcome>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

impl DiscoveryReport {
    pub fn schema(&self, id: &str) -> Option<&SchemaDetails> {
        self.schemas.iter().find(|s| s.schema_id() == Some(id))
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.is_success())
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.as_ref().map_or(0, SchemaRelationshipStore::len)
    }
}

/// Discovery pipeline built from a [`DiscoveryConfig`]
#[derive(Debug, Clone)]
pub struct SchemaDiscovery {
    config: DiscoveryConfig,
    registry: FormatRegistry,
    inference: TypeInferenceEngine,
    relationships: RelationshipDetectionEngine,
}

impl SchemaDiscovery {
    /// Pipeline with the built-in parsers, enhancers and strategies
    pub fn new(config: DiscoveryConfig) -> DiscoveryResult<Self> {
        config.validate()?;
        let registry = FormatRegistry::from_config(&config.detection);
        let inference = TypeInferenceEngine::new(config.inference.clone());
        let relationships = RelationshipDetectionEngine::new().with_inference(inference.clone());
        Ok(Self {
            config,
            registry,
            inference,
            relationships,
        })
    }

    /// Pipeline with caller-provided components
    pub fn with_components(
        config: DiscoveryConfig,
        registry: FormatRegistry,
        inference: TypeInferenceEngine,
        relationships: RelationshipDetectionEngine,
    ) -> Self {
        Self {
            config,
            registry,
            inference,
            relationships,
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Run detection, parsing, type enhancement and relationship detection
    pub fn discover(&self, inputs: &[SourceFile]) -> DiscoveryResult<DiscoveryReport> {
        if self.registry.is_empty() {
            return Err(DiscoveryError::NoParsers);
        }
        let span = info_span!("discover", files = inputs.len());
        let _enter = span.enter();
        let started_at = Utc::now();
        let start = Instant::now();

        let processed: Vec<(FileOutcome, Vec<SchemaDetails>)> =
            inputs.par_iter().map(|input| self.process(input)).collect();

        let mut files = Vec::with_capacity(processed.len());
        let mut schemas = Vec::new();
        for (outcome, found) in processed {
            files.push(outcome);
            schemas.extend(found);
        }

        let usable: Vec<SchemaDetails> = schemas.iter().filter(|s| !s.has_error()).cloned().collect();
        let relationships = if usable.is_empty() {
            None
        } else {
            // Types were enhanced per file already
            let options = DetectionOptions {
                enhance_types: false,
                ..self.config.relationships.clone()
            };
            Some(self.relationships.detect_relationships(&usable, &options)?)
        };

        let report = DiscoveryReport {
            schemas,
            relationships,
            files,
            started_at,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
        };
        info!(
            files = report.files.len(),
            failed = report.failed_files().count(),
            schemas = report.schemas.len(),
            relationships = report.relationship_count(),
            elapsed_ms = report.elapsed_ms,
            "Discovery complete"
        );
        Ok(report)
    }

    fn process(&self, input: &SourceFile) -> (FileOutcome, Vec<SchemaDetails>) {
        let filename = Some(input.name.as_str());
        let mut outcome = FileOutcome {
            filename: input.name.clone(),
            format: None,
            schema_count: 0,
            error: None,
        };

        let parsed = self
            .registry
            .identify_format(filename, &input.content)
            .and_then(|detection| {
                let format_id = detection.format_id.ok_or(DiscoveryError::UnknownFormat {
                    filename: Some(input.name.clone()),
                    confidence: detection.confidence,
                })?;
                outcome.format = Some(format_id.clone());
                let parser = self.registry.parser(&format_id)?;
                Ok(parser.parse_schemas(filename, &input.content)?)
            });

        match parsed {
            Ok(found) => {
                let stem = naming::file_stem(&input.name);
                let single = found.len() == 1;
                let schemas: Vec<SchemaDetails> = found
                    .into_iter()
                    .enumerate()
                    .map(|(index, schema)| {
                        let schema = match schema.schema_id() {
                            Some(_) => schema,
                            None if single => schema.with_id(stem.clone()),
                            None => schema.with_id(format!("{stem}_{index}")),
                        };
                        self.inference.enhance_schema(schema)
                    })
                    .collect();
                debug!(file = %input.name, format = ?outcome.format, schemas = schemas.len(), "Parsed file");
                outcome.schema_count = schemas.len();
                (outcome, schemas)
            }
            Err(e) => {
                warn!(file = %input.name, error = %e, "Skipping file");
                outcome.error = Some(e.to_string());
                let kept = if self.config.keep_failed_files {
                    let format = outcome.format.as_deref().unwrap_or(UNKNOWN_FORMAT);
                    vec![SchemaDetails::failed(format, e.to_string()).with_id(naming::file_stem(&input.name))]
                } else {
                    Vec::new()
                };
                (outcome, kept)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::Value;

    use super::*;
    use crate::config::DetectionConfig;
    use crate::formats::{FormatParser, ParseResult};
    use crate::inference::InferenceConfig;
    use crate::models::{FormatCapabilities, FormatInfo};

    /// Parser recording how often it is asked to parse or sample
    struct CountingParser {
        info: FormatInfo,
        parses: AtomicUsize,
        samples: AtomicUsize,
    }

    impl FormatParser for CountingParser {
        fn format_info(&self) -> &FormatInfo {
            &self.info
        }

        fn can_parse(&self, _filename: Option<&str>, _content: &[u8]) -> f64 {
            0.9
        }

        fn parse_schema(&self, _filename: Option<&str>, _content: &[u8]) -> ParseResult<SchemaDetails> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            Ok(SchemaDetails::new())
        }

        fn extract_sample_data(
            &self,
            _filename: Option<&str>,
            _content: &[u8],
            _max_records: usize,
        ) -> ParseResult<Vec<Value>> {
            self.samples.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    fn discovery(keep_failed_files: bool) -> SchemaDiscovery {
        SchemaDiscovery::new(DiscoveryConfig {
            keep_failed_files,
            ..DiscoveryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_failed_file_is_reported() {
        let report = discovery(false)
            .discover(&[
                SourceFile::new("users.csv", "id,name\n1,Ada\n2,Grace\n"),
                SourceFile::new("blob.bin", vec![0u8, 159, 146, 150]),
            ])
            .unwrap();
        assert_eq!(report.files.len(), 2);
        assert!(report.files[0].is_success());
        assert_eq!(report.files[0].format.as_deref(), Some("csv"));
        assert!(!report.files[1].is_success());
        assert_eq!(report.schemas.len(), 1);
        assert_eq!(report.schemas[0].schema_id(), Some("users"));
        assert!(report.schemas[0].fields[0].enhanced_type.is_some());
    }

    #[test]
    fn test_keep_failed_files() {
        let report = discovery(true)
            .discover(&[SourceFile::new("blob.bin", vec![0u8, 159, 146, 150])])
            .unwrap();
        assert_eq!(report.schemas.len(), 1);
        assert!(report.schemas[0].has_error());
        assert_eq!(report.schemas[0].metadata.format.as_deref(), Some(UNKNOWN_FORMAT));
        assert!(report.relationships.is_none());
    }

    #[test]
    fn test_each_file_parsed_once() {
        let parser = Arc::new(CountingParser {
            info: FormatInfo::new("counted", "Counted", "test format")
                .extensions(&["cnt"])
                .capabilities(FormatCapabilities::data()),
            parses: AtomicUsize::new(0),
            samples: AtomicUsize::new(0),
        });
        let detection = DetectionConfig {
            include_schema_preview: true,
            ..DetectionConfig::default()
        };
        let mut registry = FormatRegistry::new(detection);
        registry.register(parser.clone(), 1).unwrap();
        let inference = TypeInferenceEngine::new(InferenceConfig::default());
        let discovery = SchemaDiscovery::with_components(
            DiscoveryConfig::default(),
            registry,
            inference.clone(),
            RelationshipDetectionEngine::new().with_inference(inference),
        );

        let report = discovery.discover(&[SourceFile::new("data.cnt", "x")]).unwrap();
        assert_eq!(report.files[0].format.as_deref(), Some("counted"));
        assert_eq!(report.schemas[0].schema_id(), Some("data"));
        assert_eq!(parser.parses.load(Ordering::SeqCst), 1);
        assert_eq!(parser.samples.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = DiscoveryConfig::default();
        config.relationships.confidence_threshold = 3.0;
        assert!(matches!(SchemaDiscovery::new(config), Err(DiscoveryError::Config(_))));
    }
}
