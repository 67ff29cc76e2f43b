//! Format registry: parser registration, detection and dispatch

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::common;
use super::{FormatParser, ParserOptions, builtin_parsers};
use crate::config::DetectionConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{FormatDetectionResult, FormatInfo, SchemaDetails};

/// Confidence for an extension claimed by exactly one parser
const UNIQUE_EXTENSION_CONFIDENCE: f64 = 0.95;
/// Base confidence for an extension shared by several parsers
const SHARED_EXTENSION_CONFIDENCE: f64 = 0.8;
/// Weight of the content score on top of a shared extension
const SHARED_EXTENSION_CONTENT_WEIGHT: f64 = 0.15;

/// Schema type of formats that describe plain records
const GENERIC_SCHEMA_TYPE: &str = "data";

/// A parser registered under its format id
#[derive(Clone)]
pub struct ParserRegistration {
    pub format_id: String,
    pub parser: Arc<dyn FormatParser>,
    /// Lower values win ties
    pub priority: i32,
    pub format_info: FormatInfo,
}

impl std::fmt::Debug for ParserRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistration")
            .field("format_id", &self.format_id)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Registry of format parsers
///
/// Built once and shared read-only; all detection and parsing methods take `&self`.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    registrations: Vec<ParserRegistration>,
    config: DetectionConfig,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FormatRegistry {
    /// Create an empty registry
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            registrations: Vec::new(),
            config,
        }
    }

    /// Registry with every built-in parser and default settings
    pub fn with_defaults() -> Self {
        Self::from_config(&DetectionConfig::default())
    }

    /// Registry with every built-in parser configured from `config`
    pub fn from_config(config: &DetectionConfig) -> Self {
        let mut registry = Self::new(config.clone());
        let options = ParserOptions::from(config);
        for (parser, priority) in builtin_parsers(&options) {
            let format_id = parser.format_id().to_string();
            let format_info = parser.format_info().clone();
            registry.registrations.push(ParserRegistration {
                format_id,
                parser,
                priority,
                format_info,
            });
        }
        registry.sort();
        registry
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Register a parser; format ids must be unique
    pub fn register(&mut self, parser: Arc<dyn FormatParser>, priority: i32) -> DiscoveryResult<()> {
        let format_id = parser.format_id().to_string();
        if self.get(&format_id).is_some() {
            return Err(DiscoveryError::Config(format!(
                "format id '{format_id}' is already registered"
            )));
        }
        let format_info = parser.format_info().clone();
        self.registrations.push(ParserRegistration {
            format_id,
            parser,
            priority,
            format_info,
        });
        self.sort();
        Ok(())
    }

    /// Remove a parser, returning its registration
    pub fn unregister(&mut self, format_id: &str) -> Option<ParserRegistration> {
        let idx = self
            .registrations
            .iter()
            .position(|r| r.format_id == format_id)?;
        Some(self.registrations.remove(idx))
    }

    fn sort(&mut self) {
        self.registrations
            .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.format_id.cmp(&b.format_id)));
    }

    pub fn get(&self, format_id: &str) -> Option<&ParserRegistration> {
        self.registrations.iter().find(|r| r.format_id == format_id)
    }

    /// Parser for a format id
    pub fn parser(&self, format_id: &str) -> DiscoveryResult<Arc<dyn FormatParser>> {
        self.get(format_id)
            .map(|r| Arc::clone(&r.parser))
            .ok_or_else(|| DiscoveryError::UnknownFormatId(format_id.to_string()))
    }

    /// Registrations in priority order
    pub fn registrations(&self) -> &[ParserRegistration] {
        &self.registrations
    }

    pub fn formats(&self) -> Vec<&FormatInfo> {
        self.registrations.iter().map(|r| &r.format_info).collect()
    }

    pub fn format_ids(&self) -> Vec<&str> {
        self.registrations
            .iter()
            .map(|r| r.format_id.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Registrations claiming a file extension
    pub fn formats_for_extension(&self, extension: &str) -> Vec<&ParserRegistration> {
        self.registrations
            .iter()
            .filter(|r| r.format_info.has_extension(extension))
            .collect()
    }

    /// Determine the format of `content`
    ///
    /// Returns a result with `format_id = None` when no parser reaches the
    /// configured confidence threshold. Sample records and a schema preview
    /// are attached as configured.
    pub fn detect_format(
        &self,
        filename: Option<&str>,
        content: &[u8],
    ) -> DiscoveryResult<FormatDetectionResult> {
        self.detect(filename, content, true)
    }

    /// Determine the format of `content` without building any preview
    pub fn identify_format(
        &self,
        filename: Option<&str>,
        content: &[u8],
    ) -> DiscoveryResult<FormatDetectionResult> {
        self.detect(filename, content, false)
    }

    fn detect(
        &self,
        filename: Option<&str>,
        content: &[u8],
        previews: bool,
    ) -> DiscoveryResult<FormatDetectionResult> {
        if self.registrations.is_empty() {
            return Err(DiscoveryError::NoParsers);
        }
        let start = Instant::now();
        let mut candidates: BTreeMap<String, f64> = BTreeMap::new();

        let claimed = common::file_extension(filename)
            .map(|ext| self.formats_for_extension(&ext))
            .unwrap_or_default();

        let (best, method) = match claimed.len() {
            0 => (self.best_by_content(&self.registrations.iter().collect::<Vec<_>>(), filename, content, &mut candidates), "content"),
            1 => {
                let only = claimed[0];
                candidates.insert(only.format_id.clone(), UNIQUE_EXTENSION_CONFIDENCE);
                (Some((only, UNIQUE_EXTENSION_CONFIDENCE)), "extension")
            }
            _ => {
                let scored = self.best_by_content(&claimed, filename, content, &mut candidates);
                let best = match scored {
                    Some((reg, score)) => Some((
                        reg,
                        SHARED_EXTENSION_CONFIDENCE + SHARED_EXTENSION_CONTENT_WEIGHT * score,
                    )),
                    // No content signal: a plain data format over its specializations
                    None => claimed
                        .iter()
                        .find(|r| r.format_info.schema_type == GENERIC_SCHEMA_TYPE)
                        .or(claimed.first())
                        .map(|r| (*r, SHARED_EXTENSION_CONFIDENCE)),
                };
                (best, "extension+content")
            }
        };

        let confidence = best.map(|(_, c)| c).unwrap_or(0.0);
        let mut result = FormatDetectionResult::unknown(content.len(), confidence);
        result.detected_encoding = common::detect_encoding(content).map(str::to_string);
        result.metadata.insert(
            "content_sha256".to_string(),
            Value::String(format!("{:x}", Sha256::digest(content))),
        );
        result
            .metadata
            .insert("candidates".to_string(), json!(candidates));

        match best {
            Some((registration, confidence)) if confidence >= self.config.confidence_threshold => {
                debug!(
                    format = %registration.format_id,
                    confidence,
                    method,
                    "Detected format"
                );
                result.format_id = Some(registration.format_id.clone());
                result.mime_type = registration
                    .format_info
                    .primary_mime_type()
                    .map(str::to_string);
                result
                    .metadata
                    .insert("detection_method".to_string(), json!(method));
                if previews {
                    self.attach_previews(&mut result, registration, filename, content);
                }
            }
            _ => {
                debug!(confidence, filename = ?filename, "No format reached the detection threshold");
                result
                    .metadata
                    .insert("detection_method".to_string(), json!("none"));
            }
        }

        result.metadata.insert(
            "elapsed_ms".to_string(),
            json!(start.elapsed().as_secs_f64() * 1000.0),
        );
        result.detection_time = Utc::now();
        Ok(result)
    }

    fn best_by_content<'a>(
        &self,
        registrations: &[&'a ParserRegistration],
        filename: Option<&str>,
        content: &[u8],
        candidates: &mut BTreeMap<String, f64>,
    ) -> Option<(&'a ParserRegistration, f64)> {
        let mut best: Option<(&'a ParserRegistration, f64)> = None;
        // Registrations are in priority order, so a strict `>` keeps the earlier one on ties
        for registration in registrations {
            let score = registration.parser.can_parse(filename, content).clamp(0.0, 1.0);
            if score > 0.0 {
                candidates.insert(registration.format_id.clone(), score);
            }
            if score > 0.0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((registration, score));
            }
        }
        best
    }

    fn attach_previews(
        &self,
        result: &mut FormatDetectionResult,
        registration: &ParserRegistration,
        filename: Option<&str>,
        content: &[u8],
    ) {
        if self.config.sample_records > 0 {
            match registration
                .parser
                .extract_sample_data(filename, content, self.config.sample_records)
            {
                Ok(samples) => result.sample_data = Some(samples),
                Err(e) => debug!(format = %registration.format_id, error = %e, "Sample extraction failed"),
            }
        }
        if self.config.include_schema_preview {
            match registration.parser.parse_schema(filename, content) {
                Ok(schema) => result.schema_preview = Some(schema),
                Err(e) => debug!(format = %registration.format_id, error = %e, "Schema preview failed"),
            }
        }
    }

    fn resolve(&self, filename: Option<&str>, content: &[u8]) -> DiscoveryResult<&ParserRegistration> {
        let detection = self.identify_format(filename, content)?;
        match detection.format_id {
            Some(id) => self
                .get(&id)
                .ok_or(DiscoveryError::UnknownFormatId(id)),
            None => Err(DiscoveryError::UnknownFormat {
                filename: filename.map(str::to_string),
                confidence: detection.confidence,
            }),
        }
    }

    /// Detect the format and extract the document schema
    pub fn parse(&self, filename: Option<&str>, content: &[u8]) -> DiscoveryResult<SchemaDetails> {
        let registration = self.resolve(filename, content)?;
        Ok(registration.parser.parse_schema(filename, content)?)
    }

    /// Detect the format and extract one schema per entity
    ///
    /// Returns the detected format id with the schemas.
    pub fn parse_entities(
        &self,
        filename: Option<&str>,
        content: &[u8],
    ) -> DiscoveryResult<(String, Vec<SchemaDetails>)> {
        let registration = self.resolve(filename, content)?;
        let schemas = registration.parser.parse_schemas(filename, content)?;
        Ok((registration.format_id.clone(), schemas))
    }

    /// Parse with an explicitly chosen format
    pub fn parse_as(
        &self,
        format_id: &str,
        filename: Option<&str>,
        content: &[u8],
    ) -> DiscoveryResult<SchemaDetails> {
        let parser = self.parser(format_id)?;
        Ok(parser.parse_schema(filename, content)?)
    }

    /// Detect the format and extract sample records
    pub fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> DiscoveryResult<Vec<Value>> {
        let registration = self.resolve(filename, content)?;
        match registration
            .parser
            .extract_sample_data(filename, content, max_records)
        {
            Ok(samples) => Ok(samples),
            Err(e) => {
                warn!(format = %registration.format_id, error = %e, "Sample extraction failed");
                Err(e.into())
            }
        }
    }
}
