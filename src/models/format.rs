//! Format descriptors and detection results

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::SchemaDetails;

/// What a format parser is able to provide
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCapabilities {
    pub schema_extraction: bool,
    pub type_inference: bool,
    pub relationship_detection: bool,
    pub streaming: bool,
}

impl FormatCapabilities {
    /// Capabilities of a data format (rows to infer types from)
    pub fn data() -> Self {
        Self {
            schema_extraction: true,
            type_inference: true,
            relationship_detection: false,
            streaming: false,
        }
    }

    /// Capabilities of a schema language with declared types
    pub fn schema_language() -> Self {
        Self {
            schema_extraction: true,
            type_inference: false,
            relationship_detection: true,
            streaming: false,
        }
    }

    pub fn with_streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    pub fn with_relationships(mut self) -> Self {
        self.relationship_detection = true;
        self
    }
}

/// Static description of a supported format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub mime_types: Vec<String>,
    pub extensions: Vec<String>,
    pub capabilities: FormatCapabilities,
    #[serde(default)]
    pub examples: Vec<String>,
    /// "data", "schema" or "columnar"
    pub schema_type: String,
    pub version: String,
}

impl FormatInfo {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            mime_types: Vec::new(),
            extensions: Vec::new(),
            capabilities: FormatCapabilities::default(),
            examples: Vec::new(),
            schema_type: "data".to_string(),
            version: "1.0".to_string(),
        }
    }

    pub fn mime_types(mut self, mime_types: &[&str]) -> Self {
        self.mime_types = mime_types.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn capabilities(mut self, capabilities: FormatCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn examples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn schema_type(mut self, schema_type: &str) -> Self {
        self.schema_type = schema_type.to_string();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Whether the format claims the extension (case-insensitive, no dot)
    pub fn has_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    pub fn primary_mime_type(&self) -> Option<&str> {
        self.mime_types.first().map(String::as_str)
    }
}

/// Outcome of format detection for one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDetectionResult {
    pub format_id: Option<String>,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data: Option<Vec<Value>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_preview: Option<SchemaDetails>,
    pub detection_time: DateTime<Utc>,
}

impl FormatDetectionResult {
    /// Result that reports no format
    pub fn unknown(file_size: usize, confidence: f64) -> Self {
        Self {
            format_id: None,
            confidence,
            mime_type: None,
            file_size,
            detected_encoding: None,
            sample_data: None,
            metadata: BTreeMap::new(),
            schema_preview: None,
            detection_time: Utc::now(),
        }
    }

    pub fn is_detected(&self) -> bool {
        self.format_id.is_some()
    }
}
