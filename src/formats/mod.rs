//! Format parser plugins
//!
//! Each supported format implements [`FormatParser`]: content sniffing, schema
//! extraction into the normalized [`SchemaDetails`] model and sample extraction.
//! Parsers are registered with a [`FormatRegistry`], which detects the format of
//! incoming content and dispatches to the right parser.
//!
//! ## Example
//!
//! ```rust,ignore
//! use schema_discovery::formats::FormatRegistry;
//!
//! let registry = FormatRegistry::with_defaults();
//! let detection = registry.detect_format(Some("users.csv"), b"id,name\n1,Alice\n")?;
//! assert_eq!(detection.format_id.as_deref(), Some("csv"));
//!
//! let schema = registry.parse(Some("users.csv"), b"id,name\n1,Alice\n")?;
//! assert_eq!(schema.fields.len(), 2);
//! ```

pub mod avro;
pub mod common;
pub mod csv;
mod error;
pub mod graphql;
pub mod json;
pub mod json_schema;
pub mod openapi;
pub mod orc;
pub mod parquet;
pub mod protobuf;
mod registry;
pub mod sql;
pub mod xml;
pub mod xsd;
pub mod yaml;

use serde_json::Value;

use crate::config::DetectionConfig;
use crate::models::{FormatInfo, SchemaDetails};

pub use error::{ParseError, ParseResult};
pub use registry::{FormatRegistry, ParserRegistration};

pub use self::avro::AvroParser;
pub use self::csv::CsvParser;
pub use self::graphql::GraphQlParser;
pub use self::json::JsonParser;
pub use self::json_schema::JsonSchemaParser;
pub use self::openapi::OpenApiParser;
pub use self::orc::OrcParser;
pub use self::parquet::ParquetParser;
pub use self::protobuf::ProtobufParser;
pub use self::sql::SqlParser;
pub use self::xml::XmlParser;
pub use self::xsd::XsdParser;
pub use self::yaml::YamlParser;

/// Contract implemented by every format plugin
///
/// Implementations hold no mutable state: identical input always yields
/// identical output, and detection never fails or panics on malformed input.
pub trait FormatParser: Send + Sync {
    /// Static description of the format
    fn format_info(&self) -> &FormatInfo;

    /// Confidence in `[0, 1]` that `content` is in this format; 0.0 means no
    fn can_parse(&self, filename: Option<&str>, content: &[u8]) -> f64;

    /// Extract the schema of the whole document
    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails>;

    /// Extract one schema per entity (table, message, type, component)
    fn parse_schemas(
        &self,
        filename: Option<&str>,
        content: &[u8],
    ) -> ParseResult<Vec<SchemaDetails>> {
        Ok(vec![self.parse_schema(filename, content)?])
    }

    /// Up to `max_records` records: real rows for data formats, fabricated
    /// structural samples for schema languages
    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>>;

    /// Format identifier
    fn format_id(&self) -> &str {
        &self.format_info().id
    }
}

/// Settings shared by the built-in parsers
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
    /// Maximum nesting depth walked before giving up
    pub max_depth: usize,
    /// Sample values kept per field
    pub max_samples: usize,
    /// Maximum data records read for inference
    pub max_records: usize,
    /// SQL dialect name understood by `sqlparser`
    pub sql_dialect: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_samples: 10,
            max_records: 1000,
            sql_dialect: "generic".to_string(),
        }
    }
}

impl From<&DetectionConfig> for ParserOptions {
    fn from(config: &DetectionConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_samples: config.max_field_samples,
            max_records: config.max_records,
            sql_dialect: config.sql_dialect.clone(),
        }
    }
}

/// One instance of every built-in parser with its registry priority
///
/// Lower priorities win ties. Schema dialects sharing an envelope with a
/// generic data format (OpenAPI, Avro and JSON Schema over JSON/YAML) rank
/// ahead of it.
pub fn builtin_parsers(options: &ParserOptions) -> Vec<(std::sync::Arc<dyn FormatParser>, i32)> {
    use std::sync::Arc;
    vec![
        (Arc::new(OpenApiParser::with_options(options.clone())) as Arc<dyn FormatParser>, 10),
        (Arc::new(AvroParser::with_options(options.clone())), 15),
        (Arc::new(JsonSchemaParser::with_options(options.clone())), 20),
        (Arc::new(XsdParser::with_options(options.clone())), 25),
        (Arc::new(ParquetParser::with_options(options.clone())), 30),
        (Arc::new(OrcParser::with_options(options.clone())), 30),
        (Arc::new(SqlParser::with_options(options.clone())), 35),
        (Arc::new(ProtobufParser::with_options(options.clone())), 35),
        (Arc::new(GraphQlParser::with_options(options.clone())), 35),
        (Arc::new(XmlParser::with_options(options.clone())), 40),
        (Arc::new(JsonParser::with_options(options.clone())), 50),
        (Arc::new(YamlParser::with_options(options.clone())), 60),
        (Arc::new(CsvParser::with_options(options.clone())), 70),
    ]
}
