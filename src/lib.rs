//! Schema Discovery - format detection, schema extraction and relationship discovery
//!
//! Provides unified interfaces for:
//! - Format detection and schema extraction for data files and schema languages
//!   (JSON, YAML, CSV, XML, Parquet, ORC, Avro, JSON Schema, XSD, Protobuf,
//!   GraphQL, OpenAPI, SQL DDL)
//! - Type inference with explainable confidence scores
//! - Relationship detection across schemas
//! - An end-to-end discovery pipeline over many files

pub mod config;
pub mod error;
pub mod formats;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod relationships;

// Re-export commonly used types
pub use config::{DetectionConfig, DiscoveryConfig};
pub use error::{DiscoveryError, DiscoveryResult};
pub use formats::{FormatParser, FormatRegistry, ParseError, ParseResult, ParserOptions};
pub use inference::{
    InferenceConfig, InferenceError, TypeEnhancer, TypeInferenceEngine,
};
pub use pipeline::{DiscoveryReport, FileOutcome, SchemaDiscovery, SourceFile};
pub use relationships::{
    DetectionOptions, DetectionStrategy, RelationshipDetectionEngine, RelationshipError,
};

// Re-export models
pub use models::{
    Confidence, DataType, EnhancedTypeInfo, FieldConstraint, FieldInfo, ForeignKeyDefinition,
    FormatDetectionResult, FormatInfo, RelationshipType, SchemaDetails, SchemaRelationship,
    SchemaRelationshipStore, TypePattern,
};
