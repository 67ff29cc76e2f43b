//! Models module
//!
//! Defines the data structures shared by the parsers, the type inference
//! engine and the relationship detection engine. Every type is plain serde data.

pub mod confidence;
pub mod format;
pub mod relationship;
pub mod schema;
pub mod types;

pub use confidence::{Confidence, RelationshipConfidence, TypeConfidence, clamp_score};
pub use format::{FormatCapabilities, FormatDetectionResult, FormatInfo};
pub use relationship::{
    ConfidenceStats, ConfidenceSummary, RelationshipMetadata, RelationshipType,
    SchemaRelationship, SchemaRelationshipStore, StoreMetadata,
};
pub use schema::{
    DataType, FieldConstraint, FieldInfo, ForeignKeyDefinition, IndexDefinition, SchemaDetails,
    SchemaMetadata, constraint_kinds, escape_path_segment,
};
pub use types::{EnhancedTypeInfo, TypeAlternative, TypePattern};
