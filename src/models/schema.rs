//! Normalized schema model shared by every parser and downstream stage

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::EnhancedTypeInfo;

/// Primary data type of a field
///
/// Every field carries exactly one primary type. Richer information (formats,
/// value patterns, union members) travels through constraints and enhanced types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Date,
    DateTime,
    Null,
    Binary,
    Enum,
    Uuid,
    Unknown,
}

impl DataType {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Boolean => "BOOLEAN",
            DataType::Array => "ARRAY",
            DataType::Object => "OBJECT",
            DataType::Date => "DATE",
            DataType::DateTime => "DATETIME",
            DataType::Null => "NULL",
            DataType::Binary => "BINARY",
            DataType::Enum => "ENUM",
            DataType::Uuid => "UUID",
            DataType::Unknown => "UNKNOWN",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, DataType::Array | DataType::Object)
    }

    /// Whether this type is a plain scalar (not a container, null or unknown)
    pub fn is_scalar(&self) -> bool {
        !self.is_container() && !matches!(self, DataType::Null | DataType::Unknown)
    }

    /// Type of a JSON value as observed in a data document
    pub fn of_json(value: &Value) -> DataType {
        match value {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    DataType::Integer
                } else {
                    DataType::Float
                }
            }
            Value::String(_) => DataType::String,
            Value::Array(_) => DataType::Array,
            Value::Object(_) => DataType::Object,
        }
    }

    /// Widen two observed types of the same path into one
    pub fn merge(self, other: DataType) -> DataType {
        if self == other {
            return self;
        }
        match (self, other) {
            (DataType::Null, t) | (t, DataType::Null) => t,
            (DataType::Unknown, t) | (t, DataType::Unknown) => t,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            (DataType::Date, DataType::DateTime) | (DataType::DateTime, DataType::Date) => {
                DataType::DateTime
            }
            (a, b) if a.is_container() || b.is_container() => DataType::Unknown,
            _ => DataType::String,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint tags used by the built-in parsers and enhancers
pub mod constraint_kinds {
    pub const PRIMARY_KEY: &str = "primary_key";
    pub const UNIQUE: &str = "unique";
    pub const NOT_NULL: &str = "not_null";
    pub const DEFAULT: &str = "default";
    pub const ENUM: &str = "enum";
    pub const FORMAT: &str = "format";
    pub const PATTERN: &str = "pattern";
    pub const MINIMUM: &str = "minimum";
    pub const MAXIMUM: &str = "maximum";
    pub const EXCLUSIVE_MINIMUM: &str = "exclusive_minimum";
    pub const EXCLUSIVE_MAXIMUM: &str = "exclusive_maximum";
    pub const MULTIPLE_OF: &str = "multiple_of";
    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const MIN_ITEMS: &str = "min_items";
    pub const MAX_ITEMS: &str = "max_items";
    pub const UNIQUE_ITEMS: &str = "unique_items";
    pub const PRECISION: &str = "precision";
    pub const SCALE: &str = "scale";
    pub const MAX_OCCURS: &str = "max_occurs";
    pub const ITEMS_TYPE: &str = "items_type";
    pub const KEY_TYPE: &str = "key_type";
    pub const VALUE_TYPE: &str = "value_type";
    pub const UNION_TYPES: &str = "union_types";
    pub const LOGICAL_TYPE: &str = "logical_type";
    pub const ONEOF: &str = "oneof";
    pub const REFERENCE: &str = "reference";
    pub const FIXED_SIZE: &str = "fixed_size";
}

/// A declared or inferred constraint on a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConstraint {
    /// Constraint tag (see [`constraint_kinds`])
    #[serde(rename = "type")]
    pub constraint_type: String,
    /// Constraint value
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldConstraint {
    pub fn new(constraint_type: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            constraint_type: constraint_type.into(),
            value: value.into(),
            description: None,
        }
    }

    /// Constraint that only marks presence (`value = true`)
    pub fn flag(constraint_type: impl Into<String>) -> Self {
        Self::new(constraint_type, Value::Bool(true))
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A single field of a schema, addressed by its structural path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Leaf name
    pub name: String,
    /// Dot/`@` path, unique within the owning schema
    pub path: String,
    pub data_type: DataType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<FieldConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_values: Option<Vec<Value>>,
    /// Result of the type inference engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_type: Option<EnhancedTypeInfo>,
    /// Format-specific extras (native type names, occurrence counts, ...)
    #[serde(
        default,
        rename = "metadata",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub additional_metadata: BTreeMap<String, Value>,
}

fn default_true() -> bool {
    true
}

impl FieldInfo {
    /// Create a nullable field without constraints
    pub fn new(name: impl Into<String>, path: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            data_type,
            nullable: true,
            description: None,
            constraints: Vec::new(),
            sample_values: None,
            enhanced_type: None,
            additional_metadata: BTreeMap::new(),
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    pub fn with_constraint(mut self, constraint: FieldConstraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    pub fn with_samples(mut self, samples: Vec<Value>) -> Self {
        if !samples.is_empty() {
            self.sample_values = Some(samples);
        }
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.additional_metadata.insert(key.into(), value.into());
        self
    }

    /// Add a constraint unless an identical tag/value pair is already present
    pub fn add_constraint(&mut self, constraint: FieldConstraint) {
        if !self.constraints.iter().any(|c| {
            c.constraint_type == constraint.constraint_type && c.value == constraint.value
        }) {
            self.constraints.push(constraint);
        }
    }

    /// First constraint with the given tag
    pub fn constraint(&self, constraint_type: &str) -> Option<&FieldConstraint> {
        self.constraints
            .iter()
            .find(|c| c.constraint_type == constraint_type)
    }

    pub fn has_constraint(&self, constraint_type: &str) -> bool {
        self.constraint(constraint_type).is_some()
    }

    /// Path of the parent field, if nested
    pub fn parent_path(&self) -> Option<&str> {
        let idx = path_separators(&self.path).last()?;
        Some(&self.path[..idx])
    }

    /// Nesting depth (0 for top-level fields)
    pub fn depth(&self) -> usize {
        path_separators(&self.path).count()
    }
}

/// Escape a single path segment so literal `.`, `@` and `\` are not read as
/// separators
pub fn escape_path_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(['.', '@', '\\']) {
        return Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 2);
    for c in segment.chars() {
        if matches!(c, '.' | '@' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Byte offsets of the unescaped `.` and `@` separators in a path
fn path_separators(path: &str) -> impl Iterator<Item = usize> + '_ {
    let mut escaped = false;
    path.char_indices().filter_map(move |(idx, c)| {
        if escaped {
            escaped = false;
            return None;
        }
        match c {
            '\\' => {
                escaped = true;
                None
            }
            '.' | '@' => Some(idx),
            _ => None,
        }
    })
}

/// Explicit foreign key declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Field paths in the declaring schema
    pub source_fields: Vec<String>,
    /// Identifier (or name) of the referenced schema
    pub target_schema: String,
    /// Referenced fields; empty means "the target's primary key"
    #[serde(default)]
    pub target_fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

impl ForeignKeyDefinition {
    pub fn new(
        source_fields: Vec<String>,
        target_schema: impl Into<String>,
        target_fields: Vec<String>,
    ) -> Self {
        Self {
            name: None,
            source_fields,
            target_schema: target_schema.into(),
            target_fields,
            on_delete: None,
            on_update: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Index declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// Schema-level metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Identifier used to resolve cross-schema references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Format id of the parser that produced the schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
    /// Set only for schemas standing in for a failed parse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Final type confidence per field path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub type_confidence: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, Value>,
}

/// Normalized description of one data source's structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDetails {
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyDefinition>,
    #[serde(default)]
    pub unique_constraints: Vec<Vec<String>>,
    #[serde(default)]
    pub indices: Vec<IndexDefinition>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub metadata: SchemaMetadata,
}

impl SchemaDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty schema recording a parse failure
    pub fn failed(format: &str, error: impl Into<String>) -> Self {
        let mut schema = Self::new();
        schema.metadata.format = Some(format.to_string());
        schema.metadata.error = Some(error.into());
        schema
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if self.metadata.name.is_none() {
            self.metadata.name = Some(id.clone());
        }
        self.metadata.schema_id = Some(id);
        self
    }

    /// Identifier of this schema (explicit id, else name)
    pub fn schema_id(&self) -> Option<&str> {
        self.metadata
            .schema_id
            .as_deref()
            .or(self.metadata.name.as_deref())
    }

    pub fn field(&self, path: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.path == path)
    }

    pub fn field_mut(&mut self, path: &str) -> Option<&mut FieldInfo> {
        self.fields.iter_mut().find(|f| f.path == path)
    }

    /// Fields that are not nested below another field
    pub fn top_level_fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.iter().filter(|f| f.depth() == 0)
    }

    pub fn has_error(&self) -> bool {
        self.metadata.error.is_some()
    }

    /// Whether the given field set is guaranteed unique in this schema
    ///
    /// True when it equals the primary key, a unique constraint or a unique index,
    /// or when it is a single field carrying a `unique`/`primary_key` constraint.
    pub fn is_unique_field_set(&self, fields: &[String]) -> bool {
        if fields.is_empty() {
            return false;
        }
        let wanted: HashSet<&str> = fields.iter().map(String::as_str).collect();
        let same = |candidate: &[String]| {
            candidate.len() == wanted.len() && candidate.iter().all(|f| wanted.contains(f.as_str()))
        };

        if same(&self.primary_keys) {
            return true;
        }
        if self.unique_constraints.iter().any(|u| same(u)) {
            return true;
        }
        if self.indices.iter().any(|i| i.unique && same(&i.fields)) {
            return true;
        }
        if fields.len() == 1 {
            if let Some(field) = self.field(&fields[0]) {
                return field.has_constraint(constraint_kinds::UNIQUE)
                    || field.has_constraint(constraint_kinds::PRIMARY_KEY);
            }
        }
        false
    }

    /// Whether all field paths are pairwise distinct
    pub fn has_unique_paths(&self) -> bool {
        let mut seen = HashSet::new();
        self.fields.iter().all(|f| seen.insert(f.path.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_merge() {
        assert_eq!(DataType::Integer.merge(DataType::Float), DataType::Float);
        assert_eq!(DataType::Null.merge(DataType::Boolean), DataType::Boolean);
        assert_eq!(DataType::Date.merge(DataType::DateTime), DataType::DateTime);
        assert_eq!(DataType::Boolean.merge(DataType::Integer), DataType::String);
        assert_eq!(DataType::Array.merge(DataType::Object), DataType::Unknown);
    }

    #[test]
    fn test_datatype_serialization() {
        let json = serde_json::to_string(&DataType::DateTime).unwrap();
        assert_eq!(json, "\"DATETIME\"");
        let back: DataType = serde_json::from_str("\"UUID\"").unwrap();
        assert_eq!(back, DataType::Uuid);
    }

    #[test]
    fn test_field_paths() {
        let field = FieldInfo::new("id", "user@id", DataType::String);
        assert_eq!(field.parent_path(), Some("user"));
        assert_eq!(field.depth(), 1);

        let top = FieldInfo::new("id", "id", DataType::Integer);
        assert_eq!(top.parent_path(), None);
        assert_eq!(top.depth(), 0);

        let dotted = FieldInfo::new("a.b", r"a\.b", DataType::Integer);
        assert_eq!(dotted.parent_path(), None);
        assert_eq!(dotted.depth(), 0);

        let nested = FieldInfo::new("x@y", r"a\.b.x\@y", DataType::Integer);
        assert_eq!(nested.parent_path(), Some(r"a\.b"));
        assert_eq!(nested.depth(), 1);
    }

    #[test]
    fn test_escape_path_segment() {
        assert_eq!(escape_path_segment("plain"), "plain");
        assert_eq!(escape_path_segment("a.b"), r"a\.b");
        assert_eq!(escape_path_segment(r"c:\d@e"), r"c:\\d\@e");
    }

    #[test]
    fn test_unique_field_set() {
        let mut schema = SchemaDetails::new().with_id("users");
        schema
            .fields
            .push(FieldInfo::new("id", "id", DataType::Integer));
        schema.fields.push(
            FieldInfo::new("email", "email", DataType::String)
                .with_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE)),
        );
        schema
            .fields
            .push(FieldInfo::new("name", "name", DataType::String));
        schema.primary_keys = vec!["id".to_string()];

        assert!(schema.is_unique_field_set(&["id".to_string()]));
        assert!(schema.is_unique_field_set(&["email".to_string()]));
        assert!(!schema.is_unique_field_set(&["name".to_string()]));
        assert!(!schema.is_unique_field_set(&[]));
    }

    #[test]
    fn test_constraint_dedup() {
        let mut field = FieldInfo::new("a", "a", DataType::String);
        field.add_constraint(FieldConstraint::new(constraint_kinds::MAX_LENGTH, 10));
        field.add_constraint(FieldConstraint::new(constraint_kinds::MAX_LENGTH, 10));
        assert_eq!(field.constraints.len(), 1);
    }
}
