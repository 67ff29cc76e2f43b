//! Relationship model for detected cross-schema links

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::confidence::RelationshipConfidence;

/// Cardinality of a relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationshipType {
    /// Classify from uniqueness of the source and target field sets
    pub fn from_uniqueness(source_unique: bool, target_unique: bool) -> Self {
        match (source_unique, target_unique) {
            (true, true) => RelationshipType::OneToOne,
            (false, true) => RelationshipType::ManyToOne,
            (true, false) => RelationshipType::OneToMany,
            (false, false) => RelationshipType::ManyToMany,
        }
    }

    /// Symmetric cardinalities carry no direction
    pub fn is_bidirectional(&self) -> bool {
        matches!(
            self,
            RelationshipType::OneToOne | RelationshipType::ManyToMany
        )
    }

    /// Same relationship seen from the other side
    pub fn reversed(&self) -> Self {
        match self {
            RelationshipType::OneToMany => RelationshipType::ManyToOne,
            RelationshipType::ManyToOne => RelationshipType::OneToMany,
            other => *other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::OneToOne => "ONE_TO_ONE",
            RelationshipType::OneToMany => "ONE_TO_MANY",
            RelationshipType::ManyToOne => "MANY_TO_ONE",
            RelationshipType::ManyToMany => "MANY_TO_MANY",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of a relationship
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    /// Strategies that produced (or agreed on) the relationship
    #[serde(default)]
    pub detection_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, Value>,
}

/// A link between fields of two schemas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRelationship {
    pub id: Uuid,
    pub source_schema: String,
    pub target_schema: String,
    pub source_fields: Vec<String>,
    pub target_fields: Vec<String>,
    pub relationship_type: RelationshipType,
    pub confidence: RelationshipConfidence,
    pub bidirectional: bool,
    #[serde(default)]
    pub metadata: RelationshipMetadata,
}

impl SchemaRelationship {
    /// Create a relationship; symmetric ones are normalized so `source <= target`
    pub fn new(
        source_schema: impl Into<String>,
        target_schema: impl Into<String>,
        source_fields: Vec<String>,
        target_fields: Vec<String>,
        relationship_type: RelationshipType,
        confidence: RelationshipConfidence,
    ) -> Self {
        let mut source_schema = source_schema.into();
        let mut target_schema = target_schema.into();
        let mut source_fields = source_fields;
        let mut target_fields = target_fields;
        let bidirectional = relationship_type.is_bidirectional();

        if bidirectional && source_schema > target_schema {
            std::mem::swap(&mut source_schema, &mut target_schema);
            std::mem::swap(&mut source_fields, &mut target_fields);
        }

        let detection_methods = if confidence.detection_method.is_empty() {
            Vec::new()
        } else {
            vec![confidence.detection_method.clone()]
        };

        Self {
            id: Self::generate_id(&source_schema, &target_schema),
            source_schema,
            target_schema,
            source_fields,
            target_fields,
            relationship_type,
            confidence,
            bidirectional,
            metadata: RelationshipMetadata {
                detection_methods,
                additional: BTreeMap::new(),
            },
        }
    }

    /// Generate a deterministic UUID v5 from the endpoint pair
    ///
    /// The pair is sorted so both directions of the same link share an id.
    pub fn generate_id(source_schema: &str, target_schema: &str) -> Uuid {
        let (a, b) = if source_schema <= target_schema {
            (source_schema, target_schema)
        } else {
            (target_schema, source_schema)
        };
        let key = format!("{a}:{b}");
        Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes())
    }

    /// Consolidation key
    pub fn pair(&self) -> (&str, &str) {
        (&self.source_schema, &self.target_schema)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.additional.insert(key.into(), value.into());
        self
    }

    pub fn involves(&self, schema: &str) -> bool {
        self.source_schema == schema || self.target_schema == schema
    }
}

/// Aggregate statistics over a set of confidence scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl ConfidenceStats {
    pub fn from_scores(scores: &[f64]) -> Self {
        if scores.is_empty() {
            return Self::default();
        }
        let sum: f64 = scores.iter().sum();
        Self {
            count: scores.len(),
            mean: sum / scores.len() as f64,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Overall and per-type confidence statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub overall: ConfidenceStats,
    #[serde(default)]
    pub by_type: BTreeMap<RelationshipType, ConfidenceStats>,
}

/// Bookkeeping about one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    pub schema_count: usize,
    pub relationship_count: usize,
    #[serde(default)]
    pub strategies_run: Vec<String>,
    #[serde(default)]
    pub failed_strategies: Vec<String>,
    /// Connected groups of related schemas
    #[serde(default)]
    pub clusters: Vec<Vec<String>>,
    pub generated_at: DateTime<Utc>,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            schema_count: 0,
            relationship_count: 0,
            strategies_run: Vec::new(),
            failed_strategies: Vec::new(),
            clusters: Vec::new(),
            generated_at: Utc::now(),
        }
    }
}

/// Consolidated output of a relationship detection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRelationshipStore {
    pub relationships: Vec<SchemaRelationship>,
    #[serde(default)]
    pub schema_coverage: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub confidence_summary: ConfidenceSummary,
    #[serde(default)]
    pub metadata: StoreMetadata,
}

impl SchemaRelationshipStore {
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Relationships touching the given schema
    pub fn for_schema<'a>(
        &'a self,
        schema: &'a str,
    ) -> impl Iterator<Item = &'a SchemaRelationship> + 'a {
        self.relationships.iter().filter(move |r| r.involves(schema))
    }

    /// Relationship for an exact ordered pair
    pub fn between(&self, source: &str, target: &str) -> Option<&SchemaRelationship> {
        self.relationships
            .iter()
            .find(|r| r.source_schema == source && r.target_schema == target)
    }

    /// Schemas related to `schema`
    pub fn related(&self, schema: &str) -> &[String] {
        self.schema_coverage
            .get(schema)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_direction_independent() {
        let a = SchemaRelationship::generate_id("posts", "users");
        let b = SchemaRelationship::generate_id("users", "posts");
        assert_eq!(a, b);
        assert_ne!(a, SchemaRelationship::generate_id("posts", "tags"));
    }

    #[test]
    fn test_bidirectional_normalization() {
        let rel = SchemaRelationship::new(
            "users",
            "profiles",
            vec!["id".into()],
            vec!["user_id".into()],
            RelationshipType::OneToOne,
            RelationshipConfidence::new(0.8, "foreign_key"),
        );
        assert!(rel.bidirectional);
        assert_eq!(rel.source_schema, "profiles");
        assert_eq!(rel.source_fields, vec!["user_id".to_string()]);
        assert_eq!(rel.metadata.detection_methods, vec!["foreign_key".to_string()]);
    }

    #[test]
    fn test_cardinality_from_uniqueness() {
        assert_eq!(
            RelationshipType::from_uniqueness(false, true),
            RelationshipType::ManyToOne
        );
        assert_eq!(
            RelationshipType::from_uniqueness(true, false),
            RelationshipType::OneToMany
        );
        assert!(RelationshipType::from_uniqueness(false, false).is_bidirectional());
    }

    #[test]
    fn test_confidence_stats() {
        let stats = ConfidenceStats::from_scores(&[0.5, 0.9, 0.7]);
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 0.7).abs() < 1e-9);
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 0.9);
    }
}
