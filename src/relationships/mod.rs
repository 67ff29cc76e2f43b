//! Relationship detection engine
//!
//! Finds links between schemas with independent strategies and merges their
//! findings into one [`SchemaRelationshipStore`].
//!
//! ## Strategies
//!
//! - **Foreign key** (10) - explicit foreign key declarations
//! - **Name based** (20) - naming conventions such as `user_id` or `fk_order`
//! - **Structural similarity** (30) - fields alike in type, name and constraints
//!
//! Every strategy sees all schemas through a [`SchemaCatalog`]. A failing
//! strategy is logged and recorded in the store metadata; the others still run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use schema_discovery::relationships::{DetectionOptions, RelationshipDetectionEngine};
//!
//! let engine = RelationshipDetectionEngine::default();
//! let store = engine.detect_relationships(&schemas, &DetectionOptions::default())?;
//! for rel in &store.relationships {
//!     println!("{} -> {} ({})", rel.source_schema, rel.target_schema, rel.relationship_type);
//! }
//! ```

mod catalog;
mod consolidate;
mod error;
mod foreign_key;
mod name_based;
pub mod naming;
mod options;
pub mod similarity;
mod store;
mod structural;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::inference::TypeInferenceEngine;
use crate::models::{SchemaDetails, SchemaRelationship, SchemaRelationshipStore};

pub use catalog::{CatalogEntry, NameMatch, SchemaCatalog};
pub use consolidate::consolidate_relationships;
pub use error::{RelationshipError, RelationshipResult};
pub use foreign_key::ForeignKeyStrategy;
pub use name_based::NameBasedStrategy;
pub use options::{DetectionOptions, DetectionOptionsBuilder};
pub use store::build_store;
pub use structural::StructuralSimilarityStrategy;

/// One way of finding relationships
pub trait DetectionStrategy: Send + Sync {
    /// Name recorded in `detection_methods`
    fn name(&self) -> &str;

    /// Lower priorities run first
    fn priority(&self) -> i32;

    fn detect(
        &self,
        catalog: &SchemaCatalog<'_>,
        options: &DetectionOptions,
    ) -> RelationshipResult<Vec<SchemaRelationship>>;
}

/// Runs the registered strategies and consolidates their output
#[derive(Clone)]
pub struct RelationshipDetectionEngine {
    strategies: Vec<Arc<dyn DetectionStrategy>>,
    inference: TypeInferenceEngine,
}

impl std::fmt::Debug for RelationshipDetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipDetectionEngine")
            .field("strategies", &self.strategy_names())
            .field("inference", &self.inference)
            .finish()
    }
}

impl Default for RelationshipDetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationshipDetectionEngine {
    /// Engine with the built-in strategies
    pub fn new() -> Self {
        let mut engine = Self::empty();
        engine.register(Arc::new(ForeignKeyStrategy::new()));
        engine.register(Arc::new(NameBasedStrategy::new()));
        engine.register(Arc::new(StructuralSimilarityStrategy::new()));
        engine
    }

    /// Engine without strategies
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
            inference: TypeInferenceEngine::default(),
        }
    }

    /// Use `inference` when `enhance_types` is set
    pub fn with_inference(mut self, inference: TypeInferenceEngine) -> Self {
        self.inference = inference;
        self
    }

    /// Add a strategy, keeping priority order
    pub fn register(&mut self, strategy: Arc<dyn DetectionStrategy>) {
        self.strategies.push(strategy);
        self.strategies.sort_by_key(|s| s.priority());
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Detect, consolidate and summarize relationships among `schemas`
    pub fn detect_relationships(
        &self,
        schemas: &[SchemaDetails],
        options: &DetectionOptions,
    ) -> RelationshipResult<SchemaRelationshipStore> {
        if schemas.is_empty() {
            return Err(RelationshipError::NoSchemas);
        }
        options.validate()?;

        let enhanced;
        let schemas = if options.enhance_types {
            enhanced = self.inference.enhance_schemas(schemas.to_vec());
            enhanced.as_slice()
        } else {
            schemas
        };
        let catalog = SchemaCatalog::new(schemas);

        let mut raw = Vec::new();
        let mut strategies_run = Vec::new();
        let mut failed_strategies = Vec::new();
        for strategy in &self.strategies {
            match strategy.detect(&catalog, options) {
                Ok(found) => {
                    debug!("Strategy {} proposed {} relationships", strategy.name(), found.len());
                    strategies_run.push(strategy.name().to_string());
                    raw.extend(found);
                }
                Err(e) => {
                    warn!("Relationship strategy {} failed: {}", strategy.name(), e);
                    failed_strategies.push(strategy.name().to_string());
                }
            }
        }

        let raw_count = raw.len();
        let relationships =
            consolidate_relationships(raw, options.confidence_threshold, options.max_relationships);
        debug!(
            "Consolidated {} proposals into {} relationships across {} schemas",
            raw_count,
            relationships.len(),
            catalog.len()
        );

        let schema_ids: Vec<String> = catalog.entries().iter().map(|e| e.id.clone()).collect();
        Ok(build_store(
            relationships,
            &schema_ids,
            strategies_run,
            failed_strategies,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, FieldInfo, ForeignKeyDefinition, RelationshipType};

    struct FailingStrategy;

    impl DetectionStrategy for FailingStrategy {
        fn name(&self) -> &str {
            "failing"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn detect(
            &self,
            _catalog: &SchemaCatalog<'_>,
            _options: &DetectionOptions,
        ) -> RelationshipResult<Vec<SchemaRelationship>> {
            Err(RelationshipError::StrategyFailed {
                strategy: "failing".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    fn blog() -> Vec<SchemaDetails> {
        let mut users = SchemaDetails::new().with_id("users");
        users.fields.push(FieldInfo::new("id", "id", DataType::Integer));
        users.fields.push(FieldInfo::new("username", "username", DataType::String));
        users.primary_keys = vec!["id".into()];

        let mut posts = SchemaDetails::new().with_id("posts");
        posts.fields.push(FieldInfo::new("id", "id", DataType::Integer));
        posts.fields.push(FieldInfo::new("user_id", "user_id", DataType::Integer));
        posts.fields.push(FieldInfo::new("body", "body", DataType::String));
        posts.primary_keys = vec!["id".into()];
        posts.foreign_keys.push(ForeignKeyDefinition::new(
            vec!["user_id".into()],
            "users",
            vec!["id".into()],
        ));
        vec![users, posts]
    }

    #[test]
    fn test_no_schemas() {
        let engine = RelationshipDetectionEngine::new();
        let err = engine
            .detect_relationships(&[], &DetectionOptions::default())
            .unwrap_err();
        assert_eq!(err, RelationshipError::NoSchemas);
    }

    #[test]
    fn test_foreign_key_scenario() {
        let engine = RelationshipDetectionEngine::new();
        let store = engine
            .detect_relationships(&blog(), &DetectionOptions::default())
            .unwrap();
        assert_eq!(store.len(), 1);
        let rel = &store.relationships[0];
        assert_eq!(rel.pair(), ("posts", "users"));
        assert_eq!(rel.relationship_type, RelationshipType::ManyToOne);
        assert!(rel.confidence.score >= 0.85);
        assert!(rel.metadata.detection_methods.contains(&"foreign_key".to_string()));
        assert_eq!(store.metadata.clusters, vec![vec!["posts".to_string(), "users".to_string()]]);
    }

    #[test]
    fn test_failing_strategy_is_recorded() {
        let mut engine = RelationshipDetectionEngine::new();
        engine.register(Arc::new(FailingStrategy));
        assert_eq!(
            engine.strategy_names(),
            vec!["failing", "foreign_key", "name_based", "structural_similarity"]
        );
        let store = engine
            .detect_relationships(&blog(), &DetectionOptions::default())
            .unwrap();
        assert_eq!(store.metadata.failed_strategies, vec!["failing".to_string()]);
        assert_eq!(store.metadata.strategies_run.len(), 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_oversized_structural_input_is_absorbed() {
        let options = DetectionOptions::builder().max_structural_schemas(1).build();
        let store = RelationshipDetectionEngine::new()
            .detect_relationships(&blog(), &options)
            .unwrap();
        assert_eq!(store.metadata.failed_strategies, vec!["structural_similarity".to_string()]);
        assert_eq!(store.len(), 1);
    }
}
