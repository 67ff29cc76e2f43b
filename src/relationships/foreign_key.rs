//! Explicit foreign key declarations

use tracing::debug;

use super::catalog::SchemaCatalog;
use super::{DetectionOptions, DetectionStrategy, RelationshipResult};
use crate::models::{
    ForeignKeyDefinition, RelationshipConfidence, RelationshipType, SchemaRelationship,
};

pub const STRATEGY: &str = "foreign_key";

const EXPLICIT_BASE: f64 = 0.9;

/// Turns declared foreign keys into relationships
#[derive(Debug, Default)]
pub struct ForeignKeyStrategy;

impl ForeignKeyStrategy {
    pub fn new() -> Self {
        Self
    }
}

/// Bonus for how fully the constraint was declared, at most 0.07
fn completeness(fk: &ForeignKeyDefinition) -> f64 {
    let mut bonus = 0.0;
    if fk.name.is_some() {
        bonus += 0.03;
    }
    if fk.on_delete.is_some() || fk.on_update.is_some() {
        bonus += 0.02;
    }
    if !fk.target_fields.is_empty() {
        bonus += 0.02;
    }
    bonus
}

impl DetectionStrategy for ForeignKeyStrategy {
    fn name(&self) -> &str {
        STRATEGY
    }

    fn priority(&self) -> i32 {
        10
    }

    fn detect(
        &self,
        catalog: &SchemaCatalog<'_>,
        _options: &DetectionOptions,
    ) -> RelationshipResult<Vec<SchemaRelationship>> {
        let mut found = Vec::new();
        for source in catalog.entries() {
            for fk in &source.schema.foreign_keys {
                if fk.source_fields.is_empty() {
                    continue;
                }
                let Some((target, _)) = catalog.resolve(&fk.target_schema) else {
                    debug!(
                        "Foreign key {}.{:?} references unknown schema '{}'",
                        source.id, fk.source_fields, fk.target_schema
                    );
                    continue;
                };
                let target_fields = if fk.target_fields.is_empty() {
                    target.identifier_fields()
                } else {
                    fk.target_fields.clone()
                };
                let relationship_type = RelationshipType::from_uniqueness(
                    source.is_unique(&fk.source_fields),
                    target.is_unique(&target_fields),
                );

                let mut confidence = RelationshipConfidence::new(EXPLICIT_BASE, STRATEGY)
                    .with_factor("explicit_foreign_key", EXPLICIT_BASE);
                let bonus = completeness(fk);
                if bonus > 0.0 {
                    confidence.add_factor("metadata_completeness", bonus);
                }
                confidence.recompute(0.0);

                let mut relationship = SchemaRelationship::new(
                    source.id.clone(),
                    target.id.clone(),
                    fk.source_fields.clone(),
                    target_fields,
                    relationship_type,
                    confidence,
                );
                if let Some(name) = &fk.name {
                    relationship = relationship.with_metadata("constraint_name", name.clone());
                }
                if let Some(action) = &fk.on_delete {
                    relationship = relationship.with_metadata("on_delete", action.clone());
                }
                if let Some(action) = &fk.on_update {
                    relationship = relationship.with_metadata("on_update", action.clone());
                }
                found.push(relationship);
            }
        }
        Ok(found)
    }
}
