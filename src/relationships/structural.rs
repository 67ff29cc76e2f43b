//! Structural similarity between schema pairs
//!
//! Every unordered pair of schemas is compared field by field, so the cost is
//! O(schemas² · fields²). Inputs above `max_structural_schemas` schemas or
//! `max_structural_fields` fields per schema are rejected with
//! [`RelationshipError::LimitExceeded`].

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use super::catalog::{CatalogEntry, SchemaCatalog};
use super::naming;
use super::similarity::compare_fields;
use super::{DetectionOptions, DetectionStrategy, RelationshipError, RelationshipResult};
use crate::models::{FieldInfo, RelationshipConfidence, RelationshipType, SchemaRelationship};

pub const STRATEGY: &str = "structural_similarity";

/// Structural evidence alone never reaches full confidence
const MAX_CONFIDENCE: f64 = 0.9;
const MATCH_BONUS: f64 = 0.05;
const MAX_MATCH_BONUS: f64 = 0.2;
const DIRECTION_BONUS: f64 = 0.05;
const MAX_COVERAGE_BONUS: f64 = 0.1;

/// Names every schema tends to carry; equal names say nothing about a link
const GENERIC_FIELDS: &[&str] = &[
    "id", "uuid", "guid", "key", "pk", "oid", "rowid", "createdat", "updatedat", "deletedat",
    "modifiedat", "created", "updated", "modified", "version", "name", "description", "title",
    "type", "status",
];

/// Proposes relationships between schemas sharing similar fields
#[derive(Debug, Default)]
pub struct StructuralSimilarityStrategy;

impl StructuralSimilarityStrategy {
    pub fn new() -> Self {
        Self
    }
}

fn is_generic(field: &FieldInfo) -> bool {
    GENERIC_FIELDS.contains(&naming::compact(&field.name).as_str())
}

fn comparable<'a>(entry: &CatalogEntry<'a>) -> Vec<&'a FieldInfo> {
    entry
        .schema
        .fields
        .iter()
        .filter(|f| !f.data_type.is_container())
        .collect()
}

/// Matched fields sharing one similarity value
#[derive(Debug, Default)]
struct MatchGroup {
    left: Vec<String>,
    right: Vec<String>,
}

fn compare_pair(
    left: &CatalogEntry<'_>,
    right: &CatalogEntry<'_>,
    min_similarity: f64,
) -> Vec<SchemaRelationship> {
    let left_fields = comparable(left);
    let right_fields = comparable(right);
    if left_fields.is_empty() || right_fields.is_empty() {
        return Vec::new();
    }

    // Keyed by similarity in hundredths so equal scores group together
    let mut groups: BTreeMap<u32, MatchGroup> = BTreeMap::new();
    for a in &left_fields {
        for b in &right_fields {
            if is_generic(a) && is_generic(b) {
                continue;
            }
            let score = compare_fields(a, b).score();
            if score < min_similarity {
                continue;
            }
            let group = groups.entry((score * 100.0).round() as u32).or_default();
            if !group.left.contains(&a.path) && !group.right.contains(&b.path) {
                group.left.push(a.path.clone());
                group.right.push(b.path.clone());
            }
        }
    }

    let smaller = left_fields.len().min(right_fields.len()) as f64;
    groups
        .into_iter()
        .rev()
        .map(|(key, group)| {
            let similarity = key as f64 / 100.0;
            let matches = group.left.len();
            let left_unique = left.is_unique(&group.left);
            let right_unique = right.is_unique(&group.right);

            let mut confidence = RelationshipConfidence::new(similarity, STRATEGY)
                .with_factor("field_similarity", similarity)
                .with_factor("match_count", (matches as f64 * MATCH_BONUS).min(MAX_MATCH_BONUS));
            if left_unique != right_unique {
                confidence.add_factor("direction", DIRECTION_BONUS);
            }
            confidence.add_factor(
                "schema_coverage",
                (matches as f64 / smaller).min(1.0) * MAX_COVERAGE_BONUS,
            );
            confidence.recompute(0.0);
            confidence.score = confidence.score.min(MAX_CONFIDENCE);

            // The non-unique side references the unique one
            let (source, target, source_fields, target_fields) = if left_unique && !right_unique {
                (right, left, group.right, group.left)
            } else {
                (left, right, group.left, group.right)
            };
            let relationship_type = RelationshipType::from_uniqueness(
                source.is_unique(&source_fields),
                target.is_unique(&target_fields),
            );
            SchemaRelationship::new(
                source.id.clone(),
                target.id.clone(),
                source_fields,
                target_fields,
                relationship_type,
                confidence,
            )
            .with_metadata("similarity", similarity)
        })
        .collect()
}

impl StructuralSimilarityStrategy {
    fn check_limits(
        &self,
        catalog: &SchemaCatalog<'_>,
        options: &DetectionOptions,
    ) -> RelationshipResult<()> {
        if catalog.len() > options.max_structural_schemas {
            return Err(RelationshipError::LimitExceeded {
                strategy: STRATEGY.to_string(),
                what: "schemas",
                count: catalog.len(),
                limit: options.max_structural_schemas,
            });
        }
        if let Some(widest) = catalog.entries().iter().map(|e| e.schema.fields.len()).max()
            && widest > options.max_structural_fields
        {
            return Err(RelationshipError::LimitExceeded {
                strategy: STRATEGY.to_string(),
                what: "fields",
                count: widest,
                limit: options.max_structural_fields,
            });
        }
        Ok(())
    }
}

impl DetectionStrategy for StructuralSimilarityStrategy {
    fn name(&self) -> &str {
        STRATEGY
    }

    fn priority(&self) -> i32 {
        30
    }

    fn detect(
        &self,
        catalog: &SchemaCatalog<'_>,
        options: &DetectionOptions,
    ) -> RelationshipResult<Vec<SchemaRelationship>> {
        self.check_limits(catalog, options)?;

        let entries = catalog.entries();
        let pairs: Vec<(usize, usize)> = (0..entries.len())
            .flat_map(|i| ((i + 1)..entries.len()).map(move |j| (i, j)))
            .collect();
        let compare = |&(i, j): &(usize, usize)| {
            compare_pair(&entries[i], &entries[j], options.min_similarity)
        };

        let found: Vec<SchemaRelationship> = if options.parallel {
            pairs.par_iter().flat_map_iter(compare).collect()
        } else {
            pairs.iter().flat_map(compare).collect()
        };
        debug!(
            "Structural comparison of {} schema pairs proposed {} relationships",
            pairs.len(),
            found.len()
        );
        Ok(found)
    }
}
