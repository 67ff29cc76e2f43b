//! Reference detection from field naming conventions

use std::collections::HashSet;

use tracing::debug;

use super::catalog::{CatalogEntry, NameMatch, SchemaCatalog};
use super::naming;
use super::similarity::{effective_type, type_compatibility};
use super::{DetectionOptions, DetectionStrategy, RelationshipResult};
use crate::models::{FieldInfo, RelationshipConfidence, RelationshipType, SchemaRelationship};

pub const STRATEGY: &str = "name_based";

/// Where the schema name sits relative to the marker
#[derive(Debug, Clone, Copy)]
enum Affix {
    Suffix(&'static str),
    Prefix(&'static str),
}

/// Reference naming patterns, most specific first
const PATTERNS: &[(Affix, f64)] = &[
    (Affix::Suffix("id"), 0.75),
    (Affix::Prefix("fk"), 0.7),
    (Affix::Suffix("fk"), 0.7),
    (Affix::Suffix("uuid"), 0.65),
    (Affix::Suffix("ref"), 0.6),
    (Affix::Prefix("id"), 0.55),
    (Affix::Suffix("key"), 0.5),
    (Affix::Suffix("code"), 0.4),
    (Affix::Suffix("no"), 0.3),
    (Affix::Suffix("num"), 0.3),
];

/// Markers that make a compact field name id-like for the reverse scan
const ID_MARKERS: &[&str] = &["id", "uuid", "key", "ref"];

const EMBEDDED_BASE: f64 = 0.5;

/// Infers references from names such as `user_id`, `fk_customer` or `orderRef`
#[derive(Debug, Default)]
pub struct NameBasedStrategy;

impl NameBasedStrategy {
    pub fn new() -> Self {
        Self
    }
}

/// A field name split into schema stem and reference marker
struct Candidate {
    stem: String,
    marker: &'static str,
    base: f64,
}

fn split_name(snake: &str) -> Option<Candidate> {
    PATTERNS.iter().find_map(|(affix, base)| {
        let stem = match affix {
            Affix::Suffix(marker) => snake.strip_suffix(marker)?.strip_suffix('_')?,
            Affix::Prefix(marker) => snake.strip_prefix(marker)?.strip_prefix('_')?,
        };
        if stem.is_empty() {
            return None;
        }
        let marker = match affix {
            Affix::Suffix(m) | Affix::Prefix(m) => *m,
        };
        Some(Candidate {
            stem: stem.to_string(),
            marker,
            base: *base,
        })
    })
}

/// Whether the raw name separates stem and marker with `_` or `-`
fn has_delimiter(name: &str) -> bool {
    name.contains(['_', '-'])
}

/// Fields of `target` a reference with `marker` most likely points at
fn target_fields(target: &CatalogEntry<'_>, marker: &str) -> Vec<String> {
    let identifiers = target.identifier_fields();
    if !identifiers.is_empty() {
        return identifiers;
    }
    target
        .schema
        .top_level_fields()
        .find(|f| naming::compact(&f.name) == marker)
        .map(|f| vec![f.path.clone()])
        .unwrap_or_default()
}

fn build(
    source: &CatalogEntry<'_>,
    field: &FieldInfo,
    target: &CatalogEntry<'_>,
    target_fields: Vec<String>,
    mut confidence: RelationshipConfidence,
) -> SchemaRelationship {
    if let Some(target_field) = target_fields.first().and_then(|path| target.field(path))
        && type_compatibility(effective_type(field), effective_type(target_field)) < 0.5
    {
        confidence.add_factor("type_mismatch", -0.15);
    }
    confidence.recompute(0.0);

    let source_fields = vec![field.path.clone()];
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
    .with_metadata("matched_field", field.name.clone())
}

impl NameBasedStrategy {
    fn match_pattern(
        &self,
        catalog: &SchemaCatalog<'_>,
        source: &CatalogEntry<'_>,
        field: &FieldInfo,
    ) -> Option<SchemaRelationship> {
        let candidate = split_name(&naming::to_snake_case(&field.name))?;
        let (target, how) = catalog.resolve(&candidate.stem)?;
        if target.id == source.id {
            return None;
        }
        let fields = target_fields(target, candidate.marker);
        if fields.is_empty() {
            return None;
        }

        let mut confidence = RelationshipConfidence::new(candidate.base, STRATEGY)
            .with_factor("name_pattern", candidate.base);
        if !target.identifier_fields().is_empty() {
            confidence.add_factor("target_identifier", 0.1);
        }
        if has_delimiter(&field.name) {
            confidence.add_factor("clear_delimiter", 0.05);
        }
        match how {
            NameMatch::Exact => confidence.add_factor("exact_schema_name", 0.1),
            NameMatch::Substring => confidence.add_factor("fuzzy_schema_match", -0.1),
            NameMatch::Inflected => {}
        }
        debug!(
            "Name pattern '{}' links {}.{} to {}",
            candidate.marker, source.id, field.path, target.id
        );
        Some(build(source, field, target, fields, confidence))
    }

    /// Id-like names without a delimiter that embed another schema's name
    fn match_embedded(
        &self,
        catalog: &SchemaCatalog<'_>,
        source: &CatalogEntry<'_>,
        field: &FieldInfo,
    ) -> Option<SchemaRelationship> {
        let compact = naming::compact(&field.name);
        let marker = ID_MARKERS.iter().find(|m| compact.ends_with(*m))?;
        let head = &compact[..compact.len() - marker.len()];
        if head.len() < 3 {
            return None;
        }
        let target = catalog
            .entries()
            .iter()
            .filter(|e| e.id != source.id && e.canonical().len() >= 3)
            .filter(|e| head.contains(e.canonical()))
            .max_by_key(|e| e.canonical().len())?;
        let fields = target_fields(target, marker);
        if fields.is_empty() {
            return None;
        }
        let mut confidence = RelationshipConfidence::new(EMBEDDED_BASE, STRATEGY)
            .with_factor("embedded_schema_name", EMBEDDED_BASE);
        if !target.identifier_fields().is_empty() {
            confidence.add_factor("target_identifier", 0.1);
        }
        Some(build(source, field, target, fields, confidence))
    }
}

impl DetectionStrategy for NameBasedStrategy {
    fn name(&self) -> &str {
        STRATEGY
    }

    fn priority(&self) -> i32 {
        20
    }

    fn detect(
        &self,
        catalog: &SchemaCatalog<'_>,
        _options: &DetectionOptions,
    ) -> RelationshipResult<Vec<SchemaRelationship>> {
        let mut found = Vec::new();
        for source in catalog.entries() {
            let own_keys: HashSet<&str> = source
                .schema
                .primary_keys
                .iter()
                .map(String::as_str)
                .collect();
            // One link per (field, target schema)
            let mut seen: HashSet<(String, String)> = HashSet::new();
            for field in &source.schema.fields {
                if field.data_type.is_container() || own_keys.contains(field.path.as_str()) {
                    continue;
                }
                let matched = self
                    .match_pattern(catalog, source, field)
                    .or_else(|| self.match_embedded(catalog, source, field));
                if let Some(relationship) = matched
                    && seen.insert((field.path.clone(), relationship.target_schema.clone()))
                {
                    found.push(relationship);
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, SchemaDetails};

    fn schema(id: &str, fields: &[(&str, DataType)], pk: Option<&str>) -> SchemaDetails {
        let mut schema = SchemaDetails::new().with_id(id);
        for (name, data_type) in fields {
            schema.fields.push(FieldInfo::new(*name, *name, *data_type));
        }
        if let Some(pk) = pk {
            schema.primary_keys = vec![pk.to_string()];
        }
        schema
    }

    fn detect(schemas: &[SchemaDetails]) -> Vec<SchemaRelationship> {
        let catalog = SchemaCatalog::new(schemas);
        NameBasedStrategy::new()
            .detect(&catalog, &DetectionOptions::default())
            .unwrap()
    }

    #[test]
    fn test_split_name() {
        let c = split_name("user_id").unwrap();
        assert_eq!((c.stem.as_str(), c.marker, c.base), ("user", "id", 0.75));
        let c = split_name("fk_customer").unwrap();
        assert_eq!((c.stem.as_str(), c.marker), ("customer", "fk"));
        let c = split_name("order_item_ref").unwrap();
        assert_eq!(c.stem, "order_item");
        assert!(split_name("id").is_none());
        assert!(split_name("valid").is_none());
    }

    #[test]
    fn test_suffix_id_links_to_plural_schema() {
        let found = detect(&[
            schema("users", &[("id", DataType::Integer)], Some("id")),
            schema(
                "posts",
                &[("id", DataType::Integer), ("user_id", DataType::Integer)],
                Some("id"),
            ),
        ]);
        assert_eq!(found.len(), 1);
        let rel = &found[0];
        assert_eq!(rel.pair(), ("posts", "users"));
        assert_eq!(rel.relationship_type, RelationshipType::ManyToOne);
        assert_eq!(rel.target_fields, vec!["id".to_string()]);
        // 0.75 + identifier 0.1 + delimiter 0.05, inflected name
        assert!((rel.confidence.score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_type_mismatch_penalty() {
        let found = detect(&[
            schema("user", &[("id", DataType::Integer)], Some("id")),
            schema("posts", &[("user_id", DataType::Boolean)], None),
        ]);
        let rel = &found[0];
        assert!(rel.confidence.has_factor("exact_schema_name"));
        assert_eq!(rel.confidence.factor("type_mismatch"), Some(-0.15));
    }

    #[test]
    fn test_embedded_schema_name() {
        let found = detect(&[
            schema("customers", &[("id", DataType::Integer)], Some("id")),
            schema("invoices", &[("billingcustomerid", DataType::Integer)], None),
        ]);
        assert_eq!(found.len(), 1);
        assert!(found[0].confidence.has_factor("embedded_schema_name"));
        assert_eq!(found[0].target_schema, "customers");
    }

    #[test]
    fn test_self_reference_skipped() {
        let found = detect(&[schema(
            "users",
            &[("id", DataType::Integer), ("user_id", DataType::Integer)],
            Some("id"),
        )]);
        assert!(found.is_empty());
    }
}
