//! Schema identifiers and name resolution

use std::collections::HashSet;

use super::naming;
use crate::models::{FieldInfo, SchemaDetails};

/// How a name was matched to a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Same name ignoring case and separators
    Exact,
    /// Singular or plural form of the schema name
    Inflected,
    /// One name contains the other
    Substring,
}

impl NameMatch {
    pub fn is_fuzzy(&self) -> bool {
        matches!(self, NameMatch::Substring)
    }
}

/// A schema with the identifier it is known by during detection
#[derive(Debug, Clone)]
pub struct CatalogEntry<'a> {
    pub id: String,
    pub schema: &'a SchemaDetails,
    /// Comparison key, see [`naming::canonical`]
    canonical: String,
    compact: String,
}

impl<'a> CatalogEntry<'a> {
    pub fn field(&self, path: &str) -> Option<&'a FieldInfo> {
        self.schema.field(path)
    }

    /// Whether the field set is unique on this schema
    ///
    /// True for the primary key, a declared unique constraint or a single field
    /// flagged `unique`/`primary_key`.
    pub fn is_unique(&self, fields: &[String]) -> bool {
        self.schema.is_unique_field_set(fields)
    }

    /// Fields identifying a row: primary key, else an `id` field
    pub fn identifier_fields(&self) -> Vec<String> {
        if !self.schema.primary_keys.is_empty() {
            return self.schema.primary_keys.clone();
        }
        self.schema
            .top_level_fields()
            .find(|f| f.name.eq_ignore_ascii_case("id"))
            .map(|f| vec![f.path.clone()])
            .unwrap_or_default()
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

/// Identifiers and name lookup over the schemas of one detection run
#[derive(Debug, Clone)]
pub struct SchemaCatalog<'a> {
    entries: Vec<CatalogEntry<'a>>,
}

impl<'a> SchemaCatalog<'a> {
    /// Identify each schema by `schema_id`, else `name`, else `schema_<index>`
    ///
    /// Duplicate identifiers get a numeric suffix so every entry stays addressable.
    pub fn new(schemas: &'a [SchemaDetails]) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let entries = schemas
            .iter()
            .enumerate()
            .map(|(index, schema)| {
                let base = schema
                    .schema_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("schema_{index}"));
                let mut id = base.clone();
                let mut n = 2;
                while !seen.insert(id.clone()) {
                    id = format!("{base}_{n}");
                    n += 1;
                }
                CatalogEntry {
                    canonical: naming::canonical(&id),
                    compact: naming::compact(&id),
                    id,
                    schema,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[CatalogEntry<'a>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry<'a>> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Resolve a schema reference by exact, then singular/plural, then substring match
    pub fn resolve(&self, name: &str) -> Option<(&CatalogEntry<'a>, NameMatch)> {
        if let Some(entry) = self.get(name) {
            return Some((entry, NameMatch::Exact));
        }
        let compact = naming::compact(name);
        if compact.is_empty() {
            return None;
        }
        if let Some(entry) = self.entries.iter().find(|e| e.compact == compact) {
            return Some((entry, NameMatch::Exact));
        }
        let canonical = naming::canonical(name);
        if let Some(entry) = self.entries.iter().find(|e| e.canonical == canonical) {
            return Some((entry, NameMatch::Inflected));
        }
        // Short fragments match too much
        if canonical.len() < 3 {
            return None;
        }
        self.entries
            .iter()
            .filter(|e| e.canonical.len() >= 3)
            .filter(|e| e.canonical.contains(&canonical) || canonical.contains(&e.canonical))
            // Prefer the closest length
            .min_by_key(|e| e.canonical.len().abs_diff(canonical.len()))
            .map(|e| (e, NameMatch::Substring))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataType, FieldConstraint, constraint_kinds};

    fn schema(id: Option<&str>, fields: &[&str]) -> SchemaDetails {
        let mut schema = match id {
            Some(id) => SchemaDetails::new().with_id(id),
            None => SchemaDetails::new(),
        };
        for f in fields {
            schema.fields.push(FieldInfo::new(*f, *f, DataType::String));
        }
        schema
    }

    #[test]
    fn test_identifiers() {
        let schemas = vec![schema(Some("users"), &[]), schema(None, &[]), schema(Some("users"), &[])];
        let catalog = SchemaCatalog::new(&schemas);
        let ids: Vec<&str> = catalog.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["users", "schema_1", "users_2"]);
    }

    #[test]
    fn test_resolve() {
        let schemas = vec![
            schema(Some("users"), &[]),
            schema(Some("OrderItems"), &[]),
            schema(Some("customer_accounts"), &[]),
        ];
        let catalog = SchemaCatalog::new(&schemas);
        let (entry, how) = catalog.resolve("users").unwrap();
        assert_eq!((entry.id.as_str(), how), ("users", NameMatch::Exact));
        let (entry, how) = catalog.resolve("user").unwrap();
        assert_eq!((entry.id.as_str(), how), ("users", NameMatch::Inflected));
        let (entry, how) = catalog.resolve("order_item").unwrap();
        assert_eq!((entry.id.as_str(), how), ("OrderItems", NameMatch::Inflected));
        let (entry, how) = catalog.resolve("customer").unwrap();
        assert_eq!((entry.id.as_str(), how), ("customer_accounts", NameMatch::Substring));
        assert!(catalog.resolve("xy").is_none());
        assert!(catalog.resolve("invoice").is_none());
    }

    #[test]
    fn test_uniqueness() {
        let mut users = schema(Some("users"), &["id", "email", "name"]);
        users.primary_keys = vec!["id".into()];
        users.field_mut("email").unwrap().add_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE));
        let schemas = vec![users];
        let catalog = SchemaCatalog::new(&schemas);
        let entry = catalog.get("users").unwrap();
        assert!(entry.is_unique(&["id".into()]));
        assert!(entry.is_unique(&["email".into()]));
        assert!(!entry.is_unique(&["name".into()]));
        assert!(!entry.is_unique(&[]));
        assert_eq!(entry.identifier_fields(), vec!["id"]);
    }
}
