//! Naming helpers: case normalization and English singular/plural forms

use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

static ACRONYM_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").unwrap());

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").unwrap());

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("datum", "data"),
    ("index", "indices"),
    ("criterion", "criteria"),
];

const UNCOUNTABLE: &[&str] = &[
    "data", "metadata", "info", "information", "news", "series", "species", "status",
    "equipment", "software", "feedback", "analysis",
];

/// Convert camelCase, PascalCase, kebab-case or dotted names to snake_case
pub fn to_snake_case(name: &str) -> String {
    let step = ACRONYM_BOUNDARY.replace_all(name, "${1}_${2}");
    let step = CAMEL_BOUNDARY.replace_all(&step, "${1}_${2}");
    let step = SEPARATORS.replace_all(&step, "_");
    step.trim_matches('_').to_lowercase()
}

/// Snake-case name with all separators removed, for loose comparison
pub fn compact(name: &str) -> String {
    to_snake_case(name).replace('_', "")
}

/// Singular form of an English noun (best effort)
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.len() <= 2 || UNCOUNTABLE.contains(&lower.as_str()) {
        return lower;
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == lower) {
        return singular.to_string();
    }
    if IRREGULAR.iter().any(|(singular, _)| *singular == lower) {
        return lower;
    }
    if let Some(stem) = lower.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = lower.strip_suffix("lves") {
        return format!("{stem}lf");
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if lower.ends_with(suffix) {
            return lower[..lower.len() - 2].to_string();
        }
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return lower;
    }
    if let Some(stem) = lower.strip_suffix('s') {
        return stem.to_string();
    }
    lower
}

/// Plural form of an English noun (best effort)
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return lower;
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return plural.to_string();
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return lower;
    }
    let bytes = lower.as_bytes();
    if lower.ends_with('y')
        && bytes.len() > 1
        && !matches!(bytes[bytes.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u')
    {
        return format!("{}ies", &lower[..lower.len() - 1]);
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| lower.ends_with(s)) {
        return format!("{lower}es");
    }
    format!("{lower}s")
}

/// Canonical comparison key for a schema or entity name
///
/// Snake-cased, singular, separators removed: `OrderItems`, `order_items` and
/// `order-item` all map to `orderitem`.
pub fn canonical(name: &str) -> String {
    let snake = to_snake_case(name);
    let mut parts: Vec<String> = snake.split('_').map(str::to_string).collect();
    if let Some(last) = parts.last_mut() {
        *last = singularize(last);
    }
    parts.concat()
}

/// Last segment of a dotted/`@` path
pub fn leaf_name(path: &str) -> &str {
    path.rsplit(['.', '@']).next().unwrap_or(path)
}

/// File stem without directories or extensions
pub fn file_stem(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.split('.').next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(to_snake_case("userId"), "user_id");
        assert_eq!(to_snake_case("UserAccount"), "user_account");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("created-at"), "created_at");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("status"), "status");
        assert_eq!(singularize("user"), "user");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("key"), "keys");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("person"), "people");
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("OrderItems"), "orderitem");
        assert_eq!(canonical("order_items"), "orderitem");
        assert_eq!(canonical("users"), "user");
    }

    #[test]
    fn test_paths_and_files() {
        assert_eq!(leaf_name("orders.items.sku"), "sku");
        assert_eq!(leaf_name("user@id"), "id");
        assert_eq!(file_stem("data/users.schema.json"), "users");
    }
}
