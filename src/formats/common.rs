//! Helpers shared by the format parsers

use std::borrow::Cow;
use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Duration, NaiveDate};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::error::{ParseError, ParseResult};
use crate::inference::patterns::{self, ValueFormat};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, SchemaDetails, constraint_kinds, escape_path_segment,
};
use crate::relationships::naming;

/// Decode text content, honoring UTF-8 and UTF-16 byte order marks
pub fn decode_text(content: &[u8]) -> ParseResult<Cow<'_, str>> {
    if let Some(rest) = content.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return std::str::from_utf8(rest)
            .map(Cow::Borrowed)
            .map_err(|e| ParseError::Encoding(e.to_string()));
    }
    if let Some(rest) = content.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes).map(Cow::Owned);
    }
    if let Some(rest) = content.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes).map(Cow::Owned);
    }
    std::str::from_utf8(content)
        .map(Cow::Borrowed)
        .map_err(|e| ParseError::Encoding(e.to_string()))
}

fn decode_utf16(bytes: &[u8], read: fn([u8; 2]) -> u16) -> ParseResult<String> {
    if bytes.len() % 2 != 0 {
        return Err(ParseError::Encoding("odd UTF-16 byte length".to_string()));
    }
    let units = bytes.chunks_exact(2).map(|c| read([c[0], c[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| ParseError::Encoding(e.to_string()))
}

/// Text content for sniffing; `None` for binary or undecodable input
pub fn sniff_text(content: &[u8]) -> Option<Cow<'_, str>> {
    decode_text(content).ok()
}

/// Name of the text encoding of `content`, if it is text at all
pub fn detect_encoding(content: &[u8]) -> Option<&'static str> {
    if content.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some("utf-8-sig");
    }
    if content.starts_with(&[0xFF, 0xFE]) {
        return Some("utf-16le");
    }
    if content.starts_with(&[0xFE, 0xFF]) {
        return Some("utf-16be");
    }
    let text = std::str::from_utf8(content).ok()?;
    if text.contains('\0') {
        return None;
    }
    if text.is_ascii() {
        Some("ascii")
    } else {
        Some("utf-8")
    }
}

/// Lower-case extension of a filename, without the dot
pub fn file_extension(filename: Option<&str>) -> Option<String> {
    let name = filename?.rsplit(['/', '\\']).next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Schema name derived from a filename stem
pub fn schema_name_from_filename(filename: Option<&str>) -> Option<String> {
    let stem = naming::file_stem(filename?);
    if stem.is_empty() { None } else { Some(stem) }
}

/// Fraction of `keywords` that occur (as whole words) in `text`
pub fn keyword_density(text: &str, keywords: &[&str]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let words: std::collections::HashSet<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    let hits = keywords
        .iter()
        .filter(|k| {
            let k = k.to_lowercase();
            if k.contains(' ') {
                lowered.contains(&k)
            } else {
                words.contains(k.as_str())
            }
        })
        .count();
    hits as f64 / keywords.len() as f64
}

/// Number of `indicators` present as keys of a JSON object
pub fn indicator_count(object: &Map<String, Value>, indicators: &[&str]) -> usize {
    indicators.iter().filter(|k| object.contains_key(**k)).count()
}

/// Whether a field name conventionally denotes a primary key
pub fn is_primary_key_name(field_name: &str, schema_name: Option<&str>) -> bool {
    let lower = naming::to_snake_case(field_name);
    if matches!(lower.as_str(), "id" | "uuid" | "guid" | "key" | "pk") || field_name == "_id" {
        return true;
    }
    schema_name.is_some_and(|s| {
        let entity = naming::singularize(&naming::to_snake_case(s));
        lower == format!("{entity}_id") || lower == format!("{entity}_uuid")
    })
}

/// Primary key guess for formats without explicit keys
///
/// Considers top-level fields only. Preference order is `id`, `uuid`/`guid`/`_id`,
/// `<schema>_id`, `key`, then a leading `*_id` field.
pub fn infer_primary_keys(fields: &[FieldInfo], schema_name: Option<&str>) -> Vec<String> {
    let entity_key = schema_name
        .map(|s| format!("{}_id", naming::singularize(&naming::to_snake_case(s))));
    let rank = |field: &FieldInfo| -> Option<u8> {
        let name = naming::to_snake_case(&field.name);
        match name.as_str() {
            "id" => Some(0),
            "uuid" | "guid" => Some(1),
            _ if field.name == "_id" => Some(1),
            _ if entity_key.as_deref() == Some(name.as_str()) => Some(2),
            "key" => Some(3),
            _ => None,
        }
    };

    let top: Vec<&FieldInfo> = fields
        .iter()
        .filter(|f| f.depth() == 0 && f.data_type.is_scalar())
        .collect();
    let best = top
        .iter()
        .filter_map(|f| rank(*f).map(|r| (r, *f)))
        .min_by_key(|(r, _)| *r);
    if let Some((_, field)) = best {
        return vec![field.path.clone()];
    }
    match top.first() {
        Some(first) if naming::to_snake_case(&first.name).ends_with("_id") => {
            vec![first.path.clone()]
        }
        _ => Vec::new(),
    }
}

/// Mark the given key paths as non-null primary key fields
pub fn apply_primary_keys(schema: &mut SchemaDetails) {
    let keys = schema.primary_keys.clone();
    for key in &keys {
        if let Some(field) = schema.field_mut(key) {
            field.nullable = false;
            field.add_constraint(FieldConstraint::flag(constraint_kinds::PRIMARY_KEY));
        }
    }
}

/// Infer the type of a single textual cell
pub fn infer_scalar(text: &str) -> (DataType, Value) {
    let trimmed = text.trim();
    if trimmed.is_empty() || matches!(trimmed.to_ascii_lowercase().as_str(), "null" | "na" | "n/a")
    {
        return (DataType::Null, Value::Null);
    }
    if patterns::is_integer(trimmed)
        && let Ok(n) = trimmed.parse::<i64>()
    {
        return (DataType::Integer, json!(n));
    }
    if patterns::is_float(trimmed)
        && let Ok(f) = trimmed.parse::<f64>()
        && f.is_finite()
    {
        return (DataType::Float, json!(f));
    }
    if let Some(b) = patterns::parse_boolean(trimmed) {
        return (DataType::Boolean, Value::Bool(b));
    }
    if patterns::is_datetime(trimmed) {
        return (DataType::DateTime, Value::String(trimmed.to_string()));
    }
    if patterns::is_date(trimmed) {
        return (DataType::Date, Value::String(trimmed.to_string()));
    }
    (DataType::String, Value::String(trimmed.to_string()))
}

/// Accumulates fields observed across many data records
///
/// Repeated observations of one path merge their types, so every path appears
/// exactly once. A field is nullable when it was seen null or was missing from
/// some of its parent objects.
pub struct FieldCollector {
    fields: Vec<FieldInfo>,
    index: HashMap<String, usize>,
    present: HashMap<String, usize>,
    saw_null: HashMap<String, bool>,
    parents: HashMap<String, usize>,
    item_types: HashMap<String, DataType>,
    max_samples: usize,
    max_depth: usize,
}

impl FieldCollector {
    pub fn new(max_samples: usize, max_depth: usize) -> Self {
        Self {
            fields: Vec::new(),
            index: HashMap::new(),
            present: HashMap::new(),
            saw_null: HashMap::new(),
            parents: HashMap::new(),
            item_types: HashMap::new(),
            max_samples,
            max_depth,
        }
    }

    /// Observe one top-level record
    pub fn observe_record(&mut self, record: &Map<String, Value>) -> ParseResult<()> {
        self.observe_object("", record, 0)
    }

    /// Observe an object whose members live below `prefix`
    pub fn observe_object(
        &mut self,
        prefix: &str,
        object: &Map<String, Value>,
        depth: usize,
    ) -> ParseResult<()> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        *self.parents.entry(prefix.to_string()).or_insert(0) += 1;
        for (key, value) in object {
            let path = join_path(prefix, key);
            self.observe_value(key, &path, value, depth)?;
        }
        Ok(())
    }

    /// Observe one value at `path`
    pub fn observe_value(
        &mut self,
        name: &str,
        path: &str,
        value: &Value,
        depth: usize,
    ) -> ParseResult<()> {
        let observed = DataType::of_json(value);
        let idx = match self.index.get(path) {
            Some(idx) => *idx,
            None => {
                self.fields.push(FieldInfo::new(name, path, observed));
                self.index.insert(path.to_string(), self.fields.len() - 1);
                self.fields.len() - 1
            }
        };
        *self.present.entry(path.to_string()).or_insert(0) += 1;
        if value.is_null() {
            self.saw_null.insert(path.to_string(), true);
        }

        let max_samples = self.max_samples;
        let field = &mut self.fields[idx];
        field.data_type = field.data_type.merge(observed);
        if !value.is_null() {
            let samples = field.sample_values.get_or_insert_with(Vec::new);
            if samples.len() < max_samples && !samples.contains(value) {
                samples.push(value.clone());
            }
        }

        match value {
            Value::Object(object) => self.observe_object(path, object, depth + 1)?,
            Value::Array(items) => {
                let items_path = join_path(path, "items");
                for item in items {
                    match item {
                        Value::Object(object) => {
                            self.observe_object(&items_path, object, depth + 1)?
                        }
                        Value::Null => {}
                        other => {
                            let t = DataType::of_json(other);
                            let merged = self
                                .item_types
                                .get(path)
                                .map_or(t, |existing| existing.merge(t));
                            self.item_types.insert(path.to_string(), merged);
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Finalize nullability and item-type constraints
    pub fn finish(self) -> Vec<FieldInfo> {
        let FieldCollector {
            mut fields,
            present,
            saw_null,
            parents,
            item_types,
            ..
        } = self;
        for field in &mut fields {
            let parent = field.parent_path().unwrap_or("").to_string();
            let seen = present.get(&field.path).copied().unwrap_or(0);
            let expected = parents.get(&parent).copied().unwrap_or(seen);
            field.nullable = saw_null.get(&field.path).copied().unwrap_or(false) || seen < expected;
            if let Some(items) = item_types.get(&field.path) {
                field.add_constraint(FieldConstraint::new(
                    constraint_kinds::ITEMS_TYPE,
                    items.as_str(),
                ));
            }
        }
        fields
    }
}

/// Join a child segment onto a path, escaping separators inside the segment
pub fn join_path(prefix: &str, segment: &str) -> String {
    let segment = escape_path_segment(segment);
    if prefix.is_empty() {
        segment.into_owned()
    } else {
        format!("{prefix}.{segment}")
    }
}

/// Join an attribute onto a path
pub fn attribute_path(prefix: &str, attribute: &str) -> String {
    format!("{prefix}@{}", escape_path_segment(attribute))
}

/// Merge single-entity schemas into one document schema
///
/// With more than one entity, paths and key references are prefixed with the
/// entity name. A single entity is returned unchanged.
pub fn combine_entities(mut entities: Vec<SchemaDetails>, format: &str) -> SchemaDetails {
    if entities.len() == 1 {
        return entities.remove(0);
    }
    let mut combined = SchemaDetails::new();
    combined.metadata.format = Some(format.to_string());
    for entity in entities {
        let name = entity.schema_id().unwrap_or("entity").to_string();
        let entity_segment = escape_path_segment(&name).into_owned();
        let prefix = |p: &String| format!("{entity_segment}.{p}");
        for mut field in entity.fields {
            field.path = prefix(&field.path);
            combined.fields.push(field);
        }
        combined
            .primary_keys
            .extend(entity.primary_keys.iter().map(prefix));
        for mut fk in entity.foreign_keys {
            fk.source_fields = fk.source_fields.iter().map(prefix).collect();
            combined.foreign_keys.push(fk);
        }
        for unique in entity.unique_constraints {
            combined
                .unique_constraints
                .push(unique.iter().map(prefix).collect());
        }
        for mut index in entity.indices {
            index.fields = index.fields.iter().map(prefix).collect();
            combined.indices.push(index);
        }
        for dep in entity.dependencies {
            if !combined.dependencies.contains(&dep) {
                combined.dependencies.push(dep);
            }
        }
        if let Some(count) = entity.metadata.record_count {
            *combined.metadata.record_count.get_or_insert(0) += count;
        }
    }
    combined
}

/// Fabricate structurally valid records for a schema without data
pub fn fabricate_records(schema: &SchemaDetails, count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| Value::Object(fabricate_object(&schema.fields, "", i, 0)))
        .collect()
}

/// Round-robin fabricated records across entity schemas
pub fn fabricate_entity_records(entities: &[SchemaDetails], max_records: usize) -> Vec<Value> {
    let mut records = Vec::new();
    if entities.is_empty() {
        return records;
    }
    let mut round = 0;
    while records.len() < max_records {
        for entity in entities {
            if records.len() >= max_records {
                break;
            }
            records.push(Value::Object(fabricate_object(&entity.fields, "", round, 0)));
        }
        round += 1;
    }
    records
}

const FABRICATION_DEPTH: usize = 8;

fn fabricate_object(fields: &[FieldInfo], prefix: &str, index: usize, depth: usize) -> Map<String, Value> {
    let mut object = Map::new();
    if depth > FABRICATION_DEPTH {
        return object;
    }
    for field in fields {
        let parent = field.parent_path().unwrap_or("");
        if parent != prefix {
            continue;
        }
        let key = if field.path[prefix.len()..].starts_with('@') {
            format!("@{}", field.name)
        } else {
            field.name.clone()
        };
        object.insert(key, fabricate_field(fields, field, index, depth));
    }
    object
}

fn fabricate_field(fields: &[FieldInfo], field: &FieldInfo, index: usize, depth: usize) -> Value {
    match field.data_type {
        DataType::Object => {
            let values_path = join_path(&field.path, "values");
            if field.has_constraint(constraint_kinds::KEY_TYPE) {
                let value = if has_children(fields, &values_path) {
                    Value::Object(fabricate_object(fields, &values_path, index, depth + 1))
                } else {
                    declared_scalar(field, constraint_kinds::VALUE_TYPE, index)
                };
                let mut map = Map::new();
                map.insert(format!("key_{}", index + 1), value);
                return Value::Object(map);
            }
            Value::Object(fabricate_object(fields, &field.path, index, depth + 1))
        }
        DataType::Array => {
            let items_path = join_path(&field.path, "items");
            let item = if has_children(fields, &items_path) {
                Value::Object(fabricate_object(fields, &items_path, index, depth + 1))
            } else {
                declared_scalar(field, constraint_kinds::ITEMS_TYPE, index)
            };
            Value::Array(vec![item])
        }
        _ => fabricate_scalar(field, field.data_type, index),
    }
}

fn has_children(fields: &[FieldInfo], prefix: &str) -> bool {
    fields.iter().any(|f| f.parent_path() == Some(prefix))
}

fn declared_scalar(field: &FieldInfo, constraint: &str, index: usize) -> Value {
    let data_type = field
        .constraint(constraint)
        .and_then(|c| c.value.as_str())
        .and_then(|s| serde_json::from_value::<DataType>(Value::String(s.to_string())).ok())
        .unwrap_or(DataType::String);
    fabricate_scalar(field, data_type, index)
}

/// Deterministic placeholder value for a scalar field
pub fn fabricate_scalar(field: &FieldInfo, data_type: DataType, index: usize) -> Value {
    if let Some(values) = field
        .constraint(constraint_kinds::ENUM)
        .and_then(|c| c.value.as_array())
        && !values.is_empty()
    {
        return values[index % values.len()].clone();
    }
    if let Some(value) = field
        .constraint(constraint_kinds::DEFAULT)
        .map(|c| c.value.clone())
        && index == 0
        && !value.is_null()
    {
        return value;
    }
    let format = field
        .constraint(constraint_kinds::FORMAT)
        .and_then(|c| c.value.as_str())
        .and_then(ValueFormat::from_format_keyword);

    let n = index as i64 + 1;
    match data_type {
        DataType::Integer => json!(n),
        DataType::Float => json!(n as f64 * 1.5),
        DataType::Boolean => Value::Bool(index % 2 == 0),
        DataType::Date => Value::String(sample_date(index).format("%Y-%m-%d").to_string()),
        DataType::DateTime => Value::String(
            sample_date(index)
                .and_hms_opt(12, 0, 0)
                .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_default(),
        ),
        DataType::Uuid => Value::String(sample_uuid(&field.path, index)),
        DataType::Binary => Value::String(BASE64.encode(format!("{}-{n}", field.name))),
        DataType::Null => Value::Null,
        DataType::Array => Value::Array(Vec::new()),
        DataType::Object => Value::Object(Map::new()),
        DataType::Enum => Value::String(format!("{}_VALUE", field.name.to_uppercase())),
        DataType::String | DataType::Unknown => match format {
            Some(ValueFormat::Email) => Value::String(format!("user{n}@example.com")),
            Some(ValueFormat::Url) => Value::String(format!("https://example.com/{}/{n}", field.name)),
            Some(ValueFormat::Uuid) => Value::String(sample_uuid(&field.path, index)),
            Some(ValueFormat::Date) => Value::String(sample_date(index).format("%Y-%m-%d").to_string()),
            Some(ValueFormat::DateTime) => Value::String(
                sample_date(index)
                    .and_hms_opt(12, 0, 0)
                    .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                    .unwrap_or_default(),
            ),
            Some(ValueFormat::Ipv4) => Value::String(format!("192.0.2.{}", (index % 254) + 1)),
            _ => Value::String(format!("{}_{n}", field.name)),
        },
    }
}

fn sample_date(index: usize) -> NaiveDate {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    base + Duration::days(index as i64)
}

fn sample_uuid(path: &str, index: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{path}:{index}").as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text_boms() {
        let utf8 = [0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(decode_text(&utf8).unwrap(), "hi");

        let utf16le = [0xFF, 0xFE, b'h', 0, b'i', 0];
        assert_eq!(decode_text(&utf16le).unwrap(), "hi");

        assert!(matches!(
            decode_text(&[0xC3, 0x28]),
            Err(ParseError::Encoding(_))
        ));
    }

    #[test]
    fn test_detect_encoding() {
        assert_eq!(detect_encoding(b"plain"), Some("ascii"));
        assert_eq!(detect_encoding("caf\u{e9}".as_bytes()), Some("utf-8"));
        assert_eq!(detect_encoding(b"PAR1\0\0"), None);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension(Some("dir/Users.JSON")), Some("json".to_string()));
        assert_eq!(file_extension(Some("Makefile")), None);
        assert_eq!(file_extension(None), None);
    }

    #[test]
    fn test_primary_key_inference() {
        let fields = vec![
            FieldInfo::new("name", "name", DataType::String),
            FieldInfo::new("user_id", "user_id", DataType::Integer),
        ];
        assert_eq!(infer_primary_keys(&fields, Some("users")), vec!["user_id"]);

        let fields = vec![
            FieldInfo::new("uuid", "uuid", DataType::String),
            FieldInfo::new("id", "id", DataType::Integer),
        ];
        assert_eq!(infer_primary_keys(&fields, None), vec!["id"]);

        let fields = vec![FieldInfo::new("name", "name", DataType::String)];
        assert!(infer_primary_keys(&fields, None).is_empty());
    }

    #[test]
    fn test_infer_scalar() {
        assert_eq!(infer_scalar("42").0, DataType::Integer);
        assert_eq!(infer_scalar("4.2").0, DataType::Float);
        assert_eq!(infer_scalar("true").0, DataType::Boolean);
        assert_eq!(infer_scalar("2024-02-29").0, DataType::Date);
        assert_eq!(infer_scalar("2024-02-29T10:00:00Z").0, DataType::DateTime);
        assert_eq!(infer_scalar("Alice").0, DataType::String);
        assert_eq!(infer_scalar("").0, DataType::Null);
    }

    #[test]
    fn test_collector_merges_and_tracks_nullability() {
        let mut collector = FieldCollector::new(5, 10);
        let records = [
            json!({"id": 1, "score": 1, "address": {"city": "Berlin"}, "tags": ["a"]}),
            json!({"id": 2, "score": 2.5, "address": {"city": "Paris", "zip": "75001"}}),
        ];
        for record in &records {
            collector.observe_record(record.as_object().unwrap()).unwrap();
        }
        let fields = collector.finish();

        let get = |p: &str| fields.iter().find(|f| f.path == p).unwrap();
        assert_eq!(get("score").data_type, DataType::Float);
        assert!(!get("id").nullable);
        assert!(get("tags").nullable);
        assert!(get("address.zip").nullable);
        assert!(!get("address.city").nullable);
        assert_eq!(
            get("tags").constraint(constraint_kinds::ITEMS_TYPE).unwrap().value,
            json!("STRING")
        );
    }

    #[test]
    fn test_collector_keeps_dotted_keys_apart() {
        let mut collector = FieldCollector::new(5, 10);
        let record = json!({"a.b": 1, "a": {"b": "x"}, "c@d": true});
        collector.observe_record(record.as_object().unwrap()).unwrap();
        let fields = collector.finish();

        let get = |p: &str| fields.iter().find(|f| f.path == p).unwrap();
        assert_eq!(get(r"a\.b").data_type, DataType::Integer);
        assert_eq!(get(r"a\.b").name, "a.b");
        assert_eq!(get("a.b").data_type, DataType::String);
        assert_eq!(get("a.b").parent_path(), Some("a"));
        assert_eq!(get(r"c\@d").depth(), 0);
        let mut schema = SchemaDetails::new();
        schema.fields = fields;
        assert!(schema.has_unique_paths());
    }

    #[test]
    fn test_collector_depth_limit() {
        let mut collector = FieldCollector::new(5, 1);
        let record = json!({"a": {"b": {"c": 1}}});
        let err = collector
            .observe_record(record.as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, ParseError::MaxDepthExceeded { .. }));
    }

    #[test]
    fn test_fabricate_nested_records() {
        let mut schema = SchemaDetails::new();
        schema.fields = vec![
            FieldInfo::new("id", "id", DataType::Uuid),
            FieldInfo::new("user", "user", DataType::Object),
            FieldInfo::new("id", "user@id", DataType::Integer),
            FieldInfo::new("orders", "orders", DataType::Array),
            FieldInfo::new("sku", "orders.items.sku", DataType::String),
        ];
        let records = fabricate_records(&schema, 2);
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert!(first["id"].is_string());
        assert_eq!(first["user"]["@id"], json!(1));
        assert_eq!(first["orders"][0]["sku"], json!("sku_1"));
        assert_ne!(records[0]["id"], records[1]["id"]);
    }

    #[test]
    fn test_combine_entities_prefixes_paths() {
        let mut users = SchemaDetails::new().with_id("users");
        users.fields.push(FieldInfo::new("id", "id", DataType::Integer));
        users.primary_keys.push("id".into());
        let mut posts = SchemaDetails::new().with_id("posts");
        posts.fields.push(FieldInfo::new("id", "id", DataType::Integer));

        let combined = combine_entities(vec![users, posts], "sql");
        assert!(combined.has_unique_paths());
        assert_eq!(combined.primary_keys, vec!["users.id"]);
        assert!(combined.field("posts.id").is_some());
    }
}
