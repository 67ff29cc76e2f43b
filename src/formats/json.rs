//! JSON and JSON-lines data documents

use serde_json::{Map, Value};
use tracing::debug;

use super::common::{self, FieldCollector};
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{FormatCapabilities, FormatInfo, SchemaDetails};

const FORMAT: &str = "json";

/// Parser for JSON documents, arrays of records and JSON lines
pub struct JsonParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "JSON", "JavaScript Object Notation data documents")
            .mime_types(&["application/json", "application/x-ndjson"])
            .extensions(&["json", "jsonl", "ndjson"])
            .capabilities(FormatCapabilities::data().with_streaming())
            .examples(&[r#"[{"id": 1, "name": "Alice"}]"#, r#"{"id": 1}"#])
            .schema_type("data");
        Self { info, options }
    }

    /// Records contained in a JSON document
    ///
    /// An array of objects yields its elements, JSON lines yield one record per
    /// line and a single object is one record. Anything else is wrapped as
    /// `{"value": ...}`.
    pub fn read_records(&self, text: &str) -> ParseResult<Vec<Value>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        match serde_json::from_str::<Value>(trimmed) {
            Ok(document) => Ok(records_from_document(document, self.options.max_records)),
            Err(whole_err) => {
                let lines = read_json_lines(trimmed, self.options.max_records);
                match lines {
                    Some(records) if !records.is_empty() => Ok(records),
                    _ => Err(ParseError::syntax(FORMAT, whole_err)),
                }
            }
        }
    }
}

/// Split a parsed document into records
pub(crate) fn records_from_document(document: Value, max_records: usize) -> Vec<Value> {
    match document {
        Value::Array(items) if !items.is_empty() && items.iter().all(|v| v.is_object() || v.is_null()) => {
            items
                .into_iter()
                .filter(|v| v.is_object())
                .take(max_records)
                .collect()
        }
        Value::Object(_) => vec![document],
        other => {
            let mut wrapper = Map::new();
            wrapper.insert("value".to_string(), other);
            vec![Value::Object(wrapper)]
        }
    }
}

/// Parse newline-delimited JSON; `None` when any non-empty line is invalid
fn read_json_lines(text: &str, max_records: usize) -> Option<Vec<Value>> {
    let mut records = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let value: Value = serde_json::from_str(line).ok()?;
        if records.len() < max_records {
            records.extend(records_from_document(value, 1));
        }
    }
    Some(records)
}

/// Build a schema from data records (shared with the YAML parser)
pub(crate) fn schema_from_records(
    records: &[Value],
    filename: Option<&str>,
    format: &str,
    options: &ParserOptions,
) -> ParseResult<SchemaDetails> {
    let mut collector = FieldCollector::new(options.max_samples, options.max_depth);
    for record in records {
        if let Value::Object(object) = record {
            collector.observe_record(object)?;
        }
    }

    let name = common::schema_name_from_filename(filename);
    let mut schema = SchemaDetails::new();
    schema.fields = collector.finish();
    schema.primary_keys = common::infer_primary_keys(&schema.fields, name.as_deref());
    common::apply_primary_keys(&mut schema);
    schema.metadata.name = name.clone();
    schema.metadata.schema_id = name;
    schema.metadata.format = Some(format.to_string());
    schema.metadata.record_count = Some(records.len() as u64);

    debug!(
        format,
        fields = schema.fields.len(),
        records = records.len(),
        "Extracted schema from data records"
    );
    Ok(schema)
}

impl FormatParser for JsonParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return 0.0;
        }
        if serde_json::from_str::<Value>(trimmed).is_ok() {
            return 0.8;
        }
        match read_json_lines(trimmed, 10) {
            Some(records) if records.len() > 1 => 0.75,
            _ => 0.0,
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let text = common::decode_text(content)?;
        let records = self.read_records(&text)?;
        schema_from_records(&records, filename, FORMAT, &self.options)
    }

    fn extract_sample_data(
        &self,
        _filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let text = common::decode_text(content)?;
        let mut records = self.read_records(&text)?;
        records.truncate(max_records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataType;

    #[test]
    fn test_can_parse() {
        let parser = JsonParser::new();
        assert!(parser.can_parse(None, br#"{"a": 1}"#) >= 0.8);
        assert!(parser.can_parse(None, b"{\"a\": 1}\n{\"a\": 2}\n") > 0.7);
        assert_eq!(parser.can_parse(None, b"id,name\n1,a"), 0.0);
        assert_eq!(parser.can_parse(None, b"{not json"), 0.0);
        assert_eq!(parser.can_parse(None, &[0xff, 0xfe, 0x00]), 0.0);
    }

    #[test]
    fn test_array_of_records() {
        let parser = JsonParser::new();
        let content = br#"[
            {"id": 1, "name": "Alice", "address": {"city": "Berlin"}, "orders": [{"sku": "A1"}]},
            {"id": 2, "name": "Bob", "address": {"city": "Paris"}, "orders": []}
        ]"#;
        let schema = parser.parse_schema(Some("customers.json"), content).unwrap();
        assert!(schema.has_unique_paths());
        assert_eq!(schema.field("id").unwrap().data_type, DataType::Integer);
        assert_eq!(schema.field("address.city").unwrap().data_type, DataType::String);
        assert!(schema.field("orders.items.sku").is_some());
        assert_eq!(schema.primary_keys, vec!["id"]);
        assert_eq!(schema.metadata.record_count, Some(2));
        assert_eq!(schema.metadata.name.as_deref(), Some("customers"));
    }

    #[test]
    fn test_json_lines() {
        let parser = JsonParser::new();
        let content = b"{\"id\": 1, \"score\": 1}\n{\"id\": 2, \"score\": 2.5, \"extra\": true}\n";
        let schema = parser.parse_schema(Some("events.jsonl"), content).unwrap();
        assert_eq!(schema.field("score").unwrap().data_type, DataType::Float);
        assert!(schema.field("extra").unwrap().nullable);

        let samples = parser.extract_sample_data(None, content, 1).unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_errors() {
        let parser = JsonParser::new();
        assert!(matches!(parser.parse_schema(None, b"  "), Err(ParseError::Empty(_))));
        assert!(matches!(
            parser.parse_schema(None, b"{\"a\": "),
            Err(ParseError::Syntax { .. })
        ));
    }
}
