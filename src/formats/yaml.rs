//! YAML data documents

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::common;
use super::json::{records_from_document, schema_from_records};
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{FormatCapabilities, FormatInfo, SchemaDetails};

const FORMAT: &str = "yaml";

static YAML_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*(-\s+\S|[\w"'][^:\n]*:(\s|$))"#).unwrap());

/// Parser for (multi-document) YAML data
pub struct YamlParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for YamlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse every document of a YAML stream into JSON values
pub(crate) fn load_documents(text: &str) -> ParseResult<Vec<Value>> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document).map_err(|e| ParseError::syntax(FORMAT, e))?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

impl YamlParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "YAML", "YAML data documents")
            .mime_types(&["application/yaml", "application/x-yaml", "text/yaml"])
            .extensions(&["yaml", "yml"])
            .capabilities(FormatCapabilities::data())
            .examples(&["- id: 1\n  name: Alice\n"])
            .schema_type("data");
        Self { info, options }
    }

    fn read_records(&self, text: &str) -> ParseResult<Vec<Value>> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let mut records = Vec::new();
        for document in load_documents(text)? {
            let remaining = self.options.max_records.saturating_sub(records.len());
            if remaining == 0 {
                break;
            }
            records.extend(records_from_document(document, remaining));
        }
        if records.is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        Ok(records)
    }
}

impl FormatParser for YamlParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || serde_json::from_str::<Value>(trimmed).is_ok() {
            return 0.0;
        }
        if !YAML_LINE.is_match(trimmed) {
            return 0.0;
        }
        match load_documents(trimmed) {
            Ok(docs) if docs.iter().all(|d| d.is_object() || d.is_array()) && !docs.is_empty() => {
                if trimmed.starts_with("---") { 0.85 } else { 0.8 }
            }
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
    fn test_multi_document() {
        let parser = YamlParser::new();
        let content = b"---\nid: 1\nname: Alice\n---\nid: 2\nname: Bob\nemail: bob@example.com\n";
        let schema = parser.parse_schema(Some("people.yaml"), content).unwrap();
        assert_eq!(schema.field("id").unwrap().data_type, DataType::Integer);
        assert!(schema.field("email").unwrap().nullable);
        assert_eq!(schema.metadata.record_count, Some(2));
        assert_eq!(schema.metadata.format.as_deref(), Some("yaml"));
    }

    #[test]
    fn test_sequence_of_records() {
        let parser = YamlParser::new();
        let content = b"- id: 1\n  tags: [a, b]\n- id: 2\n  tags: []\n";
        let schema = parser.parse_schema(None, content).unwrap();
        assert_eq!(schema.field("tags").unwrap().data_type, DataType::Array);
    }

    #[test]
    fn test_can_parse() {
        let parser = YamlParser::new();
        assert!(parser.can_parse(None, b"name: test\nitems:\n  - a\n") >= 0.8);
        assert_eq!(parser.can_parse(None, br#"{"name": "json"}"#), 0.0);
        assert_eq!(parser.can_parse(None, b"just text"), 0.0);
    }
}
