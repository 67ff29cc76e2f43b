//! OpenAPI 3.x and Swagger 2.0 documents
//!
//! Component schemas (`components.schemas`, or `definitions` in Swagger 2.0)
//! are walked with the JSON Schema walker, one entity per object schema. API
//! level information (title, versions, servers, paths and operations) is
//! attached to every entity's metadata.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::common;
use super::json_schema::SchemaWalker;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{FormatCapabilities, FormatInfo, SchemaDetails};

const FORMAT: &str = "openapi";

const INDICATORS: &[&str] = &[
    "info", "paths", "components", "servers", "definitions", "basePath", "tags",
    "securityDefinitions", "webhooks", "host",
];
const HTTP_METHODS: &[&str] = &["get", "post", "put", "delete", "patch", "options", "head", "trace"];

/// Parser for OpenAPI and Swagger API descriptions in JSON or YAML
pub struct OpenApiParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for OpenApiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenApiParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "OpenAPI", "OpenAPI 3.x and Swagger 2.0 API descriptions")
            .mime_types(&["application/vnd.oai.openapi", "application/vnd.oai.openapi+json"])
            .extensions(&["json", "yaml", "yml"])
            .capabilities(FormatCapabilities::schema_language().with_relationships())
            .examples(&["openapi: 3.0.3\ninfo:\n  title: Shop\n  version: 1.0.0\npaths: {}\n"])
            .schema_type("openapi");
        Self { info, options }
    }

    fn entities(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        let text = common::decode_text(content)?;
        let document = load_document(&text)?;
        let Some(object) = document.as_object() else {
            return Err(ParseError::unsupported(FORMAT, "document root is not a mapping"));
        };
        let spec_version = spec_version(object)
            .ok_or_else(|| ParseError::unsupported(FORMAT, "missing 'openapi' or 'swagger' version"))?;
        if !(spec_version.starts_with("3.") || spec_version.starts_with("2.")) {
            return Err(ParseError::unsupported(
                FORMAT,
                format!("unsupported specification version '{spec_version}'"),
            ));
        }

        let mut walker = SchemaWalker::new(&document, &self.options, FORMAT);
        walker.register_definitions("/components/schemas");
        walker.register_definitions("/definitions");

        let api = api_metadata(object);
        let usage = schema_usage(object);
        let mut entities = Vec::new();
        for (name, schema) in walker.registered() {
            let mut entity = walker.build_entity(&name, schema)?;
            entity.metadata.version = Some(spec_version.clone());
            entity.metadata.namespace = object
                .get("info")
                .and_then(|i| i.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string);
            entity
                .metadata
                .additional
                .insert("api".to_string(), Value::Object(api.clone()));
            if let Some(operations) = usage.get(&name) {
                entity
                    .metadata
                    .additional
                    .insert("operations".to_string(), json!(operations));
            }
            if let Some(source) = filename {
                entity
                    .metadata
                    .additional
                    .insert("source_file".to_string(), json!(source));
            }
            entities.push(entity);
        }
        if entities.is_empty() {
            return Err(ParseError::unsupported(FORMAT, "no object component schemas"));
        }
        let path_count = api.get("path_count").and_then(serde_json::Value::as_u64).unwrap_or(0);
        debug!(
            entities = entities.len(),
            paths = path_count,
            version = %spec_version,
            "Extracted OpenAPI component schemas"
        );
        Ok(entities)
    }
}

/// Parse JSON, falling back to YAML
fn load_document(text: &str) -> ParseResult<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty(FORMAT.to_string()));
    }
    if trimmed.starts_with('{')
        && let Ok(document) = serde_json::from_str::<Value>(trimmed)
    {
        return Ok(document);
    }
    serde_yaml::from_str::<Value>(trimmed).map_err(|e| ParseError::syntax(FORMAT, e))
}

fn spec_version(object: &Map<String, Value>) -> Option<String> {
    ["openapi", "swagger"].iter().find_map(|key| match object.get(*key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// API level description shared by every entity of the document
fn api_metadata(object: &Map<String, Value>) -> Map<String, Value> {
    let mut metadata = Map::new();
    if let Some(version) = spec_version(object) {
        metadata.insert("spec_version".to_string(), json!(version));
    }
    if let Some(info) = object.get("info").and_then(Value::as_object) {
        for (key, target) in [("title", "title"), ("version", "api_version"), ("description", "description")] {
            if let Some(value) = info.get(key).and_then(Value::as_str) {
                metadata.insert(target.to_string(), json!(value));
            }
        }
    }

    let mut servers: Vec<String> = object
        .get("servers")
        .and_then(Value::as_array)
        .map(|servers| {
            servers
                .iter()
                .filter_map(|s| s.get("url").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if let Some(host) = object.get("host").and_then(Value::as_str) {
        let base = object.get("basePath").and_then(Value::as_str).unwrap_or("");
        servers.push(format!("{host}{base}"));
    }
    if !servers.is_empty() {
        metadata.insert("servers".to_string(), json!(servers));
    }

    let mut operation_count = 0;
    let mut by_method: BTreeMap<&str, usize> = BTreeMap::new();
    let paths = object.get("paths").and_then(Value::as_object);
    for item in paths.into_iter().flat_map(|p| p.values()).filter_map(Value::as_object) {
        for method in HTTP_METHODS {
            if item.contains_key(*method) {
                operation_count += 1;
                *by_method.entry(*method).or_insert(0) += 1;
            }
        }
    }
    metadata.insert("path_count".to_string(), json!(paths.map_or(0, Map::len)));
    metadata.insert("operation_count".to_string(), json!(operation_count));
    if !by_method.is_empty() {
        metadata.insert("operations_by_method".to_string(), json!(by_method));
    }

    if let Some(tags) = object.get("tags").and_then(Value::as_array) {
        let names: Vec<&str> = tags
            .iter()
            .filter_map(|t| t.get("name").and_then(Value::as_str))
            .collect();
        if !names.is_empty() {
            metadata.insert("tags".to_string(), json!(names));
        }
    }
    let schemes = object
        .get("components")
        .and_then(|c| c.get("securitySchemes"))
        .or_else(|| object.get("securityDefinitions"))
        .and_then(Value::as_object);
    if let Some(schemes) = schemes {
        metadata.insert(
            "security_schemes".to_string(),
            json!(schemes.keys().collect::<Vec<_>>()),
        );
    }
    metadata
}

/// Operations (`METHOD /path`) referencing each component schema by name
fn schema_usage(object: &Map<String, Value>) -> BTreeMap<String, Vec<String>> {
    let mut usage: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let Some(paths) = object.get("paths").and_then(Value::as_object) else {
        return usage;
    };
    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            warn!(path = %path, "Skipping malformed path item");
            continue;
        };
        for method in HTTP_METHODS {
            let Some(operation) = item.get(*method) else {
                continue;
            };
            let mut references = Vec::new();
            collect_references(operation, &mut references);
            let label = format!("{} {path}", method.to_uppercase());
            for reference in references {
                let Some(name) = reference
                    .strip_prefix("#/components/schemas/")
                    .or_else(|| reference.strip_prefix("#/definitions/"))
                else {
                    continue;
                };
                let operations = usage.entry(name.replace("~1", "/").replace("~0", "~")).or_default();
                if !operations.contains(&label) {
                    operations.push(label.clone());
                }
            }
        }
    }
    usage
}

fn collect_references(value: &Value, references: &mut Vec<String>) {
    match value {
        Value::Object(object) => {
            for (key, child) in object {
                match (key.as_str(), child) {
                    ("$ref", Value::String(reference)) => references.push(reference.clone()),
                    _ => collect_references(child, references),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, references)),
        _ => {}
    }
}

impl FormatParser for OpenApiParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('<') || trimmed.starts_with('[') {
            return 0.0;
        }
        let Ok(Value::Object(object)) = load_document(trimmed) else {
            return 0.0;
        };
        match spec_version(&object) {
            Some(v) if v.starts_with("3.") || v.starts_with("2.") => 0.98,
            Some(_) => 0.6,
            None => {
                let indicators = common::indicator_count(&object, INDICATORS);
                let has_api_shape = object.contains_key("paths") || object.contains_key("components");
                if indicators >= 2 && has_api_shape && object.contains_key("info") {
                    0.8
                } else {
                    0.0
                }
            }
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let entities = self.entities(filename, content)?;
        let api = entities
            .first()
            .and_then(|e| e.metadata.additional.get("api"))
            .cloned();
        let mut schema = common::combine_entities(entities, FORMAT);
        if let Some(Value::Object(api)) = api {
            schema.metadata.version = api.get("spec_version").and_then(Value::as_str).map(str::to_string);
            schema.metadata.additional.insert("api".to_string(), Value::Object(api));
        }
        if schema.schema_id().is_none()
            && let Some(name) = common::schema_name_from_filename(filename)
        {
            schema = schema.with_id(name);
        }
        Ok(schema)
    }

    fn parse_schemas(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        self.entities(filename, content)
    }

    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let entities = self.entities(filename, content)?;
        let limit = max_records.min(self.options.max_records);
        Ok(common::fabricate_entity_records(&entities, limit))
    }
}
