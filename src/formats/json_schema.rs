//! JSON Schema documents
//!
//! [`SchemaWalker`] flattens JSON Schema objects into field paths. It is shared
//! with the OpenAPI parser, whose component schemas are JSON Schema dialects.
//!
//! Definitions that describe objects with properties become entities of their
//! own. A property holding a `$ref` to such an entity is a reference and is
//! recorded as a foreign key to the entity's identifier. Every other `$ref` is
//! resolved inline.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value, json};
use tracing::debug;

use super::common;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, ForeignKeyDefinition, FormatCapabilities, FormatInfo,
    SchemaDetails, constraint_kinds,
};
use crate::relationships::naming;

const FORMAT: &str = "json_schema";

/// Keys whose co-occurrence marks a JSON Schema document
const INDICATORS: &[&str] = &[
    "$schema", "$id", "$defs", "definitions", "properties", "required", "type", "title",
    "additionalProperties", "allOf", "oneOf", "anyOf", "$ref", "items",
];
/// Keys only a schema (not a data record) is expected to carry
const STRUCTURAL_KEYS: &[&str] = &[
    "$schema", "$defs", "definitions", "properties", "items", "allOf", "oneOf", "anyOf", "$ref",
];
const TYPE_NAMES: &[&str] = &["object", "array", "string", "integer", "number", "boolean", "null"];
/// Keys of the API description formats that embed JSON Schema
const API_KEYS: &[&str] = &["openapi", "swagger", "paths"];
/// Keys of Avro schemas, which share the `type`/`fields` envelope
const AVRO_KEYS: &[&str] = &["fields", "symbols"];

const MAX_REF_HOPS: usize = 32;

/// Keyword to constraint mapping for plain-valued keywords
const CONSTRAINT_KEYWORDS: &[(&str, &str)] = &[
    ("minimum", constraint_kinds::MINIMUM),
    ("maximum", constraint_kinds::MAXIMUM),
    ("multipleOf", constraint_kinds::MULTIPLE_OF),
    ("minLength", constraint_kinds::MIN_LENGTH),
    ("maxLength", constraint_kinds::MAX_LENGTH),
    ("pattern", constraint_kinds::PATTERN),
    ("minItems", constraint_kinds::MIN_ITEMS),
    ("maxItems", constraint_kinds::MAX_ITEMS),
    ("format", constraint_kinds::FORMAT),
    ("default", constraint_kinds::DEFAULT),
];

/// Parser for JSON Schema (draft 4 through 2020-12)
pub struct JsonSchemaParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for JsonSchemaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonSchemaParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "JSON Schema", "JSON Schema vocabulary documents")
            .mime_types(&["application/schema+json"])
            .extensions(&["json", "schema.json"])
            .capabilities(FormatCapabilities::schema_language().with_relationships())
            .examples(&[
                r#"{"$schema": "https://json-schema.org/draft/2020-12/schema", "type": "object", "properties": {"id": {"type": "integer"}}}"#,
            ])
            .schema_type("json-schema");
        Self { info, options }
    }

    fn entities(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let document: Value =
            serde_json::from_str(text.trim()).map_err(|e| ParseError::syntax(FORMAT, e))?;
        if !document.is_object() {
            return Err(ParseError::unsupported(FORMAT, "document root is not an object"));
        }

        let mut walker = SchemaWalker::new(&document, &self.options, FORMAT);
        walker.register_definitions("/definitions");
        walker.register_definitions("/$defs");

        let root_name = document
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| common::schema_name_from_filename(filename))
            .unwrap_or_else(|| "root".to_string());
        let has_root_entity = walker.is_entity_like(&document);
        if has_root_entity {
            walker.register_entity("#", &root_name);
        }

        let mut entities = Vec::new();
        if has_root_entity {
            entities.push(walker.build_entity(&root_name, &document)?);
        }
        for (name, schema) in walker.registered() {
            if name != root_name || !has_root_entity {
                entities.push(walker.build_entity(&name, schema)?);
            }
        }
        if entities.is_empty() {
            let mut schema = walker.build_entity(&root_name, &document)?;
            if schema.fields.is_empty() {
                return Err(ParseError::unsupported(FORMAT, "schema describes no object properties"));
            }
            schema.metadata.format = Some(FORMAT.to_string());
            entities.push(schema);
        }

        let draft = document.get("$schema").and_then(Value::as_str);
        for entity in &mut entities {
            if let Some(draft) = draft {
                entity.metadata.version = Some(draft.to_string());
            }
            if let Some(id) = document.get("$id").and_then(Value::as_str) {
                entity.metadata.namespace = Some(id.to_string());
            }
        }
        debug!(
            entities = entities.len(),
            fields = entities.iter().map(|e| e.fields.len()).sum::<usize>(),
            "Extracted JSON Schema"
        );
        Ok(entities)
    }
}

/// Outcome of resolving a schema's `$ref` chain
enum Resolved {
    /// Reference to a registered entity
    Entity(String),
    /// Reference into another document
    External(String),
    /// Inline schema and the local references followed to reach it
    Schema(Value, Vec<String>),
}

#[derive(Default)]
struct EntityState {
    fields: Vec<FieldInfo>,
    foreign_keys: Vec<ForeignKeyDefinition>,
    dependencies: Vec<String>,
    ref_stack: Vec<String>,
}

impl EntityState {
    /// Add a field, merging with an earlier observation of the same path
    fn push(&mut self, field: FieldInfo) {
        match self.fields.iter_mut().find(|f| f.path == field.path) {
            Some(existing) => {
                existing.data_type = existing.data_type.merge(field.data_type);
                existing.nullable |= field.nullable;
                for constraint in field.constraints {
                    existing.add_constraint(constraint);
                }
            }
            None => self.fields.push(field),
        }
    }

    fn add_dependency(&mut self, reference: &str) {
        let document = reference.split('#').next().unwrap_or(reference).to_string();
        if !document.is_empty() && !self.dependencies.contains(&document) {
            self.dependencies.push(document);
        }
    }
}

/// Walks JSON Schema objects of one document into entity schemas
pub(crate) struct SchemaWalker<'a> {
    root: &'a Value,
    /// `$ref` pointer to entity name
    entities: BTreeMap<String, String>,
    order: Vec<String>,
    max_depth: usize,
    max_samples: usize,
    format: &'static str,
}

impl<'a> SchemaWalker<'a> {
    pub(crate) fn new(root: &'a Value, options: &ParserOptions, format: &'static str) -> Self {
        Self {
            root,
            entities: BTreeMap::new(),
            order: Vec::new(),
            max_depth: options.max_depth,
            max_samples: options.max_samples,
            format,
        }
    }

    /// Register every object-like schema below the JSON pointer `prefix`
    pub(crate) fn register_definitions(&mut self, prefix: &str) {
        let Some(definitions) = self.root.pointer(prefix).and_then(Value::as_object) else {
            return;
        };
        for (name, schema) in definitions {
            if self.is_entity_like(schema) {
                let pointer = format!("#{prefix}/{}", name.replace('~', "~0").replace('/', "~1"));
                self.register_entity(&pointer, name);
            }
        }
    }

    pub(crate) fn register_entity(&mut self, pointer: &str, name: &str) {
        if self.entities.insert(pointer.to_string(), name.to_string()).is_none() {
            self.order.push(pointer.to_string());
        }
    }

    /// Registered entities in registration order, excluding the document root
    pub(crate) fn registered(&self) -> Vec<(String, &'a Value)> {
        self.order
            .iter()
            .filter(|pointer| pointer.as_str() != "#")
            .filter_map(|pointer| {
                let schema = self.pointer(pointer)?;
                Some((self.entities.get(pointer)?.clone(), schema))
            })
            .collect()
    }

    /// Whether a schema describes an object with named properties
    pub(crate) fn is_entity_like(&self, schema: &Value) -> bool {
        let merged = self.merge_all_of(schema, 0);
        merged
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|p| !p.is_empty())
    }

    fn pointer(&self, reference: &str) -> Option<&'a Value> {
        let fragment = reference.strip_prefix('#')?;
        if fragment.is_empty() {
            return Some(self.root);
        }
        self.root.pointer(fragment)
    }

    /// Build one entity schema from an object schema
    pub(crate) fn build_entity(&self, name: &str, schema: &Value) -> ParseResult<SchemaDetails> {
        let merged = self.merge_all_of(schema, 0);
        let mut state = EntityState::default();
        self.walk_object(&mut state, "", &merged, 0)?;

        let mut details = SchemaDetails::new().with_id(name);
        details.fields = state.fields;
        details.foreign_keys = state.foreign_keys;
        details.dependencies = state.dependencies;
        details.metadata.format = Some(self.format.to_string());
        details.metadata.description = merged
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(title) = merged.get("title").and_then(Value::as_str) {
            details
                .metadata
                .additional
                .insert("title".to_string(), json!(title));
        }
        for (key, value) in merged.as_object().into_iter().flatten() {
            if key.starts_with("x-") {
                details.metadata.additional.insert(key.clone(), value.clone());
            }
        }
        details.primary_keys = common::infer_primary_keys(&details.fields, Some(name));
        common::apply_primary_keys(&mut details);
        Ok(details)
    }

    /// Follow `$ref` links until an entity, an external document or an inline schema
    fn resolve(&self, schema: &Value) -> ParseResult<Resolved> {
        let mut current = schema.clone();
        let mut followed = Vec::new();
        while let Some(reference) = current.get("$ref").and_then(Value::as_str).map(str::to_string) {
            if let Some(entity) = self.entities.get(&reference) {
                return Ok(Resolved::Entity(entity.clone()));
            }
            if !reference.starts_with('#') {
                return Ok(Resolved::External(reference));
            }
            if followed.len() >= MAX_REF_HOPS || followed.contains(&reference) {
                break;
            }
            let target = self.pointer(&reference).ok_or_else(|| {
                ParseError::syntax(self.format, format!("unresolved reference {reference}"))
            })?;
            current = overlay(&current, target);
            followed.push(reference);
        }
        Ok(Resolved::Schema(self.merge_all_of(&current, 0), followed))
    }

    /// Flatten `allOf` members (inlining references) into one schema
    fn merge_all_of(&self, schema: &Value, hops: usize) -> Value {
        let Some(object) = schema.as_object() else {
            return schema.clone();
        };
        let Some(members) = object.get("allOf").and_then(Value::as_array) else {
            return schema.clone();
        };
        let mut merged: Map<String, Value> = object
            .iter()
            .filter(|(k, _)| k.as_str() != "allOf")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if hops >= MAX_REF_HOPS {
            return Value::Object(merged);
        }
        for member in members {
            let mut member = member.clone();
            let mut visited = HashSet::new();
            while let Some(reference) = member.get("$ref").and_then(Value::as_str).map(str::to_string) {
                if !visited.insert(reference.clone()) || visited.len() > MAX_REF_HOPS {
                    break;
                }
                match self.pointer(&reference) {
                    Some(target) => member = overlay(&member, target),
                    None => break,
                }
            }
            let member = self.merge_all_of(&member, hops + 1);
            let Some(member) = member.as_object() else {
                continue;
            };
            for (key, value) in member {
                if key == "$ref" {
                    continue;
                }
                let slot = merged.entry(key.clone()).or_insert_with(|| value.clone());
                match (slot, value) {
                    (Value::Object(existing), Value::Object(props)) if key == "properties" => {
                        for (name, prop) in props {
                            existing.entry(name.clone()).or_insert_with(|| prop.clone());
                        }
                    }
                    (Value::Array(existing), Value::Array(names)) if key == "required" => {
                        for name in names {
                            if !existing.contains(name) {
                                existing.push(name.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Value::Object(merged)
    }

    fn walk_object(&self, state: &mut EntityState, prefix: &str, schema: &Value, depth: usize) -> ParseResult<()> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                self.walk_property(state, prefix, name, property, required.contains(name.as_str()), depth)?;
            }
        }
        Ok(())
    }

    fn walk_property(
        &self,
        state: &mut EntityState,
        prefix: &str,
        name: &str,
        schema: &Value,
        required: bool,
        depth: usize,
    ) -> ParseResult<()> {
        let path = common::join_path(prefix, name);
        let (schema, followed) = match self.resolve(schema)? {
            Resolved::Entity(target) => {
                let nullable = !required || is_nullable_flag(schema);
                let mut field = FieldInfo::new(name, path.clone(), DataType::Object)
                    .with_nullable(nullable)
                    .with_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, target.clone()));
                if let Some(description) = schema.get("description").and_then(Value::as_str) {
                    field = field.with_description(description);
                }
                state.push(field);
                state.foreign_keys.push(ForeignKeyDefinition::new(
                    vec![path],
                    target.clone(),
                    self.identifier_of(&target),
                ));
                return Ok(());
            }
            Resolved::External(reference) => {
                state.add_dependency(&reference);
                let field = FieldInfo::new(name, path, DataType::Unknown)
                    .with_nullable(!required)
                    .with_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, reference));
                state.push(field);
                return Ok(());
            }
            Resolved::Schema(schema, followed) => (schema, followed),
        };

        if followed.iter().any(|r| state.ref_stack.contains(r)) {
            let field = FieldInfo::new(name, path, DataType::Object)
                .with_nullable(true)
                .with_constraint(FieldConstraint::new(
                    constraint_kinds::REFERENCE,
                    followed.first().cloned().unwrap_or_default(),
                ));
            state.push(field);
            return Ok(());
        }

        // A union of one schema and null is that schema, nullable
        if let Some(variants) = union_variants(&schema) {
            let (nulls, others): (Vec<&Value>, Vec<&Value>) =
                variants.iter().partition(|v| is_null_schema(v));
            if others.len() == 1 && schema.get("type").is_none() {
                let mut single = others[0].clone();
                if let (Value::Object(target), Some(outer)) = (&mut single, schema.as_object()) {
                    for (key, value) in outer {
                        if !matches!(key.as_str(), "oneOf" | "anyOf" | "$ref") {
                            target.entry(key.clone()).or_insert_with(|| value.clone());
                        }
                    }
                }
                let required = required && nulls.is_empty();
                state.ref_stack.extend(followed.iter().cloned());
                let result = self.walk_property(state, prefix, name, &single, required, depth);
                state.ref_stack.truncate(state.ref_stack.len() - followed.len());
                return result;
            }
        }

        let mut field = self.describe(name, &path, &schema, required, state)?;
        let data_type = field.data_type;
        let mut children: Option<(String, Value)> = None;

        match data_type {
            DataType::Object => {
                if schema.get("properties").is_some() {
                    children = Some((path.clone(), schema.clone()));
                } else if let Some(values) = schema.get("additionalProperties").filter(|v| v.is_object()) {
                    field.add_constraint(FieldConstraint::new(constraint_kinds::KEY_TYPE, DataType::String.as_str()));
                    match self.resolve(values)? {
                        Resolved::Entity(target) => {
                            field.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, DataType::Object.as_str()));
                            field.add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, target));
                        }
                        Resolved::External(reference) => {
                            state.add_dependency(&reference);
                            field.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, DataType::Unknown.as_str()));
                        }
                        Resolved::Schema(value_schema, _) => {
                            let value_type = schema_type(&value_schema).0;
                            field.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, value_type.as_str()));
                            if value_schema.get("properties").is_some() {
                                children = Some((common::join_path(&path, "values"), value_schema));
                            }
                        }
                    }
                } else if let Some(variants) = union_variants(&schema) {
                    let mut combined = Map::new();
                    for variant in variants {
                        if let Resolved::Schema(variant, _) = self.resolve(variant)?
                            && let Some(props) = variant.get("properties").and_then(Value::as_object)
                        {
                            for (key, value) in props {
                                combined.entry(key.clone()).or_insert_with(|| value.clone());
                            }
                        }
                    }
                    if !combined.is_empty() {
                        children = Some((path.clone(), json!({ "properties": combined })));
                    }
                }
            }
            DataType::Array => match schema.get("items") {
                Some(Value::Array(tuple)) => {
                    let labels: Vec<String> = tuple.iter().map(|item| self.label(item)).collect();
                    let item_type = tuple
                        .iter()
                        .map(|item| schema_type(item).0)
                        .reduce(DataType::merge)
                        .unwrap_or(DataType::Unknown);
                    field.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, item_type.as_str()));
                    field.add_constraint(FieldConstraint::new(constraint_kinds::UNION_TYPES, labels));
                }
                Some(items) if items.is_object() => match self.resolve(items)? {
                    Resolved::Entity(target) => {
                        field.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, DataType::Object.as_str()));
                        field.add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, target));
                    }
                    Resolved::External(reference) => {
                        state.add_dependency(&reference);
                        field.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, DataType::Unknown.as_str()));
                        field.add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, reference));
                    }
                    Resolved::Schema(item_schema, _) => {
                        let (item_type, _) = schema_type(&item_schema);
                        field.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, item_type.as_str()));
                        if let Some(values) = item_schema.get("enum") {
                            field.add_constraint(FieldConstraint::new(constraint_kinds::ENUM, values.clone()));
                        }
                        if item_schema.get("properties").is_some() {
                            children = Some((common::join_path(&path, "items"), item_schema));
                        }
                    }
                },
                _ => {}
            },
            _ => {}
        }

        state.push(field);
        if let Some((child_prefix, child_schema)) = children {
            state.ref_stack.extend(followed.iter().cloned());
            let result = self.walk_object(state, &child_prefix, &child_schema, depth + 1);
            state.ref_stack.truncate(state.ref_stack.len() - followed.len());
            result?;
        }
        Ok(())
    }

    /// Field for one resolved, non-reference property schema
    fn describe(
        &self,
        name: &str,
        path: &str,
        schema: &Value,
        required: bool,
        state: &mut EntityState,
    ) -> ParseResult<FieldInfo> {
        let (mut data_type, type_nullable) = schema_type(schema);
        let mut nullable = !required || type_nullable || is_nullable_flag(schema);
        let mut constraints = Vec::new();

        if let Some(variants) = union_variants(schema) {
            let mut labels = Vec::new();
            let mut merged: Option<DataType> = None;
            for variant in variants {
                if is_null_schema(variant) {
                    nullable = true;
                    continue;
                }
                labels.push(self.label(variant));
                let variant_type = match self.resolve(variant)? {
                    Resolved::Entity(_) => DataType::Object,
                    Resolved::External(reference) => {
                        state.add_dependency(&reference);
                        DataType::Unknown
                    }
                    Resolved::Schema(resolved, _) => schema_type(&resolved).0,
                };
                merged = Some(merged.map_or(variant_type, |m| m.merge(variant_type)));
            }
            if schema.get("type").is_none() {
                data_type = merged.unwrap_or(DataType::Unknown);
            }
            let kind = if schema.get("oneOf").is_some() {
                constraint_kinds::ONEOF
            } else {
                constraint_kinds::UNION_TYPES
            };
            constraints.push(FieldConstraint::new(kind, labels));
        }

        if let Some(types) = schema.get("type").and_then(Value::as_array) {
            let labels: Vec<&str> = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null")
                .collect();
            if labels.len() > 1 {
                constraints.push(FieldConstraint::new(constraint_kinds::UNION_TYPES, labels));
            }
        }

        if let Some(values) = schema.get("enum").and_then(Value::as_array) {
            if values.iter().any(Value::is_null) {
                nullable = true;
            }
            let values: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
            if values.iter().all(Value::is_string) && matches!(data_type, DataType::String | DataType::Unknown) {
                data_type = DataType::Enum;
            }
            constraints.push(FieldConstraint::new(constraint_kinds::ENUM, values));
        } else if let Some(value) = schema.get("const") {
            constraints.push(FieldConstraint::new(constraint_kinds::ENUM, vec![value.clone()]));
        }

        for (keyword, kind) in CONSTRAINT_KEYWORDS {
            if let Some(value) = schema.get(*keyword) {
                constraints.push(FieldConstraint::new(*kind, value.clone()));
            }
        }
        for (keyword, bound, kind) in [
            ("exclusiveMinimum", "minimum", constraint_kinds::EXCLUSIVE_MINIMUM),
            ("exclusiveMaximum", "maximum", constraint_kinds::EXCLUSIVE_MAXIMUM),
        ] {
            match schema.get(keyword) {
                Some(Value::Bool(true)) => {
                    if let Some(limit) = schema.get(bound) {
                        constraints.push(FieldConstraint::new(kind, limit.clone()));
                    }
                }
                Some(limit) if limit.is_number() => constraints.push(FieldConstraint::new(kind, limit.clone())),
                _ => {}
            }
        }
        if schema.get("uniqueItems") == Some(&Value::Bool(true)) {
            constraints.push(FieldConstraint::flag(constraint_kinds::UNIQUE_ITEMS));
        }
        if required && !nullable {
            constraints.push(FieldConstraint::flag(constraint_kinds::NOT_NULL));
        }

        let mut field = FieldInfo::new(name, path, data_type).with_nullable(nullable);
        for constraint in constraints {
            field.add_constraint(constraint);
        }
        if let Some(description) = schema.get("description").and_then(Value::as_str) {
            field = field.with_description(description);
        }
        if let Some(title) = schema.get("title").and_then(Value::as_str) {
            field = field.with_metadata("title", title);
        }
        for flag in ["readOnly", "writeOnly", "deprecated"] {
            if schema.get(flag) == Some(&Value::Bool(true)) {
                field = field.with_metadata(naming::to_snake_case(flag), true);
            }
        }
        let mut samples: Vec<Value> = schema
            .get("examples")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        if let Some(example) = schema.get("example") {
            samples.push(example.clone());
        }
        samples.retain(|s| !s.is_null());
        samples.truncate(self.max_samples);
        if !samples.is_empty() {
            field = field.with_samples(samples);
        }
        Ok(field)
    }

    /// Short description of a member schema for union constraints
    fn label(&self, schema: &Value) -> String {
        if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
            return self
                .entities
                .get(reference)
                .cloned()
                .unwrap_or_else(|| reference.rsplit('/').next().unwrap_or(reference).to_string());
        }
        match schema.get("type") {
            Some(Value::String(t)) => t.clone(),
            _ => schema_type(schema).0.as_str().to_lowercase(),
        }
    }

    /// Identifier field other entities reference this entity by
    fn identifier_of(&self, entity: &str) -> Vec<String> {
        let Some(pointer) = self
            .entities
            .iter()
            .find(|(_, name)| name.as_str() == entity)
            .map(|(pointer, _)| pointer)
        else {
            return Vec::new();
        };
        let Some(schema) = self.pointer(pointer) else {
            return Vec::new();
        };
        let merged = self.merge_all_of(schema, 0);
        let Some(properties) = merged.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        if properties.contains_key("id") {
            return vec!["id".to_string()];
        }
        properties
            .keys()
            .find(|k| common::is_primary_key_name(k, Some(entity)))
            .map(|k| vec![k.clone()])
            .unwrap_or_default()
    }
}

/// `target` with the sibling keywords of a `$ref` schema laid over it
fn overlay(reference: &Value, target: &Value) -> Value {
    let mut merged = target.clone();
    if let (Value::Object(merged_obj), Some(siblings)) = (&mut merged, reference.as_object()) {
        merged_obj.remove("$ref");
        for (key, value) in siblings {
            if key != "$ref" {
                merged_obj.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

fn union_variants(schema: &Value) -> Option<&Vec<Value>> {
    schema
        .get("oneOf")
        .or_else(|| schema.get("anyOf"))
        .and_then(Value::as_array)
        .filter(|v| !v.is_empty())
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

/// OpenAPI 3.0 `nullable` and Swagger `x-nullable`
fn is_nullable_flag(schema: &Value) -> bool {
    schema.get("nullable") == Some(&Value::Bool(true)) || schema.get("x-nullable") == Some(&Value::Bool(true))
}

/// Primary type of a schema and whether its `type` admits null
pub(crate) fn schema_type(schema: &Value) -> (DataType, bool) {
    let mut names: Vec<&str> = match schema.get("type") {
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    let nullable = names.contains(&"null");
    if nullable && names.len() > 1 {
        names.retain(|n| *n != "null");
    }
    if names.is_empty() {
        let inferred = if schema.get("properties").is_some() || schema.get("additionalProperties").is_some_and(Value::is_object) {
            DataType::Object
        } else if schema.get("items").is_some() {
            DataType::Array
        } else if let Some(values) = schema.get("enum").and_then(Value::as_array) {
            values
                .iter()
                .filter(|v| !v.is_null())
                .map(DataType::of_json)
                .reduce(DataType::merge)
                .unwrap_or(DataType::Unknown)
        } else if let Some(value) = schema.get("const") {
            DataType::of_json(value)
        } else {
            DataType::Unknown
        };
        return (inferred, nullable);
    }
    let data_type = names
        .iter()
        .map(|name| named_type(name, schema))
        .reduce(DataType::merge)
        .unwrap_or(DataType::Unknown);
    (data_type, nullable)
}

fn named_type(name: &str, schema: &Value) -> DataType {
    match name {
        "string" => {
            let format = schema.get("format").and_then(Value::as_str).unwrap_or("");
            match format {
                "date" => DataType::Date,
                "date-time" => DataType::DateTime,
                "uuid" => DataType::Uuid,
                "binary" | "byte" => DataType::Binary,
                _ if schema.get("contentEncoding").and_then(Value::as_str) == Some("base64") => DataType::Binary,
                _ => DataType::String,
            }
        }
        "integer" => DataType::Integer,
        "number" => DataType::Float,
        "boolean" => DataType::Boolean,
        "object" => DataType::Object,
        "array" => DataType::Array,
        "null" => DataType::Null,
        _ => DataType::Unknown,
    }
}

impl FormatParser for JsonSchemaParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return 0.0;
        }
        let Ok(Value::Object(object)) = serde_json::from_str::<Value>(trimmed) else {
            return 0.0;
        };
        if common::indicator_count(&object, API_KEYS) > 0 || common::indicator_count(&object, AVRO_KEYS) > 0 {
            return 0.0;
        }
        if object
            .get("$schema")
            .and_then(Value::as_str)
            .is_some_and(|s| s.contains("json-schema"))
        {
            return 0.95;
        }
        if object
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| !TYPE_NAMES.contains(&t))
        {
            return 0.0;
        }
        let indicators = common::indicator_count(&object, INDICATORS);
        if indicators < 2 || common::indicator_count(&object, STRUCTURAL_KEYS) == 0 {
            return 0.0;
        }
        let named = filename.is_some_and(|f| f.to_lowercase().ends_with(".schema.json"));
        let score = 0.85 + 0.02 * (indicators - 2) as f64 + if named { 0.05 } else { 0.0 };
        score.min(0.93)
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let entities = self.entities(filename, content)?;
        let mut schema = common::combine_entities(entities, FORMAT);
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
