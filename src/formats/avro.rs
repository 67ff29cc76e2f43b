//! Apache Avro schemas (`.avsc`) and object container files (`.avro`)

use std::collections::{HashMap, HashSet};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Duration, NaiveDate};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::common::{self, join_path};
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, FormatCapabilities, FormatInfo, SchemaDetails,
    constraint_kinds,
};

const FORMAT: &str = "avro";
const MAGIC: &[u8; 4] = b"Obj\x01";
const SYNC_SIZE: usize = 16;
const PRIMITIVES: &[&str] = &[
    "null", "boolean", "int", "long", "float", "double", "bytes", "string",
];
const INDICATORS: &[&str] = &["type", "name", "namespace", "fields", "doc", "symbols", "aliases"];

/// Parser for Avro schema documents and container files
pub struct AvroParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for AvroParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AvroParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "Apache Avro", "Avro schemas and object container files")
            .mime_types(&["application/avro", "avro/binary"])
            .extensions(&["avsc", "avro"])
            .capabilities(FormatCapabilities::schema_language().with_streaming())
            .examples(&[
                r#"{"type":"record","name":"User","fields":[{"name":"id","type":"string"}]}"#,
            ])
            .schema_type("schema");
        Self { info, options }
    }

    /// Schema JSON of the input plus its container header, if any
    fn load(&self, content: &[u8]) -> ParseResult<(Value, Option<ContainerHeader>)> {
        if content.starts_with(MAGIC) {
            let header = ContainerHeader::read(content)?;
            let schema = serde_json::from_str(&header.schema)
                .map_err(|e| ParseError::syntax(FORMAT, format!("embedded schema: {e}")))?;
            return Ok((schema, Some(header)));
        }
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let schema = serde_json::from_str(text.trim()).map_err(|e| ParseError::syntax(FORMAT, e))?;
        Ok((schema, None))
    }

    fn entities(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        let (document, header) = self.load(content)?;
        let mut names = HashMap::new();
        collect_names(&document, None, &mut names);

        let roots: Vec<&Value> = match &document {
            Value::Array(members) => members.iter().filter(|m| is_record(m)).collect(),
            other => vec![other],
        };
        if roots.is_empty() {
            return Err(ParseError::unsupported(FORMAT, "union document without records"));
        }

        let mut entities = Vec::with_capacity(roots.len());
        for root in roots {
            let mut walker = AvroWalker {
                names: &names,
                fields: Vec::new(),
                max_depth: self.options.max_depth,
            };
            let mut stack = Vec::new();
            let name = match root {
                Value::Object(record) if is_record(root) => {
                    let full = full_name(record, None).unwrap_or_default();
                    stack.push(full);
                    walker.walk_record_fields(record, "", 0, &mut stack)?;
                    record.get("name").and_then(Value::as_str).map(short_name)
                }
                other => {
                    let name = other.get("name").and_then(Value::as_str).unwrap_or("value");
                    walker.push_field(short_name(name), short_name(name), other, false, 0, &mut stack)?;
                    Some(short_name(name))
                }
            };

            let name = name
                .map(str::to_string)
                .or_else(|| common::schema_name_from_filename(filename))
                .unwrap_or_else(|| "record".to_string());
            let mut schema = SchemaDetails::new().with_id(name.clone());
            schema.fields = walker.fields;
            schema.metadata.format = Some(FORMAT.to_string());
            schema.metadata.namespace = root
                .get("namespace")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    root.get("name")
                        .and_then(Value::as_str)
                        .and_then(|n| n.rsplit_once('.'))
                        .map(|(ns, _)| ns.to_string())
                });
            schema.metadata.description = root.get("doc").and_then(Value::as_str).map(str::to_string);
            schema.primary_keys = common::infer_primary_keys(&schema.fields, Some(&name));
            common::apply_primary_keys(&mut schema);
            if let Some(header) = &header {
                schema.metadata.record_count = Some(header.record_count);
                schema
                    .metadata
                    .additional
                    .insert("codec".to_string(), json!(header.codec));
            }
            entities.push(schema);
        }
        debug!(entities = entities.len(), container = header.is_some(), "Extracted Avro schema");
        Ok(entities)
    }
}

fn is_record(value: &Value) -> bool {
    matches!(
        value.get("type").and_then(Value::as_str),
        Some("record") | Some("error")
    )
}

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

fn full_name(def: &Map<String, Value>, namespace: Option<&str>) -> Option<String> {
    let name = def.get("name")?.as_str()?;
    if name.contains('.') {
        return Some(name.to_string());
    }
    let ns = def.get("namespace").and_then(Value::as_str).or(namespace);
    Some(match ns {
        Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_string(),
    })
}

/// Register every named type (record, enum, fixed) under its full and short name
fn collect_names<'a>(value: &'a Value, namespace: Option<&str>, names: &mut HashMap<String, &'a Value>) {
    match value {
        Value::Array(members) => {
            for member in members {
                collect_names(member, namespace, names);
            }
        }
        Value::Object(def) => {
            let kind = def.get("type");
            match kind.and_then(Value::as_str) {
                Some("record" | "error" | "enum" | "fixed") => {
                    let Some(full) = full_name(def, namespace) else {
                        return;
                    };
                    names.entry(short_name(&full).to_string()).or_insert(value);
                    let inner_ns = full.rsplit_once('.').map(|(ns, _)| ns.to_string());
                    names.insert(full, value);
                    if let Some(Value::Array(fields)) = def.get("fields") {
                        for field in fields {
                            if let Some(t) = field.get("type") {
                                collect_names(t, inner_ns.as_deref(), names);
                            }
                        }
                    }
                }
                Some("array") => {
                    if let Some(items) = def.get("items") {
                        collect_names(items, namespace, names);
                    }
                }
                Some("map") => {
                    if let Some(values) = def.get("values") {
                        collect_names(values, namespace, names);
                    }
                }
                _ => {
                    if let Some(inner) = kind.filter(|k| !k.is_string()) {
                        collect_names(inner, namespace, names);
                    }
                }
            }
        }
        _ => {}
    }
}

struct AvroWalker<'a> {
    names: &'a HashMap<String, &'a Value>,
    fields: Vec<FieldInfo>,
    max_depth: usize,
}

impl<'a> AvroWalker<'a> {
    /// Follow named references and single-member nullable unions
    fn resolve(&self, schema: &'a Value) -> &'a Value {
        match schema {
            Value::String(name) if !PRIMITIVES.contains(&name.as_str()) => {
                self.names.get(name).copied().unwrap_or(schema)
            }
            Value::Array(members) => {
                let non_null: Vec<&Value> = members.iter().filter(|m| m.as_str() != Some("null")).collect();
                match non_null.as_slice() {
                    [single] => self.resolve(*single),
                    _ => schema,
                }
            }
            Value::Object(def) => match def.get("type") {
                Some(inner @ (Value::Object(_) | Value::Array(_))) => self.resolve(inner),
                Some(Value::String(name))
                    if def.len() == 1 && !PRIMITIVES.contains(&name.as_str()) =>
                {
                    self.names.get(name).copied().unwrap_or(schema)
                }
                _ => schema,
            },
            _ => schema,
        }
    }

    /// Data type of a schema without walking its children
    fn type_of(&self, schema: &'a Value) -> DataType {
        let resolved = self.resolve(schema);
        match resolved {
            Value::String(name) => primitive_type(name).unwrap_or(DataType::Unknown),
            Value::Array(_) => DataType::Unknown,
            Value::Object(def) => {
                let kind = def.get("type").and_then(Value::as_str).unwrap_or_default();
                match kind {
                    "record" | "error" | "map" => DataType::Object,
                    "array" => DataType::Array,
                    "enum" => DataType::Enum,
                    _ => logical_type(def)
                        .map(|(t, _)| t)
                        .or_else(|| primitive_type(kind))
                        .unwrap_or(DataType::Unknown),
                }
            }
            _ => DataType::Unknown,
        }
    }

    fn type_label(&self, schema: &Value) -> String {
        match schema {
            Value::String(name) => name.clone(),
            Value::Object(def) => def
                .get("name")
                .or_else(|| def.get("logicalType"))
                .or_else(|| def.get("type"))
                .and_then(Value::as_str)
                .unwrap_or("complex")
                .to_string(),
            _ => "union".to_string(),
        }
    }

    fn walk_record_fields(
        &mut self,
        record: &'a Map<String, Value>,
        prefix: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<()> {
        let Some(Value::Array(fields)) = record.get("fields") else {
            return Ok(());
        };
        let mut seen = HashSet::new();
        for field in fields {
            let Some(name) = field.get("name").and_then(Value::as_str) else {
                continue;
            };
            let Some(field_type) = field.get("type") else {
                continue;
            };
            if !seen.insert(name) {
                return Err(ParseError::syntax(FORMAT, format!("duplicate field '{name}' in record")));
            }
            let index = self.push_field(name, &join_path(prefix, name), field_type, false, depth, stack)?;
            let info = &mut self.fields[index];
            if let Some(doc) = field.get("doc").and_then(Value::as_str) {
                info.description = Some(doc.to_string());
            }
            if let Some(default) = field.get("default") {
                if default.is_null() {
                    info.nullable = true;
                }
                info.add_constraint(FieldConstraint::new(constraint_kinds::DEFAULT, default.clone()));
            }
            if let Some(aliases) = field.get("aliases") {
                info.additional_metadata.insert("aliases".to_string(), aliases.clone());
            }
        }
        Ok(())
    }

    /// Push the field for `schema` at `path` (plus its children); returns its index
    fn push_field(
        &mut self,
        name: &str,
        path: &str,
        schema: &'a Value,
        nullable: bool,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<usize> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        match schema {
            Value::Array(members) => {
                let non_null: Vec<&'a Value> =
                    members.iter().filter(|m| m.as_str() != Some("null")).collect();
                let nullable = nullable || non_null.len() < members.len();
                match non_null.as_slice() {
                    [] => Ok(self.push(FieldInfo::new(name, path, DataType::Null).with_nullable(true))),
                    [single] => self.push_field(name, path, *single, nullable, depth, stack),
                    many => {
                        let types: Vec<DataType> = many.iter().map(|m| self.type_of(*m)).collect();
                        let data_type = if types.iter().all(DataType::is_numeric) {
                            DataType::Float
                        } else if types.iter().all(|t| *t == types[0]) {
                            types[0]
                        } else {
                            DataType::Unknown
                        };
                        let labels: Vec<String> = many.iter().map(|m| self.type_label(m)).collect();
                        let field = FieldInfo::new(name, path, data_type)
                            .with_nullable(nullable)
                            .with_constraint(FieldConstraint::new(constraint_kinds::UNION_TYPES, labels));
                        Ok(self.push(field))
                    }
                }
            }
            Value::String(type_name) => {
                if let Some(data_type) = primitive_type(type_name) {
                    let nullable = nullable || type_name == "null";
                    return Ok(self.push(FieldInfo::new(name, path, data_type).with_nullable(nullable)));
                }
                let Some(definition) = self.names.get(type_name.as_str()).copied() else {
                    debug!(reference = %type_name, "Unresolved Avro named type");
                    return Ok(self.push(
                        FieldInfo::new(name, path, DataType::Unknown)
                            .with_nullable(nullable)
                            .with_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, type_name.as_str())),
                    ));
                };
                if stack.iter().any(|s| s == type_name || short_name(s) == type_name) {
                    return Ok(self.push(
                        FieldInfo::new(name, path, DataType::Object)
                            .with_nullable(nullable)
                            .with_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, type_name.as_str())),
                    ));
                }
                self.push_field(name, path, definition, nullable, depth, stack)
            }
            Value::Object(def) => self.push_complex(name, path, def, nullable, depth, stack),
            _ => Err(ParseError::syntax(FORMAT, format!("invalid type for field {path}"))),
        }
    }

    fn push_complex(
        &mut self,
        name: &str,
        path: &str,
        def: &'a Map<String, Value>,
        nullable: bool,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<usize> {
        let kind = match def.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(inner @ (Value::Object(_) | Value::Array(_))) => {
                return self.push_field(name, path, inner, nullable, depth, stack);
            }
            _ => return Err(ParseError::syntax(FORMAT, format!("missing type for field {path}"))),
        };
        let with_doc = |field: FieldInfo| match def.get("doc").and_then(Value::as_str) {
            Some(doc) => field.with_description(doc),
            None => field,
        };

        match kind {
            "record" | "error" => {
                let full = full_name(def, None).unwrap_or_else(|| name.to_string());
                let field = with_doc(
                    FieldInfo::new(name, path, DataType::Object)
                        .with_nullable(nullable)
                        .with_metadata("avro_type", full.as_str()),
                );
                let index = self.push(field);
                if stack.contains(&full) {
                    self.fields[index]
                        .add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, full.as_str()));
                    return Ok(index);
                }
                stack.push(full);
                self.walk_record_fields(def, path, depth + 1, stack)?;
                stack.pop();
                Ok(index)
            }
            "enum" => {
                let symbols = def.get("symbols").cloned().unwrap_or_else(|| json!([]));
                let mut field = FieldInfo::new(name, path, DataType::Enum)
                    .with_nullable(nullable)
                    .with_constraint(FieldConstraint::new(constraint_kinds::ENUM, symbols));
                if let Some(enum_name) = def.get("name").and_then(Value::as_str) {
                    field = field.with_metadata("avro_type", enum_name);
                }
                Ok(self.push(with_doc(field)))
            }
            "fixed" => {
                let size = def.get("size").and_then(Value::as_u64).unwrap_or(0);
                let (data_type, mut constraints) =
                    logical_type(def).unwrap_or((DataType::Binary, Vec::new()));
                constraints.push(FieldConstraint::new(constraint_kinds::FIXED_SIZE, size));
                let mut field = FieldInfo::new(name, path, data_type).with_nullable(nullable);
                for c in constraints {
                    field.add_constraint(c);
                }
                Ok(self.push(with_doc(field)))
            }
            "array" => {
                let items = def.get("items").unwrap_or(&Value::Null);
                let index = self.push(with_doc(
                    FieldInfo::new(name, path, DataType::Array).with_nullable(nullable),
                ));
                self.push_container_children(index, path, "items", constraint_kinds::ITEMS_TYPE, items, depth, stack)?;
                Ok(index)
            }
            "map" => {
                let values = def.get("values").unwrap_or(&Value::Null);
                let index = self.push(with_doc(
                    FieldInfo::new(name, path, DataType::Object)
                        .with_nullable(nullable)
                        .with_constraint(FieldConstraint::new(constraint_kinds::KEY_TYPE, "STRING")),
                ));
                self.push_container_children(index, path, "values", constraint_kinds::VALUE_TYPE, values, depth, stack)?;
                Ok(index)
            }
            primitive => {
                let (data_type, constraints) = match logical_type(def) {
                    Some(logical) => logical,
                    None => (primitive_type(primitive).unwrap_or(DataType::Unknown), Vec::new()),
                };
                let mut field = FieldInfo::new(name, path, data_type).with_nullable(nullable);
                for c in constraints {
                    field.add_constraint(c);
                }
                Ok(self.push(with_doc(field)))
            }
        }
    }

    /// Record-typed elements become child fields under `segment`; anything else
    /// is recorded as an element type constraint on the container
    #[allow(clippy::too_many_arguments)]
    fn push_container_children(
        &mut self,
        index: usize,
        path: &str,
        segment: &str,
        constraint: &str,
        element: &'a Value,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<()> {
        let resolved = self.resolve(element);
        if let Value::Object(record) = resolved
            && is_record(resolved)
        {
            let full = full_name(record, None).unwrap_or_default();
            if stack.contains(&full) {
                self.fields[index].add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, full));
                return Ok(());
            }
            stack.push(full);
            self.walk_record_fields(record, &join_path(path, segment), depth + 1, stack)?;
            stack.pop();
            return Ok(());
        }
        let element_type = self.type_of(element);
        self.fields[index].add_constraint(FieldConstraint::new(constraint, element_type.as_str()));
        if let Value::Object(def) = resolved
            && def.get("type").and_then(Value::as_str) == Some("enum")
            && let Some(symbols) = def.get("symbols")
        {
            self.fields[index].add_constraint(FieldConstraint::new(constraint_kinds::ENUM, symbols.clone()));
        }
        Ok(())
    }

    fn push(&mut self, field: FieldInfo) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }
}

fn primitive_type(name: &str) -> Option<DataType> {
    Some(match name {
        "null" => DataType::Null,
        "boolean" => DataType::Boolean,
        "int" | "long" => DataType::Integer,
        "float" | "double" => DataType::Float,
        "bytes" => DataType::Binary,
        "string" => DataType::String,
        _ => return None,
    })
}

/// Data type and constraints implied by a `logicalType` annotation
fn logical_type(def: &Map<String, Value>) -> Option<(DataType, Vec<FieldConstraint>)> {
    let logical = def.get("logicalType")?.as_str()?;
    let tag = FieldConstraint::new(constraint_kinds::LOGICAL_TYPE, logical);
    let mut constraints = vec![tag];
    let data_type = match logical {
        "date" => DataType::Date,
        "timestamp-millis" | "timestamp-micros" | "timestamp-nanos" | "local-timestamp-millis"
        | "local-timestamp-micros" => DataType::DateTime,
        "time-millis" | "time-micros" => {
            constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "time"));
            DataType::String
        }
        "uuid" => DataType::Uuid,
        "decimal" => {
            if let Some(p) = def.get("precision") {
                constraints.push(FieldConstraint::new(constraint_kinds::PRECISION, p.clone()));
            }
            if let Some(s) = def.get("scale") {
                constraints.push(FieldConstraint::new(constraint_kinds::SCALE, s.clone()));
            }
            DataType::Float
        }
        "duration" => DataType::Binary,
        _ => return None,
    };
    Some((data_type, constraints))
}

/// Header of an object container file
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub schema: String,
    pub codec: String,
    pub metadata: HashMap<String, Vec<u8>>,
    pub sync: [u8; SYNC_SIZE],
    /// Offset of the first data block
    pub data_offset: usize,
    /// Sum of the object counts of all readable blocks
    pub record_count: u64,
}

impl ContainerHeader {
    pub fn read(content: &[u8]) -> ParseResult<Self> {
        let mut cursor = Cursor::new(content);
        if cursor.take(MAGIC.len())? != MAGIC {
            return Err(ParseError::syntax(FORMAT, "missing container magic"));
        }
        let mut metadata = HashMap::new();
        loop {
            let mut count = cursor.read_long()?;
            if count == 0 {
                break;
            }
            if count < 0 {
                count = -count;
                cursor.read_long()?;
            }
            for _ in 0..count {
                let key = cursor.read_string()?;
                let value = cursor.read_bytes()?.to_vec();
                metadata.insert(key, value);
            }
        }
        let mut sync = [0u8; SYNC_SIZE];
        sync.copy_from_slice(cursor.take(SYNC_SIZE)?);
        let data_offset = cursor.pos;

        let schema = metadata
            .get("avro.schema")
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .ok_or_else(|| ParseError::syntax(FORMAT, "container header without avro.schema"))?;
        let codec = metadata
            .get("avro.codec")
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .unwrap_or_else(|| "null".to_string());

        // Block headers are never compressed, so counts are readable for every codec
        let mut record_count = 0u64;
        while !cursor.at_end() {
            let Ok(count) = cursor.read_long() else { break };
            let Ok(size) = cursor.read_long() else { break };
            if count < 0 || size < 0 || cursor.take(size as usize).is_err() || cursor.take(SYNC_SIZE).is_err() {
                break;
            }
            record_count += count as u64;
        }

        Ok(Self {
            schema,
            codec,
            metadata,
            sync,
            data_offset,
            record_count,
        })
    }
}

/// Binary reader for Avro's zig-zag varint encoding
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| ParseError::syntax(FORMAT, "unexpected end of data"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_long(&mut self) -> ParseResult<i64> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.take(1)?[0];
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 63 {
                return Err(ParseError::syntax(FORMAT, "varint overflow"));
            }
        }
        Ok((value >> 1) as i64 ^ -((value & 1) as i64))
    }

    fn read_bytes(&mut self) -> ParseResult<&'a [u8]> {
        let len = self.read_long()?;
        if len < 0 {
            return Err(ParseError::syntax(FORMAT, "negative length"));
        }
        self.take(len as usize)
    }

    fn read_string(&mut self) -> ParseResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ParseError::Encoding(e.to_string()))
    }
}

/// Decoder for datums written with the null codec
struct DatumReader<'a> {
    names: &'a HashMap<String, &'a Value>,
    max_depth: usize,
}

impl<'a> DatumReader<'a> {
    fn read(&self, cursor: &mut Cursor<'_>, schema: &'a Value, depth: usize) -> ParseResult<Value> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        match schema {
            Value::String(name) => {
                if let Some(value) = read_primitive(cursor, name)? {
                    return Ok(value);
                }
                let definition = self
                    .names
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| ParseError::syntax(FORMAT, format!("unknown type {name}")))?;
                self.read(cursor, definition, depth + 1)
            }
            Value::Array(members) => {
                let branch = cursor.read_long()?;
                let member = usize::try_from(branch)
                    .ok()
                    .and_then(|i| members.get(i))
                    .ok_or_else(|| ParseError::syntax(FORMAT, "union branch out of range"))?;
                self.read(cursor, member, depth)
            }
            Value::Object(def) => self.read_complex(cursor, def, depth),
            _ => Err(ParseError::syntax(FORMAT, "invalid schema")),
        }
    }

    fn read_complex(&self, cursor: &mut Cursor<'_>, def: &'a Map<String, Value>, depth: usize) -> ParseResult<Value> {
        let kind = match def.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(inner) => return self.read(cursor, inner, depth),
            None => return Err(ParseError::syntax(FORMAT, "missing type")),
        };
        match kind {
            "record" | "error" => {
                let mut object = Map::new();
                if let Some(Value::Array(fields)) = def.get("fields") {
                    for field in fields {
                        let name = field.get("name").and_then(Value::as_str).unwrap_or_default();
                        let field_type = field.get("type").unwrap_or(&Value::Null);
                        object.insert(name.to_string(), self.read(cursor, field_type, depth + 1)?);
                    }
                }
                Ok(Value::Object(object))
            }
            "enum" => {
                let index = cursor.read_long()?;
                let symbol = def
                    .get("symbols")
                    .and_then(Value::as_array)
                    .and_then(|s| usize::try_from(index).ok().and_then(|i| s.get(i)))
                    .cloned()
                    .ok_or_else(|| ParseError::syntax(FORMAT, "enum index out of range"))?;
                Ok(symbol)
            }
            "fixed" => {
                let size = def.get("size").and_then(Value::as_u64).unwrap_or(0) as usize;
                Ok(json!(BASE64.encode(cursor.take(size)?)))
            }
            "array" => {
                let items = def.get("items").unwrap_or(&Value::Null);
                let mut values = Vec::new();
                self.read_blocks(cursor, |c| {
                    values.push(self.read(c, items, depth + 1)?);
                    Ok(())
                })?;
                Ok(Value::Array(values))
            }
            "map" => {
                let value_schema = def.get("values").unwrap_or(&Value::Null);
                let mut object = Map::new();
                self.read_blocks(cursor, |c| {
                    let key = c.read_string()?;
                    object.insert(key, self.read(c, value_schema, depth + 1)?);
                    Ok(())
                })?;
                Ok(Value::Object(object))
            }
            primitive => {
                let raw = read_primitive(cursor, primitive)?
                    .ok_or_else(|| ParseError::syntax(FORMAT, format!("unknown type {primitive}")))?;
                Ok(apply_logical(def, raw))
            }
        }
    }

    fn read_blocks(
        &self,
        cursor: &mut Cursor<'_>,
        mut each: impl FnMut(&mut Cursor<'_>) -> ParseResult<()>,
    ) -> ParseResult<()> {
        loop {
            let mut count = cursor.read_long()?;
            if count == 0 {
                return Ok(());
            }
            if count < 0 {
                count = -count;
                cursor.read_long()?;
            }
            for _ in 0..count {
                each(cursor)?;
            }
        }
    }
}

fn read_primitive(cursor: &mut Cursor<'_>, name: &str) -> ParseResult<Option<Value>> {
    let value = match name {
        "null" => Value::Null,
        "boolean" => Value::Bool(cursor.take(1)?[0] != 0),
        "int" | "long" => json!(cursor.read_long()?),
        "float" => {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(cursor.take(4)?);
            json!(f32::from_le_bytes(bytes))
        }
        "double" => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(cursor.take(8)?);
            json!(f64::from_le_bytes(bytes))
        }
        "bytes" => json!(BASE64.encode(cursor.read_bytes()?)),
        "string" => json!(cursor.read_string()?),
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Render logical-typed raw values the way they read in JSON
fn apply_logical(def: &Map<String, Value>, raw: Value) -> Value {
    let Some(logical) = def.get("logicalType").and_then(Value::as_str) else {
        return raw;
    };
    let Some(n) = raw.as_i64() else {
        return raw;
    };
    let rendered = match logical {
        "date" => NaiveDate::from_ymd_opt(1970, 1, 1)
            .zip(Duration::try_days(n))
            .and_then(|(epoch, days)| epoch.checked_add_signed(days))
            .map(|d| d.to_string()),
        "timestamp-millis" | "local-timestamp-millis" => {
            DateTime::from_timestamp_millis(n).map(|t| t.to_rfc3339())
        }
        "timestamp-micros" | "local-timestamp-micros" => {
            DateTime::from_timestamp_micros(n).map(|t| t.to_rfc3339())
        }
        _ => None,
    };
    rendered.map(Value::String).unwrap_or(raw)
}

impl AvroParser {
    fn container_records(&self, content: &[u8], max_records: usize) -> ParseResult<Option<Vec<Value>>> {
        let header = ContainerHeader::read(content)?;
        if header.codec != "null" {
            debug!(codec = %header.codec, "Compressed Avro blocks, fabricating samples");
            return Ok(None);
        }
        let schema: Value = serde_json::from_str(&header.schema).map_err(|e| ParseError::syntax(FORMAT, e))?;
        let mut names = HashMap::new();
        collect_names(&schema, None, &mut names);
        let reader = DatumReader {
            names: &names,
            max_depth: self.options.max_depth.max(1) * 2,
        };

        let mut cursor = Cursor::new(content);
        cursor.pos = header.data_offset;
        let mut records = Vec::new();
        while !cursor.at_end() && records.len() < max_records {
            let count = cursor.read_long()?;
            let size = cursor.read_long()?;
            if count < 0 || size < 0 {
                return Err(ParseError::syntax(FORMAT, "corrupt block header"));
            }
            let mut block = Cursor::new(cursor.take(size as usize)?);
            for _ in 0..count {
                if records.len() >= max_records {
                    break;
                }
                records.push(reader.read(&mut block, &schema, 0)?);
            }
            if cursor.take(SYNC_SIZE)? != header.sync {
                return Err(ParseError::syntax(FORMAT, "sync marker mismatch"));
            }
        }
        Ok(Some(records))
    }
}

impl FormatParser for AvroParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        if content.starts_with(MAGIC) {
            return 0.98;
        }
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return 0.0;
        }
        let Ok(document) = serde_json::from_str::<Value>(trimmed) else {
            return 0.0;
        };
        let score = |value: &Value| -> f64 {
            let Value::Object(object) = value else {
                return 0.0;
            };
            let kind = object.get("type").and_then(Value::as_str);
            let named = object.get("name").is_some_and(Value::is_string);
            match kind {
                Some("record" | "error") if named && object.get("fields").is_some_and(Value::is_array) => 0.95,
                Some("enum") if named && object.get("symbols").is_some_and(Value::is_array) => 0.9,
                Some("fixed") if named && object.get("size").is_some() => 0.9,
                _ if common::indicator_count(object, INDICATORS) >= 3 && named => 0.5,
                _ => 0.0,
            }
        };
        match &document {
            Value::Array(members) if !members.is_empty() => {
                let best = members.iter().map(score).fold(0.0, f64::max);
                if best >= 0.9 { 0.9 } else { 0.0 }
            }
            other => score(other),
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let entities = self.entities(filename, content)?;
        Ok(common::combine_entities(entities, FORMAT))
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
        if content.starts_with(MAGIC)
            && let Some(records) = self.container_records(content, max_records)?
        {
            return Ok(records);
        }
        let entities = self.entities(filename, content)?;
        Ok(common::fabricate_entity_records(&entities, max_records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = r#"{"type":"record","name":"User","fields":[{"name":"id","type":"string"},{"name":"email","type":["null","string"]}]}"#;

    fn zigzag(n: i64) -> Vec<u8> {
        let mut v = ((n << 1) ^ (n >> 63)) as u64;
        let mut out = Vec::new();
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    fn avro_string(s: &str) -> Vec<u8> {
        let mut out = zigzag(s.len() as i64);
        out.extend_from_slice(s.as_bytes());
        out
    }

    fn container(schema: &str, records: &[Vec<u8>]) -> Vec<u8> {
        let sync = [7u8; SYNC_SIZE];
        let mut out = MAGIC.to_vec();
        out.extend(zigzag(1));
        out.extend(avro_string("avro.schema"));
        out.extend(avro_string(schema));
        out.extend(zigzag(0));
        out.extend_from_slice(&sync);
        let body: Vec<u8> = records.concat();
        out.extend(zigzag(records.len() as i64));
        out.extend(zigzag(body.len() as i64));
        out.extend(body);
        out.extend_from_slice(&sync);
        out
    }

    #[test]
    fn test_user_record() {
        let parser = AvroParser::new();
        let schema = parser.parse_schema(Some("user.avsc"), USER.as_bytes()).unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert!(!schema.field("id").unwrap().nullable);
        assert!(schema.field("email").unwrap().nullable);
        assert!(schema.primary_keys.contains(&"id".to_string()));
        assert_eq!(schema.schema_id(), Some("User"));
    }

    #[test]
    fn test_complex_types() {
        let content = r#"{
            "type": "record", "name": "Order", "namespace": "shop",
            "fields": [
                {"name": "order_id", "type": {"type": "string", "logicalType": "uuid"}},
                {"name": "placed", "type": {"type": "long", "logicalType": "timestamp-millis"}},
                {"name": "status", "type": {"type": "enum", "name": "Status", "symbols": ["NEW", "DONE"]}},
                {"name": "lines", "type": {"type": "array", "items": {
                    "type": "record", "name": "Line",
                    "fields": [{"name": "sku", "type": "string"}, {"name": "qty", "type": "int"}]
                }}},
                {"name": "tags", "type": {"type": "map", "values": "string"}},
                {"name": "checksum", "type": {"type": "fixed", "name": "Md5", "size": 16}},
                {"name": "previous", "type": ["null", "Order"], "default": null},
                {"name": "amount", "type": ["int", "double"]}
            ]
        }"#;
        let parser = AvroParser::new();
        let schema = parser.parse_schema(None, content.as_bytes()).unwrap();
        assert!(schema.has_unique_paths());
        assert_eq!(schema.field("order_id").unwrap().data_type, DataType::Uuid);
        assert_eq!(schema.field("placed").unwrap().data_type, DataType::DateTime);
        assert_eq!(schema.field("status").unwrap().data_type, DataType::Enum);
        assert_eq!(schema.field("lines").unwrap().data_type, DataType::Array);
        assert_eq!(schema.field("lines.items.qty").unwrap().data_type, DataType::Integer);
        let tags = schema.field("tags").unwrap();
        assert_eq!(tags.constraint(constraint_kinds::VALUE_TYPE).unwrap().value, json!("STRING"));
        assert_eq!(
            schema.field("checksum").unwrap().constraint(constraint_kinds::FIXED_SIZE).unwrap().value,
            json!(16)
        );
        let previous = schema.field("previous").unwrap();
        assert!(previous.nullable);
        assert!(previous.has_constraint(constraint_kinds::REFERENCE));
        assert_eq!(schema.field("amount").unwrap().data_type, DataType::Float);
        assert_eq!(schema.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(schema.primary_keys, vec!["order_id"]);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let content = r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"},{"name":"a","type":"string"}]}"#;
        let err = AvroParser::new().parse_schema(None, content.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
        assert!(err.to_string().contains("duplicate field 'a'"));
    }

    #[test]
    fn test_can_parse() {
        let parser = AvroParser::new();
        assert!(parser.can_parse(None, USER.as_bytes()) >= 0.9);
        assert_eq!(parser.can_parse(None, br#"{"type": "object", "properties": {}}"#), 0.0);
        assert!(parser.can_parse(None, b"Obj\x01rest") > 0.95);
    }

    #[test]
    fn test_container_file() {
        let mut first = avro_string("u1");
        first.extend(zigzag(1));
        first.extend(avro_string("a@example.com"));
        let mut second = avro_string("u2");
        second.extend(zigzag(0));

        let bytes = container(USER, &[first, second]);
        let parser = AvroParser::new();
        let schema = parser.parse_schema(Some("users.avro"), &bytes).unwrap();
        assert_eq!(schema.metadata.record_count, Some(2));
        assert_eq!(schema.fields.len(), 2);

        let samples = parser.extract_sample_data(None, &bytes, 10).unwrap();
        assert_eq!(samples, vec![
            json!({"id": "u1", "email": "a@example.com"}),
            json!({"id": "u2", "email": null}),
        ]);
    }

    #[test]
    fn test_fabricated_samples() {
        let parser = AvroParser::new();
        let samples = parser.extract_sample_data(None, USER.as_bytes(), 3).unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples[0]["id"].is_string());
    }
}
