//! XML Schema Definition (XSD)

use std::collections::HashMap;

use serde_json::{Value, json};
use tracing::debug;

use super::common::{self, attribute_path, join_path};
use super::xml::{XmlNode, parse_document};
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, ForeignKeyDefinition, FormatCapabilities, FormatInfo,
    SchemaDetails, constraint_kinds,
};

const FORMAT: &str = "xsd";
const XML_SCHEMA_NS: &str = "http://www.w3.org/2001/XMLSchema";
const SIMPLE_TYPE_DEPTH: usize = 10;

/// Parser for XML Schema documents
pub struct XsdParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for XsdParser {
    fn default() -> Self {
        Self::new()
    }
}

impl XsdParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "XML Schema", "W3C XML Schema Definition")
            .mime_types(&["application/xml"])
            .extensions(&["xsd"])
            .capabilities(FormatCapabilities::schema_language())
            .examples(&[r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#])
            .schema_type("schema");
        Self { info, options }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Key,
    Unique,
    KeyRef,
}

#[derive(Debug, Clone)]
struct KeyDecl {
    kind: KeyKind,
    name: String,
    selector: String,
    fields: Vec<String>,
    refer: Option<String>,
}

/// Local part of a qualified name
fn local(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

/// Type of a built-in XSD simple type, with an optional `format` hint
fn builtin_type(name: &str) -> Option<(DataType, Option<&'static str>)> {
    let t = match local(name) {
        "string" | "normalizedString" | "token" | "language" | "Name" | "NCName" | "QName"
        | "ID" | "IDREF" | "IDREFS" | "ENTITY" | "NMTOKEN" | "NMTOKENS" => (DataType::String, None),
        "anyURI" => (DataType::String, Some("uri")),
        "int" | "integer" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "nonPositiveInteger" | "negativeInteger" | "unsignedLong"
        | "unsignedInt" | "unsignedShort" | "unsignedByte" => (DataType::Integer, None),
        "decimal" | "float" | "double" => (DataType::Float, None),
        "boolean" => (DataType::Boolean, None),
        "date" => (DataType::Date, None),
        "dateTime" | "dateTimeStamp" => (DataType::DateTime, None),
        "time" => (DataType::String, Some("time")),
        "duration" | "gYear" | "gYearMonth" | "gMonth" | "gMonthDay" | "gDay" => {
            (DataType::String, None)
        }
        "base64Binary" | "hexBinary" => (DataType::Binary, None),
        "anyType" | "anySimpleType" => (DataType::Unknown, None),
        _ => return None,
    };
    Some(t)
}

struct XsdWalker<'a> {
    complex_types: HashMap<&'a str, &'a XmlNode>,
    simple_types: HashMap<&'a str, &'a XmlNode>,
    elements: HashMap<&'a str, &'a XmlNode>,
    schema_prefix: Option<String>,
    fields: Vec<FieldInfo>,
    keys: Vec<KeyDecl>,
    max_depth: usize,
}

impl<'a> XsdWalker<'a> {
    fn new(root: &'a XmlNode, max_depth: usize) -> Self {
        let mut complex_types = HashMap::new();
        let mut simple_types = HashMap::new();
        let mut elements = HashMap::new();
        for child in &root.children {
            let Some(name) = child.attr("name") else {
                continue;
            };
            match child.name.as_str() {
                "complexType" => {
                    complex_types.insert(name, child);
                }
                "simpleType" => {
                    simple_types.insert(name, child);
                }
                "element" => {
                    elements.insert(name, child);
                }
                _ => {}
            }
        }
        let schema_prefix = root
            .namespaces
            .iter()
            .find(|(_, uri)| uri == XML_SCHEMA_NS)
            .map(|(p, _)| p.clone());
        Self {
            complex_types,
            simple_types,
            elements,
            schema_prefix,
            fields: Vec::new(),
            keys: Vec::new(),
            max_depth,
        }
    }

    /// Whether a type reference names a built-in XML Schema type
    fn is_builtin_ref(&self, type_ref: &str) -> bool {
        match (type_ref.split_once(':'), &self.schema_prefix) {
            (Some((prefix, _)), Some(schema_prefix)) => prefix == schema_prefix,
            (Some((prefix, _)), None) => prefix == "xs" || prefix == "xsd",
            (None, _) => !self.complex_types.contains_key(type_ref)
                && !self.simple_types.contains_key(type_ref)
                && builtin_type(type_ref).is_some(),
        }
    }

    /// Resolve a simple type reference into a type plus facet constraints
    fn simple_type(&self, type_ref: &str, depth: usize) -> (DataType, Vec<FieldConstraint>) {
        if self.is_builtin_ref(type_ref) || depth > SIMPLE_TYPE_DEPTH {
            return builtin_constraints(type_ref);
        }
        match self.simple_types.get(local(type_ref)) {
            Some(node) => self.simple_type_node(node, depth + 1),
            None => builtin_constraints(type_ref),
        }
    }

    fn simple_type_node(&self, node: &XmlNode, depth: usize) -> (DataType, Vec<FieldConstraint>) {
        if let Some(restriction) = node.child("restriction") {
            let (mut data_type, mut constraints) = match restriction.attr("base") {
                Some(base) => self.simple_type(base, depth),
                None => match restriction.child("simpleType") {
                    Some(inline) => self.simple_type_node(inline, depth + 1),
                    None => (DataType::String, Vec::new()),
                },
            };
            let mut enumeration: Vec<Value> = Vec::new();
            for facet in &restriction.children {
                let Some(value) = facet.attr("value") else {
                    continue;
                };
                let numeric = || {
                    value
                        .parse::<i64>()
                        .map(Value::from)
                        .or_else(|_| value.parse::<f64>().map(Value::from))
                        .unwrap_or_else(|_| Value::from(value))
                };
                let constraint = match facet.name.as_str() {
                    "enumeration" => {
                        enumeration.push(json!(value));
                        continue;
                    }
                    "pattern" => FieldConstraint::new(constraint_kinds::PATTERN, value),
                    "length" => {
                        constraints.push(FieldConstraint::new(constraint_kinds::MIN_LENGTH, numeric()));
                        FieldConstraint::new(constraint_kinds::MAX_LENGTH, numeric())
                    }
                    "minLength" => FieldConstraint::new(constraint_kinds::MIN_LENGTH, numeric()),
                    "maxLength" => FieldConstraint::new(constraint_kinds::MAX_LENGTH, numeric()),
                    "minInclusive" => FieldConstraint::new(constraint_kinds::MINIMUM, numeric()),
                    "maxInclusive" => FieldConstraint::new(constraint_kinds::MAXIMUM, numeric()),
                    "minExclusive" => {
                        FieldConstraint::new(constraint_kinds::EXCLUSIVE_MINIMUM, numeric())
                    }
                    "maxExclusive" => {
                        FieldConstraint::new(constraint_kinds::EXCLUSIVE_MAXIMUM, numeric())
                    }
                    "totalDigits" => FieldConstraint::new(constraint_kinds::PRECISION, numeric()),
                    "fractionDigits" => FieldConstraint::new(constraint_kinds::SCALE, numeric()),
                    _ => continue,
                };
                constraints.push(constraint);
            }
            if !enumeration.is_empty() {
                data_type = DataType::Enum;
                constraints.push(FieldConstraint::new(constraint_kinds::ENUM, enumeration));
            }
            return (data_type, constraints);
        }
        if let Some(list) = node.child("list") {
            let item = list
                .attr("itemType")
                .map(|t| self.simple_type(t, depth).0)
                .unwrap_or(DataType::String);
            return (
                DataType::Array,
                vec![FieldConstraint::new(constraint_kinds::ITEMS_TYPE, item.as_str())],
            );
        }
        if let Some(union) = node.child("union") {
            let members: Vec<Value> = union
                .attr("memberTypes")
                .map(|m| {
                    m.split_whitespace()
                        .map(|t| json!(self.simple_type(t, depth).0.as_str()))
                        .collect()
                })
                .unwrap_or_default();
            return (
                DataType::String,
                vec![FieldConstraint::new(constraint_kinds::UNION_TYPES, members)],
            );
        }
        (DataType::String, Vec::new())
    }

    fn collect_keys(&mut self, element: &XmlNode) {
        for child in &element.children {
            let kind = match child.name.as_str() {
                "key" => KeyKind::Key,
                "unique" => KeyKind::Unique,
                "keyref" => KeyKind::KeyRef,
                _ => continue,
            };
            let selector = child
                .child("selector")
                .and_then(|s| s.attr("xpath"))
                .unwrap_or_default()
                .to_string();
            let fields = child
                .children_named("field")
                .filter_map(|f| f.attr("xpath"))
                .map(str::to_string)
                .collect();
            self.keys.push(KeyDecl {
                kind,
                name: child.attr("name").unwrap_or_default().to_string(),
                selector,
                fields,
                refer: child.attr("refer").map(|r| local(r).to_string()),
            });
        }
    }

    fn walk_element(
        &mut self,
        element: &'a XmlNode,
        prefix: &str,
        depth: usize,
        stack: &mut Vec<String>,
        in_choice: bool,
    ) -> ParseResult<()> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        // `ref` elements take their definition from the global element
        let definition = match element.attr("ref") {
            Some(r) => match self.elements.get(local(r)) {
                Some(global) => *global,
                None => {
                    debug!(reference = r, "Unresolved element reference");
                    return Ok(());
                }
            },
            None => element,
        };
        let Some(name) = definition.attr("name") else {
            return Ok(());
        };

        let min_occurs: u64 = element
            .attr("minOccurs")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);
        let max_occurs = element.attr("maxOccurs").unwrap_or("1");
        let repeated = max_occurs == "unbounded" || max_occurs.parse::<u64>().is_ok_and(|m| m > 1);
        let nullable = min_occurs == 0 || in_choice || definition.attr("nillable") == Some("true");

        self.collect_keys(definition);
        let path = join_path(prefix, name);
        let description = documentation(definition);

        let type_ref = definition.attr("type");
        let complex = match type_ref {
            Some(t) if !self.is_builtin_ref(t) => self.complex_types.get(local(t)).copied(),
            Some(_) => None,
            None => definition.child("complexType"),
        };

        if let Some(complex_type) = complex {
            let data_type = if repeated { DataType::Array } else { DataType::Object };
            let mut field = FieldInfo::new(name, path.clone(), data_type).with_nullable(nullable);
            if let Some(d) = description {
                field = field.with_description(d);
            }
            if repeated {
                field.add_constraint(FieldConstraint::new(constraint_kinds::MAX_OCCURS, max_occurs));
            }
            let type_key = type_ref.map(|t| local(t).to_string());
            if let Some(key) = &type_key {
                field = field.with_metadata("xsd_type", key.as_str());
                if stack.contains(key) {
                    field.add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, key.as_str()));
                    self.fields.push(field);
                    return Ok(());
                }
            }
            self.fields.push(field);
            let child_prefix = if repeated { join_path(&path, "items") } else { path };
            if let Some(key) = &type_key {
                stack.push(key.clone());
            }
            self.walk_complex_type(complex_type, &child_prefix, depth + 1, stack)?;
            if type_key.is_some() {
                stack.pop();
            }
            return Ok(());
        }

        let (data_type, constraints) = match (type_ref, definition.child("simpleType")) {
            (Some(t), _) => self.simple_type(t, 0),
            (None, Some(inline)) => self.simple_type_node(inline, 0),
            (None, None) => (DataType::Unknown, Vec::new()),
        };
        let mut field = if repeated {
            FieldInfo::new(name, path, DataType::Array)
                .with_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, data_type.as_str()))
                .with_constraint(FieldConstraint::new(constraint_kinds::MAX_OCCURS, max_occurs))
        } else {
            FieldInfo::new(name, path, data_type)
        };
        for constraint in constraints {
            field.add_constraint(constraint);
        }
        if let Some(default) = definition.attr("default") {
            field.add_constraint(FieldConstraint::new(constraint_kinds::DEFAULT, default));
        }
        if let Some(d) = description {
            field = field.with_description(d);
        }
        if let Some(t) = type_ref {
            field = field.with_metadata("xsd_type", t);
        }
        self.fields.push(field.with_nullable(nullable));
        Ok(())
    }

    fn walk_complex_type(
        &mut self,
        complex_type: &'a XmlNode,
        prefix: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<()> {
        for child in &complex_type.children {
            match child.name.as_str() {
                "sequence" | "all" => self.walk_particles(child, prefix, depth, stack, false)?,
                "choice" => self.walk_particles(child, prefix, depth, stack, true)?,
                "attribute" => self.push_attribute(child, prefix),
                "complexContent" => {
                    for derivation in &child.children {
                        if !matches!(derivation.name.as_str(), "extension" | "restriction") {
                            continue;
                        }
                        if derivation.name == "extension"
                            && let Some(base) = derivation.attr("base")
                            && !self.is_builtin_ref(base)
                            && let Some(base_type) = self.complex_types.get(local(base)).copied()
                        {
                            let key = local(base).to_string();
                            if !stack.contains(&key) {
                                stack.push(key);
                                self.walk_complex_type(base_type, prefix, depth, stack)?;
                                stack.pop();
                            }
                        }
                        self.walk_complex_type(derivation, prefix, depth, stack)?;
                    }
                }
                "simpleContent" => {
                    for derivation in &child.children {
                        if let Some(base) = derivation.attr("base") {
                            let (data_type, constraints) = self.simple_type(base, 0);
                            let mut field = FieldInfo::new("_text", join_path(prefix, "_text"), data_type)
                                .with_nullable(false);
                            for c in constraints {
                                field.add_constraint(c);
                            }
                            if self.fields.iter().all(|f| f.path != field.path) {
                                self.fields.push(field);
                            }
                        }
                        for attribute in derivation.children_named("attribute") {
                            self.push_attribute(attribute, prefix);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_particles(
        &mut self,
        group: &'a XmlNode,
        prefix: &str,
        depth: usize,
        stack: &mut Vec<String>,
        in_choice: bool,
    ) -> ParseResult<()> {
        let optional_group = in_choice || group.attr("minOccurs") == Some("0");
        for child in &group.children {
            match child.name.as_str() {
                "element" => self.walk_element(child, prefix, depth, stack, optional_group)?,
                "sequence" | "all" => {
                    self.walk_particles(child, prefix, depth, stack, optional_group)?
                }
                "choice" => self.walk_particles(child, prefix, depth, stack, true)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn push_attribute(&mut self, attribute: &XmlNode, prefix: &str) {
        let Some(name) = attribute.attr("name").or_else(|| attribute.attr("ref").map(local)) else {
            return;
        };
        let (data_type, constraints) = match (attribute.attr("type"), attribute.child("simpleType")) {
            (Some(t), _) => self.simple_type(t, 0),
            (None, Some(inline)) => self.simple_type_node(inline, 0),
            (None, None) => (DataType::String, Vec::new()),
        };
        let path = attribute_path(prefix, name);
        if self.fields.iter().any(|f| f.path == path) {
            return;
        }
        let mut field = FieldInfo::new(name, path, data_type)
            .with_nullable(attribute.attr("use") != Some("required"))
            .with_metadata("xml_kind", "attribute");
        for c in constraints {
            field.add_constraint(c);
        }
        if let Some(default) = attribute.attr("default") {
            field.add_constraint(FieldConstraint::new(constraint_kinds::DEFAULT, default));
        }
        if let Some(d) = documentation(attribute) {
            field = field.with_description(d);
        }
        self.fields.push(field);
    }

    /// Map a key selector/field XPath pair onto a field path
    fn resolve_key_path(&self, selector: &str, field_xpath: &str) -> Option<String> {
        let step = selector
            .rsplit('/')
            .map(|s| local(s.trim_start_matches('.')))
            .find(|s| !s.is_empty() && *s != "*")?;
        let field_xpath = field_xpath.trim_start_matches("./");
        let element = self
            .fields
            .iter()
            .find(|f| f.name == step && f.data_type.is_container())?;
        let base = if element.data_type == DataType::Array {
            join_path(&element.path, "items")
        } else {
            element.path.clone()
        };
        let candidate = match field_xpath.strip_prefix('@') {
            Some(attr) => attribute_path(&base, local(attr)),
            None => join_path(&base, local(field_xpath)),
        };
        self.fields
            .iter()
            .any(|f| f.path == candidate)
            .then_some(candidate)
    }
}

fn builtin_constraints(type_ref: &str) -> (DataType, Vec<FieldConstraint>) {
    match builtin_type(type_ref) {
        Some((data_type, Some(format))) => (
            data_type,
            vec![FieldConstraint::new(constraint_kinds::FORMAT, format)],
        ),
        Some((data_type, None)) => (data_type, Vec::new()),
        None => (DataType::String, Vec::new()),
    }
}

fn documentation(node: &XmlNode) -> Option<String> {
    let text = &node.child("annotation")?.child("documentation")?.text;
    if text.is_empty() { None } else { Some(text.clone()) }
}

impl XsdParser {
    fn build_schema(&self, root: &XmlNode, filename: Option<&str>) -> ParseResult<SchemaDetails> {
        if root.name != "schema" {
            return Err(ParseError::syntax(FORMAT, format!("root element is <{}>, expected <schema>", root.name)));
        }
        let mut walker = XsdWalker::new(root, self.options.max_depth);
        let globals: Vec<&XmlNode> = root.children_named("element").collect();

        let mut stack = Vec::new();
        if let [single] = globals.as_slice() {
            // Single root element: its content forms the document, the root is not a path segment
            walker.collect_keys(single);
            let complex = match single.attr("type") {
                Some(t) if !walker.is_builtin_ref(t) => walker.complex_types.get(local(t)).copied(),
                _ => single.child("complexType"),
            };
            match complex {
                Some(ct) => walker.walk_complex_type(ct, "", 1, &mut stack)?,
                None => walker.walk_element(single, "", 0, &mut stack, false)?,
            }
        } else {
            for element in &globals {
                walker.walk_element(element, "", 0, &mut stack, false)?;
            }
        }

        let root_element = globals.first().and_then(|e| e.attr("name")).map(str::to_string);
        let name = common::schema_name_from_filename(filename)
            .or_else(|| root_element.clone())
            .unwrap_or_else(|| "schema".to_string());

        let mut schema = SchemaDetails::new();
        schema.metadata.schema_id = Some(name.clone());
        schema.metadata.name = Some(name.clone());
        schema.metadata.format = Some(FORMAT.to_string());
        schema.metadata.namespace = root.attr("targetNamespace").map(str::to_string);
        schema.metadata.version = root.attr("version").map(str::to_string);
        schema.metadata.description = documentation(root);
        if let Some(root_element) = root_element {
            schema
                .metadata
                .additional
                .insert("root_element".to_string(), json!(root_element));
        }
        schema.metadata.additional.insert(
            "complex_types".to_string(),
            json!(walker.complex_types.len()),
        );

        // Identity constraints
        let mut key_paths: HashMap<String, Vec<String>> = HashMap::new();
        for key in walker.keys.iter().filter(|k| k.kind != KeyKind::KeyRef) {
            let paths: Vec<String> = key
                .fields
                .iter()
                .filter_map(|f| walker.resolve_key_path(&key.selector, f))
                .collect();
            if paths.len() != key.fields.len() || paths.is_empty() {
                debug!(key = %key.name, "Could not resolve identity constraint");
                continue;
            }
            if key.kind == KeyKind::Key && schema.primary_keys.is_empty() {
                schema.primary_keys = paths.clone();
            }
            if paths.len() == 1
                && let Some(field) = walker.fields.iter_mut().find(|f| f.path == paths[0])
            {
                field.add_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE));
            }
            schema.unique_constraints.push(paths.clone());
            key_paths.insert(key.name.clone(), paths);
        }
        for keyref in walker.keys.iter().filter(|k| k.kind == KeyKind::KeyRef) {
            let sources: Vec<String> = keyref
                .fields
                .iter()
                .filter_map(|f| walker.resolve_key_path(&keyref.selector, f))
                .collect();
            let target = keyref.refer.as_ref().and_then(|r| key_paths.get(r));
            match target {
                Some(target_fields) if !sources.is_empty() => {
                    schema.foreign_keys.push(
                        ForeignKeyDefinition::new(sources, name.clone(), target_fields.clone())
                            .with_name(keyref.name.clone()),
                    );
                }
                _ => debug!(keyref = %keyref.name, "Could not resolve keyref"),
            }
        }

        schema.fields = walker.fields;
        if schema.primary_keys.is_empty() {
            schema.primary_keys = common::infer_primary_keys(&schema.fields, Some(&name));
        }
        common::apply_primary_keys(&mut schema);

        for import in root
            .children
            .iter()
            .filter(|c| matches!(c.name.as_str(), "import" | "include" | "redefine"))
        {
            if let Some(location) = import.attr("schemaLocation").or_else(|| import.attr("namespace")) {
                schema.dependencies.push(location.to_string());
            }
        }

        debug!(fields = schema.fields.len(), keys = schema.unique_constraints.len(), "Extracted XSD schema");
        Ok(schema)
    }
}

impl FormatParser for XsdParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim_start();
        if !trimmed.starts_with('<') || !trimmed.contains("schema") {
            return 0.0;
        }
        match parse_document(trimmed, FORMAT) {
            Ok(root) if root.name == "schema" => {
                if root.namespaces.iter().any(|(_, uri)| uri == XML_SCHEMA_NS) {
                    0.95
                } else {
                    0.7
                }
            }
            _ => 0.0,
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let root = parse_document(&text, FORMAT)?;
        self.build_schema(&root, filename)
    }

    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let schema = self.parse_schema(filename, content)?;
        Ok(common::fabricate_records(&schema, max_records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:library">
  <xs:import namespace="urn:common" schemaLocation="common.xsd"/>
  <xs:simpleType name="IsbnType">
    <xs:restriction base="xs:string">
      <xs:pattern value="\d{13}"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:simpleType name="Genre">
    <xs:restriction base="xs:string">
      <xs:enumeration value="fiction"/>
      <xs:enumeration value="science"/>
    </xs:restriction>
  </xs:simpleType>
  <xs:complexType name="AuthorType">
    <xs:sequence>
      <xs:element name="name" type="xs:string"/>
    </xs:sequence>
    <xs:attribute name="id" type="xs:integer" use="required"/>
  </xs:complexType>
  <xs:complexType name="BookType">
    <xs:sequence>
      <xs:element name="isbn" type="IsbnType"/>
      <xs:element name="genre" type="Genre" minOccurs="0"/>
      <xs:element name="published" type="xs:date"/>
      <xs:element name="price">
        <xs:simpleType>
          <xs:restriction base="xs:decimal">
            <xs:minInclusive value="0"/>
          </xs:restriction>
        </xs:simpleType>
      </xs:element>
    </xs:sequence>
    <xs:attribute name="author" type="xs:integer"/>
  </xs:complexType>
  <xs:element name="library">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="author" type="AuthorType" maxOccurs="unbounded"/>
        <xs:element name="book" type="BookType" maxOccurs="unbounded"/>
      </xs:sequence>
    </xs:complexType>
    <xs:key name="authorKey">
      <xs:selector xpath="author"/>
      <xs:field xpath="@id"/>
    </xs:key>
    <xs:keyref name="bookAuthor" refer="authorKey">
      <xs:selector xpath="book"/>
      <xs:field xpath="@author"/>
    </xs:keyref>
  </xs:element>
</xs:schema>"#;

    #[test]
    fn test_can_parse() {
        let parser = XsdParser::new();
        assert!(parser.can_parse(None, LIBRARY.as_bytes()) >= 0.95);
        assert_eq!(parser.can_parse(None, b"<users/>"), 0.0);
    }

    #[test]
    fn test_types_and_facets() {
        let parser = XsdParser::new();
        let schema = parser.parse_schema(Some("library.xsd"), LIBRARY.as_bytes()).unwrap();
        assert!(schema.has_unique_paths());

        let book = schema.field("book").unwrap();
        assert_eq!(book.data_type, DataType::Array);

        let isbn = schema.field("book.items.isbn").unwrap();
        assert_eq!(isbn.data_type, DataType::String);
        assert!(isbn.has_constraint(constraint_kinds::PATTERN));

        let genre = schema.field("book.items.genre").unwrap();
        assert_eq!(genre.data_type, DataType::Enum);
        assert!(genre.nullable);

        assert_eq!(schema.field("book.items.published").unwrap().data_type, DataType::Date);
        let price = schema.field("book.items.price").unwrap();
        assert_eq!(price.data_type, DataType::Float);
        assert_eq!(
            price.constraint(constraint_kinds::MINIMUM).unwrap().value,
            json!(0)
        );
        assert!(!schema.field("author.items@id").unwrap().nullable);
        assert_eq!(schema.metadata.namespace.as_deref(), Some("urn:library"));
        assert_eq!(schema.dependencies, vec!["common.xsd"]);
    }

    #[test]
    fn test_identity_constraints() {
        let parser = XsdParser::new();
        let schema = parser.parse_schema(Some("library.xsd"), LIBRARY.as_bytes()).unwrap();
        assert_eq!(schema.primary_keys, vec!["author.items@id"]);
        assert_eq!(schema.foreign_keys.len(), 1);
        let fk = &schema.foreign_keys[0];
        assert_eq!(fk.source_fields, vec!["book.items@author"]);
        assert_eq!(fk.target_fields, vec!["author.items@id"]);
        assert_eq!(fk.target_schema, "library");
    }

    #[test]
    fn test_recursive_type_is_bounded() {
        let content = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:complexType name="Node">
    <xs:sequence>
      <xs:element name="value" type="xs:string"/>
      <xs:element name="child" type="Node" minOccurs="0"/>
    </xs:sequence>
  </xs:complexType>
  <xs:element name="tree" type="Node"/>
</xs:schema>"#;
        let parser = XsdParser::new();
        let schema = parser.parse_schema(None, content.as_bytes()).unwrap();
        let child = schema.field("child").unwrap();
        assert!(child.has_constraint(constraint_kinds::REFERENCE) || schema.field("child.child").is_some());
        assert!(schema.has_unique_paths());
    }

    #[test]
    fn test_fabricated_samples() {
        let parser = XsdParser::new();
        let samples = parser.extract_sample_data(None, LIBRARY.as_bytes(), 2).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0]["book"].is_array());
    }
}
