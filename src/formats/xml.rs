//! XML data documents

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::common::{self, attribute_path, join_path};
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, FormatCapabilities, FormatInfo, SchemaDetails,
    constraint_kinds,
};

const FORMAT: &str = "xml";
const TEXT_SEGMENT: &str = "_text";

/// Element of a parsed XML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    /// Local name (namespace prefix stripped)
    pub name: String,
    pub prefix: Option<String>,
    /// Attributes by local name, excluding namespace declarations
    pub attributes: Vec<(String, String)>,
    /// Namespace declarations (`prefix`, `uri`); the default namespace has an empty prefix
    pub namespaces: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> ParseResult<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).to_string();
        let qualified = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let prefix = qualified.split_once(':').map(|(p, _)| p.to_string());
        let mut node = XmlNode {
            name,
            prefix,
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ParseError::syntax(FORMAT, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| ParseError::syntax(FORMAT, e))?
                .to_string();
            if key == "xmlns" {
                node.namespaces.push((String::new(), value));
            } else if let Some(ns) = key.strip_prefix("xmlns:") {
                node.namespaces.push((ns.to_string(), value));
            } else {
                let local = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
                node.attributes.push((local, value));
            }
        }
        Ok(node)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Whether the element carries structure beyond text
    pub fn is_complex(&self) -> bool {
        !self.children.is_empty() || !self.attributes.is_empty()
    }

    /// All descendants, depth first
    pub fn descendants(&self) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        let mut stack: Vec<&XmlNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Parse a document into its root element
pub(crate) fn parse_document(text: &str, format: &str) -> ParseResult<XmlNode> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(XmlNode::from_start(e)?),
            Ok(Event::Empty(ref e)) => {
                let node = XmlNode::from_start(e)?;
                attach(&mut stack, &mut root, node, format)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| ParseError::syntax(format, "unexpected closing tag"))?;
                attach(&mut stack, &mut root, node, format)?;
            }
            Ok(Event::Text(t)) => {
                if let Some(current) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| ParseError::syntax(format, e))?;
                    current.text.push_str(text.trim());
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::syntax(
                    format,
                    format!("{} at position {}", e, reader.error_position()),
                ));
            }
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::syntax(format, "unclosed element at end of document"));
    }
    root.ok_or_else(|| ParseError::Empty(format.to_string()))
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
    format: &str,
) -> ParseResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(ParseError::syntax(format, "multiple root elements")),
    }
    Ok(())
}

/// Parser for XML documents
pub struct XmlParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for XmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "XML", "Extensible Markup Language documents")
            .mime_types(&["application/xml", "text/xml"])
            .extensions(&["xml"])
            .capabilities(FormatCapabilities::data())
            .examples(&[r#"<users><user id="1"><name>Alice</name></user></users>"#])
            .schema_type("data");
        Self { info, options }
    }
}

/// Builds fields level by level over all instances of an element path
struct XmlFieldBuilder<'o> {
    fields: Vec<FieldInfo>,
    options: &'o ParserOptions,
}

impl XmlFieldBuilder<'_> {
    fn visit(&mut self, prefix: &str, parents: &[&XmlNode], depth: usize) -> ParseResult<()> {
        if depth > self.options.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.options.max_depth,
            });
        }
        self.visit_attributes(prefix, parents);
        self.visit_text(prefix, parents);

        // Child names in order of first appearance
        let mut names: Vec<&str> = Vec::new();
        for parent in parents {
            for child in &parent.children {
                if !names.contains(&child.name.as_str()) {
                    names.push(&child.name);
                }
            }
        }

        for name in names {
            let mut nodes: Vec<&XmlNode> = Vec::new();
            let mut present_in = 0;
            let mut repeated = false;
            for parent in parents {
                let count = parent.children_named(name).count();
                if count > 0 {
                    present_in += 1;
                }
                repeated |= count > 1;
                nodes.extend(parent.children_named(name));
            }
            let path = join_path(prefix, name);
            let nullable = present_in < parents.len();
            let complex = nodes.iter().any(|n| n.is_complex());

            if complex {
                let data_type = if repeated { DataType::Array } else { DataType::Object };
                let mut field = FieldInfo::new(name, path.clone(), data_type).with_nullable(nullable);
                if repeated {
                    field.add_constraint(FieldConstraint::new(constraint_kinds::MAX_OCCURS, "unbounded"));
                }
                self.fields.push(field);
                let child_prefix = if repeated { join_path(&path, "items") } else { path };
                self.visit(&child_prefix, &nodes, depth + 1)?;
            } else {
                self.push_scalar(name, path, parents, &nodes, repeated, nullable);
            }
        }
        Ok(())
    }

    fn push_scalar(
        &mut self,
        name: &str,
        path: String,
        parents: &[&XmlNode],
        nodes: &[&XmlNode],
        repeated: bool,
        nullable: bool,
    ) {
        let mut item_type = DataType::Null;
        let mut saw_empty = false;
        for node in nodes {
            let (t, _) = common::infer_scalar(&node.text);
            if t == DataType::Null {
                saw_empty = true;
            } else {
                item_type = item_type.merge(t);
            }
        }
        if item_type == DataType::Null {
            item_type = DataType::String;
        }

        let samples: Vec<Value> = if repeated {
            parents
                .iter()
                .map(|p| {
                    Value::Array(
                        p.children_named(name)
                            .map(|n| typed_text(&n.text, item_type))
                            .collect(),
                    )
                })
                .filter(|v| v.as_array().is_some_and(|a| !a.is_empty()))
                .take(self.options.max_samples)
                .collect()
        } else {
            let mut samples = Vec::new();
            for node in nodes {
                let value = typed_text(&node.text, item_type);
                if !value.is_null() && !samples.contains(&value) && samples.len() < self.options.max_samples {
                    samples.push(value);
                }
            }
            samples
        };

        let mut field = if repeated {
            FieldInfo::new(name, path, DataType::Array)
                .with_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, item_type.as_str()))
                .with_constraint(FieldConstraint::new(constraint_kinds::MAX_OCCURS, "unbounded"))
        } else {
            FieldInfo::new(name, path, item_type)
        };
        field.nullable = nullable || saw_empty;
        self.fields.push(field.with_samples(samples));
    }

    fn visit_attributes(&mut self, prefix: &str, nodes: &[&XmlNode]) {
        let mut names: Vec<&str> = Vec::new();
        for node in nodes {
            for (key, _) in &node.attributes {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }
        for name in names {
            let values: Vec<&str> = nodes.iter().filter_map(|n| n.attr(name)).collect();
            let data_type = values
                .iter()
                .map(|v| common::infer_scalar(v).0)
                .filter(|t| *t != DataType::Null)
                .fold(DataType::Null, DataType::merge);
            let data_type = if data_type == DataType::Null { DataType::String } else { data_type };
            let mut samples: Vec<Value> = Vec::new();
            for v in &values {
                let value = typed_text(v, data_type);
                if !samples.contains(&value) && samples.len() < self.options.max_samples {
                    samples.push(value);
                }
            }
            self.fields.push(
                FieldInfo::new(name, attribute_path(prefix, name), data_type)
                    .with_nullable(values.len() < nodes.len())
                    .with_samples(samples)
                    .with_metadata("xml_kind", "attribute"),
            );
        }
    }

    fn visit_text(&mut self, prefix: &str, nodes: &[&XmlNode]) {
        let texts: Vec<&str> = nodes
            .iter()
            .filter(|n| n.is_complex() && !n.text.is_empty())
            .map(|n| n.text.as_str())
            .collect();
        if texts.is_empty() || prefix.is_empty() {
            return;
        }
        let data_type = texts
            .iter()
            .map(|t| common::infer_scalar(t).0)
            .fold(DataType::Null, DataType::merge);
        self.fields.push(
            FieldInfo::new(TEXT_SEGMENT, join_path(prefix, TEXT_SEGMENT), data_type)
                .with_nullable(texts.len() < nodes.len())
                .with_metadata("xml_kind", "text"),
        );
    }
}

fn typed_text(text: &str, data_type: DataType) -> Value {
    let (t, value) = common::infer_scalar(text);
    if t == data_type || t == DataType::Null {
        value
    } else {
        Value::String(text.trim().to_string())
    }
}

/// JSON rendering of an element: `@attr` keys, repeated children as arrays
pub(crate) fn node_to_json(node: &XmlNode) -> Value {
    if !node.is_complex() {
        return common::infer_scalar(&node.text).1;
    }
    let mut object = Map::new();
    for (key, value) in &node.attributes {
        object.insert(format!("@{key}"), common::infer_scalar(value).1);
    }
    let mut grouped: HashMap<&str, Vec<Value>> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for child in &node.children {
        if !grouped.contains_key(child.name.as_str()) {
            order.push(&child.name);
        }
        grouped.entry(&child.name).or_default().push(node_to_json(child));
    }
    for name in order {
        let mut values = grouped.remove(name).unwrap_or_default();
        let value = if values.len() == 1 { values.remove(0) } else { Value::Array(values) };
        object.insert(name.to_string(), value);
    }
    if !node.text.is_empty() {
        object.insert(TEXT_SEGMENT.to_string(), json!(node.text));
    }
    Value::Object(object)
}

impl FormatParser for XmlParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim_start();
        if !trimmed.starts_with('<') {
            return 0.0;
        }
        match parse_document(trimmed, FORMAT) {
            Ok(_) if trimmed.starts_with("<?xml") => 0.85,
            Ok(_) => 0.75,
            Err(_) => 0.0,
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let root = parse_document(&text, FORMAT)?;

        let mut builder = XmlFieldBuilder {
            fields: Vec::new(),
            options: &self.options,
        };
        builder.visit("", &[&root], 0)?;

        let name = common::schema_name_from_filename(filename).unwrap_or_else(|| root.name.clone());
        let mut schema = SchemaDetails::new();
        schema.fields = builder.fields;
        schema.primary_keys = common::infer_primary_keys(&schema.fields, Some(&name));
        common::apply_primary_keys(&mut schema);
        schema.metadata.schema_id = Some(name.clone());
        schema.metadata.name = Some(name);
        schema.metadata.format = Some(FORMAT.to_string());
        schema.metadata.namespace = root
            .namespaces
            .iter()
            .find(|(p, _)| p.is_empty())
            .map(|(_, uri)| uri.clone());
        schema
            .metadata
            .additional
            .insert("root_element".to_string(), json!(root.name));

        debug!(root = %root.name, fields = schema.fields.len(), "Extracted XML schema");
        Ok(schema)
    }

    fn extract_sample_data(
        &self,
        _filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let text = common::decode_text(content)?;
        let root = parse_document(&text, FORMAT)?;
        let uniform = root.children.len() > 1
            && root.children.iter().all(|c| c.name == root.children[0].name);
        let records = if uniform {
            root.children.iter().take(max_records).map(node_to_json).collect()
        } else {
            vec![node_to_json(&root)]
        };
        Ok(records.into_iter().take(max_records).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"<?xml version="1.0"?>
<users xmlns="http://example.com/users">
  <user id="1" active="true">
    <name>Alice</name>
    <email>alice@example.com</email>
    <tag>admin</tag>
    <tag>ops</tag>
  </user>
  <user id="2" active="false">
    <name>Bob</name>
  </user>
</users>"#;

    #[test]
    fn test_dom_parsing() {
        let root = parse_document(USERS, FORMAT).unwrap();
        assert_eq!(root.name, "users");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attr("id"), Some("1"));
        assert_eq!(root.namespaces[0].1, "http://example.com/users");
        assert_eq!(root.descendants().len(), 7);
    }

    #[test]
    fn test_schema_paths() {
        let parser = XmlParser::new();
        let schema = parser.parse_schema(Some("users.xml"), USERS.as_bytes()).unwrap();
        assert!(schema.has_unique_paths());

        let user = schema.field("user").unwrap();
        assert_eq!(user.data_type, DataType::Array);

        let id = schema.field("user.items@id").unwrap();
        assert_eq!(id.data_type, DataType::Integer);
        assert!(!id.nullable);

        let email = schema.field("user.items.email").unwrap();
        assert!(email.nullable);

        let tag = schema.field("user.items.tag").unwrap();
        assert_eq!(tag.data_type, DataType::Array);
        assert_eq!(
            tag.constraint(constraint_kinds::ITEMS_TYPE).unwrap().value,
            json!("STRING")
        );
        assert_eq!(
            schema.metadata.namespace.as_deref(),
            Some("http://example.com/users")
        );
    }

    #[test]
    fn test_attribute_path_on_single_element() {
        let parser = XmlParser::new();
        let content = br#"<doc><user id="7"><name>A</name></user></doc>"#;
        let schema = parser.parse_schema(None, content).unwrap();
        assert_eq!(schema.field("user").unwrap().data_type, DataType::Object);
        assert!(schema.field("user@id").is_some());
        assert!(schema.field("user.name").is_some());
    }

    #[test]
    fn test_malformed() {
        let parser = XmlParser::new();
        assert!(matches!(
            parser.parse_schema(None, b"<a><b></a>"),
            Err(ParseError::Syntax { .. })
        ));
        assert_eq!(parser.can_parse(None, b"<a><b></a>"), 0.0);
        assert!(parser.can_parse(None, USERS.as_bytes()) > 0.8);
    }

    #[test]
    fn test_sample_records() {
        let parser = XmlParser::new();
        let samples = parser.extract_sample_data(None, USERS.as_bytes(), 10).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0]["@id"], json!(1));
        assert_eq!(samples[0]["tag"], json!(["admin", "ops"]));
        assert_eq!(samples[1]["name"], json!("Bob"));
    }
}
