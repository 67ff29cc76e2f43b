//! GraphQL schema definition language (SDL)

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;

use super::common;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, ForeignKeyDefinition, FormatCapabilities, FormatInfo,
    SchemaDetails, constraint_kinds,
};

const FORMAT: &str = "graphql";
const ROOT_OPERATIONS: &[&str] = &["Query", "Mutation", "Subscription"];

const SDL_KEYWORDS: &[&str] = &[
    "type", "input", "interface", "enum", "union", "scalar", "schema", "query", "mutation",
    "implements", "extend", "directive", "id", "string", "int", "boolean",
];

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(extend\s+)?(type|input|interface|enum)\s+[_A-Za-z]\w*(\s+implements\s+[^{]+)?\s*(@[^{]*)?\{")
        .unwrap()
});
static SDL_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[_A-Za-z]\w*\s*(\([^)]*\))?\s*:\s*\[?\s*[_A-Za-z]\w*").unwrap());

/// Parser for GraphQL type definitions
pub struct GraphQlParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for GraphQlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphQlParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "GraphQL SDL", "GraphQL schema definition language")
            .mime_types(&["application/graphql"])
            .extensions(&["graphql", "gql", "graphqls"])
            .capabilities(FormatCapabilities::schema_language().with_relationships())
            .examples(&["type User {\n  id: ID!\n  name: String\n}\n"])
            .schema_type("sdl");
        Self { info, options }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Str(String),
    Number(String),
    Punct(char),
    Spread,
}

fn tokenize(text: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || c == ',' || c == '\u{feff}' {
            i += 1;
        } else if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '"' {
            if chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"') {
                i += 3;
                let start = i;
                while i < chars.len() && !(chars[i] == '"' && chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"')) {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ParseError::syntax(FORMAT, "unterminated block string"));
                }
                let raw: String = chars[start..i].iter().collect();
                tokens.push(Token::Str(block_string(&raw)));
                i += 3;
            } else {
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => return Err(ParseError::syntax(FORMAT, "unterminated string")),
                        Some('\\') => {
                            if let Some(escaped) = chars.get(i + 1) {
                                value.push(*escaped);
                            }
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(other) => {
                            value.push(*other);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
        } else if c == '.' && chars.get(i + 1) == Some(&'.') && chars.get(i + 2) == Some(&'.') {
            tokens.push(Token::Spread);
            i += 3;
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || matches!(chars[i], '.' | '-' | '+')) {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
        } else if "!$&()[]{}:=@|".contains(c) {
            tokens.push(Token::Punct(c));
            i += 1;
        } else {
            return Err(ParseError::syntax(FORMAT, format!("unexpected character '{c}'")));
        }
    }
    Ok(tokens)
}

/// Dedent a block string and trim its blank first and last lines
fn block_string(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().collect();
    let indent = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    let dedented: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| if i == 0 { *l } else { l.get(indent..).unwrap_or("") })
        .collect();
    dedented.join("\n").trim().to_string()
}

/// Type reference with list and non-null wrappers
#[derive(Debug, Clone, PartialEq)]
enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    fn named(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named(),
        }
    }

    fn render(&self) -> String {
        match self {
            TypeRef::Named(name) => name.clone(),
            TypeRef::List(inner) => format!("[{}]", inner.render()),
            TypeRef::NonNull(inner) => format!("{}!", inner.render()),
        }
    }
}

#[derive(Debug, Clone)]
struct GqlField {
    name: String,
    description: Option<String>,
    type_ref: TypeRef,
    arguments: Vec<String>,
    default: Option<Value>,
    deprecated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Object,
    Interface,
    Input,
}

impl TypeKind {
    fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Object => "type",
            TypeKind::Interface => "interface",
            TypeKind::Input => "input",
        }
    }
}

#[derive(Debug, Clone)]
struct GqlType {
    name: String,
    kind: TypeKind,
    description: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<GqlField>,
}

#[derive(Debug, Default)]
struct Document {
    types: Vec<GqlType>,
    enums: HashMap<String, Vec<String>>,
    unions: HashMap<String, Vec<String>>,
    scalars: Vec<String>,
    roots: BTreeMap<String, String>,
}

impl Document {
    fn object(&self, name: &str) -> Option<&GqlType> {
        self.types.iter().find(|t| t.name == name)
    }
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> ParseResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| ParseError::syntax(FORMAT, "unexpected end of document"))?;
        self.pos += 1;
        Ok(token)
    }

    fn name(&mut self) -> ParseResult<String> {
        match self.next()? {
            Token::Name(name) => Ok(name),
            other => Err(ParseError::syntax(FORMAT, format!("expected name, found {other:?}"))),
        }
    }

    fn expect(&mut self, punct: char) -> ParseResult<()> {
        match self.next()? {
            Token::Punct(c) if c == punct => Ok(()),
            other => Err(ParseError::syntax(FORMAT, format!("expected '{punct}', found {other:?}"))),
        }
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_name(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(n)) if n == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn description(&mut self) -> Option<String> {
        if let Some(Token::Str(text)) = self.peek().cloned() {
            self.pos += 1;
            Some(text)
        } else {
            None
        }
    }

    /// Skip past the punctuator closing an already consumed `open`
    fn skip_balanced(&mut self, open: char, close: char) -> ParseResult<()> {
        let mut depth = 1;
        while depth > 0 {
            match self.next()? {
                Token::Punct(c) if c == open => depth += 1,
                Token::Punct(c) if c == close => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Directives; returns whether `@deprecated` was among them
    fn directives(&mut self) -> ParseResult<bool> {
        let mut deprecated = false;
        while self.eat('@') {
            let name = self.name()?;
            deprecated |= name == "deprecated";
            if self.eat('(') {
                self.skip_balanced('(', ')')?;
            }
        }
        Ok(deprecated)
    }

    fn type_ref(&mut self) -> ParseResult<TypeRef> {
        let base = if self.eat('[') {
            let inner = self.type_ref()?;
            self.expect(']')?;
            TypeRef::List(Box::new(inner))
        } else {
            TypeRef::Named(self.name()?)
        };
        Ok(if self.eat('!') {
            TypeRef::NonNull(Box::new(base))
        } else {
            base
        })
    }

    /// A constant value, rendered as JSON
    fn value(&mut self) -> ParseResult<Value> {
        Ok(match self.next()? {
            Token::Str(s) => json!(s),
            Token::Number(n) => common::infer_scalar(&n).1,
            Token::Name(n) => match n.as_str() {
                "true" => json!(true),
                "false" => json!(false),
                "null" => Value::Null,
                _ => json!(n),
            },
            Token::Punct('[') => {
                let mut items = Vec::new();
                while !self.eat(']') {
                    items.push(self.value()?);
                }
                Value::Array(items)
            }
            Token::Punct('{') => {
                let mut object = serde_json::Map::new();
                while !self.eat('}') {
                    let key = self.name()?;
                    self.expect(':')?;
                    object.insert(key, self.value()?);
                }
                Value::Object(object)
            }
            other => return Err(ParseError::syntax(FORMAT, format!("unexpected value {other:?}"))),
        })
    }
}

fn parse_document(text: &str) -> ParseResult<Document> {
    let mut stream = TokenStream {
        tokens: tokenize(text)?,
        pos: 0,
    };
    let mut doc = Document::default();
    while stream.peek().is_some() {
        let description = stream.description();
        let extend = stream.eat_name("extend");
        let keyword = stream.name()?;
        match keyword.as_str() {
            "type" | "interface" | "input" => {
                let kind = match keyword.as_str() {
                    "type" => TypeKind::Object,
                    "interface" => TypeKind::Interface,
                    _ => TypeKind::Input,
                };
                let parsed = parse_type(&mut stream, kind, description)?;
                match doc.types.iter_mut().find(|t| t.name == parsed.name) {
                    Some(existing) if extend => {
                        existing.fields.extend(parsed.fields);
                        existing.interfaces.extend(parsed.interfaces);
                        check_unique_fields(existing)?;
                    }
                    Some(_) => {
                        return Err(ParseError::syntax(FORMAT, format!("duplicate type {}", parsed.name)));
                    }
                    None => doc.types.push(parsed),
                }
            }
            "enum" => {
                let name = stream.name()?;
                stream.directives()?;
                let mut values = Vec::new();
                if stream.eat('{') {
                    while !stream.eat('}') {
                        stream.description();
                        values.push(stream.name()?);
                        stream.directives()?;
                    }
                }
                doc.enums.entry(name).or_default().extend(values);
            }
            "union" => {
                let name = stream.name()?;
                stream.directives()?;
                let mut members = Vec::new();
                if stream.eat('=') {
                    stream.eat('|');
                    members.push(stream.name()?);
                    while stream.eat('|') {
                        members.push(stream.name()?);
                    }
                }
                doc.unions.entry(name).or_default().extend(members);
            }
            "scalar" => {
                doc.scalars.push(stream.name()?);
                stream.directives()?;
            }
            "schema" => {
                stream.directives()?;
                stream.expect('{')?;
                while !stream.eat('}') {
                    let operation = stream.name()?;
                    stream.expect(':')?;
                    doc.roots.insert(operation, stream.name()?);
                }
            }
            "directive" => {
                stream.expect('@')?;
                stream.name()?;
                if stream.eat('(') {
                    stream.skip_balanced('(', ')')?;
                }
                stream.eat_name("repeatable");
                if !stream.eat_name("on") {
                    return Err(ParseError::syntax(FORMAT, "directive definition without locations"));
                }
                stream.eat('|');
                stream.name()?;
                while stream.eat('|') {
                    stream.name()?;
                }
            }
            other => return Err(ParseError::syntax(FORMAT, format!("unexpected definition '{other}'"))),
        }
    }
    Ok(doc)
}

fn parse_type(stream: &mut TokenStream, kind: TypeKind, description: Option<String>) -> ParseResult<GqlType> {
    let name = stream.name()?;
    let mut interfaces = Vec::new();
    if stream.eat_name("implements") {
        stream.eat('&');
        interfaces.push(stream.name()?);
        while stream.eat('&') || matches!(stream.peek(), Some(Token::Name(_))) {
            interfaces.push(stream.name()?);
        }
    }
    stream.directives()?;
    let mut fields = Vec::new();
    if stream.eat('{') {
        while !stream.eat('}') {
            let field_description = stream.description();
            let field_name = stream.name()?;
            let mut arguments = Vec::new();
            if stream.eat('(') {
                while !stream.eat(')') {
                    stream.description();
                    arguments.push(stream.name()?);
                    stream.expect(':')?;
                    stream.type_ref()?;
                    if stream.eat('=') {
                        stream.value()?;
                    }
                    stream.directives()?;
                }
            }
            stream.expect(':')?;
            let type_ref = stream.type_ref()?;
            let default = if stream.eat('=') { Some(stream.value()?) } else { None };
            let deprecated = stream.directives()?;
            fields.push(GqlField {
                name: field_name,
                description: field_description,
                type_ref,
                arguments,
                default,
                deprecated,
            });
        }
    }
    let parsed = GqlType {
        name,
        kind,
        description,
        interfaces,
        fields,
    };
    check_unique_fields(&parsed)?;
    Ok(parsed)
}

fn check_unique_fields(gql_type: &GqlType) -> ParseResult<()> {
    let mut seen = HashSet::new();
    match gql_type.fields.iter().find(|f| !seen.insert(f.name.as_str())) {
        Some(duplicate) => Err(ParseError::syntax(
            FORMAT,
            format!("duplicate field '{}' in type {}", duplicate.name, gql_type.name),
        )),
        None => Ok(()),
    }
}

/// Data type of a named scalar; custom scalars are guessed from their names
fn scalar_type(name: &str) -> Option<DataType> {
    Some(match name {
        "ID" | "String" => DataType::String,
        "Int" => DataType::Integer,
        "Float" => DataType::Float,
        "Boolean" => DataType::Boolean,
        _ => return None,
    })
}

fn custom_scalar_type(name: &str) -> DataType {
    let lower = name.to_lowercase();
    if lower.contains("datetime") || lower.contains("timestamp") || lower == "instant" {
        DataType::DateTime
    } else if lower.contains("date") {
        DataType::Date
    } else if lower.contains("uuid") {
        DataType::Uuid
    } else if lower.contains("json") || lower == "object" {
        DataType::Object
    } else if lower.contains("upload") || lower.contains("bytes") {
        DataType::Binary
    } else if lower.contains("long") || lower.contains("bigint") {
        DataType::Integer
    } else if lower.contains("decimal") {
        DataType::Float
    } else {
        DataType::String
    }
}

impl GraphQlParser {
    fn entities(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let doc = parse_document(&text)?;

        let root_names: Vec<String> = if doc.roots.is_empty() {
            ROOT_OPERATIONS.iter().map(|s| s.to_string()).collect()
        } else {
            doc.roots.values().cloned().collect()
        };
        let operations: BTreeMap<&str, Vec<&str>> = doc
            .types
            .iter()
            .filter(|t| root_names.contains(&t.name))
            .map(|t| (t.name.as_str(), t.fields.iter().map(|f| f.name.as_str()).collect()))
            .collect();

        let mut entities = Vec::new();
        for gql_type in doc.types.iter().filter(|t| !root_names.contains(&t.name)) {
            entities.push(self.entity(&doc, gql_type, filename, &operations));
        }
        if entities.is_empty() {
            return Err(ParseError::unsupported(FORMAT, "no object, interface or input types"));
        }
        debug!(
            types = entities.len(),
            enums = doc.enums.len(),
            unions = doc.unions.len(),
            "Extracted GraphQL schema"
        );
        Ok(entities)
    }

    fn entity(
        &self,
        doc: &Document,
        gql_type: &GqlType,
        filename: Option<&str>,
        operations: &BTreeMap<&str, Vec<&str>>,
    ) -> SchemaDetails {
        let mut schema = SchemaDetails::new().with_id(gql_type.name.clone());
        schema.metadata.format = Some(FORMAT.to_string());
        schema.metadata.description = gql_type.description.clone();
        schema
            .metadata
            .additional
            .insert("kind".to_string(), json!(gql_type.kind.as_str()));
        if !gql_type.interfaces.is_empty() {
            schema
                .metadata
                .additional
                .insert("interfaces".to_string(), json!(gql_type.interfaces));
        }
        if !operations.is_empty() {
            schema
                .metadata
                .additional
                .insert("operations".to_string(), json!(operations));
        }
        if let Some(source) = filename {
            schema
                .metadata
                .additional
                .insert("source_file".to_string(), json!(source));
        }

        for field in &gql_type.fields {
            let (info, foreign_key) = field_info(doc, field);
            if let Some(fk) = foreign_key {
                schema.foreign_keys.push(fk);
            }
            schema.fields.push(info);
        }

        let id_field = gql_type
            .fields
            .iter()
            .find(|f| f.type_ref.named() == "ID" && !matches!(strip_non_null(&f.type_ref), TypeRef::List(_)));
        schema.primary_keys = match id_field {
            Some(field) => vec![field.name.clone()],
            None => common::infer_primary_keys(&schema.fields, Some(&gql_type.name)),
        };
        common::apply_primary_keys(&mut schema);
        schema
    }
}

fn strip_non_null(type_ref: &TypeRef) -> &TypeRef {
    match type_ref {
        TypeRef::NonNull(inner) => inner,
        other => other,
    }
}

/// Key field other types reference this type by
fn identifier_field(doc: &Document, type_name: &str) -> Option<String> {
    let target = doc.object(type_name)?;
    target
        .fields
        .iter()
        .find(|f| f.type_ref.named() == "ID")
        .or_else(|| target.fields.iter().find(|f| f.name == "id"))
        .map(|f| f.name.clone())
}

fn field_info(doc: &Document, field: &GqlField) -> (FieldInfo, Option<ForeignKeyDefinition>) {
    let nullable = !matches!(field.type_ref, TypeRef::NonNull(_));
    let unwrapped = strip_non_null(&field.type_ref);
    let named = field.type_ref.named();

    let mut constraints: Vec<FieldConstraint> = Vec::new();
    let mut element_type = if let Some(t) = scalar_type(named) {
        t
    } else if let Some(values) = doc.enums.get(named) {
        constraints.push(FieldConstraint::new(constraint_kinds::ENUM, values.clone()));
        DataType::Enum
    } else if let Some(members) = doc.unions.get(named) {
        constraints.push(FieldConstraint::new(constraint_kinds::UNION_TYPES, members.clone()));
        constraints.push(FieldConstraint::new(constraint_kinds::REFERENCE, named));
        DataType::Object
    } else if doc.object(named).is_some() {
        constraints.push(FieldConstraint::new(constraint_kinds::REFERENCE, named));
        DataType::Object
    } else if doc.scalars.iter().any(|s| s == named) {
        custom_scalar_type(named)
    } else {
        constraints.push(FieldConstraint::new(constraint_kinds::REFERENCE, named));
        DataType::Unknown
    };
    if named == "ID" {
        constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "id"));
    }

    let is_list = matches!(unwrapped, TypeRef::List(_));
    let mut info = if is_list {
        let inner = match unwrapped {
            TypeRef::List(inner) => strip_non_null(inner),
            other => other,
        };
        if matches!(inner, TypeRef::List(_)) {
            element_type = DataType::Array;
        }
        FieldInfo::new(field.name.clone(), field.name.clone(), DataType::Array)
            .with_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, element_type.as_str()))
    } else {
        FieldInfo::new(field.name.clone(), field.name.clone(), element_type)
    };
    info = info
        .with_nullable(nullable)
        .with_metadata("graphql_type", field.type_ref.render());
    for constraint in constraints {
        info.add_constraint(constraint);
    }
    if let Some(description) = &field.description {
        info = info.with_description(description.clone());
    }
    if let Some(default) = &field.default {
        info.add_constraint(FieldConstraint::new(constraint_kinds::DEFAULT, default.clone()));
    }
    if !field.arguments.is_empty() {
        info = info.with_metadata("arguments", field.arguments.clone());
    }
    if field.deprecated {
        info = info.with_metadata("deprecated", true);
    }

    // Singular object references are foreign keys to the target's identifier
    let foreign_key = if !is_list && doc.object(named).is_some() {
        let target_fields = identifier_field(doc, named).into_iter().collect();
        Some(ForeignKeyDefinition::new(vec![field.name.clone()], named, target_fields))
    } else {
        None
    };
    (info, foreign_key)
}

impl FormatParser for GraphQlParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim_start();
        if trimmed.is_empty() || trimmed.starts_with(['{', '[', '<']) {
            return 0.0;
        }
        if !TYPE_DECL.is_match(&text) || !SDL_FIELD.is_match(&text) {
            return 0.0;
        }
        if parse_document(&text).is_err() {
            return 0.3;
        }
        (0.75 + 0.2 * common::keyword_density(&text, SDL_KEYWORDS)).min(0.9)
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

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG: &str = r#"
"""
A registered author
"""
type User implements Node & Entity {
  id: ID!
  "Primary contact"
  email: String!
  name: String
  role: Role!
  posts(first: Int = 10, after: String): [Post!]!
  joined: DateTime
}

type Post implements Node {
  id: ID!
  title: String!
  author: User!
  tags: [String]
  legacyScore: Float @deprecated(reason: "unused")
  result: SearchResult
}

interface Node {
  id: ID!
}

interface Entity {
  id: ID!
}

enum Role {
  ADMIN
  EDITOR @deprecated
}

union SearchResult = User | Post

scalar DateTime

input PostFilter {
  titleContains: String
  limit: Int = 20
}

type Query {
  user(id: ID!): User
  posts(filter: PostFilter): [Post!]!
}

extend type User {
  nickname: String
}

directive @auth(requires: Role = ADMIN) on OBJECT | FIELD_DEFINITION
"#;

    #[test]
    fn test_types_and_wrappers() {
        let parser = GraphQlParser::new();
        let entities = parser.parse_schemas(Some("blog.graphql"), BLOG.as_bytes()).unwrap();
        let names: Vec<&str> = entities.iter().filter_map(|e| e.schema_id()).collect();
        assert_eq!(names, vec!["User", "Post", "Node", "Entity", "PostFilter"]);

        let user = &entities[0];
        assert_eq!(user.metadata.description.as_deref(), Some("A registered author"));
        assert_eq!(user.primary_keys, vec!["id"]);
        assert!(!user.field("email").unwrap().nullable);
        assert_eq!(user.field("email").unwrap().description.as_deref(), Some("Primary contact"));
        assert!(user.field("name").unwrap().nullable);
        assert_eq!(user.field("role").unwrap().data_type, DataType::Enum);
        let posts = user.field("posts").unwrap();
        assert_eq!(posts.data_type, DataType::Array);
        assert_eq!(posts.constraint(constraint_kinds::ITEMS_TYPE).unwrap().value, json!("OBJECT"));
        assert_eq!(user.field("joined").unwrap().data_type, DataType::DateTime);
        assert!(user.field("nickname").is_some());
        assert_eq!(user.metadata.additional["interfaces"], json!(["Node", "Entity"]));
    }

    #[test]
    fn test_references_become_foreign_keys() {
        let parser = GraphQlParser::new();
        let entities = parser.parse_schemas(None, BLOG.as_bytes()).unwrap();
        let post = &entities[1];
        assert_eq!(post.foreign_keys.len(), 1);
        let fk = &post.foreign_keys[0];
        assert_eq!(fk.source_fields, vec!["author"]);
        assert_eq!(fk.target_schema, "User");
        assert_eq!(fk.target_fields, vec!["id"]);
        // list references stay references only
        assert!(entities[0].foreign_keys.is_empty());
        let result = post.field("result").unwrap();
        assert!(result.has_constraint(constraint_kinds::UNION_TYPES));
        assert_eq!(
            post.field("legacyScore").unwrap().additional_metadata["deprecated"],
            json!(true)
        );
    }

    #[test]
    fn test_input_defaults_and_operations() {
        let parser = GraphQlParser::new();
        let entities = parser.parse_schemas(None, BLOG.as_bytes()).unwrap();
        let filter = entities.iter().find(|e| e.schema_id() == Some("PostFilter")).unwrap();
        assert_eq!(
            filter.field("limit").unwrap().constraint(constraint_kinds::DEFAULT).unwrap().value,
            json!(20)
        );
        assert_eq!(filter.metadata.additional["operations"]["Query"], json!(["user", "posts"]));
    }

    #[test]
    fn test_can_parse() {
        let parser = GraphQlParser::new();
        assert!(parser.can_parse(None, BLOG.as_bytes()) >= 0.75);
        assert_eq!(parser.can_parse(None, b"message A {\n  string id = 1;\n}"), 0.0);
        assert_eq!(parser.can_parse(None, br#"{"type": "record"}"#), 0.0);
    }

    #[test]
    fn test_errors() {
        let parser = GraphQlParser::new();
        assert!(matches!(parser.parse_schema(None, b"type User {"), Err(ParseError::Syntax { .. })));
        assert!(matches!(
            parser.parse_schema(None, b"type User { id: ID } type User { x: Int }"),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let parser = GraphQlParser::new();
        let err = parser.parse_schemas(None, b"type User { id: ID! id: String }").unwrap_err();
        assert!(err.to_string().contains("duplicate field 'id' in type User"));

        let extended = b"type User { id: ID! }\nextend type User { id: String }";
        assert!(matches!(parser.parse_schema(None, extended), Err(ParseError::Syntax { .. })));
    }
}
