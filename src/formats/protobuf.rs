//! Protocol Buffers IDL (`.proto`)

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::common::{self, join_path};
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, FormatCapabilities, FormatInfo, SchemaDetails,
    constraint_kinds,
};

const FORMAT: &str = "protobuf";
const MAX_NESTING: usize = 64;

const PROTO_KEYWORDS: &[&str] = &[
    "syntax", "package", "import", "message", "enum", "service", "rpc", "returns", "repeated",
    "optional", "oneof", "map", "int32", "int64", "string", "bool",
];

static SYNTAX_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*(syntax|edition)\s*=\s*["'](proto[23]|\d{4})["']\s*;"#).unwrap());
static MESSAGE_DECL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*message\s+\w+\s*\{").unwrap());
static NUMBERED_FIELD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+\s*=\s*\d+\s*[;\[]").unwrap());

/// Parser for `.proto` definitions
pub struct ProtobufParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for ProtobufParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtobufParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "Protocol Buffers", "Protocol Buffers message definitions")
            .mime_types(&["text/x-protobuf", "application/x-protobuf"])
            .extensions(&["proto"])
            .capabilities(FormatCapabilities::schema_language())
            .examples(&["syntax = \"proto3\";\nmessage User { string id = 1; }\n"])
            .schema_type("idl");
        Self { info, options }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Sym(char),
}

fn tokenize(text: &str) -> ParseResult<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            if i >= chars.len() {
                return Err(ParseError::syntax(FORMAT, "unterminated block comment"));
            }
            i += 2;
        } else if c == '"' || c == '\'' {
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(ParseError::syntax(FORMAT, "unterminated string")),
                    Some('\\') => {
                        if let Some(escaped) = chars.get(i + 1) {
                            value.push(*escaped);
                        }
                        i += 2;
                    }
                    Some(q) if *q == c => {
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
        } else if c.is_ascii_digit()
            || (matches!(c, '-' | '+') && chars.get(i + 1).is_some_and(char::is_ascii_digit))
        {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Number(chars[start..i].iter().collect()));
        } else if c.is_alphabetic() || c == '_' || c == '.' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Sym(c));
            i += 1;
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    None,
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone)]
struct ProtoField {
    name: String,
    type_name: String,
    label: Label,
    number: i64,
    map: Option<(String, String)>,
    oneof: Option<String>,
    default: Option<String>,
    deprecated: bool,
}

#[derive(Debug, Clone, Default)]
struct ProtoMessage {
    name: String,
    full_name: String,
    fields: Vec<ProtoField>,
    messages: Vec<ProtoMessage>,
    enums: Vec<ProtoEnum>,
}

#[derive(Debug, Clone, Default)]
struct ProtoEnum {
    full_name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ProtoMethod {
    name: String,
    input: String,
    output: String,
    client_streaming: bool,
    server_streaming: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ProtoService {
    name: String,
    methods: Vec<ProtoMethod>,
}

#[derive(Debug, Clone, Default)]
struct ProtoFile {
    syntax: String,
    package: Option<String>,
    imports: Vec<String>,
    messages: Vec<ProtoMessage>,
    enums: Vec<ProtoEnum>,
    services: Vec<ProtoService>,
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
            .ok_or_else(|| ParseError::syntax(FORMAT, "unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn ident(&mut self) -> ParseResult<String> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(ParseError::syntax(FORMAT, format!("expected identifier, found {other:?}"))),
        }
    }

    fn expect(&mut self, symbol: char) -> ParseResult<()> {
        match self.next()? {
            Token::Sym(c) if c == symbol => Ok(()),
            other => Err(ParseError::syntax(FORMAT, format!("expected '{symbol}', found {other:?}"))),
        }
    }

    fn eat(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&Token::Sym(symbol)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(k)) if k == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn number(&mut self) -> ParseResult<i64> {
        match self.next()? {
            Token::Number(n) => parse_int(&n).ok_or_else(|| ParseError::syntax(FORMAT, format!("invalid number {n}"))),
            other => Err(ParseError::syntax(FORMAT, format!("expected number, found {other:?}"))),
        }
    }

    /// Skip a statement: up to `;`, or over a balanced `{...}` block
    fn skip_statement(&mut self) -> ParseResult<()> {
        loop {
            match self.next()? {
                Token::Sym(';') => return Ok(()),
                Token::Sym('{') => return self.skip_block(),
                _ => {}
            }
        }
    }

    /// Skip to the `}` matching an already consumed `{`
    fn skip_block(&mut self) -> ParseResult<()> {
        let mut depth = 1;
        while depth > 0 {
            match self.next()? {
                Token::Sym('{') => depth += 1,
                Token::Sym('}') => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// `[key = value, ...]` field options; returns (default, deprecated)
    fn field_options(&mut self) -> ParseResult<(Option<String>, bool)> {
        let mut default = None;
        let mut deprecated = false;
        if !self.eat('[') {
            return Ok((default, deprecated));
        }
        let mut key = String::new();
        loop {
            match self.next()? {
                Token::Sym(']') => break,
                Token::Ident(name) if key.is_empty() => key = name,
                Token::Sym('=') => {
                    let value = match self.next()? {
                        Token::Ident(v) | Token::Number(v) | Token::Str(v) => v,
                        Token::Sym('{') => {
                            self.skip_block()?;
                            String::new()
                        }
                        Token::Sym(c) => c.to_string(),
                    };
                    match key.as_str() {
                        "default" => default = Some(value),
                        "deprecated" => deprecated = value == "true",
                        _ => {}
                    }
                }
                Token::Sym(',') => key.clear(),
                _ => {}
            }
        }
        Ok((default, deprecated))
    }
}

fn parse_int(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.trim_start_matches('+')),
    };
    let value = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn parse_file(text: &str) -> ParseResult<ProtoFile> {
    let mut stream = TokenStream {
        tokens: tokenize(text)?,
        pos: 0,
    };
    let mut file = ProtoFile {
        syntax: "proto2".to_string(),
        ..ProtoFile::default()
    };
    while let Some(token) = stream.peek().cloned() {
        stream.pos += 1;
        let keyword = match token {
            Token::Ident(keyword) => keyword,
            Token::Sym(';') => continue,
            other => return Err(ParseError::syntax(FORMAT, format!("unexpected {other:?}"))),
        };
        match keyword.as_str() {
            "syntax" | "edition" => {
                stream.expect('=')?;
                if let Token::Str(value) = stream.next()? {
                    file.syntax = value;
                }
                stream.expect(';')?;
            }
            "package" => {
                file.package = Some(stream.ident()?);
                stream.expect(';')?;
            }
            "import" => {
                let _ = stream.eat_ident("public") || stream.eat_ident("weak");
                if let Token::Str(path) = stream.next()? {
                    file.imports.push(path);
                }
                stream.expect(';')?;
            }
            "message" => {
                let scope = file.package.clone().unwrap_or_default();
                let message = parse_message(&mut stream, &scope, 0)?;
                file.messages.push(message);
            }
            "enum" => {
                let scope = file.package.clone().unwrap_or_default();
                file.enums.push(parse_enum(&mut stream, &scope)?);
            }
            "service" => file.services.push(parse_service(&mut stream)?),
            "option" | "extend" => stream.skip_statement()?,
            other => {
                return Err(ParseError::syntax(FORMAT, format!("unexpected keyword '{other}'")));
            }
        }
    }
    Ok(file)
}

fn parse_message(stream: &mut TokenStream, scope: &str, depth: usize) -> ParseResult<ProtoMessage> {
    if depth > MAX_NESTING {
        return Err(ParseError::MaxDepthExceeded {
            depth,
            max: MAX_NESTING,
        });
    }
    let name = stream.ident()?;
    let full_name = qualify(scope, &name);
    let mut message = ProtoMessage {
        name,
        full_name: full_name.clone(),
        ..ProtoMessage::default()
    };
    stream.expect('{')?;
    while !stream.eat('}') {
        if stream.eat(';') {
            continue;
        }
        let keyword = stream.ident()?;
        match keyword.as_str() {
            "message" => message.messages.push(parse_message(stream, &full_name, depth + 1)?),
            "enum" => message.enums.push(parse_enum(stream, &full_name)?),
            "oneof" => {
                let group = stream.ident()?;
                stream.expect('{')?;
                while !stream.eat('}') {
                    if stream.eat(';') {
                        continue;
                    }
                    let type_name = stream.ident()?;
                    if type_name == "option" {
                        stream.skip_statement()?;
                        continue;
                    }
                    if let Some(mut field) = parse_field(stream, type_name, Label::None)? {
                        field.oneof = Some(group.clone());
                        message.fields.push(field);
                    }
                }
            }
            "option" | "reserved" | "extensions" | "extend" => stream.skip_statement()?,
            "map" if stream.peek() == Some(&Token::Sym('<')) => {
                stream.expect('<')?;
                let key = stream.ident()?;
                stream.expect(',')?;
                let value = stream.ident()?;
                stream.expect('>')?;
                let name = stream.ident()?;
                stream.expect('=')?;
                let number = stream.number()?;
                let (_, deprecated) = stream.field_options()?;
                stream.expect(';')?;
                message.fields.push(ProtoField {
                    name,
                    type_name: "map".to_string(),
                    label: Label::None,
                    number,
                    map: Some((key, value)),
                    oneof: None,
                    default: None,
                    deprecated,
                });
            }
            "repeated" | "optional" | "required" => {
                let label = match keyword.as_str() {
                    "repeated" => Label::Repeated,
                    "optional" => Label::Optional,
                    _ => Label::Required,
                };
                let type_name = stream.ident()?;
                if let Some(field) = parse_field(stream, type_name, label)? {
                    message.fields.push(field);
                }
            }
            _ => {
                if let Some(field) = parse_field(stream, keyword, Label::None)? {
                    message.fields.push(field);
                }
            }
        }
    }
    let mut seen = HashSet::new();
    if let Some(duplicate) = message.fields.iter().find(|f| !seen.insert(f.name.as_str())) {
        return Err(ParseError::syntax(
            FORMAT,
            format!("duplicate field '{}' in message {}", duplicate.name, message.name),
        ));
    }
    Ok(message)
}

/// Rest of a field after its label and type; `None` for proto2 groups
fn parse_field(stream: &mut TokenStream, type_name: String, label: Label) -> ParseResult<Option<ProtoField>> {
    if type_name == "group" {
        stream.skip_statement()?;
        return Ok(None);
    }
    let name = stream.ident()?;
    stream.expect('=')?;
    let number = stream.number()?;
    let (default, deprecated) = stream.field_options()?;
    stream.expect(';')?;
    Ok(Some(ProtoField {
        name,
        type_name,
        label,
        number,
        map: None,
        oneof: None,
        default,
        deprecated,
    }))
}

fn parse_enum(stream: &mut TokenStream, scope: &str) -> ParseResult<ProtoEnum> {
    let name = stream.ident()?;
    let mut proto_enum = ProtoEnum {
        full_name: qualify(scope, &name),
        values: Vec::new(),
    };
    stream.expect('{')?;
    while !stream.eat('}') {
        if stream.eat(';') {
            continue;
        }
        let value = stream.ident()?;
        if matches!(value.as_str(), "option" | "reserved") {
            stream.skip_statement()?;
            continue;
        }
        stream.expect('=')?;
        stream.number()?;
        stream.field_options()?;
        stream.expect(';')?;
        proto_enum.values.push(value);
    }
    Ok(proto_enum)
}

fn parse_service(stream: &mut TokenStream) -> ParseResult<ProtoService> {
    let name = stream.ident()?;
    let mut service = ProtoService {
        name,
        methods: Vec::new(),
    };
    stream.expect('{')?;
    while !stream.eat('}') {
        if stream.eat(';') {
            continue;
        }
        let keyword = stream.ident()?;
        if keyword != "rpc" {
            stream.skip_statement()?;
            continue;
        }
        let method = stream.ident()?;
        stream.expect('(')?;
        let client_streaming = stream.eat_ident("stream");
        let input = stream.ident()?;
        stream.expect(')')?;
        if !stream.eat_ident("returns") {
            return Err(ParseError::syntax(FORMAT, format!("rpc {method} without returns")));
        }
        stream.expect('(')?;
        let server_streaming = stream.eat_ident("stream");
        let output = stream.ident()?;
        stream.expect(')')?;
        if stream.eat('{') {
            stream.skip_block()?;
        } else {
            stream.expect(';')?;
        }
        service.methods.push(ProtoMethod {
            name: method,
            input,
            output,
            client_streaming,
            server_streaming,
        });
    }
    Ok(service)
}

fn scalar_type(type_name: &str) -> Option<DataType> {
    Some(match type_name {
        "double" | "float" => DataType::Float,
        "int32" | "int64" | "uint32" | "uint64" | "sint32" | "sint64" | "fixed32" | "fixed64"
        | "sfixed32" | "sfixed64" => DataType::Integer,
        "bool" => DataType::Boolean,
        "string" => DataType::String,
        "bytes" => DataType::Binary,
        _ => return None,
    })
}

/// Well-known `google.protobuf` types: data type and whether the wrapper is nullable
fn well_known_type(type_name: &str) -> Option<(DataType, bool)> {
    let name = type_name.trim_start_matches('.').strip_prefix("google.protobuf.")?;
    Some(match name {
        "Timestamp" => (DataType::DateTime, true),
        "Duration" | "FieldMask" => (DataType::String, true),
        "Struct" | "Any" | "Empty" | "Value" => (DataType::Object, true),
        "ListValue" => (DataType::Array, true),
        "StringValue" => (DataType::String, true),
        "BytesValue" => (DataType::Binary, true),
        "BoolValue" => (DataType::Boolean, true),
        "DoubleValue" | "FloatValue" => (DataType::Float, true),
        "Int32Value" | "Int64Value" | "UInt32Value" | "UInt64Value" => (DataType::Integer, true),
        _ => return None,
    })
}

enum Resolved<'a> {
    Message(&'a ProtoMessage),
    Enum(&'a ProtoEnum),
}

struct ProtoWalker<'a> {
    types: HashMap<String, Resolved<'a>>,
    proto3: bool,
    fields: Vec<FieldInfo>,
    max_depth: usize,
}

fn register<'a>(message: &'a ProtoMessage, types: &mut HashMap<String, Resolved<'a>>) {
    types.insert(message.full_name.clone(), Resolved::Message(message));
    for nested in &message.messages {
        register(nested, types);
    }
    for proto_enum in &message.enums {
        types.insert(proto_enum.full_name.clone(), Resolved::Enum(proto_enum));
    }
}

impl<'a> ProtoWalker<'a> {
    fn new(file: &'a ProtoFile, max_depth: usize) -> Self {
        let mut types = HashMap::new();
        for message in &file.messages {
            register(message, &mut types);
        }
        for proto_enum in &file.enums {
            types.insert(proto_enum.full_name.clone(), Resolved::Enum(proto_enum));
        }
        Self {
            types,
            proto3: file.syntax == "proto3",
            fields: Vec::new(),
            max_depth,
        }
    }

    /// Resolve a type name the way protoc does: innermost scope outwards
    fn resolve(&self, type_name: &str, scope: &str) -> Option<&Resolved<'a>> {
        if let Some(absolute) = type_name.strip_prefix('.') {
            return self.types.get(absolute);
        }
        let mut current = scope;
        loop {
            if let Some(found) = self.types.get(&qualify(current, type_name)) {
                return Some(found);
            }
            if current.is_empty() {
                break;
            }
            current = current.rsplit_once('.').map(|(parent, _)| parent).unwrap_or("");
        }
        let suffix = format!(".{type_name}");
        self.types
            .iter()
            .filter(|(name, _)| name.ends_with(&suffix))
            .min_by_key(|(name, _)| name.len())
            .map(|(_, resolved)| resolved)
    }

    fn walk_message(
        &mut self,
        message: &'a ProtoMessage,
        prefix: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<()> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        stack.push(message.full_name.clone());
        for field in &message.fields {
            self.walk_field(field, &message.full_name, prefix, depth, stack)?;
        }
        stack.pop();
        Ok(())
    }

    fn walk_field(
        &mut self,
        field: &'a ProtoField,
        scope: &str,
        prefix: &str,
        depth: usize,
        stack: &mut Vec<String>,
    ) -> ParseResult<()> {
        let path = join_path(prefix, &field.name);

        if let Some((key, value)) = &field.map {
            let key_type = scalar_type(key).unwrap_or(DataType::String);
            let mut info = FieldInfo::new(field.name.clone(), path.clone(), DataType::Object)
                .with_nullable(false)
                .with_constraint(FieldConstraint::new(constraint_kinds::KEY_TYPE, key_type.as_str()));
            let value_message = match self.resolve(value, scope) {
                Some(Resolved::Message(m)) => Some(*m),
                _ => None,
            };
            let value_type = self.element_type(value, scope);
            info.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, value_type.as_str()));
            self.fields.push(self.annotate(info, field));
            if let Some(m) = value_message
                && !stack.contains(&m.full_name)
            {
                self.walk_message(m, &join_path(&path, "values"), depth + 1, stack)?;
            }
            return Ok(());
        }

        let repeated = field.label == Label::Repeated;
        let nullable = match field.label {
            Label::Repeated | Label::Required => false,
            Label::Optional => true,
            Label::None => field.oneof.is_some() || !self.proto3,
        };

        let mut constraints = Vec::new();
        let mut child: Option<&'a ProtoMessage> = None;
        let (element_type, element_nullable) = if let Some(t) = scalar_type(&field.type_name) {
            (t, nullable)
        } else if let Some((t, wrapper_nullable)) = well_known_type(&field.type_name) {
            (t, nullable || (wrapper_nullable && !repeated))
        } else {
            match self.resolve(&field.type_name, scope) {
                Some(Resolved::Enum(e)) => {
                    constraints.push(FieldConstraint::new(constraint_kinds::ENUM, e.values.clone()));
                    (DataType::Enum, nullable)
                }
                Some(Resolved::Message(m)) => {
                    child = Some(*m);
                    // Message fields have presence in both syntaxes
                    (DataType::Object, !repeated)
                }
                None => {
                    constraints.push(FieldConstraint::new(constraint_kinds::REFERENCE, field.type_name.as_str()));
                    (DataType::Unknown, !repeated)
                }
            }
        };

        let mut info = if repeated {
            let mut info = FieldInfo::new(field.name.clone(), path.clone(), DataType::Array).with_nullable(false);
            if child.is_none() {
                info.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, element_type.as_str()));
            }
            info
        } else {
            FieldInfo::new(field.name.clone(), path.clone(), element_type).with_nullable(element_nullable)
        };
        for constraint in constraints {
            info.add_constraint(constraint);
        }
        if let Some(group) = &field.oneof {
            info.add_constraint(FieldConstraint::new(constraint_kinds::ONEOF, group.as_str()));
        }
        if let Some(default) = &field.default {
            let (_, value) = common::infer_scalar(default);
            info.add_constraint(FieldConstraint::new(constraint_kinds::DEFAULT, value));
        }
        if field.label == Label::Required {
            info.add_constraint(FieldConstraint::flag(constraint_kinds::NOT_NULL));
        }
        self.fields.push(self.annotate(info, field));

        if let Some(message) = child {
            if stack.contains(&message.full_name) {
                if let Some(last) = self.fields.last_mut() {
                    last.add_constraint(FieldConstraint::new(constraint_kinds::REFERENCE, message.full_name.as_str()));
                }
                return Ok(());
            }
            let child_prefix = if repeated { join_path(&path, "items") } else { path };
            self.walk_message(message, &child_prefix, depth + 1, stack)?;
        }
        Ok(())
    }

    fn element_type(&self, type_name: &str, scope: &str) -> DataType {
        scalar_type(type_name)
            .or_else(|| well_known_type(type_name).map(|(t, _)| t))
            .or_else(|| {
                self.resolve(type_name, scope).map(|r| match r {
                    Resolved::Message(_) => DataType::Object,
                    Resolved::Enum(_) => DataType::Enum,
                })
            })
            .unwrap_or(DataType::Unknown)
    }

    fn annotate(&self, info: FieldInfo, field: &ProtoField) -> FieldInfo {
        let info = info
            .with_metadata("field_number", field.number)
            .with_metadata("proto_type", field.type_name.as_str());
        if field.deprecated {
            info.with_metadata("deprecated", true)
        } else {
            info
        }
    }
}

impl ProtobufParser {
    fn entities(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let file = parse_file(&text)?;
        if file.messages.is_empty() {
            return Err(ParseError::unsupported(FORMAT, "no message definitions"));
        }

        let services = json!(file.services);
        let mut entities = Vec::with_capacity(file.messages.len());
        for message in &file.messages {
            let mut walker = ProtoWalker::new(&file, self.options.max_depth);
            walker.walk_message(message, "", 0, &mut Vec::new())?;

            let mut schema = SchemaDetails::new().with_id(message.name.clone());
            schema.fields = walker.fields;
            schema.metadata.format = Some(FORMAT.to_string());
            schema.metadata.namespace = file.package.clone();
            schema.metadata.version = Some(file.syntax.clone());
            schema.dependencies = file.imports.clone();
            schema
                .metadata
                .additional
                .insert("full_name".to_string(), json!(message.full_name));
            if !file.services.is_empty() {
                schema
                    .metadata
                    .additional
                    .insert("services".to_string(), services.clone());
            }
            if let Some(source) = filename {
                schema
                    .metadata
                    .additional
                    .insert("source_file".to_string(), json!(source));
            }
            schema.primary_keys = common::infer_primary_keys(&schema.fields, Some(&message.name));
            common::apply_primary_keys(&mut schema);
            entities.push(schema);
        }
        debug!(
            messages = entities.len(),
            services = file.services.len(),
            syntax = %file.syntax,
            "Extracted protobuf schema"
        );
        Ok(entities)
    }
}

impl FormatParser for ProtobufParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        if SYNTAX_LINE.is_match(&text) {
            return 0.95;
        }
        if !(MESSAGE_DECL.is_match(&text) && NUMBERED_FIELD.is_match(&text)) {
            return 0.0;
        }
        (0.7 + 0.25 * common::keyword_density(&text, PROTO_KEYWORDS)).min(0.9)
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
        Ok(common::fabricate_entity_records(&entities, max_records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = r#"
// Shop service definitions
syntax = "proto3";

package shop.v1;

import "google/protobuf/timestamp.proto";

/* Customer account */
message Customer {
  string id = 1;
  string email = 2;
  optional string nickname = 3;
  google.protobuf.Timestamp created_at = 4;
  repeated string tags = 5;
  map<string, int64> counters = 6;
  Address address = 7;
  repeated Order orders = 8;
  Status status = 9;

  message Address {
    string street = 1;
    string city = 2;
  }

  enum Status {
    STATUS_UNSPECIFIED = 0;
    ACTIVE = 1;
  }

  oneof contact {
    string phone = 10;
    string fax = 11;
  }
}

message Order {
  string id = 1;
  string customer_id = 2;
  double total = 3 [deprecated = true];
  reserved 4, 5;
}

service CustomerService {
  rpc GetCustomer (Customer) returns (Customer);
  rpc StreamOrders (Customer) returns (stream Order) {}
}
"#;

    #[test]
    fn test_messages_and_fields() {
        let parser = ProtobufParser::new();
        let entities = parser.parse_schemas(Some("shop.proto"), SHOP.as_bytes()).unwrap();
        assert_eq!(entities.len(), 2);

        let customer = &entities[0];
        assert!(customer.has_unique_paths());
        assert_eq!(customer.schema_id(), Some("Customer"));
        assert_eq!(customer.metadata.namespace.as_deref(), Some("shop.v1"));
        assert_eq!(customer.primary_keys, vec!["id"]);

        assert!(!customer.field("email").unwrap().nullable);
        assert!(customer.field("nickname").unwrap().nullable);
        assert_eq!(customer.field("created_at").unwrap().data_type, DataType::DateTime);
        assert_eq!(customer.field("tags").unwrap().data_type, DataType::Array);
        let counters = customer.field("counters").unwrap();
        assert_eq!(
            counters.constraint(constraint_kinds::VALUE_TYPE).unwrap().value,
            json!("INTEGER")
        );
        assert_eq!(customer.field("address.city").unwrap().data_type, DataType::String);
        assert!(customer.field("orders.items.customer_id").is_some());
        let status = customer.field("status").unwrap();
        assert_eq!(status.data_type, DataType::Enum);
        assert_eq!(
            status.constraint(constraint_kinds::ENUM).unwrap().value,
            json!(["STATUS_UNSPECIFIED", "ACTIVE"])
        );
        let phone = customer.field("phone").unwrap();
        assert!(phone.nullable);
        assert_eq!(phone.constraint(constraint_kinds::ONEOF).unwrap().value, json!("contact"));
        assert_eq!(customer.dependencies, vec!["google/protobuf/timestamp.proto"]);
    }

    #[test]
    fn test_services_in_metadata() {
        let parser = ProtobufParser::new();
        let schema = parser.parse_schemas(None, SHOP.as_bytes()).unwrap().remove(1);
        let services = &schema.metadata.additional["services"];
        assert_eq!(services[0]["name"], json!("CustomerService"));
        assert_eq!(services[0]["methods"][1]["server_streaming"], json!(true));
        assert_eq!(schema.field("total").unwrap().additional_metadata["deprecated"], json!(true));
    }

    #[test]
    fn test_proto2_labels() {
        let content = r#"syntax = "proto2";
message Item {
  required int32 id = 1;
  optional string label = 2 [default = "none"];
  optional Item parent = 3;
}"#;
        let schema = ProtobufParser::new().parse_schema(None, content.as_bytes()).unwrap();
        assert!(!schema.field("id").unwrap().nullable);
        let label = schema.field("label").unwrap();
        assert!(label.nullable);
        assert_eq!(label.constraint(constraint_kinds::DEFAULT).unwrap().value, json!("none"));
        assert!(schema.field("parent").unwrap().has_constraint(constraint_kinds::REFERENCE));
    }

    #[test]
    fn test_combined_paths() {
        let schema = ProtobufParser::new().parse_schema(None, SHOP.as_bytes()).unwrap();
        assert!(schema.field("Customer.email").is_some());
        assert!(schema.field("Order.total").is_some());
    }

    #[test]
    fn test_can_parse_and_errors() {
        let parser = ProtobufParser::new();
        assert!(parser.can_parse(None, SHOP.as_bytes()) >= 0.95);
        assert!(parser.can_parse(None, b"message A {\n  string id = 1;\n}\n") >= 0.7);
        assert_eq!(parser.can_parse(None, b"type Query { users: [User] }"), 0.0);
        assert!(matches!(
            parser.parse_schema(None, b"message A { string id = ; }"),
            Err(ParseError::Syntax { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let parser = ProtobufParser::new();
        let err = parser
            .parse_schemas(None, b"syntax = \"proto3\";\nmessage M { int32 a = 1; string a = 2; }\n")
            .unwrap_err();
        assert!(err.to_string().contains("duplicate field 'a' in message M"));

        let err = parser
            .parse_schema(None, b"message M { oneof pick { string a = 1; } int32 a = 2; }")
            .unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }
}
