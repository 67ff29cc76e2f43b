//! Apache ORC files
//!
//! Only the file tail is decoded: the postscript (last byte holds its length)
//! and the footer it points to, both protobuf messages. Footers stored
//! uncompressed, or in compression chunks flagged as original, are supported.
//! Row data is never decoded, so samples are fabricated from the type tree.

use serde_json::{Value, json};
use tracing::debug;

use super::common;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, FormatCapabilities, FormatInfo, SchemaDetails,
    constraint_kinds,
};

const FORMAT: &str = "orc";
const MAGIC: &[u8] = b"ORC";
const CHUNK_HEADER: usize = 3;

/// Parser for ORC file footers
pub struct OrcParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for OrcParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OrcParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "Apache ORC", "Optimized row columnar files")
            .mime_types(&["application/vnd.apache.orc", "application/x-orc"])
            .extensions(&["orc"])
            .capabilities(FormatCapabilities::data())
            .schema_type("columnar");
        Self { info, options }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WireValue<'a> {
    Varint(u64),
    Fixed64(u64),
    Bytes(&'a [u8]),
    Fixed32(u32),
}

impl<'a> WireValue<'a> {
    fn as_u64(&self) -> Option<u64> {
        match self {
            WireValue::Varint(v) | WireValue::Fixed64(v) => Some(*v),
            WireValue::Fixed32(v) => Some(u64::from(*v)),
            WireValue::Bytes(_) => None,
        }
    }

    fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            WireValue::Bytes(b) => Some(*b),
            _ => None,
        }
    }

    fn as_string(&self) -> ParseResult<String> {
        let bytes = self
            .as_bytes()
            .ok_or_else(|| ParseError::syntax(FORMAT, "expected length-delimited string"))?;
        String::from_utf8(bytes.to_vec()).map_err(|e| ParseError::syntax(FORMAT, e))
    }
}

/// Reader for protobuf wire-format messages
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn varint(&mut self) -> ParseResult<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| ParseError::syntax(FORMAT, "truncated varint"))?;
            self.pos += 1;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(ParseError::syntax(FORMAT, "varint longer than 10 bytes"))
    }

    fn take(&mut self, len: usize) -> ParseResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| ParseError::syntax(FORMAT, "field extends past end of message"))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Next `(field number, value)` pair, `None` at the end of the message
    fn field(&mut self) -> ParseResult<Option<(u64, WireValue<'a>)>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }
        let key = self.varint()?;
        let number = key >> 3;
        let value = match key & 0x7 {
            0 => WireValue::Varint(self.varint()?),
            1 => {
                let bytes = self.take(8)?;
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                WireValue::Fixed64(u64::from_le_bytes(raw))
            }
            2 => {
                let len = usize::try_from(self.varint()?)
                    .map_err(|_| ParseError::syntax(FORMAT, "length overflow"))?;
                WireValue::Bytes(self.take(len)?)
            }
            5 => {
                let bytes = self.take(4)?;
                let mut raw = [0u8; 4];
                raw.copy_from_slice(bytes);
                WireValue::Fixed32(u32::from_le_bytes(raw))
            }
            other => return Err(ParseError::syntax(FORMAT, format!("unsupported wire type {other}"))),
        };
        Ok(Some((number, value)))
    }
}

/// Repeated integers, packed or not
fn push_repeated(target: &mut Vec<u64>, value: WireValue<'_>) -> ParseResult<()> {
    match value {
        WireValue::Bytes(packed) => {
            let mut reader = WireReader::new(packed);
            while reader.pos < packed.len() {
                target.push(reader.varint()?);
            }
        }
        other => target.extend(other.as_u64()),
    }
    Ok(())
}

#[derive(Debug, Default)]
struct PostScript {
    footer_length: u64,
    compression: u64,
    version: Vec<u64>,
    writer_version: Option<u64>,
    magic: Option<String>,
}

impl PostScript {
    fn decode(buf: &[u8]) -> ParseResult<Self> {
        let mut ps = PostScript::default();
        let mut reader = WireReader::new(buf);
        while let Some((number, value)) = reader.field()? {
            match number {
                1 => ps.footer_length = value.as_u64().unwrap_or(0),
                2 => ps.compression = value.as_u64().unwrap_or(0),
                4 => push_repeated(&mut ps.version, value)?,
                6 => ps.writer_version = value.as_u64(),
                8000 => ps.magic = Some(value.as_string()?),
                _ => {}
            }
        }
        Ok(ps)
    }

    fn compression_name(&self) -> &'static str {
        match self.compression {
            0 => "none",
            1 => "zlib",
            2 => "snappy",
            3 => "lzo",
            4 => "lz4",
            5 => "zstd",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Default, Clone)]
struct OrcType {
    kind: u64,
    subtypes: Vec<u64>,
    field_names: Vec<String>,
    maximum_length: Option<u64>,
    precision: Option<u64>,
    scale: Option<u64>,
}

impl OrcType {
    fn decode(buf: &[u8]) -> ParseResult<Self> {
        let mut orc_type = OrcType::default();
        let mut reader = WireReader::new(buf);
        while let Some((number, value)) = reader.field()? {
            match number {
                1 => orc_type.kind = value.as_u64().unwrap_or(0),
                2 => push_repeated(&mut orc_type.subtypes, value)?,
                3 => orc_type.field_names.push(value.as_string()?),
                4 => orc_type.maximum_length = value.as_u64(),
                5 => orc_type.precision = value.as_u64(),
                6 => orc_type.scale = value.as_u64(),
                _ => {}
            }
        }
        Ok(orc_type)
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            0 => "boolean",
            1 => "tinyint",
            2 => "smallint",
            3 => "int",
            4 => "bigint",
            5 => "float",
            6 => "double",
            7 => "string",
            8 => "binary",
            9 => "timestamp",
            10 => "array",
            11 => "map",
            12 => "struct",
            13 => "uniontype",
            14 => "decimal",
            15 => "date",
            16 => "varchar",
            17 => "char",
            18 => "timestamp with local time zone",
            _ => "unknown",
        }
    }
}

#[derive(Debug, Default)]
struct Footer {
    types: Vec<OrcType>,
    stripes: usize,
    number_of_rows: Option<u64>,
    row_index_stride: Option<u64>,
    metadata: Vec<(String, Vec<u8>)>,
}

impl Footer {
    fn decode(buf: &[u8]) -> ParseResult<Self> {
        let mut footer = Footer::default();
        let mut reader = WireReader::new(buf);
        while let Some((number, value)) = reader.field()? {
            match number {
                3 => footer.stripes += 1,
                4 => {
                    let bytes = value
                        .as_bytes()
                        .ok_or_else(|| ParseError::syntax(FORMAT, "type is not a message"))?;
                    footer.types.push(OrcType::decode(bytes)?);
                }
                5 => {
                    let bytes = value
                        .as_bytes()
                        .ok_or_else(|| ParseError::syntax(FORMAT, "metadata item is not a message"))?;
                    let mut item = WireReader::new(bytes);
                    let (mut name, mut data) = (String::new(), Vec::new());
                    while let Some((n, v)) = item.field()? {
                        match n {
                            1 => name = v.as_string()?,
                            2 => data = v.as_bytes().unwrap_or_default().to_vec(),
                            _ => {}
                        }
                    }
                    footer.metadata.push((name, data));
                }
                6 => footer.number_of_rows = value.as_u64(),
                8 => footer.row_index_stride = value.as_u64(),
                _ => {}
            }
        }
        Ok(footer)
    }
}

/// Postscript and the raw footer bytes it describes
fn read_tail(content: &[u8]) -> ParseResult<(PostScript, Vec<u8>)> {
    if content.is_empty() {
        return Err(ParseError::Empty(FORMAT.to_string()));
    }
    if !content.starts_with(MAGIC) {
        return Err(ParseError::syntax(FORMAT, "missing ORC magic bytes"));
    }
    let ps_len = usize::from(content[content.len() - 1]);
    let ps_end = content.len() - 1;
    let ps_start = ps_end
        .checked_sub(ps_len)
        .filter(|start| *start >= MAGIC.len())
        .ok_or_else(|| ParseError::syntax(FORMAT, "postscript length exceeds file size"))?;
    let postscript = PostScript::decode(&content[ps_start..ps_end])?;
    if postscript.magic.as_deref().is_some_and(|m| m != "ORC") {
        return Err(ParseError::syntax(FORMAT, "postscript magic mismatch"));
    }

    let footer_len = usize::try_from(postscript.footer_length)
        .map_err(|_| ParseError::syntax(FORMAT, "footer length overflow"))?;
    let footer_start = ps_start
        .checked_sub(footer_len)
        .filter(|start| *start >= MAGIC.len())
        .ok_or_else(|| ParseError::syntax(FORMAT, "footer length exceeds file size"))?;
    let raw = &content[footer_start..ps_start];
    let footer = if postscript.compression == 0 {
        raw.to_vec()
    } else {
        read_stored_chunks(raw, postscript.compression_name())?
    };
    Ok((postscript, footer))
}

/// Concatenate compression chunks that were stored as original bytes
fn read_stored_chunks(raw: &[u8], codec: &str) -> ParseResult<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut pos = 0;
    while pos < raw.len() {
        let header = raw
            .get(pos..pos + CHUNK_HEADER)
            .ok_or_else(|| ParseError::syntax(FORMAT, "truncated compression chunk header"))?;
        let header = u32::from(header[0]) | u32::from(header[1]) << 8 | u32::from(header[2]) << 16;
        let original = header & 1 == 1;
        let len = (header >> 1) as usize;
        pos += CHUNK_HEADER;
        let chunk = raw
            .get(pos..pos + len)
            .ok_or_else(|| ParseError::syntax(FORMAT, "truncated compression chunk"))?;
        if !original {
            return Err(ParseError::unsupported(
                FORMAT,
                format!("{codec} compressed footer chunks are not supported"),
            ));
        }
        out.extend_from_slice(chunk);
        pos += len;
    }
    Ok(out)
}

struct OrcWalker<'a> {
    types: &'a [OrcType],
    fields: Vec<FieldInfo>,
    max_depth: usize,
}

impl OrcWalker<'_> {
    fn orc_type(&self, index: u64) -> ParseResult<&OrcType> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.types.get(i))
            .ok_or_else(|| ParseError::syntax(FORMAT, format!("type index {index} out of range")))
    }

    fn walk_struct(&mut self, struct_type: &OrcType, prefix: &str, depth: usize) -> ParseResult<()> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        for (i, subtype) in struct_type.subtypes.iter().enumerate() {
            let name = struct_type
                .field_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("_col{i}"));
            let child = self.orc_type(*subtype)?.clone();
            self.walk_column(&name, &child, prefix, depth)?;
        }
        Ok(())
    }

    fn walk_column(&mut self, name: &str, column: &OrcType, prefix: &str, depth: usize) -> ParseResult<()> {
        let path = common::join_path(prefix, name);
        let mut field = FieldInfo::new(name, path.clone(), scalar_type(column))
            .with_nullable(true)
            .with_metadata("orc_type", column.kind_name());
        match column.kind {
            10 => {
                let element = match column.subtypes.first() {
                    Some(index) => self.orc_type(*index)?.clone(),
                    None => OrcType::default(),
                };
                field.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, scalar_type(&element).as_str()));
                self.fields.push(field);
                if element.kind == 12 {
                    self.walk_struct(&element, &common::join_path(&path, "items"), depth + 1)?;
                }
            }
            11 => {
                let key = match column.subtypes.first() {
                    Some(index) => scalar_type(self.orc_type(*index)?),
                    None => DataType::String,
                };
                let value = match column.subtypes.get(1) {
                    Some(index) => Some(self.orc_type(*index)?.clone()),
                    None => None,
                };
                field.add_constraint(FieldConstraint::new(constraint_kinds::KEY_TYPE, key.as_str()));
                let value_type = value.as_ref().map_or(DataType::Unknown, scalar_type);
                field.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, value_type.as_str()));
                self.fields.push(field);
                if let Some(value) = value.filter(|v| v.kind == 12) {
                    self.walk_struct(&value, &common::join_path(&path, "values"), depth + 1)?;
                }
            }
            12 => {
                self.fields.push(field);
                self.walk_struct(column, &path, depth + 1)?;
            }
            13 => {
                let mut members = Vec::new();
                for index in &column.subtypes {
                    members.push(self.orc_type(*index)?.kind_name());
                }
                field.add_constraint(FieldConstraint::new(constraint_kinds::UNION_TYPES, members));
                self.fields.push(field);
            }
            _ => {
                if let Some(precision) = column.precision.filter(|_| column.kind == 14) {
                    field.add_constraint(FieldConstraint::new(constraint_kinds::PRECISION, precision));
                    field.add_constraint(FieldConstraint::new(constraint_kinds::SCALE, column.scale.unwrap_or(0)));
                }
                if let Some(length) = column.maximum_length.filter(|_| matches!(column.kind, 16 | 17)) {
                    field.add_constraint(FieldConstraint::new(constraint_kinds::MAX_LENGTH, length));
                }
                if column.kind == 18 {
                    field.add_constraint(FieldConstraint::new(constraint_kinds::FORMAT, "date-time"));
                }
                self.fields.push(field);
            }
        }
        Ok(())
    }
}

fn scalar_type(column: &OrcType) -> DataType {
    match column.kind {
        0 => DataType::Boolean,
        1..=4 => DataType::Integer,
        5 | 6 => DataType::Float,
        7 | 16 | 17 => DataType::String,
        8 => DataType::Binary,
        9 | 18 => DataType::DateTime,
        10 => DataType::Array,
        11 | 12 => DataType::Object,
        14 => {
            if column.scale == Some(0) {
                DataType::Integer
            } else {
                DataType::Float
            }
        }
        15 => DataType::Date,
        _ => DataType::Unknown,
    }
}

impl FormatParser for OrcParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        if !content.starts_with(MAGIC) || content.len() < MAGIC.len() + 2 {
            return 0.0;
        }
        match read_tail(content) {
            Ok((postscript, _)) if postscript.magic.as_deref() == Some("ORC") => 0.99,
            Ok(_) => 0.9,
            Err(_) => 0.5,
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let (postscript, raw_footer) = read_tail(content)?;
        let footer = Footer::decode(&raw_footer)?;
        let root = footer
            .types
            .first()
            .ok_or_else(|| ParseError::unsupported(FORMAT, "footer declares no types"))?;
        if root.kind != 12 {
            return Err(ParseError::unsupported(FORMAT, "root type is not a struct"));
        }

        let mut walker = OrcWalker {
            types: &footer.types,
            fields: Vec::new(),
            max_depth: self.options.max_depth,
        };
        walker.walk_struct(root, "", 0)?;

        let name = common::schema_name_from_filename(filename).unwrap_or_else(|| "orc".to_string());
        let mut schema = SchemaDetails::new().with_id(name.clone());
        schema.fields = walker.fields;
        schema.metadata.format = Some(FORMAT.to_string());
        schema.metadata.record_count = footer.number_of_rows;
        if !postscript.version.is_empty() {
            let version: Vec<String> = postscript.version.iter().map(u64::to_string).collect();
            schema.metadata.version = Some(version.join("."));
        }
        let additional = &mut schema.metadata.additional;
        additional.insert("compression".to_string(), json!(postscript.compression_name()));
        additional.insert("stripes".to_string(), json!(footer.stripes));
        if let Some(writer) = postscript.writer_version {
            additional.insert("writer_version".to_string(), json!(writer));
        }
        if let Some(stride) = footer.row_index_stride {
            additional.insert("row_index_stride".to_string(), json!(stride));
        }
        if !footer.metadata.is_empty() {
            let items: serde_json::Map<String, Value> = footer
                .metadata
                .iter()
                .map(|(key, value)| (key.clone(), json!(String::from_utf8_lossy(value))))
                .collect();
            additional.insert("user_metadata".to_string(), Value::Object(items));
        }

        schema.primary_keys = common::infer_primary_keys(&schema.fields, Some(&name));
        common::apply_primary_keys(&mut schema);
        debug!(
            fields = schema.fields.len(),
            rows = footer.number_of_rows.unwrap_or(0),
            compression = postscript.compression_name(),
            "Extracted ORC schema"
        );
        Ok(schema)
    }

    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let schema = self.parse_schema(filename, content)?;
        let limit = max_records.min(self.options.max_records);
        Ok(common::fabricate_records(&schema, limit))
    }
}
