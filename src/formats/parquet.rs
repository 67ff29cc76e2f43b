//! Apache Parquet files
//!
//! The schema comes from the footer metadata. Row samples are read with the
//! record API of the `parquet` crate; pages compressed with a codec this build
//! does not include fall back to fabricated samples.

use bytes::Bytes;
use parquet::basic::{ConvertedType, LogicalType, Repetition, TimeUnit, Type as PhysicalType};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::schema::types::Type;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::common;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, FormatCapabilities, FormatInfo, SchemaDetails,
    constraint_kinds,
};

const FORMAT: &str = "parquet";
const MAGIC: &[u8] = b"PAR1";

/// Parser for Parquet footers and row samples
pub struct ParquetParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for ParquetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "Apache Parquet", "Columnar storage files with footer metadata")
            .mime_types(&["application/vnd.apache.parquet", "application/x-parquet"])
            .extensions(&["parquet", "pq"])
            .capabilities(FormatCapabilities::data())
            .schema_type("columnar");
        Self { info, options }
    }

    fn open(&self, content: &[u8]) -> ParseResult<SerializedFileReader<Bytes>> {
        if content.is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        if !is_parquet(content) {
            return Err(ParseError::syntax(FORMAT, "missing PAR1 magic bytes"));
        }
        SerializedFileReader::new(Bytes::copy_from_slice(content)).map_err(|e| ParseError::syntax(FORMAT, e))
    }

    /// Up to `limit` rows as JSON objects
    fn read_rows(&self, reader: &SerializedFileReader<Bytes>, limit: usize) -> ParseResult<Vec<Value>> {
        let rows = reader
            .get_row_iter(None)
            .map_err(|e| ParseError::unsupported(FORMAT, e))?;
        let mut records = Vec::new();
        for row in rows.take(limit) {
            let row = row.map_err(|e| ParseError::unsupported(FORMAT, e))?;
            records.push(row.to_json_value());
        }
        Ok(records)
    }
}

fn is_parquet(content: &[u8]) -> bool {
    content.len() >= 12 && content.starts_with(MAGIC) && content.ends_with(MAGIC)
}

struct ParquetWalker {
    fields: Vec<FieldInfo>,
    max_depth: usize,
}

impl ParquetWalker {
    fn walk_group(&mut self, group: &Type, prefix: &str, depth: usize) -> ParseResult<()> {
        if depth > self.max_depth {
            return Err(ParseError::MaxDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        for child in group.get_fields() {
            self.walk_field(child, prefix, depth)?;
        }
        Ok(())
    }

    fn walk_field(&mut self, field: &Type, prefix: &str, depth: usize) -> ParseResult<()> {
        let info = field.get_basic_info();
        let name = info.name();
        let path = common::join_path(prefix, name);
        let repetition = info.has_repetition().then(|| info.repetition());
        let nullable = repetition == Some(Repetition::OPTIONAL);
        let logical = info.logical_type();
        let converted = info.converted_type();

        if field.is_group() {
            let is_list = matches!(logical, Some(LogicalType::List)) || converted == ConvertedType::LIST;
            let is_map = matches!(logical, Some(LogicalType::Map))
                || matches!(converted, ConvertedType::MAP | ConvertedType::MAP_KEY_VALUE);
            if is_list {
                return self.walk_list(field, name, &path, nullable, depth);
            }
            if is_map {
                return self.walk_map(field, name, &path, nullable, depth);
            }
            if repetition == Some(Repetition::REPEATED) {
                let items = common::join_path(&path, "items");
                self.fields.push(
                    FieldInfo::new(name, path.clone(), DataType::Array)
                        .with_nullable(false)
                        .with_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, DataType::Object.as_str())),
                );
                return self.walk_group(field, &items, depth + 1);
            }
            self.fields
                .push(FieldInfo::new(name, path.clone(), DataType::Object).with_nullable(nullable));
            return self.walk_group(field, &path, depth + 1);
        }

        let (data_type, constraints) = primitive_type(field);
        if repetition == Some(Repetition::REPEATED) {
            let mut list = FieldInfo::new(name, path, DataType::Array)
                .with_nullable(false)
                .with_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, data_type.as_str()));
            for constraint in constraints {
                list.add_constraint(constraint);
            }
            self.fields.push(list);
            return Ok(());
        }
        let mut scalar = FieldInfo::new(name, path, data_type)
            .with_nullable(nullable)
            .with_metadata("physical_type", field.get_physical_type().to_string());
        for constraint in constraints {
            scalar.add_constraint(constraint);
        }
        if !nullable {
            scalar.add_constraint(FieldConstraint::flag(constraint_kinds::NOT_NULL));
        }
        self.fields.push(scalar);
        Ok(())
    }

    /// `LIST` groups, in the standard three-level or a legacy two-level layout
    fn walk_list(&mut self, field: &Type, name: &str, path: &str, nullable: bool, depth: usize) -> ParseResult<()> {
        let mut list = FieldInfo::new(name, path, DataType::Array).with_nullable(nullable);
        let Some(repeated) = field.get_fields().first() else {
            self.fields.push(list);
            return Ok(());
        };
        let element = if repeated.is_group()
            && repeated.get_fields().len() == 1
            && repeated.name() != "array"
            && repeated.name() != format!("{name}_tuple")
        {
            repeated.get_fields()[0].as_ref()
        } else {
            repeated.as_ref()
        };

        let items = common::join_path(path, "items");
        if element.is_group() {
            list.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, DataType::Object.as_str()));
            self.fields.push(list);
            return self.walk_group(element, &items, depth + 1);
        }
        let (item_type, constraints) = primitive_type(element);
        list.add_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, item_type.as_str()));
        for constraint in constraints {
            list.add_constraint(constraint);
        }
        self.fields.push(list);
        Ok(())
    }

    /// `MAP` groups: one repeated `key_value` group holding `key` and `value`
    fn walk_map(&mut self, field: &Type, name: &str, path: &str, nullable: bool, depth: usize) -> ParseResult<()> {
        let mut map = FieldInfo::new(name, path, DataType::Object).with_nullable(nullable);
        let entries = field
            .get_fields()
            .first()
            .filter(|kv| kv.is_group())
            .map(|kv| kv.get_fields());
        let (key, value) = match entries {
            Some([key, value, ..]) => (Some(key.as_ref()), Some(value.as_ref())),
            Some([key]) => (Some(key.as_ref()), None),
            _ => (None, None),
        };
        let key_type = key
            .filter(|k| k.is_primitive())
            .map_or(DataType::String, |k| primitive_type(k).0);
        map.add_constraint(FieldConstraint::new(constraint_kinds::KEY_TYPE, key_type.as_str()));
        match value {
            Some(value) if value.is_group() => {
                map.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, DataType::Object.as_str()));
                self.fields.push(map);
                self.walk_group(value, &common::join_path(path, "values"), depth + 1)
            }
            Some(value) => {
                let value_type = primitive_type(value).0;
                map.add_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, value_type.as_str()));
                self.fields.push(map);
                Ok(())
            }
            None => {
                self.fields.push(map);
                Ok(())
            }
        }
    }
}

fn time_unit(unit: &TimeUnit) -> &'static str {
    match unit {
        TimeUnit::MILLIS(_) => "millis",
        TimeUnit::MICROS(_) => "micros",
        TimeUnit::NANOS(_) => "nanos",
    }
}

/// Data type and constraints of a primitive column
fn primitive_type(field: &Type) -> (DataType, Vec<FieldConstraint>) {
    let Type::PrimitiveType {
        basic_info,
        physical_type,
        type_length,
        scale,
        precision,
    } = field
    else {
        return (DataType::Object, Vec::new());
    };
    let mut constraints = Vec::new();
    let logical = |name: &str| FieldConstraint::new(constraint_kinds::LOGICAL_TYPE, name);

    if let Some(logical_type) = basic_info.logical_type() {
        let data_type = match logical_type {
            LogicalType::String => DataType::String,
            LogicalType::Enum => {
                constraints.push(logical("enum"));
                DataType::String
            }
            LogicalType::Json => {
                constraints.push(logical("json"));
                DataType::String
            }
            LogicalType::Bson => {
                constraints.push(logical("bson"));
                DataType::Binary
            }
            LogicalType::Uuid => DataType::Uuid,
            LogicalType::Date => DataType::Date,
            LogicalType::Time { unit, .. } => {
                constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "time"));
                constraints.push(logical(&format!("time-{}", time_unit(&unit))));
                DataType::String
            }
            LogicalType::Timestamp { unit, is_adjusted_to_u_t_c } => {
                constraints.push(logical(&format!("timestamp-{}", time_unit(&unit))));
                if is_adjusted_to_u_t_c {
                    constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "date-time"));
                }
                DataType::DateTime
            }
            LogicalType::Integer { bit_width, is_signed } => {
                constraints.push(logical(&format!("{}int{bit_width}", if is_signed { "" } else { "u" })));
                if !is_signed {
                    constraints.push(FieldConstraint::new(constraint_kinds::MINIMUM, 0));
                }
                DataType::Integer
            }
            LogicalType::Decimal { scale, precision } => {
                constraints.push(FieldConstraint::new(constraint_kinds::PRECISION, precision));
                constraints.push(FieldConstraint::new(constraint_kinds::SCALE, scale));
                if scale == 0 { DataType::Integer } else { DataType::Float }
            }
            LogicalType::Float16 => DataType::Float,
            _ => physical_data_type(*physical_type),
        };
        return (data_type, constraints);
    }

    let data_type = match basic_info.converted_type() {
        ConvertedType::UTF8 => DataType::String,
        ConvertedType::ENUM => {
            constraints.push(logical("enum"));
            DataType::String
        }
        ConvertedType::JSON => {
            constraints.push(logical("json"));
            DataType::String
        }
        ConvertedType::BSON => DataType::Binary,
        ConvertedType::DATE => DataType::Date,
        ConvertedType::TIME_MILLIS | ConvertedType::TIME_MICROS => {
            constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "time"));
            DataType::String
        }
        ConvertedType::TIMESTAMP_MILLIS | ConvertedType::TIMESTAMP_MICROS => DataType::DateTime,
        ConvertedType::DECIMAL => {
            constraints.push(FieldConstraint::new(constraint_kinds::PRECISION, *precision));
            constraints.push(FieldConstraint::new(constraint_kinds::SCALE, *scale));
            if *scale == 0 { DataType::Integer } else { DataType::Float }
        }
        ConvertedType::UINT_8 | ConvertedType::UINT_16 | ConvertedType::UINT_32 | ConvertedType::UINT_64 => {
            constraints.push(FieldConstraint::new(constraint_kinds::MINIMUM, 0));
            DataType::Integer
        }
        ConvertedType::INTERVAL => {
            constraints.push(logical("interval"));
            DataType::Binary
        }
        _ => physical_data_type(*physical_type),
    };
    if *physical_type == PhysicalType::FIXED_LEN_BYTE_ARRAY && data_type == DataType::Binary {
        constraints.push(FieldConstraint::new(constraint_kinds::FIXED_SIZE, *type_length));
    }
    (data_type, constraints)
}

fn physical_data_type(physical: PhysicalType) -> DataType {
    match physical {
        PhysicalType::BOOLEAN => DataType::Boolean,
        PhysicalType::INT32 | PhysicalType::INT64 => DataType::Integer,
        PhysicalType::INT96 => DataType::DateTime,
        PhysicalType::FLOAT | PhysicalType::DOUBLE => DataType::Float,
        PhysicalType::BYTE_ARRAY | PhysicalType::FIXED_LEN_BYTE_ARRAY => DataType::Binary,
    }
}

impl FormatParser for ParquetParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        if is_parquet(content) {
            0.99
        } else if content.starts_with(MAGIC) {
            // head without footer: truncated or still being written
            0.5
        } else {
            0.0
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let reader = self.open(content)?;
        let metadata = reader.metadata();
        let file_metadata = metadata.file_metadata();

        let mut walker = ParquetWalker {
            fields: Vec::new(),
            max_depth: self.options.max_depth,
        };
        walker.walk_group(file_metadata.schema(), "", 0)?;

        let name = common::schema_name_from_filename(filename)
            .unwrap_or_else(|| file_metadata.schema().name().to_string());
        let mut schema = SchemaDetails::new().with_id(name.clone());
        schema.fields = walker.fields;
        schema.metadata.format = Some(FORMAT.to_string());
        schema.metadata.record_count = u64::try_from(file_metadata.num_rows()).ok();
        schema.metadata.version = Some(file_metadata.version().to_string());
        let additional = &mut schema.metadata.additional;
        additional.insert("row_groups".to_string(), json!(metadata.num_row_groups()));
        if let Some(created_by) = file_metadata.created_by() {
            additional.insert("created_by".to_string(), json!(created_by));
        }
        if let Some(pairs) = file_metadata.key_value_metadata() {
            let pairs: serde_json::Map<String, Value> = pairs
                .iter()
                .map(|kv| (kv.key.clone(), json!(kv.value)))
                .collect();
            additional.insert("key_value_metadata".to_string(), Value::Object(pairs));
        }

        match self.read_rows(&reader, self.options.max_records) {
            Ok(rows) => attach_samples(&mut schema, &rows, self.options.max_samples),
            Err(e) => warn!(error = %e, "Parquet row samples unavailable"),
        }

        schema.primary_keys = common::infer_primary_keys(&schema.fields, Some(&name));
        common::apply_primary_keys(&mut schema);
        debug!(
            fields = schema.fields.len(),
            rows = file_metadata.num_rows(),
            row_groups = metadata.num_row_groups(),
            "Extracted Parquet schema"
        );
        Ok(schema)
    }

    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let reader = self.open(content)?;
        let limit = max_records.min(self.options.max_records);
        match self.read_rows(&reader, limit) {
            Ok(rows) => Ok(rows),
            Err(e) => {
                warn!(error = %e, "Fabricating Parquet samples");
                let schema = self.parse_schema(filename, content)?;
                Ok(common::fabricate_records(&schema, limit))
            }
        }
    }
}

/// Record distinct non-null values of top-level columns as field samples
fn attach_samples(schema: &mut SchemaDetails, rows: &[Value], max_samples: usize) {
    for field in schema.fields.iter_mut().filter(|f| f.depth() == 0) {
        let mut samples: Vec<Value> = Vec::new();
        for value in rows.iter().filter_map(|row| row.get(&field.name)) {
            if samples.len() >= max_samples {
                break;
            }
            if !value.is_null() && !samples.contains(value) {
                samples.push(value.clone());
            }
        }
        if !samples.is_empty() {
            field.sample_values = Some(samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parquet::data_type::{ByteArray, ByteArrayType, Int32Type, Int64Type};
    use parquet::file::properties::WriterProperties;
    use parquet::file::writer::SerializedFileWriter;
    use parquet::schema::parser::parse_message_type;

    use super::*;

    fn write_users() -> Vec<u8> {
        let schema = Arc::new(
            parse_message_type(
                "message users {
                    REQUIRED INT64 id;
                    OPTIONAL BYTE_ARRAY email (UTF8);
                    REQUIRED INT32 signup (DATE);
                }",
            )
            .unwrap(),
        );
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer = SerializedFileWriter::new(Vec::new(), schema, props).unwrap();
        let mut row_group = writer.next_row_group().unwrap();

        let mut column = row_group.next_column().unwrap().unwrap();
        column.typed::<Int64Type>().write_batch(&[1, 2], None, None).unwrap();
        column.close().unwrap();

        let mut column = row_group.next_column().unwrap().unwrap();
        column
            .typed::<ByteArrayType>()
            .write_batch(&[ByteArray::from("a@example.com")], Some(&[1i16, 0][..]), None)
            .unwrap();
        column.close().unwrap();

        let mut column = row_group.next_column().unwrap().unwrap();
        column.typed::<Int32Type>().write_batch(&[19000, 19001], None, None).unwrap();
        column.close().unwrap();

        row_group.close().unwrap();
        writer.into_inner().unwrap()
    }

    fn write_nested() -> Vec<u8> {
        let schema = Arc::new(
            parse_message_type(
                "message orders {
                    REQUIRED BYTE_ARRAY order_id (UTF8);
                    OPTIONAL INT64 placed (TIMESTAMP(MILLIS,true));
                    REQUIRED INT64 total (DECIMAL(12,2));
                    OPTIONAL group tags (LIST) {
                        REPEATED group list {
                            OPTIONAL BYTE_ARRAY element (UTF8);
                        }
                    }
                    OPTIONAL group lines (LIST) {
                        REPEATED group list {
                            REQUIRED group element {
                                REQUIRED BYTE_ARRAY sku (UTF8);
                                REQUIRED INT32 quantity;
                            }
                        }
                    }
                    OPTIONAL group attributes (MAP) {
                        REPEATED group key_value {
                            REQUIRED BYTE_ARRAY key (UTF8);
                            OPTIONAL DOUBLE value;
                        }
                    }
                    OPTIONAL group shipping {
                        OPTIONAL BYTE_ARRAY city (UTF8);
                    }
                }",
            )
            .unwrap(),
        );
        let props = Arc::new(WriterProperties::builder().build());
        let writer = SerializedFileWriter::new(Vec::new(), schema, props).unwrap();
        writer.into_inner().unwrap()
    }

    #[test]
    fn test_flat_schema_and_rows() {
        let parser = ParquetParser::new();
        let content = write_users();
        assert_eq!(parser.can_parse(None, &content), 0.99);

        let schema = parser.parse_schema(Some("users.parquet"), &content).unwrap();
        assert_eq!(schema.schema_id(), Some("users"));
        assert_eq!(schema.metadata.record_count, Some(2));
        assert_eq!(schema.field("id").unwrap().data_type, DataType::Integer);
        assert!(!schema.field("id").unwrap().nullable);
        assert!(schema.field("email").unwrap().nullable);
        assert_eq!(schema.field("email").unwrap().data_type, DataType::String);
        assert_eq!(schema.field("signup").unwrap().data_type, DataType::Date);
        assert_eq!(schema.primary_keys, vec!["id"]);
        assert_eq!(
            schema.field("email").unwrap().sample_values,
            Some(vec![json!("a@example.com")])
        );

        let rows = parser.extract_sample_data(None, &content, 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["email"], json!("a@example.com"));
        assert_eq!(rows[1]["email"], Value::Null);
    }

    #[test]
    fn test_nested_schema() {
        let parser = ParquetParser::new();
        let schema = parser.parse_schema(None, &write_nested()).unwrap();
        assert_eq!(schema.schema_id(), Some("orders"));
        assert_eq!(schema.metadata.record_count, Some(0));

        assert_eq!(schema.field("placed").unwrap().data_type, DataType::DateTime);
        let total = schema.field("total").unwrap();
        assert_eq!(total.data_type, DataType::Float);
        assert_eq!(total.constraint(constraint_kinds::PRECISION).unwrap().value, json!(12));

        let tags = schema.field("tags").unwrap();
        assert_eq!(tags.data_type, DataType::Array);
        assert_eq!(tags.constraint(constraint_kinds::ITEMS_TYPE).unwrap().value, json!("STRING"));

        assert_eq!(
            schema.field("lines").unwrap().constraint(constraint_kinds::ITEMS_TYPE).unwrap().value,
            json!("OBJECT")
        );
        assert_eq!(schema.field("lines.items.quantity").unwrap().data_type, DataType::Integer);

        let attributes = schema.field("attributes").unwrap();
        assert_eq!(attributes.data_type, DataType::Object);
        assert_eq!(attributes.constraint(constraint_kinds::VALUE_TYPE).unwrap().value, json!("FLOAT"));
        assert!(schema.field("shipping.city").is_some());
        assert!(schema.has_unique_paths());
    }

    #[test]
    fn test_rejects_non_parquet() {
        let parser = ParquetParser::new();
        assert_eq!(parser.can_parse(None, b"id,name\n1,Alice\n"), 0.0);
        assert_eq!(parser.can_parse(None, b"PAR1 truncated"), 0.5);
        assert!(matches!(parser.parse_schema(None, b""), Err(ParseError::Empty(_))));
        assert!(matches!(
            parser.parse_schema(None, b"PAR1 not really a parquet file PAR1"),
            Err(ParseError::Syntax { .. })
        ));
    }
}
