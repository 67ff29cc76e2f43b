//! Delimited text (CSV/TSV)

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::common;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{DataType, FieldInfo, FormatCapabilities, FormatInfo, SchemaDetails};

const FORMAT: &str = "csv";
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];
const SNIFF_LINES: usize = 20;

static HEADER_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_ .\-()#/]*$").unwrap());

/// Parser for delimited text files
pub struct CsvParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows of a delimited file with its detected layout
#[derive(Debug, Clone)]
pub struct CsvTable {
    pub delimiter: u8,
    pub has_header: bool,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "CSV", "Comma or tab separated values")
            .mime_types(&["text/csv", "text/tab-separated-values"])
            .extensions(&["csv", "tsv"])
            .capabilities(FormatCapabilities::data().with_streaming())
            .examples(&["id,name\n1,Alice\n2,Bob\n"])
            .schema_type("data");
        Self { info, options }
    }

    /// Read the table: sniff the delimiter, detect the header, collect rows
    pub fn read_table(&self, filename: Option<&str>, text: &str) -> ParseResult<CsvTable> {
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let delimiter = match common::file_extension(filename).as_deref() {
            Some("tsv") => b'\t',
            _ => sniff_delimiter(text).map(|(d, _)| d).unwrap_or(b','),
        };

        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut raw: Vec<Vec<String>> = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ParseError::syntax(FORMAT, e))?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            raw.push(record.iter().map(str::to_string).collect());
            // header row plus the record limit
            if raw.len() > self.options.max_records {
                break;
            }
        }
        if raw.is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }

        let has_header = detect_header(&raw);
        let width = raw.iter().map(Vec::len).max().unwrap_or(0);
        let (headers, rows) = if has_header {
            let mut rows = raw;
            let header = rows.remove(0);
            (normalize_headers(&header, width), rows)
        } else {
            let headers = (1..=width).map(|i| format!("column_{i}")).collect();
            (headers, raw)
        };

        Ok(CsvTable {
            delimiter,
            has_header,
            headers,
            rows,
        })
    }
}

/// Delimiter giving a consistent column count of at least two, with that count
fn sniff_delimiter(text: &str) -> Option<(u8, usize)> {
    let sample: String = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut best: Option<(u8, usize, usize)> = None;
    for delimiter in CANDIDATE_DELIMITERS {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(sample.as_bytes());
        let counts: Vec<usize> = reader
            .records()
            .filter_map(Result::ok)
            .map(|r| r.len())
            .collect();
        let Some(&first) = counts.first() else {
            continue;
        };
        if first < 2 || counts.iter().any(|c| *c != first) {
            continue;
        }
        // Prefer more rows agreeing, then more columns
        let better = best.is_none_or(|(_, rows, cols)| (counts.len(), first) > (rows, cols));
        if better {
            best = Some((delimiter, counts.len(), first));
        }
    }
    best.map(|(d, _, cols)| (d, cols))
}

/// First row is a header when its cells look like names and differ from the data below
fn detect_header(rows: &[Vec<String>]) -> bool {
    let Some(first) = rows.first() else {
        return false;
    };
    let names_ok = first.iter().all(|c| HEADER_CELL.is_match(c))
        && first.iter().collect::<HashSet<_>>().len() == first.len();
    if !names_ok {
        return false;
    }
    if rows.len() == 1 {
        return true;
    }
    let first_types: Vec<DataType> = first.iter().map(|c| common::infer_scalar(c).0).collect();
    let data_has_typed = rows[1..].iter().any(|row| {
        row.iter().enumerate().any(|(i, cell)| {
            let t = common::infer_scalar(cell).0;
            !matches!(t, DataType::String | DataType::Null)
                && first_types.get(i).is_some_and(|ft| *ft == DataType::String)
        })
    });
    // All-text tables: trust name-like, distinct cells that never repeat below
    data_has_typed
        || rows[1..]
            .iter()
            .all(|row| row.iter().zip(first).all(|(cell, head)| cell != head))
}

fn normalize_headers(header: &[String], width: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    (0..width)
        .map(|i| {
            let base = header
                .get(i)
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| format!("column_{}", i + 1));
            let mut name = base.clone();
            let mut n = 2;
            while !seen.insert(name.clone()) {
                name = format!("{base}_{n}");
                n += 1;
            }
            name
        })
        .collect()
}

impl CsvTable {
    /// One JSON object per row with typed cell values
    pub fn records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut object = Map::new();
                for (i, name) in self.headers.iter().enumerate() {
                    let value = row
                        .get(i)
                        .map(|cell| common::infer_scalar(cell).1)
                        .unwrap_or(Value::Null);
                    object.insert(name.clone(), value);
                }
                Value::Object(object)
            })
            .collect()
    }
}

impl FormatParser for CsvParser {
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
        let lines = trimmed.lines().filter(|l| !l.trim().is_empty()).count();
        match sniff_delimiter(trimmed) {
            Some(_) if lines >= 2 => 0.85,
            Some(_) => 0.4,
            None => 0.0,
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let text = common::decode_text(content)?;
        let table = self.read_table(filename, &text)?;

        let mut fields = Vec::with_capacity(table.headers.len());
        for (i, name) in table.headers.iter().enumerate() {
            let mut data_type = DataType::Null;
            let mut nullable = false;
            let mut samples: Vec<Value> = Vec::new();
            for row in &table.rows {
                let (t, value) = row
                    .get(i)
                    .map(|cell| common::infer_scalar(cell))
                    .unwrap_or((DataType::Null, Value::Null));
                if t == DataType::Null {
                    nullable = true;
                    continue;
                }
                data_type = data_type.merge(t);
                if samples.len() < self.options.max_samples && !samples.contains(&value) {
                    samples.push(value);
                }
            }
            if data_type == DataType::Null {
                data_type = DataType::String;
                nullable = true;
            }
            // Widened columns keep text samples
            if data_type == DataType::String {
                samples = samples
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Value::String(s),
                        other => Value::String(other.to_string()),
                    })
                    .collect();
            }
            fields.push(
                FieldInfo::new(name.clone(), name.clone(), data_type)
                    .with_nullable(nullable)
                    .with_samples(samples)
                    .with_metadata("column_index", i),
            );
        }

        let name = common::schema_name_from_filename(filename);
        let mut schema = SchemaDetails::new();
        schema.fields = fields;
        schema.primary_keys = common::infer_primary_keys(&schema.fields, name.as_deref());
        common::apply_primary_keys(&mut schema);
        schema.metadata.name = name.clone();
        schema.metadata.schema_id = name;
        schema.metadata.format = Some(FORMAT.to_string());
        schema.metadata.record_count = Some(table.rows.len() as u64);
        schema.metadata.additional.insert(
            "delimiter".to_string(),
            json!((table.delimiter as char).to_string()),
        );
        schema
            .metadata
            .additional
            .insert("has_header".to_string(), json!(table.has_header));

        debug!(
            columns = schema.fields.len(),
            rows = table.rows.len(),
            has_header = table.has_header,
            "Extracted CSV schema"
        );
        Ok(schema)
    }

    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let text = common::decode_text(content)?;
        let table = self.read_table(filename, &text)?;
        let mut records = table.records();
        records.truncate(max_records);
        Ok(records)
    }
}
