//! SQL DDL (CREATE TABLE, ALTER TABLE, CREATE INDEX)

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, CreateIndex, CreateTable, Ident, ObjectName,
    Statement, TableConstraint,
};
use sqlparser::dialect::{Dialect, GenericDialect, dialect_from_str};
use sqlparser::parser::Parser;
use tracing::{debug, warn};

use super::common;
use super::{FormatParser, ParseError, ParseResult, ParserOptions};
use crate::models::{
    DataType, FieldConstraint, FieldInfo, ForeignKeyDefinition, FormatCapabilities, FormatInfo,
    IndexDefinition, SchemaDetails, constraint_kinds,
};

const FORMAT: &str = "sql";

const DDL_KEYWORDS: &[&str] = &[
    "create",
    "table",
    "primary key",
    "foreign key",
    "references",
    "not null",
    "unique",
    "default",
    "constraint",
    "index",
    "alter",
    "varchar",
    "integer",
];

static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bcreate\s+(or\s+replace\s+)?((global|local)\s+)?(temp|temporary\s+)?\s*table\b")
        .unwrap()
});
static OTHER_DDL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(alter\s+table|create\s+(unique\s+)?index)\b").unwrap());
static TYPE_ARGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)").unwrap());
static ENUM_VALUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'((?:[^']|'')*)'").unwrap());

/// Parser for relational DDL scripts
pub struct SqlParser {
    info: FormatInfo,
    options: ParserOptions,
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        let info = FormatInfo::new(FORMAT, "SQL DDL", "Relational table definitions")
            .mime_types(&["application/sql", "text/x-sql"])
            .extensions(&["sql", "ddl"])
            .capabilities(FormatCapabilities::schema_language().with_relationships())
            .examples(&["CREATE TABLE users (id INTEGER PRIMARY KEY, email VARCHAR(255) NOT NULL);"])
            .schema_type("ddl");
        Self { info, options }
    }

    fn dialect(&self) -> Box<dyn Dialect> {
        dialect_from_str(&self.options.sql_dialect).unwrap_or_else(|| {
            warn!(dialect = %self.options.sql_dialect, "Unknown SQL dialect, using generic");
            Box::new(GenericDialect {})
        })
    }

    /// Parse every statement, falling back to one statement at a time
    ///
    /// Returns the statements that parsed plus the number that were skipped.
    fn statements(&self, text: &str) -> ParseResult<(Vec<Statement>, usize)> {
        let dialect = self.dialect();
        match Parser::parse_sql(dialect.as_ref(), text) {
            Ok(statements) => Ok((statements, 0)),
            Err(whole_err) => {
                debug!(error = %whole_err, "Script did not parse, recovering per statement");
                let mut statements = Vec::new();
                let mut skipped = 0;
                for chunk in text.split(';').map(str::trim).filter(|c| !c.is_empty()) {
                    match Parser::parse_sql(dialect.as_ref(), chunk) {
                        Ok(parsed) => statements.extend(parsed),
                        Err(e) => {
                            debug!(error = %e, "Skipping unparseable statement");
                            skipped += 1;
                        }
                    }
                }
                if statements.is_empty() {
                    return Err(ParseError::syntax(FORMAT, whole_err));
                }
                Ok((statements, skipped))
            }
        }
    }

    fn tables(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        let text = common::decode_text(content)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty(FORMAT.to_string()));
        }
        let (statements, skipped) = self.statements(&text)?;

        let mut tables: Vec<SchemaDetails> = Vec::new();
        for statement in &statements {
            match statement {
                Statement::CreateTable(create) => {
                    if find_table(&mut tables, &create.name).is_some() {
                        warn!(table = %create.name, "Duplicate CREATE TABLE, keeping the first definition");
                        continue;
                    }
                    tables.push(table_schema(create));
                }
                Statement::AlterTable {
                    name, operations, ..
                } => {
                    let Some(table) = find_table(&mut tables, name) else {
                        debug!(table = %name, "ALTER TABLE on unknown table");
                        continue;
                    };
                    for operation in operations {
                        if let AlterTableOperation::AddConstraint(constraint) = operation {
                            apply_table_constraint(table, constraint);
                        }
                    }
                }
                Statement::CreateIndex(index) => apply_index(&mut tables, index),
                _ => {}
            }
        }
        if tables.is_empty() {
            return Err(ParseError::unsupported(FORMAT, "no CREATE TABLE statements found"));
        }

        for table in &mut tables {
            common::apply_primary_keys(table);
            if let Some(source) = filename {
                table
                    .metadata
                    .additional
                    .insert("source_file".to_string(), json!(source));
            }
            if skipped > 0 {
                table
                    .metadata
                    .additional
                    .insert("skipped_statements".to_string(), json!(skipped));
            }
        }
        debug!(tables = tables.len(), skipped, "Extracted SQL tables");
        Ok(tables)
    }
}

fn ident(ident: &Ident) -> String {
    ident.value.clone()
}

/// Unqualified table name
fn table_name(name: &ObjectName) -> String {
    name.0.last().map(ident).unwrap_or_default()
}

fn find_table<'a>(tables: &'a mut [SchemaDetails], name: &ObjectName) -> Option<&'a mut SchemaDetails> {
    let wanted = table_name(name);
    tables
        .iter_mut()
        .find(|t| t.schema_id().is_some_and(|id| id.eq_ignore_ascii_case(&wanted)))
}

fn table_schema(create: &CreateTable) -> SchemaDetails {
    let name = table_name(&create.name);
    let mut schema = SchemaDetails::new().with_id(name.clone());
    schema.metadata.format = Some(FORMAT.to_string());
    if create.name.0.len() > 1 {
        let qualifier: Vec<String> = create.name.0[..create.name.0.len() - 1].iter().map(ident).collect();
        schema.metadata.namespace = Some(qualifier.join("."));
    }

    for column in &create.columns {
        let (field, primary, unique, foreign) = column_field(column);
        if schema.field(&field.path).is_some() {
            warn!(table = %name, column = %field.path, "Duplicate column, keeping the first definition");
            continue;
        }
        if primary && !schema.primary_keys.contains(&field.path) {
            schema.primary_keys.push(field.path.clone());
        }
        if unique {
            schema.unique_constraints.push(vec![field.path.clone()]);
        }
        if let Some(fk) = foreign {
            schema.foreign_keys.push(fk);
        }
        schema.fields.push(field);
    }
    for constraint in &create.constraints {
        apply_table_constraint(&mut schema, constraint);
    }
    schema
}

/// Field for a column plus its inline primary key, unique and foreign key options
fn column_field(column: &ColumnDef) -> (FieldInfo, bool, bool, Option<ForeignKeyDefinition>) {
    let name = ident(&column.name);
    let sql_type = column.data_type.to_string();
    let (data_type, constraints) = map_sql_type(&sql_type);

    let mut field = FieldInfo::new(name.clone(), name.clone(), data_type)
        .with_metadata("sql_type", sql_type.as_str());
    for constraint in constraints {
        field.add_constraint(constraint);
    }

    let mut primary = false;
    let mut unique = false;
    let mut foreign = None;
    for option in &column.options {
        match &option.option {
            ColumnOption::NotNull => {
                field.nullable = false;
                field.add_constraint(FieldConstraint::flag(constraint_kinds::NOT_NULL));
            }
            ColumnOption::Null => field.nullable = true,
            ColumnOption::Default(expr) => {
                field.add_constraint(FieldConstraint::new(
                    constraint_kinds::DEFAULT,
                    default_value(&expr.to_string()),
                ));
            }
            ColumnOption::Unique { is_primary, .. } => {
                if *is_primary {
                    primary = true;
                    field.nullable = false;
                } else {
                    unique = true;
                    field.add_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE));
                }
            }
            ColumnOption::ForeignKey {
                foreign_table,
                referred_columns,
                on_delete,
                on_update,
                ..
            } => {
                let mut fk = ForeignKeyDefinition::new(
                    vec![name.clone()],
                    table_name(foreign_table),
                    referred_columns.iter().map(ident).collect(),
                );
                fk.name = option.name.as_ref().map(ident);
                fk.on_delete = on_delete.as_ref().map(ToString::to_string);
                fk.on_update = on_update.as_ref().map(ToString::to_string);
                foreign = Some(fk);
            }
            ColumnOption::Comment(comment) => field.description = Some(comment.clone()),
            _ => {}
        }
    }
    (field, primary, unique, foreign)
}

fn apply_table_constraint(schema: &mut SchemaDetails, constraint: &TableConstraint) {
    match constraint {
        TableConstraint::PrimaryKey { columns, .. } => {
            schema.primary_keys = columns.iter().map(ident).collect();
        }
        TableConstraint::Unique { columns, name, .. } => {
            let fields: Vec<String> = columns.iter().map(ident).collect();
            if let [single] = fields.as_slice()
                && let Some(field) = schema.field_mut(single)
            {
                field.add_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE));
            }
            if !schema.unique_constraints.contains(&fields) {
                schema.unique_constraints.push(fields.clone());
            }
            if let Some(name) = name {
                schema.indices.push(IndexDefinition {
                    name: Some(ident(name)),
                    fields,
                    unique: true,
                });
            }
        }
        TableConstraint::ForeignKey {
            name,
            columns,
            foreign_table,
            referred_columns,
            on_delete,
            on_update,
            ..
        } => {
            let mut fk = ForeignKeyDefinition::new(
                columns.iter().map(ident).collect(),
                table_name(foreign_table),
                referred_columns.iter().map(ident).collect(),
            );
            fk.name = name.as_ref().map(ident);
            fk.on_delete = on_delete.as_ref().map(ToString::to_string);
            fk.on_update = on_update.as_ref().map(ToString::to_string);
            schema.foreign_keys.push(fk);
        }
        TableConstraint::Index { name, columns, .. } => {
            schema.indices.push(IndexDefinition {
                name: name.as_ref().map(ident),
                fields: columns.iter().map(ident).collect(),
                unique: false,
            });
        }
        _ => {}
    }
}

fn apply_index(tables: &mut [SchemaDetails], index: &CreateIndex) {
    let Some(table) = find_table(tables, &index.table_name) else {
        debug!(table = %index.table_name, "CREATE INDEX on unknown table");
        return;
    };
    let fields: Vec<String> = index
        .columns
        .iter()
        .map(|c| c.expr.to_string().trim_matches(['"', '`']).to_string())
        .collect();
    if index.unique {
        if let [single] = fields.as_slice()
            && let Some(field) = table.field_mut(single)
        {
            field.add_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE));
        }
        if !table.unique_constraints.contains(&fields) {
            table.unique_constraints.push(fields.clone());
        }
    }
    table.indices.push(IndexDefinition {
        name: index.name.as_ref().map(table_name),
        fields,
        unique: index.unique,
    });
}

/// Column default as JSON: numbers and booleans typed, quotes stripped
fn default_value(expr: &str) -> Value {
    let trimmed = expr.trim();
    if let Some(inner) = trimmed.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return json!(inner.replace("''", "'"));
    }
    match common::infer_scalar(trimmed) {
        (DataType::Integer | DataType::Float | DataType::Boolean, value) => value,
        _ => json!(trimmed),
    }
}

/// Map a SQL column type to a data type plus size/format constraints
pub fn map_sql_type(sql_type: &str) -> (DataType, Vec<FieldConstraint>) {
    let upper = sql_type.trim().to_uppercase();
    let base = upper
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    let args = TYPE_ARGS.captures(&upper).map(|c| {
        let first = c.get(1).and_then(|m| m.as_str().parse::<u64>().ok());
        let second = c.get(2).and_then(|m| m.as_str().parse::<u64>().ok());
        (first, second)
    });
    let mut constraints = Vec::new();

    if upper.ends_with("[]") || base == "ARRAY" || upper.starts_with("ARRAY<") {
        let item = upper.trim_end_matches("[]");
        let (item_type, _) = if base == "ARRAY" || upper.starts_with("ARRAY<") {
            let inner = upper
                .trim_start_matches("ARRAY")
                .trim_matches(['<', '>', '(', ')']);
            map_sql_type(inner)
        } else {
            map_sql_type(item)
        };
        constraints.push(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, item_type.as_str()));
        return (DataType::Array, constraints);
    }

    let data_type = match base {
        "INT" | "INTEGER" | "INT2" | "INT4" | "INT8" | "BIGINT" | "SMALLINT" | "TINYINT"
        | "MEDIUMINT" | "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" | "UNSIGNED" => DataType::Integer,
        "DECIMAL" | "NUMERIC" | "NUMBER" | "DEC" => {
            if let Some((Some(precision), scale)) = args {
                constraints.push(FieldConstraint::new(constraint_kinds::PRECISION, precision));
                if let Some(scale) = scale {
                    constraints.push(FieldConstraint::new(constraint_kinds::SCALE, scale));
                }
                if scale == Some(0) {
                    return (DataType::Integer, constraints);
                }
            }
            DataType::Float
        }
        "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "MONEY" => DataType::Float,
        "BOOL" | "BOOLEAN" | "BIT" => DataType::Boolean,
        "DATE" => DataType::Date,
        "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" | "DATETIME2" | "SMALLDATETIME" => DataType::DateTime,
        "TIME" | "TIMETZ" => {
            constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "time"));
            DataType::String
        }
        "UUID" | "UNIQUEIDENTIFIER" => DataType::Uuid,
        "JSON" | "JSONB" | "STRUCT" | "OBJECT" | "VARIANT" => DataType::Object,
        "BYTEA" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            DataType::Binary
        }
        "ENUM" => {
            let values: Vec<Value> = ENUM_VALUE
                .captures_iter(sql_type)
                .map(|c| json!(c[1].replace("''", "'")))
                .collect();
            if !values.is_empty() {
                constraints.push(FieldConstraint::new(constraint_kinds::ENUM, values));
            }
            DataType::Enum
        }
        "CHAR" | "CHARACTER" | "VARCHAR" | "NVARCHAR" | "NCHAR" | "VARCHAR2" | "STRING" => {
            if let Some((Some(length), _)) = args {
                constraints.push(FieldConstraint::new(constraint_kinds::MAX_LENGTH, length));
            }
            DataType::String
        }
        "TEXT" | "CLOB" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "CITEXT" | "XML" => DataType::String,
        "INET" | "CIDR" => {
            constraints.push(FieldConstraint::new(constraint_kinds::FORMAT, "ipv4"));
            DataType::String
        }
        "INTERVAL" => DataType::String,
        _ => DataType::Unknown,
    };
    (data_type, constraints)
}

impl FormatParser for SqlParser {
    fn format_info(&self) -> &FormatInfo {
        &self.info
    }

    fn can_parse(&self, _filename: Option<&str>, content: &[u8]) -> f64 {
        let Some(text) = common::sniff_text(content) else {
            return 0.0;
        };
        let trimmed = text.trim_start();
        if trimmed.starts_with(['{', '[', '<']) {
            return 0.0;
        }
        let density = common::keyword_density(&text, DDL_KEYWORDS);
        if CREATE_TABLE.is_match(&text) {
            (0.75 + 0.2 * density).min(0.95)
        } else if OTHER_DDL.is_match(&text) {
            (0.5 + 0.2 * density).min(0.7)
        } else {
            0.0
        }
    }

    fn parse_schema(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<SchemaDetails> {
        let tables = self.tables(filename, content)?;
        let mut schema = common::combine_entities(tables, FORMAT);
        if schema.schema_id().is_none()
            && let Some(name) = common::schema_name_from_filename(filename)
        {
            schema = schema.with_id(name);
        }
        Ok(schema)
    }

    fn parse_schemas(&self, filename: Option<&str>, content: &[u8]) -> ParseResult<Vec<SchemaDetails>> {
        self.tables(filename, content)
    }

    fn extract_sample_data(
        &self,
        filename: Option<&str>,
        content: &[u8],
        max_records: usize,
    ) -> ParseResult<Vec<Value>> {
        let tables = self.tables(filename, content)?;
        Ok(common::fabricate_entity_records(&tables, max_records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOG: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    status VARCHAR(20) DEFAULT 'active',
    created_at TIMESTAMP
);

CREATE TABLE posts (
    id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    title TEXT,
    price DECIMAL(10, 2),
    PRIMARY KEY (id),
    CONSTRAINT fk_posts_user FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX idx_posts_title ON posts (title);
"#;

    #[test]
    fn test_tables_and_keys() {
        let parser = SqlParser::new();
        let tables = parser.parse_schemas(Some("blog.sql"), BLOG.as_bytes()).unwrap();
        assert_eq!(tables.len(), 2);

        let users = &tables[0];
        assert_eq!(users.schema_id(), Some("users"));
        assert_eq!(users.primary_keys, vec!["id"]);
        let email = users.field("email").unwrap();
        assert!(!email.nullable);
        assert!(email.has_constraint(constraint_kinds::UNIQUE));
        assert_eq!(
            email.constraint(constraint_kinds::MAX_LENGTH).unwrap().value,
            json!(255)
        );
        assert_eq!(
            users.field("status").unwrap().constraint(constraint_kinds::DEFAULT).unwrap().value,
            json!("active")
        );
        assert_eq!(users.field("created_at").unwrap().data_type, DataType::DateTime);

        let posts = &tables[1];
        assert_eq!(posts.primary_keys, vec!["id"]);
        assert_eq!(posts.foreign_keys.len(), 1);
        let fk = &posts.foreign_keys[0];
        assert_eq!(fk.source_fields, vec!["user_id"]);
        assert_eq!(fk.target_schema, "users");
        assert_eq!(fk.target_fields, vec!["id"]);
        assert_eq!(fk.name.as_deref(), Some("fk_posts_user"));
        assert_eq!(fk.on_delete.as_deref(), Some("CASCADE"));
        assert_eq!(posts.indices.len(), 1);
        assert_eq!(posts.field("price").unwrap().data_type, DataType::Float);
    }

    #[test]
    fn test_combined_schema_prefixes_paths() {
        let parser = SqlParser::new();
        let schema = parser.parse_schema(Some("blog.sql"), BLOG.as_bytes()).unwrap();
        assert!(schema.field("users.email").is_some());
        assert!(schema.field("posts.user_id").is_some());
        assert!(schema.has_unique_paths());
        assert!(schema.primary_keys.contains(&"users.id".to_string()));
    }

    #[test]
    fn test_alter_table_adds_constraint() {
        let sql = "CREATE TABLE a (id INT PRIMARY KEY);\n\
                   CREATE TABLE b (id INT PRIMARY KEY, a_id INT);\n\
                   ALTER TABLE b ADD CONSTRAINT fk_b_a FOREIGN KEY (a_id) REFERENCES a (id);";
        let tables = SqlParser::new().parse_schemas(None, sql.as_bytes()).unwrap();
        assert_eq!(tables[1].foreign_keys.len(), 1);
        assert_eq!(tables[1].foreign_keys[0].target_schema, "a");
    }

    #[test]
    fn test_statement_recovery() {
        let sql = "CREATE TABLE ok (id INT PRIMARY KEY);\nTHIS IS NOT SQL;\nCREATE TABLE fine (name TEXT);";
        let tables = SqlParser::new().parse_schemas(None, sql.as_bytes()).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].metadata.additional["skipped_statements"], json!(1));
    }

    #[test]
    fn test_duplicate_columns_keep_first() {
        let parser = SqlParser::new();
        let sql = "CREATE TABLE t (a INT, a TEXT, b INT);\nCREATE TABLE t (c INT);";
        let tables = parser.parse_schemas(None, sql.as_bytes()).unwrap();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].has_unique_paths());
        let paths: Vec<&str> = tables[0].fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
        assert_eq!(tables[0].field("a").unwrap().data_type, DataType::Integer);

        let combined = parser.parse_schema(None, sql.as_bytes()).unwrap();
        assert!(combined.has_unique_paths());
    }

    #[test]
    fn test_errors() {
        let parser = SqlParser::new();
        assert!(matches!(parser.parse_schema(None, b""), Err(ParseError::Empty(_))));
        assert!(matches!(
            parser.parse_schema(None, b"SELECT 1;"),
            Err(ParseError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(map_sql_type("BIGINT").0, DataType::Integer);
        assert_eq!(map_sql_type("NUMERIC(10,0)").0, DataType::Integer);
        assert_eq!(map_sql_type("BOOLEAN").0, DataType::Boolean);
        assert_eq!(map_sql_type("UUID").0, DataType::Uuid);
        assert_eq!(map_sql_type("INTEGER[]").0, DataType::Array);
        assert_eq!(map_sql_type("BYTEA").0, DataType::Binary);
        let (t, c) = map_sql_type("ENUM('a','b')");
        assert_eq!(t, DataType::Enum);
        assert_eq!(c[0].value, json!(["a", "b"]));
    }

    #[test]
    fn test_can_parse() {
        let parser = SqlParser::new();
        assert!(parser.can_parse(None, BLOG.as_bytes()) >= 0.8);
        assert_eq!(parser.can_parse(None, b"id,name\n1,a\n"), 0.0);
    }

    #[test]
    fn test_samples_round_robin() {
        let samples = SqlParser::new()
            .extract_sample_data(None, BLOG.as_bytes(), 3)
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples[0].get("email").is_some());
        assert!(samples[1].get("user_id").is_some());
    }
}
