//! Format detection and parsing tests

use schema_discovery::formats::{AvroParser, CsvParser, FormatParser, SqlParser};
use schema_discovery::models::constraint_kinds;
use schema_discovery::{DataType, DetectionConfig, DiscoveryError, FormatRegistry};

const USER_AVRO: &str = r#"{"type":"record","name":"User","fields":[{"name":"id","type":"string"},{"name":"email","type":["null","string"]}]}"#;

const SHOP_SQL: &str = r#"
CREATE TABLE customers (
    id INT PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMP
);

CREATE TABLE orders (
    id INT PRIMARY KEY,
    customer_id INT NOT NULL REFERENCES customers(id),
    total DECIMAL(10, 2)
);
"#;

const PETSTORE: &str = r#"{
    "openapi": "3.0.0",
    "info": {"title": "Petstore", "version": "1.0"},
    "paths": {},
    "components": {"schemas": {
        "Pet": {"type": "object", "required": ["id"], "properties": {
            "id": {"type": "integer"},
            "name": {"type": "string"}
        }}
    }}
}"#;

mod avro_tests {
    use super::*;

    #[test]
    fn test_user_record() {
        let parser = AvroParser::new();
        let schema = parser.parse_schema(None, USER_AVRO.as_bytes()).unwrap();

        assert_eq!(schema.fields.len(), 2);
        assert!(!schema.field("id").unwrap().nullable);
        assert!(schema.field("email").unwrap().nullable);
        assert!(schema.primary_keys.contains(&"id".to_string()));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = AvroParser::new();
        let score = parser.can_parse(Some("user.avsc"), USER_AVRO.as_bytes());
        assert_eq!(score, parser.can_parse(Some("user.avsc"), USER_AVRO.as_bytes()));

        let a = parser.parse_schema(Some("user.avsc"), USER_AVRO.as_bytes()).unwrap();
        let b = parser.parse_schema(Some("user.avsc"), USER_AVRO.as_bytes()).unwrap();
        assert_eq!(a, b);
    }
}

mod csv_tests {
    use super::*;

    #[test]
    fn test_header_inference() {
        let parser = CsvParser::new();
        let schema = parser.parse_schema(None, b"id,name\n1,Alice\n2,Bob\n").unwrap();

        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(schema.field("id").unwrap().data_type, DataType::Integer);
        assert_eq!(schema.field("name").unwrap().data_type, DataType::String);
    }

    #[test]
    fn test_sample_records() {
        let parser = CsvParser::new();
        let records = parser
            .extract_sample_data(None, b"id,name\n1,Alice\n2,Bob\n3,Carol\n", 2)
            .unwrap();
        assert_eq!(records.len(), 2);
    }
}

mod sql_tests {
    use super::*;

    #[test]
    fn test_tables_become_entities() {
        let parser = SqlParser::new();
        let tables = parser.parse_schemas(Some("shop.sql"), SHOP_SQL.as_bytes()).unwrap();
        assert_eq!(tables.len(), 2);

        let customers = &tables[0];
        assert_eq!(customers.schema_id(), Some("customers"));
        assert!(customers.field("email").unwrap().has_constraint(constraint_kinds::UNIQUE));

        let orders = &tables[1];
        assert_eq!(orders.foreign_keys.len(), 1);
        assert_eq!(orders.foreign_keys[0].target_schema, "customers");
        assert_eq!(orders.field("total").unwrap().data_type, DataType::Float);
    }

    #[test]
    fn test_paths_are_unique() {
        let parser = SqlParser::new();
        let combined = parser.parse_schema(Some("shop.sql"), SHOP_SQL.as_bytes()).unwrap();
        assert!(combined.has_unique_paths());
        assert!(combined.field("orders.customer_id").is_some());
    }
}

mod registry_tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        let registry = FormatRegistry::with_defaults();
        let cases: [(&str, &[u8], &str); 4] = [
            ("user.avsc", USER_AVRO.as_bytes(), "avro"),
            ("people.csv", b"id,name\n1,Alice\n", "csv"),
            ("shop.sql", SHOP_SQL.as_bytes(), "sql"),
            ("events.proto", b"syntax = \"proto3\";\nmessage Event { string id = 1; }\n", "protobuf"),
        ];
        for (filename, content, expected) in cases {
            let result = registry.detect_format(Some(filename), content).unwrap();
            assert_eq!(result.format_id.as_deref(), Some(expected), "{filename}");
            assert!(result.confidence >= 0.7);
        }
    }

    #[test]
    fn test_shared_extension_uses_content() {
        let registry = FormatRegistry::with_defaults();
        let result = registry.detect_format(Some("api.json"), PETSTORE.as_bytes()).unwrap();
        assert_eq!(result.format_id.as_deref(), Some("openapi"));

        let result = registry
            .detect_format(Some("users.json"), br#"[{"id": 1}, {"id": 2}]"#)
            .unwrap();
        assert_eq!(result.format_id.as_deref(), Some("json"));
    }

    #[test]
    fn test_detection_attaches_samples() {
        let registry = FormatRegistry::with_defaults();
        let result = registry
            .detect_format(Some("people.csv"), b"id,name\n1,Alice\n2,Bob\n")
            .unwrap();
        assert_eq!(result.sample_data.as_ref().map(Vec::len), Some(2));
        assert!(result.schema_preview.is_none());
    }

    #[test]
    fn test_schema_preview_from_config() {
        let config = DetectionConfig {
            include_schema_preview: true,
            sample_records: 0,
            ..DetectionConfig::default()
        };
        let registry = FormatRegistry::from_config(&config);
        let result = registry
            .detect_format(Some("people.csv"), b"id,name\n1,Alice\n")
            .unwrap();
        assert!(result.sample_data.is_none());
        assert_eq!(result.schema_preview.unwrap().fields.len(), 2);
    }

    #[test]
    fn test_parse_entities() {
        let registry = FormatRegistry::with_defaults();
        let (format, schemas) = registry.parse_entities(Some("api.json"), PETSTORE.as_bytes()).unwrap();
        assert_eq!(format, "openapi");
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].schema_id(), Some("Pet"));
    }

    #[test]
    fn test_unrecognized_content() {
        let registry = FormatRegistry::with_defaults();
        let err = registry.parse(Some("blob.bin"), &[0u8, 159, 146, 150]).unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownFormat { .. }));
    }
}
