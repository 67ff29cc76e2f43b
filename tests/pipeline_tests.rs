//! End-to-end discovery pipeline tests

use schema_discovery::{
    DiscoveryConfig, DiscoveryError, RelationshipType, SchemaDiscovery, SourceFile,
};

const SHOP_SQL: &str = r#"
CREATE TABLE customers (
    id INT PRIMARY KEY,
    email VARCHAR(255) NOT NULL UNIQUE
);

CREATE TABLE orders (
    id INT PRIMARY KEY,
    customer_id INT NOT NULL REFERENCES customers(id),
    placed_at TIMESTAMP
);
"#;

const PAYMENTS_CSV: &str = "id,order_id,amount\n1,10,19.99\n2,11,5.00\n3,10,7.50\n";

fn inputs() -> Vec<SourceFile> {
    vec![
        SourceFile::new("shop.sql", SHOP_SQL),
        SourceFile::new("payments.csv", PAYMENTS_CSV),
    ]
}

mod discovery_tests {
    use super::*;

    #[test]
    fn test_mixed_formats() {
        let discovery = SchemaDiscovery::new(DiscoveryConfig::default()).unwrap();
        let report = discovery.discover(&inputs()).unwrap();

        assert_eq!(report.files.len(), 2);
        assert!(report.files.iter().all(|f| f.is_success()));
        assert_eq!(report.files[0].format.as_deref(), Some("sql"));
        assert_eq!(report.files[0].schema_count, 2);
        assert_eq!(report.files[1].format.as_deref(), Some("csv"));

        assert!(report.schema("customers").is_some());
        assert!(report.schema("orders").is_some());
        let payments = report.schema("payments").unwrap();
        assert!(payments.fields.iter().all(|f| f.enhanced_type.is_some()));

        let store = report.relationships.as_ref().unwrap();
        let declared = store.between("orders", "customers").unwrap();
        assert_eq!(declared.relationship_type, RelationshipType::ManyToOne);
        let inferred = store.between("payments", "orders").unwrap();
        assert!(inferred.metadata.detection_methods.contains(&"name_based".to_string()));
        assert_eq!(store.metadata.schema_count, 3);
    }

    #[test]
    fn test_failed_file_does_not_abort() {
        let discovery = SchemaDiscovery::new(DiscoveryConfig::default()).unwrap();
        let mut files = inputs();
        files.push(SourceFile::new("broken.avsc", r#"{"type": "record""#));
        let report = discovery.discover(&files).unwrap();

        let failed: Vec<&str> = report.failed_files().map(|f| f.filename.as_str()).collect();
        assert_eq!(failed, vec!["broken.avsc"]);
        assert!(report.schema("broken").is_none());
        assert!(report.relationship_count() >= 2);
    }

    #[test]
    fn test_keep_failed_files() {
        let config = DiscoveryConfig {
            keep_failed_files: true,
            ..DiscoveryConfig::default()
        };
        let discovery = SchemaDiscovery::new(config).unwrap();
        let mut files = inputs();
        files.push(SourceFile::new("broken.avsc", r#"{"type": "record""#));
        let report = discovery.discover(&files).unwrap();

        let broken = report.schema("broken").unwrap();
        assert!(broken.has_error());
        let store = report.relationships.as_ref().unwrap();
        assert_eq!(store.metadata.schema_count, 3);
        assert!(store.for_schema("broken").next().is_none());
    }

    #[test]
    fn test_empty_input() {
        let discovery = SchemaDiscovery::new(DiscoveryConfig::default()).unwrap();
        let report = discovery.discover(&[]).unwrap();
        assert!(report.schemas.is_empty());
        assert!(report.relationships.is_none());
        assert_eq!(report.relationship_count(), 0);
    }
}

mod config_tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let config = DiscoveryConfig::from_toml_str(
            r#"
            keep_failed_files = true

            [detection]
            sample_records = 2

            [relationships]
            confidence_threshold = 0.95
            "#,
        )
        .unwrap();
        assert!(config.keep_failed_files);
        assert_eq!(config.detection.sample_records, 2);

        let report = SchemaDiscovery::new(config).unwrap().discover(&inputs()).unwrap();
        let store = report.relationships.as_ref().unwrap();
        assert!(store.relationships.iter().all(|r| r.confidence.score >= 0.95));
    }

    #[test]
    fn test_config_from_file() {
        let path = std::env::temp_dir().join(format!(
            "schema-discovery-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "detection:\n  sql_dialect: postgres\n").unwrap();
        let config = DiscoveryConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.unwrap().detection.sql_dialect, "postgres");
    }

    #[test]
    fn test_invalid_config_file() {
        let config = DiscoveryConfig::from_toml_str("[relationships]\nmin_similarity = 2.0\n").unwrap();
        let err = SchemaDiscovery::new(config).unwrap_err();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }

    #[test]
    fn test_missing_source_file() {
        let err = SourceFile::from_path("/nonexistent/schema-discovery/input.csv").unwrap_err();
        assert!(matches!(err, DiscoveryError::Io(_)));
    }
}
