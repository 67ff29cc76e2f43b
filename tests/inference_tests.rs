//! Type inference tests

use std::sync::Arc;

use serde_json::json;

use schema_discovery::inference::{
    EnhancementContext, InferenceConfig, InferenceResult, TypeEnhancer, TypeInferenceEngine,
};
use schema_discovery::models::{constraint_kinds, EnhancedTypeInfo};
use schema_discovery::{DataType, FieldConstraint, FieldInfo, FormatRegistry, SchemaDetails, TypePattern};

fn schema_with(fields: Vec<FieldInfo>) -> SchemaDetails {
    let mut schema = SchemaDetails::new().with_id("test");
    schema.fields = fields;
    schema
}

fn all_infos(info: &EnhancedTypeInfo) -> Vec<&EnhancedTypeInfo> {
    let mut out = vec![info];
    for child in [&info.item_type, &info.key_type, &info.value_type]
        .into_iter()
        .flatten()
    {
        out.extend(all_infos(child));
    }
    for property in info.properties.values() {
        out.extend(all_infos(property));
    }
    out
}

mod scenario_tests {
    use super::*;

    #[test]
    fn test_name_based_date_boost() {
        let field = FieldInfo::new("created_date", "created_date", DataType::String)
            .with_samples(vec![json!("2025-04-23"), json!("2025-01-15")]);
        let schema = TypeInferenceEngine::default().enhance_schema(schema_with(vec![field]));

        let info = schema.fields[0].enhanced_type.as_ref().unwrap();
        let date_alternative = info
            .alternative(DataType::Date)
            .is_some_and(|alt| alt.confidence >= 0.5);
        assert!(info.has_pattern(TypePattern::Date) || date_alternative);
        assert_eq!(info.primary_type, DataType::Date);
    }

    #[test]
    fn test_email_field() {
        let field = FieldInfo::new("contact_email", "contact_email", DataType::String)
            .with_samples(vec![json!("a@example.com"), json!("b@example.org")]);
        let schema = TypeInferenceEngine::default().enhance_schema(schema_with(vec![field]));
        let info = schema.fields[0].enhanced_type.as_ref().unwrap();
        assert!(info.has_pattern(TypePattern::Email));
        assert_eq!(info.primary_type, DataType::String);
        assert!(info.confidence.has_factor("name_type_agreement"));
    }

    #[test]
    fn test_declared_key_constraints() {
        let mut schema = schema_with(vec![
            FieldInfo::new("id", "id", DataType::Integer).with_nullable(true),
            FieldInfo::new("code", "code", DataType::String)
                .with_constraint(FieldConstraint::new(constraint_kinds::MAX_LENGTH, 3)),
        ]);
        schema.primary_keys = vec!["id".to_string()];
        let schema = TypeInferenceEngine::default().enhance_schema(schema);

        let id = schema.field("id").unwrap().enhanced_type.as_ref().unwrap();
        assert!(id.has_pattern(TypePattern::Id));
        assert!(!id.is_nullable);
        let code = schema.field("code").unwrap().enhanced_type.as_ref().unwrap();
        assert!(code.confidence.has_factor("string_constraint"));
    }
}

mod property_tests {
    use super::*;

    const RECORDS: &str = r#"[
        {"id": 1, "email": "ada@example.com", "joined": "2024-01-15", "score": 3.5,
         "tags": ["a", "b"], "address": {"city": "Berlin", "zip": "10115"}, "note": null},
        {"id": 2, "email": "grace@example.com", "joined": "2024-02-01", "score": 4,
         "tags": ["c"], "address": {"city": "Paris", "zip": "75001"}, "note": "vip"}
    ]"#;

    fn parsed() -> SchemaDetails {
        FormatRegistry::with_defaults()
            .parse_as("json", Some("people.json"), RECORDS.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_confidence_bounds() {
        let schema = TypeInferenceEngine::default().enhance_schema(parsed());
        for field in &schema.fields {
            let info = field.enhanced_type.as_ref().unwrap();
            for node in all_infos(info) {
                assert!(
                    (0.1..=1.0).contains(&node.confidence.score),
                    "{} has score {}",
                    field.path,
                    node.confidence.score
                );
            }
        }
        for score in schema.metadata.type_confidence.values() {
            assert!((0.1..=1.0).contains(score));
        }
    }

    #[test]
    fn test_paths_stay_unique() {
        let schema = TypeInferenceEngine::default().enhance_schema(parsed());
        assert!(schema.has_unique_paths());
    }

    #[test]
    fn test_nested_structure() {
        let schema = TypeInferenceEngine::default().enhance_schema(parsed());
        let tags = schema.field("tags").unwrap().enhanced_type.as_ref().unwrap();
        assert_eq!(tags.item_type.as_ref().unwrap().primary_type, DataType::String);

        let address = schema.field("address").unwrap().enhanced_type.as_ref().unwrap();
        assert!(address.properties.contains_key("city"));
        assert!(address.properties.contains_key("zip"));
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let parallel = TypeInferenceEngine::default().enhance_schema(parsed());
        let config = InferenceConfig::builder().parallel(false).build();
        let sequential = TypeInferenceEngine::new(config).enhance_schema(parsed());
        assert_eq!(parallel, sequential);
    }
}

mod enhancer_chain_tests {
    use super::*;

    /// Adds a neutral factor of its own
    struct Marker;

    impl TypeEnhancer for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn priority(&self) -> i32 {
            25
        }

        fn enhance(
            &self,
            _field: &FieldInfo,
            _ctx: &EnhancementContext<'_>,
            info: &mut EnhancedTypeInfo,
        ) -> InferenceResult<()> {
            info.confidence.add_factor("marker_seen", 0.0);
            Ok(())
        }
    }

    /// Attempts to erase the ledger
    struct Eraser;

    impl TypeEnhancer for Eraser {
        fn name(&self) -> &str {
            "eraser"
        }

        fn priority(&self) -> i32 {
            35
        }

        fn enhance(
            &self,
            _field: &FieldInfo,
            _ctx: &EnhancementContext<'_>,
            info: &mut EnhancedTypeInfo,
        ) -> InferenceResult<()> {
            info.confidence.factors.clear();
            info.primary_type = DataType::Binary;
            Ok(())
        }
    }

    #[test]
    fn test_factors_only_grow() {
        let mut engine = TypeInferenceEngine::default();
        engine.register(Arc::new(Marker));
        engine.register(Arc::new(Eraser));
        assert_eq!(
            engine.enhancer_names(),
            vec!["name_based", "pattern_based", "marker", "constraint_based", "eraser", "complex_type"]
        );

        let field = FieldInfo::new("user_id", "user_id", DataType::Integer)
            .with_samples(vec![json!(1), json!(2)]);
        let schema = schema_with(vec![field.clone()]);
        let config = InferenceConfig::default();
        let ctx = EnhancementContext::new(&schema, &config);
        let info = engine.infer_field(&field, &ctx);

        assert_eq!(info.primary_type, DataType::Integer);
        assert!(info.confidence.has_factor("declared_type"));
        assert!(info.confidence.has_factor("marker_seen"));
        assert!(info.confidence.has_factor("name_type_agreement"));
    }
}
