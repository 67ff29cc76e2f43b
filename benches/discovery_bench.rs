//! Benchmarks for format detection, type inference and relationship detection
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use schema_discovery::{
    DataType, DetectionOptions, FieldInfo, ForeignKeyDefinition, FormatRegistry,
    RelationshipDetectionEngine, SchemaDetails, TypeInferenceEngine,
};

/// Generate a JSON array of sample records
fn generate_json_records(count: usize) -> String {
    let records: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"id": {}, "email": "user{}@example.com", "name": "User {}", "created_at": "2024-01-15T10:30:00Z", "balance": {}, "is_active": {}, "tags": ["a", "b"]}}"#,
                i,
                i,
                i,
                1000.0 + (i as f64 * 10.5),
                i % 2 == 0
            )
        })
        .collect();
    format!("[{}]", records.join(","))
}

/// Generate `count` schemas, each referencing its predecessor
fn generate_schemas(count: usize) -> Vec<SchemaDetails> {
    (0..count)
        .map(|i| {
            let mut schema = SchemaDetails::new().with_id(format!("entity_{i}"));
            schema.fields.push(FieldInfo::new("id", "id", DataType::Integer));
            schema.fields.push(FieldInfo::new("label", "label", DataType::String));
            schema.fields.push(FieldInfo::new("amount", "amount", DataType::Float));
            schema.primary_keys = vec!["id".to_string()];
            if i > 0 {
                schema.fields.push(FieldInfo::new("parent_ref", "parent_ref", DataType::Integer));
                schema.foreign_keys.push(ForeignKeyDefinition::new(
                    vec!["parent_ref".to_string()],
                    format!("entity_{}", i - 1),
                    vec!["id".to_string()],
                ));
            }
            schema
        })
        .collect()
}

/// Benchmark format detection by content
fn bench_format_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_detection");
    let registry = FormatRegistry::with_defaults();

    let test_cases: Vec<(&str, Vec<u8>)> = vec![
        ("json", generate_json_records(10).into_bytes()),
        ("csv", b"id,name,email\n1,Ada,ada@example.com\n2,Grace,grace@example.com\n".to_vec()),
        (
            "sql",
            b"CREATE TABLE users (id INT PRIMARY KEY, email VARCHAR(255) NOT NULL);".to_vec(),
        ),
        (
            "avro",
            br#"{"type": "record", "name": "User", "fields": [{"name": "id", "type": "long"}]}"#.to_vec(),
        ),
    ];

    for (name, content) in test_cases {
        group.bench_with_input(BenchmarkId::new("detect", name), &content, |b, content| {
            b.iter(|| black_box(registry.detect_format(None, content)));
        });
    }

    group.finish();
}

/// Benchmark parsing plus type enhancement with varying record counts
fn bench_type_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_inference");
    let registry = FormatRegistry::with_defaults();
    let engine = TypeInferenceEngine::default();

    for count in [10, 100, 500].iter() {
        let content = generate_json_records(*count).into_bytes();
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(
            BenchmarkId::new("parse_and_enhance", count),
            &content,
            |b, content| {
                b.iter(|| {
                    let schema = registry.parse_as("json", Some("users.json"), content).unwrap();
                    black_box(engine.enhance_schema(schema))
                });
            },
        );
    }

    group.finish();
}

/// Benchmark relationship detection with varying schema counts
fn bench_relationship_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("relationship_detection");
    let engine = RelationshipDetectionEngine::new();
    let options = DetectionOptions::builder().enhance_types(false).build();

    for count in [5, 20, 50].iter() {
        let schemas = generate_schemas(*count);
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(
            BenchmarkId::new("detect_relationships", count),
            &schemas,
            |b, schemas| {
                b.iter(|| black_box(engine.detect_relationships(schemas, &options).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_format_detection,
    bench_type_inference,
    bench_relationship_detection
);
criterion_main!(benches);
