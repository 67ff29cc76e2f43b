//! Item, property and map types of arrays and objects

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::patterns::{self, ValueFormat, detect_value_format};
use super::{
    BASE_SCORE, EnhancementContext, InferenceConfig, InferenceResult, TypeEnhancer, finalize,
    initial_type_info,
};
use crate::formats::common::join_path;
use crate::models::{
    DataType, EnhancedTypeInfo, FieldInfo, TypeConfidence, TypePattern, constraint_kinds,
};

const DETECTION_METHOD: &str = "complex_type";

/// Builds nested type trees for containers
#[derive(Debug, Default)]
pub struct ComplexTypeEnhancer;

impl ComplexTypeEnhancer {
    pub fn new() -> Self {
        Self
    }
}

/// Outcome of the majority vote over observed value types
#[derive(Debug, PartialEq)]
struct Vote {
    primary: DataType,
    share: f64,
    heterogeneous: bool,
    others: Vec<DataType>,
}

fn vote(values: &[&Value]) -> Option<Vote> {
    let mut counts: BTreeMap<DataType, usize> = BTreeMap::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        *counts.entry(DataType::of_json(value)).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();
    if total == 0 {
        return None;
    }
    // INTEGER and FLOAT vote together as FLOAT
    if let (Some(ints), Some(floats)) = (
        counts.get(&DataType::Integer).copied(),
        counts.get(&DataType::Float).copied(),
    ) {
        counts.remove(&DataType::Integer);
        counts.insert(DataType::Float, ints + floats);
    }
    let mut primary = DataType::Unknown;
    let mut best = 0;
    for (data_type, count) in &counts {
        if *count > best {
            primary = *data_type;
            best = *count;
        }
    }
    Some(Vote {
        primary,
        share: best as f64 / total as f64,
        heterogeneous: counts.len() > 1,
        others: counts.keys().copied().filter(|t| *t != primary).collect(),
    })
}

fn observed_info(primary: DataType, share: f64) -> EnhancedTypeInfo {
    let mut info = EnhancedTypeInfo::new(primary);
    info.confidence = TypeConfidence::new(BASE_SCORE, DETECTION_METHOD);
    info.confidence.add_factor("observed_type_share", 0.4 * share - 0.1);
    info
}

fn is_map_key(key: &str) -> bool {
    patterns::is_integer(key) || patterns::is_uuid(key)
}

/// Type info for a set of observed values at one position
fn infer_values(values: &[&Value], config: &InferenceConfig, depth: usize) -> EnhancedTypeInfo {
    let Some(vote) = vote(values) else {
        let mut info = observed_info(DataType::Null, 0.0);
        info.is_nullable = true;
        finalize(&mut info);
        return info;
    };
    let mut info = observed_info(vote.primary, vote.share);
    info.is_nullable = values.iter().any(|v| v.is_null());
    info.is_heterogeneous = vote.heterogeneous;
    for other in &vote.others {
        info.add_secondary_type(*other);
    }

    let texts: Vec<&str> = values.iter().filter_map(|v| v.as_str()).collect();
    if !texts.is_empty() {
        tag_text_patterns(&mut info, &texts, config);
    }

    if depth >= config.max_depth {
        if info.primary_type.is_container() {
            info.confidence.add_factor("depth_limited", -0.05);
        }
        finalize(&mut info);
        return info;
    }
    match info.primary_type {
        DataType::Array => {
            let items: Vec<&Value> = values
                .iter()
                .filter_map(|v| v.as_array())
                .flatten()
                .collect();
            if !items.is_empty() {
                describe_items(&mut info, &items, config, depth + 1);
            }
        }
        DataType::Object => {
            let objects: Vec<&Map<String, Value>> =
                values.iter().filter_map(|v| v.as_object()).collect();
            describe_objects(&mut info, &objects, config, depth + 1);
        }
        _ => {}
    }
    finalize(&mut info);
    info
}

fn tag_text_patterns(info: &mut EnhancedTypeInfo, texts: &[&str], config: &InferenceConfig) {
    let mut counts: Vec<(ValueFormat, usize)> = Vec::new();
    for text in texts {
        let format = detect_value_format(text);
        match counts.iter_mut().find(|(f, _)| *f == format) {
            Some((_, n)) => *n += 1,
            None => counts.push((format, 1)),
        }
    }
    for (format, count) in counts {
        let ratio = count as f64 / texts.len() as f64;
        let Some(pattern) = format.pattern() else {
            continue;
        };
        if ratio >= config.pattern_match_threshold {
            info.add_pattern(pattern);
        }
        if ratio > config.type_flip_threshold
            && info.primary_type == DataType::String
            && matches!(pattern, TypePattern::Date | TypePattern::Datetime | TypePattern::Uuid)
        {
            info.promote(format.data_type());
        }
    }
}

fn describe_items(info: &mut EnhancedTypeInfo, items: &[&Value], config: &InferenceConfig, depth: usize) {
    let item = infer_values(items, config, depth);
    info.is_heterogeneous = item.is_heterogeneous;
    info.confidence.add_factor("item_type_inferred", 0.1);
    if item.is_heterogeneous {
        info.confidence.add_factor("heterogeneous_items", -0.1);
    }
    info.item_type = Some(Box::new(item));
}

fn describe_objects(
    info: &mut EnhancedTypeInfo,
    objects: &[&Map<String, Value>],
    config: &InferenceConfig,
    depth: usize,
) {
    let keys: BTreeSet<&String> = objects.iter().flat_map(|o| o.keys()).collect();
    if keys.is_empty() {
        return;
    }

    if keys.len() >= config.map_min_properties && keys.iter().all(|k| is_map_key(k)) {
        let key_type = if keys.iter().all(|k| patterns::is_integer(k)) {
            DataType::Integer
        } else if keys.iter().all(|k| patterns::is_uuid(k)) {
            DataType::Uuid
        } else {
            DataType::String
        };
        let mut key_info = observed_info(key_type, 1.0);
        if key_type == DataType::Uuid {
            key_info.add_pattern(TypePattern::Uuid);
        }
        finalize(&mut key_info);
        let values: Vec<&Value> = objects.iter().flat_map(|o| o.values()).collect();
        info.key_type = Some(Box::new(key_info));
        info.value_type = Some(Box::new(infer_values(&values, config, depth)));
        info.confidence.add_factor("map_structure", 0.1);
        return;
    }

    for key in keys {
        let values: Vec<&Value> = objects.iter().filter_map(|o| o.get(key.as_str())).collect();
        let mut property = infer_values(&values, config, depth);
        if values.len() < objects.len() {
            property.is_nullable = true;
        }
        info.properties.insert(key.clone(), property);
    }
    info.confidence.add_factor("object_properties", 0.05);
}

/// Type info for a declared field without samples
fn declared_info(field: &FieldInfo, ctx: &EnhancementContext<'_>, depth: usize) -> EnhancedTypeInfo {
    let mut info = initial_type_info(field);
    if depth < ctx.config.max_depth {
        describe_declared(field, ctx, &mut info, depth + 1);
    }
    finalize(&mut info);
    info
}

fn constraint_type(field: &FieldInfo, kind: &str) -> Option<DataType> {
    let name = field.constraint(kind)?.value.as_str()?.to_ascii_uppercase();
    serde_json::from_value(Value::String(name)).ok()
}

fn leaf_info(data_type: DataType) -> EnhancedTypeInfo {
    let mut info = initial_type_info(&FieldInfo::new("", "", data_type).with_nullable(false));
    finalize(&mut info);
    info
}

fn describe_declared(
    field: &FieldInfo,
    ctx: &EnhancementContext<'_>,
    info: &mut EnhancedTypeInfo,
    depth: usize,
) {
    match field.data_type {
        DataType::Array => {
            let items = ctx.children(&join_path(&field.path, "items"));
            if !items.is_empty() {
                let mut item = EnhancedTypeInfo::new(DataType::Object);
                item.confidence = TypeConfidence::new(BASE_SCORE, DETECTION_METHOD);
                item.confidence.add_factor("declared_type", 0.2);
                for child in items {
                    item.properties
                        .insert(child.name.clone(), declared_info(child, ctx, depth));
                }
                finalize(&mut item);
                info.item_type = Some(Box::new(item));
                info.confidence.add_factor("declared_item_structure", 0.05);
            } else if info.item_type.is_none()
                && let Some(item) = constraint_type(field, constraint_kinds::ITEMS_TYPE)
            {
                info.item_type = Some(Box::new(leaf_info(item)));
            }
        }
        DataType::Object => {
            if field.has_constraint(constraint_kinds::KEY_TYPE) {
                let key = constraint_type(field, constraint_kinds::KEY_TYPE).unwrap_or(DataType::String);
                info.key_type = Some(Box::new(leaf_info(key)));
                let values = ctx.children(&join_path(&field.path, "values"));
                let value = if values.is_empty() {
                    leaf_info(constraint_type(field, constraint_kinds::VALUE_TYPE).unwrap_or(DataType::Unknown))
                } else {
                    let mut value = EnhancedTypeInfo::new(DataType::Object);
                    value.confidence = TypeConfidence::new(BASE_SCORE, DETECTION_METHOD);
                    value.confidence.add_factor("declared_type", 0.2);
                    for child in values {
                        value
                            .properties
                            .insert(child.name.clone(), declared_info(child, ctx, depth));
                    }
                    finalize(&mut value);
                    value
                };
                info.value_type = Some(Box::new(value));
                info.confidence.add_factor("map_structure", 0.1);
                return;
            }
            let children = ctx.children(&field.path);
            if !children.is_empty() {
                for child in children {
                    info.properties
                        .insert(child.name.clone(), declared_info(child, ctx, depth));
                }
                info.confidence.add_factor("declared_properties", 0.05);
            }
        }
        _ => {}
    }
}

impl TypeEnhancer for ComplexTypeEnhancer {
    fn name(&self) -> &str {
        "complex_type"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn enhance(
        &self,
        field: &FieldInfo,
        ctx: &EnhancementContext<'_>,
        info: &mut EnhancedTypeInfo,
    ) -> InferenceResult<()> {
        if !info.primary_type.is_container() {
            return Ok(());
        }
        let depth = field.depth() + 1;
        if depth > ctx.config.max_depth {
            return Ok(());
        }
        let samples = ctx.samples(field);
        match info.primary_type {
            DataType::Array => {
                let items: Vec<&Value> = samples
                    .iter()
                    .filter_map(Value::as_array)
                    .flatten()
                    .collect();
                if items.is_empty() {
                    describe_declared(field, ctx, info, depth);
                } else {
                    describe_items(info, &items, ctx.config, depth);
                }
            }
            DataType::Object => {
                let objects: Vec<&Map<String, Value>> =
                    samples.iter().filter_map(Value::as_object).collect();
                if objects.is_empty() {
                    describe_declared(field, ctx, info, depth);
                } else {
                    describe_objects(info, &objects, ctx.config, depth);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldConstraint, SchemaDetails};
    use serde_json::json;

    fn run_with(schema: &SchemaDetails, path: &str, config: &InferenceConfig) -> EnhancedTypeInfo {
        let field = schema.field(path).unwrap();
        let ctx = EnhancementContext::new(schema, config);
        let mut info = initial_type_info(field);
        ComplexTypeEnhancer::new()
            .enhance(field, &ctx, &mut info)
            .unwrap();
        info
    }

    fn single(field: FieldInfo) -> SchemaDetails {
        let mut schema = SchemaDetails::new();
        schema.fields.push(field);
        schema
    }

    #[test]
    fn test_numeric_items_resolve_to_float() {
        let schema = single(
            FieldInfo::new("scores", "scores", DataType::Array)
                .with_samples(vec![json!([1, 2.5]), json!([3])]),
        );
        let info = run_with(&schema, "scores", &InferenceConfig::default());
        let item = info.item_type.unwrap();
        assert_eq!(item.primary_type, DataType::Float);
        assert!(!info.is_heterogeneous);
    }

    #[test]
    fn test_heterogeneous_items() {
        let schema = single(
            FieldInfo::new("mixed", "mixed", DataType::Array)
                .with_samples(vec![json!([1, "a", "b"])]),
        );
        let info = run_with(&schema, "mixed", &InferenceConfig::default());
        assert!(info.is_heterogeneous);
        let item = info.item_type.unwrap();
        assert_eq!(item.primary_type, DataType::String);
        assert_eq!(item.secondary_types, vec![DataType::Integer]);
        assert!(info.confidence.has_factor("heterogeneous_items"));
    }

    #[test]
    fn test_object_properties_from_samples() {
        let schema = single(FieldInfo::new("address", "address", DataType::Object).with_samples(vec![
            json!({"city": "Berlin", "zip": 10115, "since": "2024-01-02"}),
            json!({"city": "Paris", "since": "2023-05-06"}),
        ]));
        let info = run_with(&schema, "address", &InferenceConfig::default());
        assert_eq!(info.properties.len(), 3);
        assert!(info.properties["zip"].is_nullable);
        assert!(!info.properties["city"].is_nullable);
        assert_eq!(info.properties["since"].primary_type, DataType::Date);
        assert!(info.key_type.is_none());
    }

    #[test]
    fn test_map_detection() {
        let sample = json!({"1": {"n": 1}, "2": {"n": 2}, "3": {"n": 3}, "4": {"n": 4}, "5": {"n": 5}});
        let schema = single(FieldInfo::new("by_id", "by_id", DataType::Object).with_samples(vec![sample]));
        let info = run_with(&schema, "by_id", &InferenceConfig::default());
        assert!(info.properties.is_empty());
        assert_eq!(info.key_type.as_ref().unwrap().primary_type, DataType::Integer);
        let value = info.value_type.as_ref().unwrap();
        assert_eq!(value.primary_type, DataType::Object);
        assert!(value.properties.contains_key("n"));

        // Below the property threshold the same shape stays a record
        let config = InferenceConfig::builder().map_min_properties(6).build();
        let info = run_with(&schema, "by_id", &config);
        assert_eq!(info.properties.len(), 5);
    }

    #[test]
    fn test_declared_structure_without_samples() {
        let mut schema = SchemaDetails::new();
        schema.fields.push(FieldInfo::new("lines", "lines", DataType::Array));
        schema.fields.push(FieldInfo::new("sku", "lines.items.sku", DataType::String));
        schema.fields.push(FieldInfo::new("qty", "lines.items.qty", DataType::Integer));
        schema.fields.push(
            FieldInfo::new("labels", "labels", DataType::Object)
                .with_constraint(FieldConstraint::new(constraint_kinds::KEY_TYPE, "STRING"))
                .with_constraint(FieldConstraint::new(constraint_kinds::VALUE_TYPE, "INTEGER")),
        );

        let info = run_with(&schema, "lines", &InferenceConfig::default());
        let item = info.item_type.unwrap();
        assert_eq!(item.primary_type, DataType::Object);
        assert_eq!(item.properties["qty"].primary_type, DataType::Integer);

        let info = run_with(&schema, "labels", &InferenceConfig::default());
        assert_eq!(info.value_type.unwrap().primary_type, DataType::Integer);
    }

    #[test]
    fn test_depth_limit() {
        let deep = json!([[[[1]]]]);
        let schema = single(FieldInfo::new("deep", "deep", DataType::Array).with_samples(vec![deep]));
        let config = InferenceConfig::builder().max_depth(2).build();
        let info = run_with(&schema, "deep", &config);
        assert!(info.depth() <= 3);
    }
}
