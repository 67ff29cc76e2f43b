//! Declared-constraint analysis

use serde_json::Value;

use super::alternatives::propose;
use super::patterns::ValueFormat;
use super::{EnhancementContext, InferenceResult, TypeEnhancer, finalize, initial_type_info};
use crate::models::{
    DataType, EnhancedTypeInfo, FieldConstraint, FieldInfo, TypePattern, constraint_kinds,
};

/// Infers and confirms types from declared constraints
#[derive(Debug, Default)]
pub struct ConstraintBasedEnhancer;

impl ConstraintBasedEnhancer {
    pub fn new() -> Self {
        Self
    }
}

const NUMERIC_BOUNDS: &[&str] = &[
    constraint_kinds::MINIMUM,
    constraint_kinds::MAXIMUM,
    constraint_kinds::EXCLUSIVE_MINIMUM,
    constraint_kinds::EXCLUSIVE_MAXIMUM,
    constraint_kinds::MULTIPLE_OF,
];

const TEXT_BOUNDS: &[&str] = &[
    constraint_kinds::MIN_LENGTH,
    constraint_kinds::MAX_LENGTH,
    constraint_kinds::PATTERN,
];

const ITEM_BOUNDS: &[&str] = &[
    constraint_kinds::MIN_ITEMS,
    constraint_kinds::MAX_ITEMS,
    constraint_kinds::UNIQUE_ITEMS,
    constraint_kinds::ITEMS_TYPE,
];

fn has_any(field: &FieldInfo, kinds: &[&str]) -> bool {
    field
        .constraints
        .iter()
        .any(|c| kinds.iter().any(|k| *k == c.constraint_type))
}

fn declared_type(value: &Value) -> Option<DataType> {
    serde_json::from_value(Value::String(value.as_str()?.to_ascii_uppercase())).ok()
}

fn is_integral(value: &Value) -> bool {
    value.as_i64().is_some() || value.as_u64().is_some() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn apply_format(info: &mut EnhancedTypeInfo, keyword: &str) {
    let Some(format) = ValueFormat::from_format_keyword(keyword) else {
        return;
    };
    if let Some(pattern) = format.pattern() {
        info.add_pattern(pattern);
    }
    let implied = format.data_type();
    if implied == info.primary_type {
        info.confidence.add_factor("format_constraint", 0.1);
        return;
    }
    match (implied, info.primary_type) {
        // A declared temporal or UUID format on text is authoritative
        (DataType::Date | DataType::DateTime | DataType::Uuid, DataType::String | DataType::Unknown) => {
            info.promote(implied);
            info.confidence.add_factor("format_constraint", 0.1);
        }
        (DataType::String, _) => {
            if format.pattern().is_some() {
                info.confidence.add_factor("format_constraint", 0.05);
            }
        }
        (DataType::Integer | DataType::Float, primary) if primary.is_numeric() => {
            info.confidence.add_factor("format_constraint", 0.05);
        }
        (other, _) => propose(info, other, 0.6, format!("format '{keyword}'")),
    }
}

fn apply_logical_type(info: &mut EnhancedTypeInfo, logical: &str) {
    let lower = logical.to_ascii_lowercase();
    let (data_type, pattern) = match lower.as_str() {
        "uuid" => (DataType::Uuid, Some(TypePattern::Uuid)),
        "date" => (DataType::Date, Some(TypePattern::Date)),
        l if l.starts_with("timestamp") || l.starts_with("local-timestamp") => {
            (DataType::DateTime, Some(TypePattern::Datetime))
        }
        l if l.starts_with("time") => (DataType::String, Some(TypePattern::Time)),
        "decimal" => (DataType::Float, None),
        _ => return,
    };
    if let Some(pattern) = pattern {
        info.add_pattern(pattern);
    }
    if data_type == info.primary_type {
        info.confidence.add_factor("logical_type", 0.1);
    } else {
        propose(info, data_type, 0.7, format!("logical type '{logical}'"));
    }
}

impl TypeEnhancer for ConstraintBasedEnhancer {
    fn name(&self) -> &str {
        "constraint_based"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn enhance(
        &self,
        field: &FieldInfo,
        ctx: &EnhancementContext<'_>,
        info: &mut EnhancedTypeInfo,
    ) -> InferenceResult<()> {
        if let Some(keyword) = field
            .constraint(constraint_kinds::FORMAT)
            .and_then(|c| c.value.as_str())
        {
            apply_format(info, keyword);
        }
        if let Some(logical) = field
            .constraint(constraint_kinds::LOGICAL_TYPE)
            .and_then(|c| c.value.as_str())
        {
            apply_logical_type(info, logical);
        }

        if let Some(values) = field
            .constraint(constraint_kinds::ENUM)
            .and_then(|c| c.value.as_array())
        {
            info.add_pattern(TypePattern::Enum);
            info.confidence.add_factor("enum_constraint", 0.1);
            let numeric = !values.is_empty() && values.iter().all(Value::is_number);
            if numeric && !info.primary_type.is_numeric() {
                let suggested = if values.iter().all(is_integral) {
                    DataType::Integer
                } else {
                    DataType::Float
                };
                propose(info, suggested, 0.5, "numeric enum values");
            }
        }

        if has_any(field, NUMERIC_BOUNDS) {
            if info.primary_type.is_numeric() {
                info.confidence.add_factor("numeric_range", 0.05);
            } else {
                let integral = field
                    .constraints
                    .iter()
                    .filter(|c| NUMERIC_BOUNDS.contains(&c.constraint_type.as_str()))
                    .all(|c| is_integral(&c.value));
                let suggested = if integral { DataType::Integer } else { DataType::Float };
                propose(info, suggested, 0.5, "numeric range constraint");
            }
        }
        if let Some(precision) = field.constraint(constraint_kinds::PRECISION)
            && precision.value.is_number()
        {
            if info.primary_type.is_numeric() {
                info.confidence.add_factor("numeric_precision", 0.05);
            } else {
                propose(info, DataType::Float, 0.5, "precision constraint");
            }
        }

        if has_any(field, TEXT_BOUNDS) {
            match info.primary_type {
                DataType::String | DataType::Enum | DataType::Uuid => {
                    info.confidence.add_factor("string_constraint", 0.05)
                }
                t if t.is_scalar() => propose(info, DataType::String, 0.4, "length or pattern constraint"),
                _ => {}
            }
        }

        if has_any(field, ITEM_BOUNDS) {
            if info.primary_type == DataType::Array {
                info.confidence.add_factor("array_constraint", 0.05);
                if info.item_type.is_none()
                    && let Some(item) = field
                        .constraint(constraint_kinds::ITEMS_TYPE)
                        .and_then(|c| declared_type(&c.value))
                {
                    let mut item_info =
                        initial_type_info(&FieldInfo::new("items", "items", item).with_nullable(false));
                    finalize(&mut item_info);
                    info.item_type = Some(Box::new(item_info));
                }
            } else {
                propose(info, DataType::Array, 0.5, "item constraint");
            }
        }
        if field.has_constraint(constraint_kinds::FIXED_SIZE) && info.primary_type == DataType::Binary {
            info.confidence.add_factor("fixed_size", 0.05);
        }

        let primary_key = field.has_constraint(constraint_kinds::PRIMARY_KEY) || ctx.is_primary_key(field);
        if primary_key {
            info.add_pattern(TypePattern::Id);
            info.confidence.add_factor("key_constraint", 0.1);
            info.is_nullable = false;
        } else if field.has_constraint(constraint_kinds::UNIQUE) {
            info.confidence.add_factor("unique_constraint", 0.05);
        }
        if field
            .constraint(constraint_kinds::NOT_NULL)
            .is_some_and(|c: &FieldConstraint| c.value != Value::Bool(false))
        {
            info.is_nullable = false;
            info.confidence.add_factor("not_null_constraint", 0.05);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::InferenceConfig;
    use crate::models::SchemaDetails;
    use serde_json::json;

    fn run(field: FieldInfo) -> EnhancedTypeInfo {
        let mut schema = SchemaDetails::new();
        schema.primary_keys = vec!["id".to_string()];
        schema.fields.push(field.clone());
        let config = InferenceConfig::default();
        let ctx = EnhancementContext::new(&schema, &config);
        let mut info = initial_type_info(&field);
        ConstraintBasedEnhancer::new()
            .enhance(&field, &ctx, &mut info)
            .unwrap();
        info
    }

    #[test]
    fn test_format_email_tags_pattern() {
        let info = run(
            FieldInfo::new("contact", "contact", DataType::String)
                .with_constraint(FieldConstraint::new(constraint_kinds::FORMAT, "email")),
        );
        assert!(info.has_pattern(TypePattern::Email));
        assert!(info.confidence.has_factor("format_constraint"));
    }

    #[test]
    fn test_format_date_promotes_string() {
        let info = run(
            FieldInfo::new("d", "d", DataType::String)
                .with_constraint(FieldConstraint::new(constraint_kinds::FORMAT, "date-time")),
        );
        assert_eq!(info.primary_type, DataType::DateTime);
        assert!(info.has_pattern(TypePattern::Datetime));
    }

    #[test]
    fn test_numeric_range_on_text() {
        let info = run(
            FieldInfo::new("level", "level", DataType::String)
                .with_constraint(FieldConstraint::new(constraint_kinds::MINIMUM, 1))
                .with_constraint(FieldConstraint::new(constraint_kinds::MAXIMUM, 10)),
        );
        assert_eq!(info.alternative(DataType::Integer).unwrap().confidence, 0.5);

        let info = run(
            FieldInfo::new("ratio", "ratio", DataType::Float)
                .with_constraint(FieldConstraint::new(constraint_kinds::MAXIMUM, 1.5)),
        );
        assert!(info.confidence.has_factor("numeric_range"));
    }

    #[test]
    fn test_enum_and_keys() {
        let info = run(
            FieldInfo::new("id", "id", DataType::Integer).with_nullable(true),
        );
        assert!(info.has_pattern(TypePattern::Id));
        assert!(!info.is_nullable);

        let info = run(
            FieldInfo::new("status", "status", DataType::String)
                .with_constraint(FieldConstraint::new(constraint_kinds::ENUM, json!(["a", "b"])))
                .with_constraint(FieldConstraint::flag(constraint_kinds::NOT_NULL)),
        );
        assert!(info.has_pattern(TypePattern::Enum));
        assert!(info.confidence.has_factor("not_null_constraint"));
        assert!(!info.is_nullable);
    }

    #[test]
    fn test_items_type_builds_item_info() {
        let info = run(
            FieldInfo::new("tags", "tags", DataType::Array)
                .with_constraint(FieldConstraint::new(constraint_kinds::ITEMS_TYPE, "STRING")),
        );
        assert_eq!(info.item_type.as_ref().unwrap().primary_type, DataType::String);
    }
}
