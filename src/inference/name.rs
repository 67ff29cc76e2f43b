//! Name-based type hints

use once_cell::sync::Lazy;
use regex::Regex;

use super::alternatives::propose;
use super::{EnhancementContext, InferenceResult, TypeEnhancer};
use crate::models::{DataType, EnhancedTypeInfo, FieldInfo, TypePattern};
use crate::relationships::naming;

/// What a naming convention suggests
struct NameRule {
    label: &'static str,
    regex: Regex,
    data_type: DataType,
    pattern: Option<TypePattern>,
    /// Confidence of the suggestion when it disagrees with the primary type
    confidence: f64,
}

impl NameRule {
    fn new(
        label: &'static str,
        pattern: &str,
        data_type: DataType,
        type_pattern: Option<TypePattern>,
        confidence: f64,
    ) -> Self {
        Self {
            label,
            regex: Regex::new(pattern).unwrap(),
            data_type,
            pattern: type_pattern,
            confidence,
        }
    }
}

/// First matching rule wins
static RULES: Lazy<Vec<NameRule>> = Lazy::new(|| {
    vec![
        NameRule::new("uuid", r"(^|_)(uuid|guid)$", DataType::Uuid, Some(TypePattern::Uuid), 0.7),
        NameRule::new(
            "identifier",
            r"^(id|pk|key)$|_(id|pk|key)$",
            DataType::Integer,
            Some(TypePattern::Id),
            0.5,
        ),
        NameRule::new(
            "boolean",
            r"^(is|has|can|should|was|allow|allows|enable|include)_|_(flag|enabled|disabled)$|^(active|enabled|disabled|deleted|verified|visible|archived)$",
            DataType::Boolean,
            None,
            0.7,
        ),
        NameRule::new(
            "datetime",
            r"_(at|time|timestamp|datetime|ts)$|^(timestamp|datetime|created|updated|modified)$",
            DataType::DateTime,
            Some(TypePattern::Datetime),
            0.7,
        ),
        NameRule::new(
            "date",
            r"_(date|on|day)$|^(date|dob|birthday|birthdate)$",
            DataType::Date,
            Some(TypePattern::Date),
            0.7,
        ),
        NameRule::new("email", r"(^|_)e?mail(_address)?$", DataType::String, Some(TypePattern::Email), 0.6),
        NameRule::new(
            "url",
            r"(^|_)(url|uri|link|href|website|homepage|endpoint)$",
            DataType::String,
            Some(TypePattern::Url),
            0.6,
        ),
        NameRule::new(
            "phone",
            r"(^|_)(phone|mobile|fax|tel|telephone)(_number|_no)?$",
            DataType::String,
            Some(TypePattern::Phone),
            0.6,
        ),
        NameRule::new("ip", r"(^|_)(ip|ipv4|ipv6)(_address|_addr)?$", DataType::String, Some(TypePattern::IpAddress), 0.6),
        NameRule::new("country", r"(^|_)country(_code|_iso)?$", DataType::String, Some(TypePattern::CountryCode), 0.5),
        NameRule::new(
            "currency",
            r"(^|_)(price|amount|cost|balance|total_price|subtotal|fee|salary)$",
            DataType::Float,
            Some(TypePattern::Currency),
            0.6,
        ),
        NameRule::new(
            "percentage",
            r"(^|_)(percent|percentage|pct)$",
            DataType::Float,
            Some(TypePattern::Percentage),
            0.6,
        ),
        NameRule::new(
            "float",
            r"(^|_)(rate|ratio|score|weight|latitude|longitude|lat|lng|lon|average|avg)$",
            DataType::Float,
            None,
            0.5,
        ),
        NameRule::new(
            "integer",
            r"(^|_)(count|num|number|qty|quantity|total|age|year|size|index|position|rank|version)$",
            DataType::Integer,
            None,
            0.5,
        ),
        NameRule::new("list", r"_(list|array|set|ids)$|^(tags|items|children|values|elements)$", DataType::Array, None, 0.6),
    ]
});

/// Names that read as plurals suggest arrays, weakly
const PLURAL_CONFIDENCE: f64 = 0.3;
/// Share of a rule's confidence proposed as an alternative
const PARTIAL_CONFIDENCE: f64 = 0.6;

/// Suggests types and patterns from the field's leaf name
#[derive(Debug, Default)]
pub struct NameBasedEnhancer;

impl NameBasedEnhancer {
    pub fn new() -> Self {
        Self
    }
}

fn agrees(rule: &NameRule, primary: DataType) -> bool {
    if rule.data_type == primary {
        return true;
    }
    match rule.label {
        // Identifiers come as numbers, strings or UUIDs
        "identifier" => matches!(primary, DataType::String | DataType::Uuid),
        "currency" | "percentage" | "float" => primary == DataType::Integer,
        _ => false,
    }
}

impl TypeEnhancer for NameBasedEnhancer {
    fn name(&self) -> &str {
        "name_based"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn enhance(
        &self,
        field: &FieldInfo,
        _ctx: &EnhancementContext<'_>,
        info: &mut EnhancedTypeInfo,
    ) -> InferenceResult<()> {
        let name = naming::to_snake_case(&field.name);
        if name.is_empty() {
            return Ok(());
        }

        let Some(rule) = RULES.iter().find(|r| r.regex.is_match(&name)) else {
            let singular = naming::singularize(&name);
            if singular != name && info.primary_type.is_scalar() && !name.contains('_') {
                propose(
                    info,
                    DataType::Array,
                    PLURAL_CONFIDENCE * PARTIAL_CONFIDENCE,
                    format!("plural name '{name}'"),
                );
            }
            return Ok(());
        };

        let primary = info.primary_type;
        if agrees(rule, primary) {
            info.confidence.add_factor("name_type_agreement", 0.1);
            if let Some(pattern) = rule.pattern {
                info.add_pattern(pattern);
            }
            return Ok(());
        }

        match (rule.data_type, primary) {
            // Dates stored as text keep their type; the name only tags the pattern
            (DataType::Date | DataType::DateTime, DataType::String) => {
                if let Some(pattern) = rule.pattern {
                    info.add_pattern(pattern);
                }
                info.confidence.add_factor("name_pattern_hint", 0.05);
            }
            (DataType::String, DataType::Unknown) => {
                if let Some(pattern) = rule.pattern {
                    info.add_pattern(pattern);
                }
                propose(
                    info,
                    DataType::String,
                    rule.confidence * PARTIAL_CONFIDENCE,
                    format!("{} name '{name}'", rule.label),
                );
            }
            // Text-shaped hints say nothing about numeric or container fields
            (DataType::String, _) => {}
            (suggested, _) => propose(
                info,
                suggested,
                rule.confidence * PARTIAL_CONFIDENCE,
                format!("{} name '{name}'", rule.label),
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{InferenceConfig, initial_type_info};
    use crate::models::SchemaDetails;

    fn run(name: &str, data_type: DataType) -> EnhancedTypeInfo {
        let field = FieldInfo::new(name, name, data_type);
        let schema = SchemaDetails::new();
        let config = InferenceConfig::default();
        let ctx = EnhancementContext::new(&schema, &config);
        let mut info = initial_type_info(&field);
        NameBasedEnhancer::new().enhance(&field, &ctx, &mut info).unwrap();
        info
    }

    #[test]
    fn test_agreement_adds_factor() {
        let info = run("user_id", DataType::Integer);
        assert!(info.confidence.has_factor("name_type_agreement"));
        assert!(info.has_pattern(TypePattern::Id));
        assert!(info.possible_alternatives.is_empty());

        let info = run("isActive", DataType::Boolean);
        assert!(info.confidence.has_factor("name_type_agreement"));
    }

    #[test]
    fn test_string_dates_only_tag_patterns() {
        let info = run("created_date", DataType::String);
        assert_eq!(info.primary_type, DataType::String);
        assert!(info.has_pattern(TypePattern::Date));
        assert!(info.possible_alternatives.is_empty());

        let info = run("updated_at", DataType::String);
        assert!(info.has_pattern(TypePattern::Datetime));
    }

    #[test]
    fn test_disagreement_proposes_alternative() {
        let info = run("is_deleted", DataType::Integer);
        assert_eq!(info.primary_type, DataType::Integer);
        let alternative = info.alternative(DataType::Boolean).unwrap();
        assert!((alternative.confidence - 0.42).abs() < 1e-9);
    }

    #[test]
    fn test_text_hints() {
        let info = run("contact_email", DataType::String);
        assert!(info.has_pattern(TypePattern::Email));

        let info = run("phone", DataType::Integer);
        assert!(info.patterns.is_empty());
        assert!(info.possible_alternatives.is_empty());
    }

    #[test]
    fn test_plural_names() {
        let info = run("tags", DataType::String);
        assert!(info.alternative(DataType::Array).is_some());

        let info = run("categories", DataType::String);
        assert!(info.alternative(DataType::Array).is_some());

        let info = run("status", DataType::String);
        assert!(info.possible_alternatives.is_empty());
    }
}
