//! Sample-value pattern detection

use std::collections::HashSet;

use serde_json::Value;

use super::alternatives::propose;
use super::patterns::{ValueFormat, detect_value_format};
use super::{EnhancementContext, InferenceResult, TypeEnhancer};
use crate::models::{DataType, EnhancedTypeInfo, FieldInfo, TypePattern};

/// Minimum samples before a low-cardinality text field counts as an enum
const ENUM_MIN_SAMPLES: usize = 6;
const ENUM_MAX_DISTINCT: usize = 3;

/// Classifies sample values with the shared value-format detector
#[derive(Debug, Default)]
pub struct PatternBasedEnhancer;

impl PatternBasedEnhancer {
    pub fn new() -> Self {
        Self
    }
}

/// Scalar sample rendered as text; containers are left to the complex enhancer
fn sample_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Occurrences per format, in first-seen order
fn tally(texts: &[String]) -> Vec<(ValueFormat, usize)> {
    let mut counts: Vec<(ValueFormat, usize)> = Vec::new();
    for text in texts {
        let format = detect_value_format(text);
        match counts.iter_mut().find(|(f, _)| *f == format) {
            Some((_, n)) => *n += 1,
            None => counts.push((format, 1)),
        }
    }
    counts
}

fn share(counts: &[(ValueFormat, usize)], formats: &[ValueFormat], total: usize) -> f64 {
    let matched: usize = counts
        .iter()
        .filter(|(f, _)| formats.contains(f))
        .map(|(_, n)| n)
        .sum();
    matched as f64 / total as f64
}

impl TypeEnhancer for PatternBasedEnhancer {
    fn name(&self) -> &str {
        "pattern_based"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn enhance(
        &self,
        field: &FieldInfo,
        ctx: &EnhancementContext<'_>,
        info: &mut EnhancedTypeInfo,
    ) -> InferenceResult<()> {
        let samples = ctx.samples(field);
        if samples.iter().any(Value::is_null) {
            info.is_nullable = true;
        }
        let texts: Vec<String> = samples.iter().filter_map(sample_text).collect();
        if texts.is_empty() {
            return Ok(());
        }
        let total = texts.len();
        let threshold = ctx.config.pattern_match_threshold;
        let counts = tally(&texts);

        for (format, count) in &counts {
            let ratio = *count as f64 / total as f64;
            if ratio < threshold {
                continue;
            }
            if let Some(pattern) = format.pattern() {
                info.add_pattern(pattern);
                info.confidence
                    .add_factor(format!("sample_pattern_{format}"), 0.15 * ratio);
            }
            if format.data_type() == info.primary_type && *format != ValueFormat::None {
                info.confidence.add_factor("sample_type_agreement", 0.1 * ratio);
            }
        }

        let textual = matches!(info.primary_type, DataType::String | DataType::Unknown);
        if textual {
            let temporal = share(&counts, &[ValueFormat::Date, ValueFormat::DateTime], total);
            if temporal > ctx.config.type_flip_threshold {
                let target = if counts.iter().any(|(f, _)| *f == ValueFormat::DateTime) {
                    DataType::DateTime
                } else {
                    DataType::Date
                };
                info.promote(target);
                info.add_pattern(if target == DataType::Date {
                    TypePattern::Date
                } else {
                    TypePattern::Datetime
                });
                info.confidence.add_factor("sample_type_flip", 0.1);
            } else if temporal >= threshold {
                let target = if share(&counts, &[ValueFormat::DateTime], total) >= threshold {
                    DataType::DateTime
                } else {
                    DataType::Date
                };
                propose(info, target, temporal, "date-like samples");
            }

            let candidates = [
                (&[ValueFormat::Uuid][..], DataType::Uuid, "uuid samples"),
                (&[ValueFormat::Integer][..], DataType::Integer, "integer samples"),
                (&[ValueFormat::Integer, ValueFormat::Float][..], DataType::Float, "numeric samples"),
                (&[ValueFormat::Boolean][..], DataType::Boolean, "boolean samples"),
            ];
            for (formats, data_type, reason) in candidates {
                let ratio = share(&counts, formats, total);
                // Integer-only text is covered by the integer candidate
                if data_type == DataType::Float && share(&counts, &[ValueFormat::Float], total) == 0.0 {
                    continue;
                }
                if ratio >= threshold {
                    propose(info, data_type, ratio * 0.8, reason);
                }
            }

            let distinct: HashSet<&str> = texts.iter().map(String::as_str).collect();
            let plain = counts
                .iter()
                .all(|(f, _)| matches!(f, ValueFormat::None | ValueFormat::CountryCode | ValueFormat::CurrencyCode));
            if total >= ENUM_MIN_SAMPLES && distinct.len() <= ENUM_MAX_DISTINCT && plain {
                info.add_pattern(TypePattern::Enum);
                info.confidence.add_factor("low_cardinality", 0.05);
            }
        }
        Ok(())
    }
}
