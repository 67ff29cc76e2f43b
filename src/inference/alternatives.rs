//! Shared bookkeeping for competing type hypotheses

use std::cmp::Ordering;

use crate::models::{DataType, EnhancedTypeInfo, TypeAlternative};

/// Ceiling for an alternative's confidence after merging
pub const MAX_ALTERNATIVE_CONFIDENCE: f64 = 0.9;

/// Record an alternative type
///
/// An existing alternative of the same type absorbs half of the new confidence
/// (capped at [`MAX_ALTERNATIVE_CONFIDENCE`]) and gains the reason; otherwise a
/// new entry is appended. The list stays sorted by confidence, highest first.
pub fn add_alternative(
    alternatives: &mut Vec<TypeAlternative>,
    data_type: DataType,
    confidence: f64,
    reason: impl Into<String>,
) {
    let reason = reason.into();
    let confidence = confidence.clamp(0.0, MAX_ALTERNATIVE_CONFIDENCE);
    match alternatives.iter_mut().find(|a| a.data_type == data_type) {
        Some(existing) => {
            existing.confidence =
                (existing.confidence + confidence * 0.5).min(MAX_ALTERNATIVE_CONFIDENCE);
            if !reason.is_empty() && !existing.reasons.contains(&reason) {
                existing.reasons.push(reason);
            }
        }
        None => alternatives.push(TypeAlternative {
            data_type,
            confidence,
            reasons: if reason.is_empty() { Vec::new() } else { vec![reason] },
        }),
    }
    alternatives.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.data_type.cmp(&b.data_type))
    });
}

/// Propose an alternative unless it is already the primary type
pub fn propose(info: &mut EnhancedTypeInfo, data_type: DataType, confidence: f64, reason: impl Into<String>) {
    if data_type == info.primary_type {
        return;
    }
    add_alternative(&mut info.possible_alternatives, data_type, confidence, reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_existing_alternative() {
        let mut alternatives = Vec::new();
        add_alternative(&mut alternatives, DataType::Date, 0.6, "name");
        add_alternative(&mut alternatives, DataType::Date, 0.4, "samples");
        assert_eq!(alternatives.len(), 1);
        assert!((alternatives[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(alternatives[0].reasons, vec!["name", "samples"]);

        add_alternative(&mut alternatives, DataType::Date, 0.9, "format");
        assert_eq!(alternatives[0].confidence, MAX_ALTERNATIVE_CONFIDENCE);
    }

    #[test]
    fn test_sorted_by_confidence() {
        let mut alternatives = Vec::new();
        add_alternative(&mut alternatives, DataType::Integer, 0.3, "a");
        add_alternative(&mut alternatives, DataType::Float, 0.7, "b");
        add_alternative(&mut alternatives, DataType::Boolean, 0.5, "c");
        let order: Vec<DataType> = alternatives.iter().map(|a| a.data_type).collect();
        assert_eq!(order, vec![DataType::Float, DataType::Boolean, DataType::Integer]);
    }

    #[test]
    fn test_propose_skips_primary() {
        let mut info = EnhancedTypeInfo::new(DataType::String);
        propose(&mut info, DataType::String, 0.8, "same");
        assert!(info.possible_alternatives.is_empty());
        propose(&mut info, DataType::Uuid, 0.8, "samples");
        assert_eq!(info.possible_alternatives.len(), 1);
    }
}
