//! Field-level similarity scoring

use std::collections::HashSet;
use std::hash::Hash;

use super::naming;
use crate::models::{DataType, FieldInfo, TypePattern};

const TYPE_WEIGHT: f64 = 0.35;
const NAME_WEIGHT: f64 = 0.25;
const CONSTRAINT_WEIGHT: f64 = 0.20;
const PATTERN_WEIGHT: f64 = 0.10;
const SAMPLE_WEIGHT: f64 = 0.10;

/// Per-dimension breakdown of a field comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSimilarity {
    pub types: f64,
    pub name: f64,
    pub constraints: f64,
    pub patterns: f64,
    pub samples: f64,
}

impl FieldSimilarity {
    /// Weighted overall score in `[0, 1]`
    pub fn score(&self) -> f64 {
        self.types * TYPE_WEIGHT
            + self.name * NAME_WEIGHT
            + self.constraints * CONSTRAINT_WEIGHT
            + self.patterns * PATTERN_WEIGHT
            + self.samples * SAMPLE_WEIGHT
    }
}

/// Compare two fields across type, name, constraints, patterns and samples
pub fn compare_fields(a: &FieldInfo, b: &FieldInfo) -> FieldSimilarity {
    FieldSimilarity {
        types: type_compatibility(effective_type(a), effective_type(b)),
        name: name_similarity(&a.name, &b.name),
        constraints: constraint_overlap(a, b),
        patterns: pattern_overlap(a, b),
        samples: sample_overlap(a, b),
    }
}

/// Inferred primary type when available, else the declared one
pub fn effective_type(field: &FieldInfo) -> DataType {
    field
        .enhanced_type
        .as_ref()
        .map(|info| info.primary_type)
        .unwrap_or(field.data_type)
}

/// Compatibility of two types in `[0, 1]`
pub fn type_compatibility(a: DataType, b: DataType) -> f64 {
    if a == b {
        return 1.0;
    }
    match (a, b) {
        (DataType::Unknown, _) | (_, DataType::Unknown) => 0.3,
        (x, y) if x.is_numeric() && y.is_numeric() => 0.8,
        (x, y) if x.is_temporal() && y.is_temporal() => 0.8,
        (DataType::String, DataType::Uuid | DataType::Enum)
        | (DataType::Uuid | DataType::Enum, DataType::String) => 0.7,
        (DataType::String, y) if y.is_temporal() => 0.4,
        (x, DataType::String) if x.is_temporal() => 0.4,
        (DataType::Integer, DataType::Boolean) | (DataType::Boolean, DataType::Integer) => 0.2,
        _ => 0.0,
    }
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    if len1 == 0 {
        return len2;
    }
    if len2 == 0 {
        return len1;
    }

    let mut matrix = vec![vec![0usize; len2 + 1]; len1 + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

/// Name likeness from normalized equality, shared prefix, containment and edit distance
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = naming::compact(a);
    let b = naming::compact(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count()) as f64;
    let shortest = a.chars().count().min(b.chars().count()) as f64;

    let edit = 1.0 - levenshtein_distance(&a, &b) as f64 / longest;
    let prefix = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count() as f64;
    let prefix_score = if prefix >= 3.0 { 0.5 + 0.4 * prefix / longest } else { 0.0 };
    let contained = if shortest >= 3.0 && (a.contains(&b) || b.contains(&a)) {
        0.6 + 0.3 * shortest / longest
    } else {
        0.0
    };
    edit.max(prefix_score).max(contained).clamp(0.0, 1.0)
}

/// Set overlap; missing evidence on both sides contributes nothing
fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard overlap of constraint kinds
pub fn constraint_overlap(a: &FieldInfo, b: &FieldInfo) -> f64 {
    let kinds = |f: &FieldInfo| -> HashSet<String> {
        f.constraints.iter().map(|c| c.constraint_type.clone()).collect()
    };
    jaccard(&kinds(a), &kinds(b))
}

/// Jaccard overlap of inferred type patterns
pub fn pattern_overlap(a: &FieldInfo, b: &FieldInfo) -> f64 {
    let patterns = |f: &FieldInfo| -> HashSet<TypePattern> {
        f.enhanced_type
            .as_ref()
            .map(|info| info.patterns.iter().copied().collect())
            .unwrap_or_default()
    };
    jaccard(&patterns(a), &patterns(b))
}

/// Jaccard overlap of sample values; zero when either side has none
pub fn sample_overlap(a: &FieldInfo, b: &FieldInfo) -> f64 {
    let samples = |f: &FieldInfo| -> HashSet<String> {
        f.sample_values
            .iter()
            .flatten()
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .collect()
    };
    jaccard(&samples(a), &samples(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldConstraint, constraint_kinds};
    use serde_json::json;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("userEmail", "user_email"), 1.0);
        assert!(name_similarity("email", "email_address") > 0.7);
        assert!(name_similarity("customer_name", "customer_no") > 0.6);
        assert!(name_similarity("price", "zip") < 0.3);
    }

    #[test]
    fn test_type_compatibility() {
        assert_eq!(type_compatibility(DataType::Integer, DataType::Integer), 1.0);
        assert_eq!(type_compatibility(DataType::Integer, DataType::Float), 0.8);
        assert_eq!(type_compatibility(DataType::Boolean, DataType::Date), 0.0);
    }

    #[test]
    fn test_identical_fields_score_high() {
        let a = FieldInfo::new("email", "email", DataType::String)
            .with_constraint(FieldConstraint::flag(constraint_kinds::UNIQUE))
            .with_samples(vec![json!("ada@example.com")]);
        let b = a.clone();
        let sim = compare_fields(&a, &b);
        assert_eq!(sim.constraints, 1.0);
        assert_eq!(sim.samples, 1.0);
        assert!(sim.score() > 0.85);
    }

    #[test]
    fn test_sample_overlap() {
        let a = FieldInfo::new("code", "code", DataType::String)
            .with_samples(vec![json!("A"), json!("B")]);
        let b = FieldInfo::new("code", "code", DataType::String)
            .with_samples(vec![json!("B"), json!("C")]);
        assert!((sample_overlap(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        let none = FieldInfo::new("code", "code", DataType::String);
        assert_eq!(sample_overlap(&a, &none), 0.0);
    }

    #[test]
    fn test_missing_evidence_scores_nothing() {
        let first = FieldInfo::new("first_name", "first_name", DataType::String);
        let last = FieldInfo::new("last_name", "last_name", DataType::String);
        let sim = compare_fields(&first, &last);
        assert_eq!(sim.constraints, 0.0);
        assert_eq!(sim.patterns, 0.0);
        assert_eq!(sim.samples, 0.0);
        assert!(sim.score() < 0.6);
    }
}
