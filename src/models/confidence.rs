//! Additive confidence ledger used for types and relationships

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lower bound of a finalized confidence score
pub const MIN_SCORE: f64 = 0.1;
/// Upper bound of a finalized confidence score
pub const MAX_SCORE: f64 = 1.0;

/// Score plus the named contributions that produced it
///
/// Factors are an append-only ledger: adding a factor that already exists
/// accumulates into it, nothing is ever removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    pub score: f64,
    #[serde(default)]
    pub factors: BTreeMap<String, f64>,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub detection_method: String,
}

/// Confidence attached to an inferred type
pub type TypeConfidence = Confidence;

/// Confidence attached to a detected relationship
pub type RelationshipConfidence = Confidence;

impl Default for Confidence {
    fn default() -> Self {
        Self::new(0.5, "")
    }
}

impl Confidence {
    pub fn new(score: f64, detection_method: impl Into<String>) -> Self {
        Self {
            score: clamp_score(score),
            factors: BTreeMap::new(),
            rationale: String::new(),
            detection_method: detection_method.into(),
        }
    }

    /// Record a named contribution
    pub fn add_factor(&mut self, name: impl Into<String>, delta: f64) {
        *self.factors.entry(name.into()).or_insert(0.0) += delta;
    }

    pub fn with_factor(mut self, name: impl Into<String>, delta: f64) -> Self {
        self.add_factor(name, delta);
        self
    }

    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.get(name).copied()
    }

    pub fn has_factor(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }

    /// Sum of all factor deltas
    pub fn factor_sum(&self) -> f64 {
        self.factors.values().sum()
    }

    /// Recompute `score = clamp(base + Σ factors)` and refresh the rationale
    pub fn recompute(&mut self, base: f64) -> f64 {
        self.score = clamp_score(base + self.factor_sum());
        self.rationale = self.describe_factors();
        self.score
    }

    /// Human-readable list of factors, largest contribution first
    pub fn describe_factors(&self) -> String {
        let mut factors: Vec<(&String, &f64)> = self.factors.iter().collect();
        factors.sort_by(|a, b| {
            b.1.abs()
                .partial_cmp(&a.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        factors
            .iter()
            .map(|(name, delta)| format!("{name} ({delta:+.2})"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Clamp a raw score into `[MIN_SCORE, MAX_SCORE]`
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return MIN_SCORE;
    }
    score.clamp(MIN_SCORE, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_accumulates() {
        let mut c = Confidence::new(0.5, "test");
        c.add_factor("a", 0.1);
        c.add_factor("a", 0.2);
        assert!((c.factor("a").unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(c.factors.len(), 1);
    }

    #[test]
    fn test_recompute_clamps() {
        let mut c = Confidence::new(0.5, "test");
        c.add_factor("huge", 5.0);
        assert_eq!(c.recompute(0.5), 1.0);

        let mut low = Confidence::new(0.5, "test");
        low.add_factor("penalty", -3.0);
        assert_eq!(low.recompute(0.5), 0.1);
    }

    #[test]
    fn test_rationale_lists_factors() {
        let mut c = Confidence::new(0.5, "test");
        c.add_factor("declared_type", 0.2);
        c.add_factor("ambiguity_penalty", -0.1);
        c.recompute(0.5);
        assert!(c.rationale.starts_with("declared_type"));
        assert!(c.rationale.contains("ambiguity_penalty (-0.10)"));
    }
}
