//! Merging of relationships proposed by several strategies

use std::collections::BTreeMap;

use crate::models::{RelationshipConfidence, SchemaRelationship, clamp_score};

const MULTIPLE_SIGNALS_STEP: f64 = 0.1;
const MAX_COUNTED_METHODS: usize = 3;

/// Filter, deduplicate and rank raw strategy output
///
/// Relationships below `threshold` are dropped, the rest are grouped by their
/// `(source_schema, target_schema)` pair and merged so each pair appears once.
/// A bidirectional relationship has no orientation of its own, so it joins the
/// directed group for the same two schemas when one exists.
/// The result is sorted by confidence (ties by pair) and truncated to `limit`.
pub fn consolidate_relationships(
    relationships: Vec<SchemaRelationship>,
    threshold: f64,
    limit: Option<usize>,
) -> Vec<SchemaRelationship> {
    let mut groups: BTreeMap<(String, String), Vec<SchemaRelationship>> = BTreeMap::new();
    let mut symmetric = Vec::new();
    for relationship in relationships {
        if relationship.confidence.score < threshold {
            continue;
        }
        if relationship.bidirectional {
            symmetric.push(relationship);
            continue;
        }
        let key = (
            relationship.source_schema.clone(),
            relationship.target_schema.clone(),
        );
        groups.entry(key).or_default().push(relationship);
    }
    for relationship in symmetric {
        let reversed = (
            relationship.target_schema.clone(),
            relationship.source_schema.clone(),
        );
        let key = if groups.contains_key(&reversed) {
            reversed
        } else {
            (
                relationship.source_schema.clone(),
                relationship.target_schema.clone(),
            )
        };
        groups.entry(key).or_default().push(relationship);
    }

    let mut merged: Vec<SchemaRelationship> = groups.into_values().filter_map(merge_group).collect();
    merged.sort_by(|a, b| {
        b.confidence
            .score
            .partial_cmp(&a.confidence.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pair().cmp(&b.pair()))
    });
    if let Some(limit) = limit {
        merged.truncate(limit);
    }
    merged
}

/// Merge relationships for one pair into the strongest member
///
/// Each factor is averaged over the whole group, members lacking it count as
/// zero. The score is `max(best, mean + multiple_signals)` and the rationale
/// spells that out alongside the averaged factors.
fn merge_group(mut group: Vec<SchemaRelationship>) -> Option<SchemaRelationship> {
    if group.len() <= 1 {
        return group.pop();
    }
    // Highest confidence first; earlier strategies win ties
    group.sort_by(|a, b| {
        b.confidence
            .score
            .partial_cmp(&a.confidence.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut methods: Vec<String> = Vec::new();
    for member in &group {
        for method in &member.metadata.detection_methods {
            if !methods.contains(method) {
                methods.push(method.clone());
            }
        }
    }

    let size = group.len() as f64;
    let mut averaged: BTreeMap<String, f64> = BTreeMap::new();
    for member in &group {
        for (name, delta) in &member.confidence.factors {
            *averaged.entry(name.clone()).or_insert(0.0) += delta / size;
        }
    }

    let base = group[0].confidence.score;
    let mean = group.iter().map(|r| r.confidence.score).sum::<f64>() / size;

    // A directed member keeps the orientation
    let lead = group.iter().position(|r| !r.bidirectional).unwrap_or(0);
    let mut best = group.remove(lead);

    let mut confidence = RelationshipConfidence::new(base, "consolidated");
    for (name, delta) in averaged {
        confidence.add_factor(name, delta);
    }
    let mut bonus = 0.0;
    if methods.len() > 1 {
        bonus = MULTIPLE_SIGNALS_STEP * methods.len().min(MAX_COUNTED_METHODS) as f64;
        confidence.add_factor("multiple_signals", bonus);
    }
    confidence.score = clamp_score(base.max(mean + bonus));
    confidence.rationale = format!(
        "max(best {base:.2}, mean {mean:.2} + multiple_signals {bonus:.2}) = {:.2}; {}",
        confidence.score,
        confidence.describe_factors()
    );

    for other in group {
        for (key, value) in other.metadata.additional {
            best.metadata.additional.entry(key).or_insert(value);
        }
    }
    best.confidence = confidence;
    best.metadata.detection_methods = methods;
    Some(best)
}
