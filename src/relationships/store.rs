//! Assembly of the relationship store

use std::collections::{BTreeMap, HashMap};

use petgraph::graph::NodeIndex;
use petgraph::visit::Dfs;
use petgraph::{Graph, Undirected};

use crate::models::{
    ConfidenceStats, ConfidenceSummary, RelationshipType, SchemaRelationship,
    SchemaRelationshipStore, StoreMetadata,
};

/// Wrap consolidated relationships with coverage, statistics and clusters
pub fn build_store(
    relationships: Vec<SchemaRelationship>,
    schema_ids: &[String],
    strategies_run: Vec<String>,
    failed_strategies: Vec<String>,
) -> SchemaRelationshipStore {
    let schema_coverage = coverage(&relationships);
    let confidence_summary = summarize(&relationships);
    let clusters = clusters(schema_ids, &relationships);
    let metadata = StoreMetadata {
        schema_count: schema_ids.len(),
        relationship_count: relationships.len(),
        strategies_run,
        failed_strategies,
        clusters,
        ..StoreMetadata::default()
    };
    SchemaRelationshipStore {
        relationships,
        schema_coverage,
        confidence_summary,
        metadata,
    }
}

/// Schemas reachable from each schema; symmetric links are recorded both ways
fn coverage(relationships: &[SchemaRelationship]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut link = |from: &str, to: &str| {
        let related = map.entry(from.to_string()).or_default();
        if !related.iter().any(|r| r == to) {
            related.push(to.to_string());
        }
    };
    for relationship in relationships {
        link(&relationship.source_schema, &relationship.target_schema);
        if relationship.bidirectional {
            link(&relationship.target_schema, &relationship.source_schema);
        }
    }
    for related in map.values_mut() {
        related.sort();
    }
    map
}

fn summarize(relationships: &[SchemaRelationship]) -> ConfidenceSummary {
    let overall: Vec<f64> = relationships.iter().map(|r| r.confidence.score).collect();
    let mut per_type: BTreeMap<RelationshipType, Vec<f64>> = BTreeMap::new();
    for relationship in relationships {
        per_type
            .entry(relationship.relationship_type)
            .or_default()
            .push(relationship.confidence.score);
    }
    ConfidenceSummary {
        overall: ConfidenceStats::from_scores(&overall),
        by_type: per_type
            .into_iter()
            .map(|(kind, scores)| (kind, ConfidenceStats::from_scores(&scores)))
            .collect(),
    }
}

/// Connected groups of two or more related schemas, sorted
fn clusters(schema_ids: &[String], relationships: &[SchemaRelationship]) -> Vec<Vec<String>> {
    let mut graph = Graph::<&str, (), Undirected>::new_undirected();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();
    for id in schema_ids {
        node_map
            .entry(id.as_str())
            .or_insert_with(|| graph.add_node(id.as_str()));
    }
    for relationship in relationships {
        let source = *node_map
            .entry(relationship.source_schema.as_str())
            .or_insert_with(|| graph.add_node(relationship.source_schema.as_str()));
        let target = *node_map
            .entry(relationship.target_schema.as_str())
            .or_insert_with(|| graph.add_node(relationship.target_schema.as_str()));
        graph.add_edge(source, target, ());
    }

    let mut visited = vec![false; graph.node_count()];
    let mut groups = Vec::new();
    for start in graph.node_indices() {
        if visited[start.index()] {
            continue;
        }
        let mut members = Vec::new();
        let mut dfs = Dfs::new(&graph, start);
        while let Some(node) = dfs.next(&graph) {
            visited[node.index()] = true;
            members.push(graph[node].to_string());
        }
        if members.len() > 1 {
            members.sort();
            groups.push(members);
        }
    }
    groups.sort();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelationshipConfidence;

    fn rel(source: &str, target: &str, kind: RelationshipType, score: f64) -> SchemaRelationship {
        SchemaRelationship::new(
            source,
            target,
            vec!["a".into()],
            vec!["b".into()],
            kind,
            RelationshipConfidence::new(score, "test"),
        )
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_coverage_and_clusters() {
        let store = build_store(
            vec![
                rel("posts", "users", RelationshipType::ManyToOne, 0.9),
                rel("comments", "posts", RelationshipType::ManyToOne, 0.8),
                rel("profiles", "accounts", RelationshipType::OneToOne, 0.6),
            ],
            &ids(&["users", "posts", "comments", "accounts", "profiles", "tags"]),
            vec!["foreign_key".into()],
            vec![],
        );
        assert_eq!(store.related("posts"), ["users".to_string()]);
        assert!(store.related("users").is_empty());
        assert_eq!(store.related("accounts"), ["profiles".to_string()]);
        assert_eq!(
            store.metadata.clusters,
            vec![ids(&["accounts", "profiles"]), ids(&["comments", "posts", "users"])]
        );
        assert_eq!(store.metadata.schema_count, 6);
        assert_eq!(store.metadata.relationship_count, 3);
    }

    #[test]
    fn test_summary() {
        let store = build_store(
            vec![
                rel("a", "b", RelationshipType::ManyToOne, 0.9),
                rel("c", "d", RelationshipType::ManyToOne, 0.7),
                rel("e", "f", RelationshipType::OneToOne, 0.5),
            ],
            &ids(&["a", "b", "c", "d", "e", "f"]),
            vec![],
            vec![],
        );
        assert_eq!(store.confidence_summary.overall.count, 3);
        let many_to_one = &store.confidence_summary.by_type[&RelationshipType::ManyToOne];
        assert_eq!(many_to_one.count, 2);
        assert!((many_to_one.mean - 0.8).abs() < 1e-9);
    }
}
