//! Design metrics of a diagram
//!
//! All metrics are pure functions of the nodes, the edges and (for coverage)
//! the declared queries. [`MetricsCache`] memoizes them per diagram.

mod cache;
mod coverage;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::schema::{Relationship, TableNode};
use super::versioning::Solution;

pub use cache::{CacheStats, MetricsCache};
pub use coverage::{is_query_handled, query_coverage};

/// Weight of the deepest nesting level in the access pattern
pub const DEPTH_WEIGHT: f64 = 0.4;
/// Weight of the most related table in the access pattern
pub const RELATIONS_WEIGHT: f64 = 0.6;
/// Weight of the column count in the recovery cost
pub const COLUMNS_WEIGHT: f64 = 0.51;
/// Weight of the nested-table count in the recovery cost
pub const NESTED_WEIGHT: f64 = 0.49;

/// Rounds half up to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Nesting level of the deepest table: 1 for a flat table, 0 for an empty diagram
pub fn max_nesting_level(nodes: &[TableNode]) -> usize {
    nodes
        .iter()
        .map(|node| node.table().depth())
        .max()
        .unwrap_or(0)
}

/// Highest number of relationship endpoints on a single table
pub fn max_relations(edges: &[Relationship]) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        *counts.entry(edge.source.as_str()).or_default() += 1;
        *counts.entry(edge.target.as_str()).or_default() += 1;
    }
    counts.into_values().max().unwrap_or(0)
}

/// `0.4 * maxDepth + 0.6 * maxRelations`, where `maxDepth` is the nesting level
/// minus one. A flat table sits at level 1, so only an empty diagram goes
/// negative (`-0.4`).
pub fn access_pattern(nodes: &[TableNode], edges: &[Relationship]) -> f64 {
    let max_depth = max_nesting_level(nodes) as f64 - 1.0;
    round2(DEPTH_WEIGHT * max_depth + RELATIONS_WEIGHT * max_relations(edges) as f64)
}

/// Number of repeated labels across the forest: each label seen `k` times adds `k - 1`
pub fn redundancy(nodes: &[TableNode]) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in nodes {
        node.table().walk(None, &mut |table, _| {
            *counts.entry(table.label.as_str()).or_default() += 1;
        });
    }
    counts.into_values().map(|count| count - 1).sum()
}

pub fn total_columns(nodes: &[TableNode]) -> usize {
    nodes.iter().map(|node| node.table().total_columns()).sum()
}

pub fn total_nested_tables(nodes: &[TableNode]) -> usize {
    nodes.iter().map(|node| node.table().total_nested()).sum()
}

/// `0.51 * columns + 0.49 * nested tables + access pattern`
pub fn recovery_cost(nodes: &[TableNode], edges: &[Relationship]) -> f64 {
    round2(
        COLUMNS_WEIGHT * total_columns(nodes) as f64
            + NESTED_WEIGHT * total_nested_tables(nodes) as f64
            + access_pattern(nodes, edges),
    )
}

/// All metrics of one diagram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub access_pattern: f64,
    pub redundancy: usize,
    pub recovery_cost: f64,
    pub query_coverage: f64,
}

/// One row of the version comparison table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetrics {
    pub version_id: String,
    /// Version description
    pub schema: String,
    pub redundancy: usize,
    pub recovery_cost: f64,
    pub access_pattern: f64,
    /// Percentage of the solution's queries the version handles
    pub completeness: f64,
}

/// Computes the metric rows of every version of a solution, in version order
pub fn compare_versions(solution: &Solution) -> Vec<VersionMetrics> {
    solution
        .versions
        .iter()
        .map(|version| VersionMetrics {
            version_id: version.id.clone(),
            schema: version.description.clone(),
            redundancy: redundancy(&version.nodes),
            recovery_cost: recovery_cost(&version.nodes, &version.edges),
            access_pattern: access_pattern(&version.nodes, &version.edges),
            completeness: query_coverage(&version.nodes, &version.edges, &solution.queries),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Table;

    fn node(id: &str, label: &str) -> TableNode {
        TableNode::new(Table::new(id, label).with_primary_key())
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.6000000000000001), 0.6);
        assert_eq!(round2(-0.4), -0.4);
        assert_eq!(round2(1.234), 1.23);
        assert_eq!(round2(1.236), 1.24);
    }

    #[test]
    fn test_access_pattern_empty_diagram() {
        assert_eq!(access_pattern(&[], &[]), -0.4);
    }

    #[test]
    fn test_access_pattern_single_relationship() {
        let nodes = vec![node("a", "A"), node("b", "B")];
        let edges = vec![Relationship::between("a", "b")];
        assert_eq!(access_pattern(&nodes, &edges), 0.6);
    }

    #[test]
    fn test_access_pattern_counts_depth_and_hubs() {
        let nested = Table::new("a", "A")
            .with_primary_key()
            .with_nested(Table::new("a-1", "B").with_nested(Table::new("a-1-1", "C")));
        let nodes = vec![
            TableNode::new(nested),
            node("b", "X"),
            node("c", "Y"),
            node("d", "Z"),
        ];
        let edges = vec![
            Relationship::between("b", "c"),
            Relationship::between("b", "d"),
            Relationship::between("a", "b"),
        ];
        assert_eq!(max_nesting_level(&nodes), 3);
        assert_eq!(max_relations(&edges), 3);
        assert_eq!(access_pattern(&nodes, &edges), 2.6);
    }

    #[test]
    fn test_redundancy_counts_repeats_at_any_depth() {
        let nodes = vec![
            TableNode::new(
                Table::new("a", "address").with_nested(Table::new("a-1", "geo")),
            ),
            TableNode::new(
                Table::new("b", "users")
                    .with_nested(Table::new("b-1", "address"))
                    .with_nested(Table::new("b-2", "address")),
            ),
        ];
        assert_eq!(redundancy(&nodes), 2);
        assert_eq!(redundancy(&[]), 0);
    }

    #[test]
    fn test_recovery_cost() {
        let nodes = vec![node("a", "A"), node("b", "B")];
        let edges = vec![Relationship::between("a", "b")];
        assert_eq!(recovery_cost(&nodes, &edges), 1.62);
        assert_eq!(recovery_cost(&[], &[]), -0.4);
    }
}
