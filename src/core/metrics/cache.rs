//! Per-diagram memoization of the metrics

use std::cell::Cell;

use crate::core::fingerprint::{queries_hash, structure_hash};
use crate::core::schema::{Query, Relationship, TableNode};

/// One memoized value with the structural hash it was computed for
#[derive(Debug, Default)]
struct Slot<T: Copy> {
    entry: Cell<Option<(u64, T)>>,
}

impl<T: Copy> Slot<T> {
    fn get_or_compute(&self, key: u64, stats: &Counters, compute: impl FnOnce() -> T) -> T {
        if let Some((cached_key, value)) = self.entry.get()
            && cached_key == key
        {
            stats.hits.set(stats.hits.get() + 1);
            return value;
        }
        stats.misses.set(stats.misses.get() + 1);
        let value = compute();
        self.entry.set(Some((key, value)));
        value
    }

    fn clear(&self) {
        self.entry.set(None);
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: Cell<u64>,
    misses: Cell<u64>,
}

/// Hit and miss counters of a [`MetricsCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes each metric against a hash of the diagram that ignores canvas
/// positions, so moving tables never triggers a recomputation.
///
/// Each diagram owns its own cache. It is not `Sync`.
#[derive(Debug, Default)]
pub struct MetricsCache {
    access_pattern: Slot<f64>,
    redundancy: Slot<usize>,
    recovery_cost: Slot<f64>,
    query_coverage: Slot<f64>,
    counters: Counters,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn access_pattern(&self, nodes: &[TableNode], edges: &[Relationship]) -> f64 {
        let key = structure_hash(nodes, edges);
        self.access_pattern
            .get_or_compute(key, &self.counters, || super::access_pattern(nodes, edges))
    }

    pub fn redundancy(&self, nodes: &[TableNode]) -> usize {
        let key = structure_hash(nodes, &[]);
        self.redundancy
            .get_or_compute(key, &self.counters, || super::redundancy(nodes))
    }

    pub fn recovery_cost(&self, nodes: &[TableNode], edges: &[Relationship]) -> f64 {
        let key = structure_hash(nodes, edges);
        self.recovery_cost
            .get_or_compute(key, &self.counters, || super::recovery_cost(nodes, edges))
    }

    pub fn query_coverage(
        &self,
        nodes: &[TableNode],
        edges: &[Relationship],
        queries: &[Query],
    ) -> f64 {
        let key = structure_hash(nodes, edges) ^ queries_hash(queries).rotate_left(1);
        self.query_coverage.get_or_compute(key, &self.counters, || {
            super::query_coverage(nodes, edges, queries)
        })
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.get(),
            misses: self.counters.misses.get(),
        }
    }

    pub fn clear(&self) {
        self.access_pattern.clear();
        self.redundancy.clear();
        self.recovery_cost.clear();
        self.query_coverage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Table;

    fn nodes() -> Vec<TableNode> {
        vec![
            TableNode::new(Table::new("a", "A")),
            TableNode::new(Table::new("b", "B")),
        ]
    }

    #[test]
    fn test_repeated_reads_hit() {
        let cache = MetricsCache::new();
        let nodes = nodes();
        let edges = vec![Relationship::between("a", "b")];

        assert_eq!(cache.access_pattern(&nodes, &edges), 0.6);
        assert_eq!(cache.access_pattern(&nodes, &edges), 0.6);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_moving_tables_keeps_cache() {
        let cache = MetricsCache::new();
        let mut nodes = nodes();
        cache.recovery_cost(&nodes, &[]);
        nodes[0].position.x = 300.0;
        cache.recovery_cost(&nodes, &[]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_structural_change_recomputes() {
        let cache = MetricsCache::new();
        let mut nodes = nodes();
        assert_eq!(cache.redundancy(&nodes), 0);
        nodes.push(TableNode::new(Table::new("c", "A")));
        assert_eq!(cache.redundancy(&nodes), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2 });
    }

    #[test]
    fn test_coverage_key_includes_queries() {
        let cache = MetricsCache::new();
        let nodes = nodes();
        let handled = vec![Query::new("q", &["A"])];
        let unhandled = vec![Query::new("q", &["Z"])];
        assert_eq!(cache.query_coverage(&nodes, &[], &handled), 100.0);
        assert_eq!(cache.query_coverage(&nodes, &[], &unhandled), 0.0);
    }

    #[test]
    fn test_clear() {
        let cache = MetricsCache::new();
        let nodes = nodes();
        cache.redundancy(&nodes);
        cache.clear();
        cache.redundancy(&nodes);
        assert_eq!(cache.stats().misses, 2);
    }
}
