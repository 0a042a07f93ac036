//! Query coverage: how many declared access patterns the schema can answer

use std::collections::HashMap;

use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Bfs;

use super::round2;
use crate::core::schema::{Query, Relationship, TableNode};

/// Reachability over the whole forest: nesting links parent and child,
/// relationships link top-level tables. Both are walked in either direction.
struct Reachability<'a> {
    ids_by_label: HashMap<&'a str, Vec<&'a str>>,
    component: HashMap<&'a str, usize>,
}

impl<'a> Reachability<'a> {
    fn build(nodes: &'a [TableNode], edges: &'a [Relationship]) -> Self {
        let mut graph: UnGraphMap<&'a str, ()> = UnGraphMap::new();
        let mut ids_by_label: HashMap<&'a str, Vec<&'a str>> = HashMap::new();

        for node in nodes {
            node.table().walk(None, &mut |table, parent| {
                graph.add_node(table.id.as_str());
                if let Some(parent) = parent {
                    graph.add_edge(parent.id.as_str(), table.id.as_str(), ());
                }
                ids_by_label
                    .entry(table.label.as_str())
                    .or_default()
                    .push(table.id.as_str());
            });
        }

        for edge in edges {
            if graph.contains_node(edge.source.as_str())
                && graph.contains_node(edge.target.as_str())
            {
                graph.add_edge(edge.source.as_str(), edge.target.as_str(), ());
            }
        }

        let mut component = HashMap::new();
        let mut next = 0;
        for start in graph.nodes() {
            if component.contains_key(start) {
                continue;
            }
            let mut bfs = Bfs::new(&graph, start);
            while let Some(id) = bfs.next(&graph) {
                component.insert(id, next);
            }
            next += 1;
        }

        Self {
            ids_by_label,
            component,
        }
    }

    /// Some table named `a` and some table named `b` share a component
    fn connected(&self, a: &[&str], b: &[&str]) -> bool {
        a.iter().any(|left| {
            b.iter().any(|right| {
                left == right
                    || matches!(
                        (self.component.get(left), self.component.get(right)),
                        (Some(x), Some(y)) if x == y
                    )
            })
        })
    }

    fn handles(&self, query: &Query) -> bool {
        let mut names: Vec<&str> = Vec::new();
        for name in &query.collections {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }

        let mut id_sets = Vec::with_capacity(names.len());
        for name in &names {
            match self.ids_by_label.get(name) {
                Some(ids) if !ids.is_empty() => id_sets.push(ids.as_slice()),
                _ => return false,
            }
        }

        for i in 0..id_sets.len() {
            for j in (i + 1)..id_sets.len() {
                if !self.connected(id_sets[i], id_sets[j]) {
                    return false;
                }
            }
        }
        true
    }
}

/// A query is handled when every collection it names exists and all of them
/// are mutually reachable. A query naming no collection is handled.
pub fn is_query_handled(nodes: &[TableNode], edges: &[Relationship], query: &Query) -> bool {
    Reachability::build(nodes, edges).handles(query)
}

/// Percentage of handled queries, 0 when there are none
pub fn query_coverage(nodes: &[TableNode], edges: &[Relationship], queries: &[Query]) -> f64 {
    if queries.is_empty() {
        return 0.0;
    }

    let reachability = Reachability::build(nodes, edges);
    let handled = queries
        .iter()
        .filter(|query| reachability.handles(query))
        .count();

    tracing::trace!("{} of {} queries handled", handled, queries.len());
    round2(handled as f64 * 100.0 / queries.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Table;

    fn forest() -> (Vec<TableNode>, Vec<Relationship>) {
        let nodes = vec![
            TableNode::new(
                Table::new("u", "users").with_nested(Table::new("u-1", "addresses")),
            ),
            TableNode::new(Table::new("o", "orders")),
            TableNode::new(Table::new("p", "products")),
        ];
        let edges = vec![Relationship::between("u", "o")];
        (nodes, edges)
    }

    #[test]
    fn test_no_queries_is_zero() {
        let (nodes, edges) = forest();
        assert_eq!(query_coverage(&nodes, &edges, &[]), 0.0);
    }

    #[test]
    fn test_single_collection_must_exist() {
        let (nodes, edges) = forest();
        assert!(is_query_handled(&nodes, &edges, &Query::new("q", &["products"])));
        assert!(!is_query_handled(&nodes, &edges, &Query::new("q", &["invoices"])));
        assert!(is_query_handled(&nodes, &edges, &Query::new("q", &[])));
    }

    #[test]
    fn test_nesting_and_relationships_connect() {
        let (nodes, edges) = forest();
        assert!(is_query_handled(
            &nodes,
            &edges,
            &Query::new("q", &["addresses", "orders"])
        ));
        assert!(!is_query_handled(
            &nodes,
            &edges,
            &Query::new("q", &["orders", "products"])
        ));
    }

    #[test]
    fn test_duplicate_names_are_ignored() {
        let (nodes, edges) = forest();
        assert!(is_query_handled(
            &nodes,
            &edges,
            &Query::new("q", &["orders", "orders", "users"])
        ));
    }

    #[test]
    fn test_any_table_carrying_a_name_counts() {
        let nodes = vec![
            TableNode::new(Table::new("a", "clients").with_nested(Table::new("a-1", "notes"))),
            TableNode::new(Table::new("b", "stores").with_nested(Table::new("b-1", "notes"))),
        ];
        assert!(is_query_handled(&nodes, &[], &Query::new("q", &["stores", "notes"])));
        assert!(!is_query_handled(&nodes, &[], &Query::new("q", &["stores", "clients"])));
    }

    #[test]
    fn test_coverage_percentage() {
        let (nodes, edges) = forest();
        let queries = vec![
            Query::new("q1", &["users", "orders"]),
            Query::new("q2", &["orders", "products"]),
            Query::new("q3", &["addresses"]),
        ];
        assert_eq!(query_coverage(&nodes, &edges, &queries), 66.67);
    }
}
