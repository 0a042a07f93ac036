//! Connectivity engine
//!
//! [`Diagram`] is the working set of one version: the forest of top-level
//! tables, the relationship edges between them and the parent-pointer index
//! used to reach nested tables. Every structural mutation leaves the
//! `submodel_index` of each top-level table equal to the index of every table
//! reachable from it, and different from every table that is not.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::error::{SchemaError, SchemaResult};
use super::metrics::{MetricsCache, MetricsReport};
use super::schema::{
    Cardinality, Column, ColumnId, ColumnType, EdgeId, Position, Query, Relationship, Table,
    TableId, TableIndex, TableNode, TableOps, descend, descend_mut, foreign_key_column_id,
    foreign_key_name, short_id,
};
use super::validation::{ValidationResult, validate_column_name, validate_table_label};

/// Undirected adjacency list over top-level table ids
pub type Graph = HashMap<TableId, Vec<TableId>>;

/// Naming heuristic used to detect an existing relationship: a column of one
/// table mentions the label of the other.
pub fn exists_connection(source: &Table, target: &Table) -> bool {
    source
        .columns
        .iter()
        .any(|column| column.name.contains(target.label.as_str()))
        || target
            .columns
            .iter()
            .any(|column| column.name.contains(source.label.as_str()))
}

/// Builds the undirected adjacency list of the relationship graph.
/// Every node gets an entry, isolated ones included.
pub fn build_graph(nodes: &[TableNode], edges: &[Relationship]) -> Graph {
    let mut graph: Graph = nodes
        .iter()
        .map(|node| (node.id.clone(), Vec::new()))
        .collect();

    for edge in edges {
        if !graph.contains_key(&edge.source) || !graph.contains_key(&edge.target) {
            continue;
        }
        if let Some(neighbors) = graph.get_mut(&edge.source) {
            neighbors.push(edge.target.clone());
        }
        if let Some(neighbors) = graph.get_mut(&edge.target) {
            neighbors.push(edge.source.clone());
        }
    }

    graph
}

/// Ids reachable from `start` in breadth-first order, `start` first
pub fn reachable_from(graph: &Graph, start: &str) -> Vec<TableId> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::new();

    if !graph.contains_key(start) {
        return order;
    }
    visited.insert(start);
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        order.push(current.to_string());
        if let Some(neighbors) = graph.get(current) {
            for neighbor in neighbors {
                if visited.insert(neighbor.as_str()) {
                    queue.push_back(neighbor.as_str());
                }
            }
        }
    }

    order
}

/// The editable diagram of a single version
#[derive(Debug, Default)]
pub struct Diagram {
    nodes: Vec<TableNode>,
    edges: Vec<Relationship>,
    index: TableIndex,
    cache: MetricsCache,
}

impl Clone for Diagram {
    fn clone(&self) -> Self {
        Self::from_parts(self.nodes.clone(), self.edges.clone())
    }
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps existing nodes and edges. The stored submodel indices are taken as they are.
    pub fn from_parts(nodes: Vec<TableNode>, edges: Vec<Relationship>) -> Self {
        let index = TableIndex::build(&nodes);
        Self {
            nodes,
            edges,
            index,
            cache: MetricsCache::default(),
        }
    }

    /// Swaps the whole working set, keeping the metrics cache of this diagram
    pub fn replace_with(&mut self, nodes: Vec<TableNode>, edges: Vec<Relationship>) {
        self.index = TableIndex::build(&nodes);
        self.nodes = nodes;
        self.edges = edges;
    }

    pub fn into_parts(self) -> (Vec<TableNode>, Vec<Relationship>) {
        (self.nodes, self.edges)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn nodes(&self) -> &[TableNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Relationship] {
        &self.edges
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    pub fn node(&self, table_id: &str) -> Option<&TableNode> {
        self.nodes.iter().find(|node| node.id == table_id)
    }

    pub fn edge(&self, edge_id: &str) -> Option<&Relationship> {
        self.edges.iter().find(|edge| edge.id == edge_id)
    }

    /// Any table of the forest, top-level or nested
    pub fn table(&self, table_id: &str) -> Option<&Table> {
        let root = self.index.root_of(table_id)?;
        let path = self.index.path_below_root(table_id)?;
        let node = self.node(root)?;
        descend(node.table(), &path)
    }

    pub fn parent_of(&self, table_id: &str) -> Option<&Table> {
        let parent = self.index.parent_of(table_id)?;
        self.table(parent)
    }

    pub fn root_of(&self, table_id: &str) -> Option<&TableNode> {
        let root = self.index.root_of(table_id)?;
        self.node(root)
    }

    /// Finds a column anywhere in the forest together with the id of its table
    pub fn find_column(&self, column_id: &str) -> Option<(TableId, &Column)> {
        let mut found = None;
        for node in &self.nodes {
            node.table().walk(None, &mut |table, _| {
                if found.is_none()
                    && let Some((_, column)) = table.find_column(column_id)
                {
                    found = Some((table.id.clone(), column));
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }

    /// Next free submodel index: one past the current maximum, 0 for an empty diagram
    pub fn next_submodel_index(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| node.submodel_index() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn build_graph(&self) -> Graph {
        build_graph(&self.nodes, &self.edges)
    }

    pub fn exists_connection(&self, source_id: &str, target_id: &str) -> SchemaResult<bool> {
        let source = self.top_level(source_id)?;
        let target = self.top_level(target_id)?;
        Ok(exists_connection(source.table(), target.table()))
    }

    // ========================================================================
    // Relationships
    // ========================================================================

    /// Relates two top-level tables.
    ///
    /// The target receives a `<source>_id` foreign key and its whole submodel
    /// is merged into the submodel of the source.
    pub fn connect(&mut self, source_id: &str, target_id: &str) -> SchemaResult<EdgeId> {
        let source = self.top_level(source_id)?;
        let target = self.top_level(target_id)?;

        if exists_connection(source.table(), target.table()) {
            tracing::warn!(
                "Relationship between '{}' and '{}' already exists",
                source.label(),
                target.label()
            );
            return Err(SchemaError::DuplicateRelationship {
                source_label: source.label().to_string(),
                target_label: target.label().to_string(),
            });
        }

        let source_label = source.label().to_string();
        let surviving = source.submodel_index();
        let absorbed = target.submodel_index();

        self.top_level_mut(target_id)?
            .table_mut()
            .create_column(Column::foreign_key(source_id, &source_label, target_id));

        if absorbed != surviving {
            for node in &mut self.nodes {
                if node.submodel_index() == absorbed {
                    node.table_mut().set_submodel_index(surviving);
                }
            }
        }

        let edge = Relationship::between(source_id, target_id);
        let edge_id = edge.id.clone();
        self.edges.push(edge);

        tracing::debug!(
            "Connected {} -> {} (submodel {} merged into {})",
            source_id,
            target_id,
            absorbed,
            surviving
        );
        Ok(edge_id)
    }

    /// Removes a relationship and its foreign key, then moves everything still
    /// reachable from the target into a fresh submodel.
    pub fn disconnect(&mut self, edge_id: &str) -> SchemaResult<Relationship> {
        let position = self
            .edges
            .iter()
            .position(|edge| edge.id == edge_id)
            .ok_or_else(|| {
                tracing::warn!("Disconnect of unknown relationship {}", edge_id);
                SchemaError::EdgeNotFound(edge_id.to_string())
            })?;
        let edge = self.edges.remove(position);

        let source_label = self.node(&edge.source).map(|node| node.label().to_string());
        self.strip_foreign_key(&edge.target, &edge.source, source_label.as_deref());

        if self.node(&edge.target).is_some() {
            let fresh = self.next_submodel_index();
            let component = reachable_from(&self.build_graph(), &edge.target);
            self.assign_submodel(&component, fresh);
            tracing::debug!(
                "Disconnected {}; {} table(s) moved to submodel {}",
                edge.id,
                component.len(),
                fresh
            );
        }

        Ok(edge)
    }

    /// Changes the cardinality shown on a relationship
    pub fn set_edge_cardinality(
        &mut self,
        edge_id: &str,
        cardinality: Cardinality,
    ) -> SchemaResult<()> {
        let edge = self
            .edges
            .iter_mut()
            .find(|edge| edge.id == edge_id)
            .ok_or_else(|| SchemaError::EdgeNotFound(edge_id.to_string()))?;
        edge.cardinality = cardinality;
        Ok(())
    }

    // ========================================================================
    // Top-level tables
    // ========================================================================

    /// Adds a top-level table in a submodel of its own
    pub fn add_table(&mut self, label: &str) -> SchemaResult<TableId> {
        self.add_table_at(label, Position::default())
    }

    pub fn add_table_at(&mut self, label: &str, position: Position) -> SchemaResult<TableId> {
        check_name(label, validate_table_label(label))?;

        let table = Table::new(short_id(), label)
            .with_primary_key()
            .with_submodel_index(self.next_submodel_index());
        let mut node = TableNode::new(table);
        node.position = position;
        let id = node.id.clone();

        self.index.insert_subtree(node.table(), None, &id, 0);
        tracing::debug!(
            "Added table '{}' ({}) in submodel {}",
            label,
            id,
            node.submodel_index()
        );
        self.nodes.push(node);
        Ok(id)
    }

    /// Deletes a top-level table with its nested subtree and every relationship
    /// touching it. Each former neighbour is re-partitioned into a fresh submodel.
    pub fn remove_table(&mut self, table_id: &str) -> SchemaResult<TableNode> {
        self.top_level(table_id)?;

        let touching: Vec<Relationship> = self
            .edges
            .iter()
            .filter(|edge| edge.touches(table_id))
            .cloned()
            .collect();
        let label = self.node(table_id).map(|node| node.label().to_string());

        let mut neighbors: Vec<TableId> = Vec::new();
        for edge in &touching {
            if edge.source == table_id {
                self.strip_foreign_key(&edge.target, table_id, label.as_deref());
            }
            if let Some(other) = edge.other_end(table_id)
                && other != table_id
                && !neighbors.iter().any(|id| id == other)
            {
                neighbors.push(other.to_string());
            }
        }

        self.edges.retain(|edge| !edge.touches(table_id));
        let position = self
            .nodes
            .iter()
            .position(|node| node.id == table_id)
            .ok_or_else(|| SchemaError::TableNotFound(table_id.to_string()))?;
        let removed = self.nodes.remove(position);
        self.index.remove_subtree(removed.table());

        let graph = self.build_graph();
        let mut reassigned: HashSet<TableId> = HashSet::new();
        for neighbor in &neighbors {
            if reassigned.contains(neighbor) {
                continue;
            }
            let fresh = self.next_submodel_index();
            let component = reachable_from(&graph, neighbor);
            self.assign_submodel(&component, fresh);
            reassigned.extend(component);
        }

        tracing::debug!(
            "Removed table {} with {} relationship(s)",
            table_id,
            touching.len()
        );
        Ok(removed)
    }

    /// Moves a top-level table on the canvas. Never affects any metric.
    pub fn move_table(&mut self, table_id: &str, position: Position) -> SchemaResult<()> {
        self.top_level_mut(table_id)?.position = position;
        Ok(())
    }

    // ========================================================================
    // Nested tables
    // ========================================================================

    /// Embeds a new table inside `parent_id`, which may itself be nested
    pub fn add_nested_table(&mut self, parent_id: &str, label: &str) -> SchemaResult<TableId> {
        check_name(label, validate_table_label(label))?;

        let (root, depth) = match self.index.get(parent_id) {
            Some(entry) => (entry.root.clone(), entry.depth),
            None => {
                tracing::warn!("Nested table requested under unknown table {}", parent_id);
                return Err(SchemaError::TableNotFound(parent_id.to_string()));
            }
        };

        let parent = self.table_mut(parent_id)?;
        let child = Table::new(format!("{}-{}", parent_id, short_id()), label)
            .with_primary_key()
            .with_submodel_index(parent.submodel_index);
        let child_id = child.id.clone();
        let child = Arc::new(child);
        parent.nested_tables.push(Arc::clone(&child));

        self.index.insert_subtree(&child, Some(parent_id), &root, depth + 1);
        tracing::debug!("Added nested table '{}' ({}) under {}", label, child_id, parent_id);
        Ok(child_id)
    }

    /// Deletes a nested table and everything embedded in it
    pub fn remove_nested_table(&mut self, table_id: &str) -> SchemaResult<Table> {
        let parent_id = match self.index.get(table_id) {
            Some(entry) => match &entry.parent {
                Some(parent) => parent.clone(),
                None => return Err(SchemaError::NotNested(table_id.to_string())),
            },
            None => {
                tracing::warn!("Removal of unknown nested table {}", table_id);
                return Err(SchemaError::TableNotFound(table_id.to_string()));
            }
        };

        let parent = self.table_mut(&parent_id)?;
        let position = parent
            .nested_tables
            .iter()
            .position(|table| table.id == table_id)
            .ok_or_else(|| SchemaError::TableNotFound(table_id.to_string()))?;
        let removed = parent.nested_tables.remove(position);
        let removed = Arc::try_unwrap(removed).unwrap_or_else(|shared| (*shared).clone());

        self.index.remove_subtree(&removed);
        tracing::debug!("Removed nested table {}", table_id);
        Ok(removed)
    }

    /// Sets the cardinality of a nested table relative to its parent
    pub fn set_nested_cardinality(
        &mut self,
        table_id: &str,
        cardinality: Cardinality,
    ) -> SchemaResult<()> {
        if !self.index.contains(table_id) {
            return Err(SchemaError::TableNotFound(table_id.to_string()));
        }
        if self.index.is_top_level(table_id) {
            return Err(SchemaError::NotNested(table_id.to_string()));
        }
        self.table_mut(table_id)?.cardinality = Some(cardinality);
        Ok(())
    }

    // ========================================================================
    // Columns
    // ========================================================================

    /// Appends user columns to any table of the forest.
    /// All columns are checked before the table is touched.
    pub fn add_columns(
        &mut self,
        table_id: &str,
        columns: Vec<(String, ColumnType)>,
    ) -> SchemaResult<Vec<ColumnId>> {
        for (name, column_type) in &columns {
            check_user_column(name, *column_type)?;
        }

        let table = self.table_mut(table_id)?;
        let mut ids = Vec::with_capacity(columns.len());
        for (name, column_type) in columns {
            let column = Column::new(format!("{}-{}", table_id, short_id()), name, column_type);
            ids.push(column.id.clone());
            table.create_column(column);
        }

        tracing::debug!("Added {} column(s) to {}", ids.len(), table_id);
        Ok(ids)
    }

    /// Renames or retypes a user column
    pub fn update_column(
        &mut self,
        column_id: &str,
        name: &str,
        column_type: ColumnType,
    ) -> SchemaResult<()> {
        let table_id = self.editable_column_owner(column_id)?;
        check_user_column(name, column_type)?;

        let table = self.table_mut(&table_id)?;
        let column = table
            .columns
            .iter_mut()
            .find(|column| column.id == column_id)
            .ok_or_else(|| SchemaError::ColumnNotFound(column_id.to_string()))?;
        column.name = name.to_string();
        column.column_type = column_type;
        Ok(())
    }

    /// Deletes a user column
    pub fn remove_column(&mut self, column_id: &str) -> SchemaResult<Column> {
        let table_id = self.editable_column_owner(column_id)?;
        let removed = self.table_mut(&table_id)?.delete_column(column_id)?;
        tracing::debug!("Removed column '{}' from {}", removed.name, table_id);
        Ok(removed)
    }

    // ========================================================================
    // Metrics
    // ========================================================================

    pub fn metrics_cache(&self) -> &MetricsCache {
        &self.cache
    }

    pub fn access_pattern(&self) -> f64 {
        self.cache.access_pattern(&self.nodes, &self.edges)
    }

    pub fn redundancy(&self) -> usize {
        self.cache.redundancy(&self.nodes)
    }

    pub fn recovery_cost(&self) -> f64 {
        self.cache.recovery_cost(&self.nodes, &self.edges)
    }

    pub fn query_coverage(&self, queries: &[Query]) -> f64 {
        self.cache.query_coverage(&self.nodes, &self.edges, queries)
    }

    pub fn metrics(&self, queries: &[Query]) -> MetricsReport {
        MetricsReport {
            access_pattern: self.access_pattern(),
            redundancy: self.redundancy(),
            recovery_cost: self.recovery_cost(),
            query_coverage: self.query_coverage(queries),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn top_level(&self, table_id: &str) -> SchemaResult<&TableNode> {
        match self.node(table_id) {
            Some(node) => Ok(node),
            None if self.index.contains(table_id) => {
                Err(SchemaError::NotTopLevel(table_id.to_string()))
            }
            None => {
                tracing::warn!("Unknown table {}", table_id);
                Err(SchemaError::TableNotFound(table_id.to_string()))
            }
        }
    }

    fn top_level_mut(&mut self, table_id: &str) -> SchemaResult<&mut TableNode> {
        self.nodes
            .iter_mut()
            .find(|node| node.id == table_id)
            .ok_or_else(|| SchemaError::TableNotFound(table_id.to_string()))
    }

    /// Mutable access to any table; shared subtrees on the path are copied
    fn table_mut(&mut self, table_id: &str) -> SchemaResult<&mut Table> {
        let not_found = || SchemaError::TableNotFound(table_id.to_string());
        let root = self.index.root_of(table_id).ok_or_else(not_found)?.to_string();
        let path = self.index.path_below_root(table_id).ok_or_else(not_found)?;

        let node = self
            .nodes
            .iter_mut()
            .find(|node| node.id == root)
            .ok_or_else(not_found)?;
        descend_mut(node.table_mut(), &path).ok_or_else(not_found)
    }

    fn editable_column_owner(&self, column_id: &str) -> SchemaResult<TableId> {
        let (table_id, column) = self.find_column(column_id).ok_or_else(|| {
            tracing::warn!("Unknown column {}", column_id);
            SchemaError::ColumnNotFound(column_id.to_string())
        })?;
        if column.is_structural() {
            return Err(SchemaError::ProtectedColumn {
                name: column.name.clone(),
                column_type: column.column_type,
            });
        }
        Ok(table_id)
    }

    /// Removes the foreign key a relationship from `source_id` put on `target_id`.
    /// Matches by column id first, then by the `<source>_id` name.
    fn strip_foreign_key(&mut self, target_id: &str, source_id: &str, source_label: Option<&str>) {
        let Some(target) = self.nodes.iter_mut().find(|node| node.id == target_id) else {
            return;
        };

        let column_id = foreign_key_column_id(source_id, target_id);
        let expected_name = source_label.map(foreign_key_name);
        let position = target
            .table()
            .columns
            .iter()
            .position(|column| column.id == column_id)
            .or_else(|| {
                target.table().columns.iter().position(|column| {
                    column.column_type == ColumnType::ForeignKey
                        && expected_name.as_deref() == Some(column.name.as_str())
                })
            });

        match position {
            Some(position) => {
                target.table_mut().columns.remove(position);
            }
            None => tracing::warn!(
                "No foreign key from {} found on {}",
                source_id,
                target_id
            ),
        }
    }

    fn assign_submodel(&mut self, table_ids: &[TableId], submodel_index: usize) {
        for node in &mut self.nodes {
            if table_ids.contains(&node.id) {
                node.table_mut().set_submodel_index(submodel_index);
            }
        }
    }
}

fn check_user_column(name: &str, column_type: ColumnType) -> SchemaResult<()> {
    if column_type.is_structural() {
        return Err(SchemaError::ProtectedColumn {
            name: name.to_string(),
            column_type,
        });
    }
    check_name(name, validate_column_name(name))
}

/// Fails only on errors; naming warnings are logged and the name is kept
fn check_name(name: &str, result: ValidationResult) -> SchemaResult<()> {
    for warning in &result.warnings {
        tracing::debug!("Name '{}': {}", name, warning);
    }
    result
        .to_result()
        .map_err(|reason| SchemaError::invalid_name(name, reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagram_with(labels: &[&str]) -> (Diagram, Vec<TableId>) {
        let mut diagram = Diagram::new();
        let ids = labels
            .iter()
            .map(|label| diagram.add_table(label).unwrap())
            .collect();
        (diagram, ids)
    }

    #[test]
    fn test_add_table_allocates_sequential_submodels() {
        let (diagram, ids) = diagram_with(&["users", "orders", "products"]);
        let indices: Vec<usize> = ids
            .iter()
            .map(|id| diagram.node(id).unwrap().submodel_index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(diagram.next_submodel_index(), 3);

        let users = diagram.table(&ids[0]).unwrap();
        assert_eq!(users.columns.len(), 1);
        assert_eq!(users.columns[0].name, "users_id");
        assert_eq!(users.columns[0].column_type, ColumnType::PrimaryKey);
    }

    #[test]
    fn test_add_table_rejects_invalid_label() {
        let mut diagram = Diagram::new();
        assert!(matches!(
            diagram.add_table(""),
            Err(SchemaError::InvalidName { .. })
        ));
        assert!(diagram.nodes().is_empty());
    }

    #[test]
    fn test_connect_adds_foreign_key_and_merges() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        let edge_id = diagram.connect(&ids[0], &ids[1]).unwrap();

        assert_eq!(edge_id, format!("e-{}-{}", ids[0], ids[1]));
        let orders = diagram.table(&ids[1]).unwrap();
        let fk = orders.columns.last().unwrap();
        assert_eq!(fk.name, "users_id");
        assert_eq!(fk.column_type, ColumnType::ForeignKey);
        assert_eq!(fk.id, format!("e-{}-{}", ids[1], ids[0]));

        assert_eq!(diagram.node(&ids[1]).unwrap().submodel_index(), 0);
        assert_eq!(diagram.edge(&edge_id).unwrap().cardinality, Cardinality::OneToOne);
    }

    #[test]
    fn test_connect_twice_is_duplicate() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        diagram.connect(&ids[0], &ids[1]).unwrap();

        let before = diagram.table(&ids[0]).unwrap().clone();
        let result = diagram.connect(&ids[1], &ids[0]);
        assert!(matches!(
            result,
            Err(SchemaError::DuplicateRelationship { .. })
        ));
        assert_eq!(diagram.edges().len(), 1);
        assert_eq!(diagram.table(&ids[0]).unwrap(), &before);
    }

    #[test]
    fn test_connect_to_self_is_duplicate() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        assert!(matches!(
            diagram.connect(&ids[0], &ids[0]),
            Err(SchemaError::DuplicateRelationship { .. })
        ));
    }

    #[test]
    fn test_connect_unknown_or_nested() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        let nested = diagram.add_nested_table(&ids[0], "address").unwrap();

        assert!(matches!(
            diagram.connect(&ids[0], "ghost"),
            Err(SchemaError::TableNotFound(_))
        ));
        assert!(matches!(
            diagram.connect(&nested, &ids[1]),
            Err(SchemaError::NotTopLevel(_))
        ));
    }

    #[test]
    fn test_connect_merges_whole_target_submodel() {
        let (mut diagram, ids) = diagram_with(&["a", "b", "c", "d"]);
        diagram.connect(&ids[2], &ids[3]).unwrap();
        diagram.connect(&ids[0], &ids[2]).unwrap();

        let indices: Vec<usize> = ids
            .iter()
            .map(|id| diagram.node(id).unwrap().submodel_index())
            .collect();
        assert_eq!(indices, vec![0, 1, 0, 0]);
    }

    #[test]
    fn test_disconnect_restores_and_splits() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        let edge_id = diagram.connect(&ids[0], &ids[1]).unwrap();
        diagram.disconnect(&edge_id).unwrap();

        assert!(diagram.edges().is_empty());
        assert_eq!(diagram.table(&ids[1]).unwrap().columns.len(), 1);
        assert_eq!(diagram.node(&ids[0]).unwrap().submodel_index(), 0);
        assert_eq!(diagram.node(&ids[1]).unwrap().submodel_index(), 1);
    }

    #[test]
    fn test_disconnect_unknown_edge() {
        let (mut diagram, _) = diagram_with(&["users"]);
        assert!(matches!(
            diagram.disconnect("e-x-y"),
            Err(SchemaError::EdgeNotFound(_))
        ));
    }

    #[test]
    fn test_disconnect_removes_only_one_foreign_key() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        let edge_id = diagram.connect(&ids[0], &ids[1]).unwrap();
        diagram
            .add_columns(&ids[1], vec![("note".into(), ColumnType::String)])
            .unwrap();

        diagram.disconnect(&edge_id).unwrap();
        let names: Vec<&str> = diagram
            .table(&ids[1])
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["orders_id", "note"]);
    }

    #[test]
    fn test_remove_table_requires_top_level() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let nested = diagram.add_nested_table(&ids[0], "address").unwrap();
        assert!(matches!(
            diagram.remove_table(&nested),
            Err(SchemaError::NotTopLevel(_))
        ));
        assert!(matches!(
            diagram.remove_table("ghost"),
            Err(SchemaError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_remove_table_drops_nested_index_entries() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let nested = diagram.add_nested_table(&ids[0], "address").unwrap();
        diagram.remove_table(&ids[0]).unwrap();
        assert!(diagram.table(&nested).is_none());
        assert!(diagram.index().is_empty());
    }

    #[test]
    fn test_nested_tables_inherit_submodel() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        let address = diagram.add_nested_table(&ids[1], "address").unwrap();
        let geo = diagram.add_nested_table(&address, "geo").unwrap();

        assert!(address.starts_with(&format!("{}-", ids[1])));
        assert!(geo.starts_with(&format!("{}-", address)));
        assert_eq!(diagram.table(&geo).unwrap().submodel_index, 1);
        assert_eq!(diagram.table(&geo).unwrap().columns[0].name, "geo_id");
        assert_eq!(diagram.parent_of(&geo).map(|t| t.id.as_str()), Some(address.as_str()));
        assert_eq!(diagram.root_of(&geo).map(|n| n.id.as_str()), Some(ids[1].as_str()));

        diagram.connect(&ids[0], &ids[1]).unwrap();
        assert_eq!(diagram.table(&address).unwrap().submodel_index, 0);
        assert_eq!(diagram.table(&geo).unwrap().submodel_index, 0);
    }

    #[test]
    fn test_remove_nested_table() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let address = diagram.add_nested_table(&ids[0], "address").unwrap();
        let geo = diagram.add_nested_table(&address, "geo").unwrap();

        assert!(matches!(
            diagram.remove_nested_table(&ids[0]),
            Err(SchemaError::NotNested(_))
        ));

        let removed = diagram.remove_nested_table(&address).unwrap();
        assert_eq!(removed.nested_tables.len(), 1);
        assert!(diagram.table(&geo).is_none());
        assert!(diagram.table(&ids[0]).unwrap().nested_tables.is_empty());
        assert_eq!(diagram.index().len(), 1);
    }

    #[test]
    fn test_nested_edits_do_not_touch_snapshots() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let snapshot = diagram.nodes().to_vec();
        diagram.add_nested_table(&ids[0], "address").unwrap();

        assert!(snapshot[0].table().nested_tables.is_empty());
        assert_eq!(diagram.table(&ids[0]).unwrap().nested_tables.len(), 1);
    }

    #[test]
    fn test_column_edits() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let nested = diagram.add_nested_table(&ids[0], "address").unwrap();
        let added = diagram
            .add_columns(
                &nested,
                vec![
                    ("street".into(), ColumnType::String),
                    ("number".into(), ColumnType::Integer),
                ],
            )
            .unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(diagram.table(&nested).unwrap().columns.len(), 3);

        diagram
            .update_column(&added[1], "zip", ColumnType::String)
            .unwrap();
        let (owner, column) = diagram.find_column(&added[1]).unwrap();
        assert_eq!(owner, nested);
        assert_eq!(column.name, "zip");

        let removed = diagram.remove_column(&added[0]).unwrap();
        assert_eq!(removed.name, "street");
        assert!(matches!(
            diagram.remove_column(&added[0]),
            Err(SchemaError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_structural_columns_are_protected() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let pk = diagram.table(&ids[0]).unwrap().columns[0].id.clone();

        assert!(matches!(
            diagram.remove_column(&pk),
            Err(SchemaError::ProtectedColumn { .. })
        ));
        assert!(matches!(
            diagram.update_column(&pk, "other", ColumnType::String),
            Err(SchemaError::ProtectedColumn { .. })
        ));
        assert!(matches!(
            diagram.add_columns(&ids[0], vec![("ref".into(), ColumnType::ForeignKey)]),
            Err(SchemaError::ProtectedColumn { .. })
        ));
    }

    #[test]
    fn test_add_columns_is_all_or_nothing() {
        let (mut diagram, ids) = diagram_with(&["users"]);
        let result = diagram.add_columns(
            &ids[0],
            vec![
                ("email".into(), ColumnType::String),
                ("".into(), ColumnType::String),
            ],
        );
        assert!(matches!(result, Err(SchemaError::InvalidName { .. })));
        assert_eq!(diagram.table(&ids[0]).unwrap().columns.len(), 1);
    }

    #[test]
    fn test_document_store_naming_rules_do_not_block_edits() {
        let mut diagram = Diagram::new();
        let long = "a".repeat(65);

        let long_id = diagram.add_table(&long).unwrap();
        let system_id = diagram.add_table("system.profile").unwrap();
        let nested_id = diagram.add_nested_table(&system_id, "a$b").unwrap();
        assert_eq!(diagram.table(&long_id).unwrap().label, long);
        assert_eq!(diagram.table(&nested_id).unwrap().label, "a$b");

        let column_ids = diagram
            .add_columns(
                &long_id,
                vec![
                    ("$price".into(), ColumnType::Double),
                    ("address.city".into(), ColumnType::String),
                ],
            )
            .unwrap();
        assert_eq!(column_ids.len(), 2);
        assert_eq!(diagram.table(&long_id).unwrap().columns.len(), 3);

        diagram
            .update_column(&column_ids[1], "$set.field", ColumnType::String)
            .unwrap();
        assert!(diagram.find_column(&column_ids[1]).is_some());
    }

    #[test]
    fn test_cardinality_and_position_edits() {
        let (mut diagram, ids) = diagram_with(&["users", "orders"]);
        let edge_id = diagram.connect(&ids[0], &ids[1]).unwrap();
        diagram
            .set_edge_cardinality(&edge_id, Cardinality::OneToMany)
            .unwrap();
        assert_eq!(diagram.edge(&edge_id).unwrap().cardinality, Cardinality::OneToMany);

        let nested = diagram.add_nested_table(&ids[0], "tags").unwrap();
        diagram
            .set_nested_cardinality(&nested, Cardinality::ManyToMany)
            .unwrap();
        assert_eq!(
            diagram.table(&nested).unwrap().cardinality,
            Some(Cardinality::ManyToMany)
        );
        assert!(matches!(
            diagram.set_nested_cardinality(&ids[0], Cardinality::OneToOne),
            Err(SchemaError::NotNested(_))
        ));

        diagram
            .move_table(&ids[0], Position::new(120.0, 40.0))
            .unwrap();
        assert_eq!(diagram.node(&ids[0]).unwrap().position, Position::new(120.0, 40.0));
    }

    #[test]
    fn test_build_graph_includes_isolated_tables() {
        let (mut diagram, ids) = diagram_with(&["a", "b", "c"]);
        diagram.connect(&ids[0], &ids[1]).unwrap();
        let graph = diagram.build_graph();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph[&ids[0]], vec![ids[1].clone()]);
        assert_eq!(graph[&ids[1]], vec![ids[0].clone()]);
        assert!(graph[&ids[2]].is_empty());
        assert_eq!(reachable_from(&graph, &ids[1]), vec![ids[1].clone(), ids[0].clone()]);
    }

    #[test]
    fn test_exists_connection_is_substring_match() {
        let users = Table::new("u", "user").with_primary_key();
        let logs = Table::new("l", "logs")
            .with_column(Column::new("l-1", "username", ColumnType::String));
        assert!(exists_connection(&users, &logs));
        assert!(exists_connection(&logs, &users));
    }
}
