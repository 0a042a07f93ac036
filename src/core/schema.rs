//! Table tree model: collections, their fields, embedded documents and relationships

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SchemaError;

pub type TableId = String;
pub type ColumnId = String;
pub type EdgeId = String;

/// Node type stored for every top-level table on the canvas
pub const TABLE_NODE_TYPE: &str = "table";

/// Generates the random local segment used in table and column ids
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Column type: a scalar document type or a structural marker
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "PRIMARY_KEY")]
    PrimaryKey,
    #[serde(rename = "FOREIGN_KEY")]
    ForeignKey,
    #[serde(rename = "DOCUMENT")]
    Document,
}

impl ColumnType {
    /// Structural markers are managed by the engine and never edited by users
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ColumnType::PrimaryKey | ColumnType::ForeignKey | ColumnType::Document
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Double => "double",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Array => "array",
            ColumnType::PrimaryKey => "PRIMARY_KEY",
            ColumnType::ForeignKey => "FOREIGN_KEY",
            ColumnType::Document => "DOCUMENT",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Колонка таблицы (document field)
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_type,
        }
    }

    /// The `<label>_id` primary key every new table starts with
    pub fn primary_key(table_id: &str, label: &str) -> Self {
        Self::new(
            format!("{}-{}", table_id, short_id()),
            format!("{}_id", label),
            ColumnType::PrimaryKey,
        )
    }

    /// The `<source>_id` foreign key placed on the target of a relationship
    pub fn foreign_key(source_id: &str, source_label: &str, target_id: &str) -> Self {
        Self::new(
            foreign_key_column_id(source_id, target_id),
            foreign_key_name(source_label),
            ColumnType::ForeignKey,
        )
    }

    pub fn is_structural(&self) -> bool {
        self.column_type.is_structural()
    }
}

/// Name of the foreign key column a relationship from `source_label` creates
pub fn foreign_key_name(source_label: &str) -> String {
    format!("{}_id", source_label)
}

pub fn foreign_key_column_id(source_id: &str, target_id: &str) -> ColumnId {
    format!("e-{}-{}", target_id, source_id)
}

/// Cardinality of a relationship or of an embedded document
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
pub enum Cardinality {
    #[default]
    #[serde(rename = "1 ... 1", alias = "1...1")]
    OneToOne,
    #[serde(rename = "1 ... n", alias = "1...n")]
    OneToMany,
    #[serde(rename = "n ... n", alias = "n...n")]
    ManyToMany,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::OneToOne => write!(f, "1 ... 1"),
            Cardinality::OneToMany => write!(f, "1 ... n"),
            Cardinality::ManyToMany => write!(f, "n ... n"),
        }
    }
}

/// A table (collection) and, recursively, the documents embedded in it.
///
/// Nested tables are shared behind `Arc` so that edits only copy the path
/// from the top-level table down to the touched subtree.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: TableId,
    pub label: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub nested_tables: Vec<Arc<Table>>,
    #[serde(default)]
    pub submodel_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

impl Table {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            columns: Vec::new(),
            nested_tables: Vec::new(),
            submodel_index: 0,
            cardinality: None,
        }
    }

    pub fn with_primary_key(mut self) -> Self {
        let column = Column::primary_key(&self.id, &self.label);
        self.columns.push(column);
        self
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_nested(mut self, nested: Table) -> Self {
        self.nested_tables.push(Arc::new(nested));
        self
    }

    pub fn with_submodel_index(mut self, index: usize) -> Self {
        self.set_submodel_index(index);
        self
    }

    /// Sets the index on this table and every embedded descendant
    pub fn set_submodel_index(&mut self, index: usize) {
        self.submodel_index = index;
        for nested in &mut self.nested_tables {
            if nested.submodel_index != index || nested.has_divergent_index(index) {
                Arc::make_mut(nested).set_submodel_index(index);
            }
        }
    }

    fn has_divergent_index(&self, index: usize) -> bool {
        self.nested_tables
            .iter()
            .any(|nested| nested.submodel_index != index || nested.has_divergent_index(index))
    }

    /// Nesting level of the deepest table in this subtree (a flat table is 1)
    pub fn depth(&self) -> usize {
        1 + self
            .nested_tables
            .iter()
            .map(|nested| nested.depth())
            .max()
            .unwrap_or(0)
    }

    /// Columns of this table and all embedded tables
    pub fn total_columns(&self) -> usize {
        self.columns.len()
            + self
                .nested_tables
                .iter()
                .map(|nested| nested.total_columns())
                .sum::<usize>()
    }

    /// Number of tables embedded below this one, at any depth
    pub fn total_nested(&self) -> usize {
        self.nested_tables.len()
            + self
                .nested_tables
                .iter()
                .map(|nested| nested.total_nested())
                .sum::<usize>()
    }

    /// Visits this table and every descendant, parent before children
    pub fn walk<'a>(
        &'a self,
        parent: Option<&'a Table>,
        visit: &mut impl FnMut(&'a Table, Option<&'a Table>),
    ) {
        visit(self, parent);
        for nested in &self.nested_tables {
            nested.walk(Some(self), visit);
        }
    }
}

/// Column operations shared by every table in the forest
pub trait TableOps {
    fn create_column(&mut self, column: Column);
    fn get_column(&self, index: usize) -> Option<&Column>;
    fn find_column(&self, column_id: &str) -> Option<(usize, &Column)>;
    fn delete_column(&mut self, column_id: &str) -> Result<Column, SchemaError>;
    fn has_column_named(&self, name: &str) -> bool;
}

impl TableOps for Table {
    fn create_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    fn get_column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    fn find_column(&self, column_id: &str) -> Option<(usize, &Column)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, column)| column.id == column_id)
    }

    fn delete_column(&mut self, column_id: &str) -> Result<Column, SchemaError> {
        let index = self
            .columns
            .iter()
            .position(|column| column.id == column_id)
            .ok_or_else(|| SchemaError::ColumnNotFound(column_id.to_string()))?;
        Ok(self.columns.remove(index))
    }

    fn has_column_named(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }
}

/// Позиция на канвасе
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

fn default_node_type() -> String {
    TABLE_NODE_TYPE.to_string()
}

/// A top-level table as placed on the canvas
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TableNode {
    pub id: TableId,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Position,
    pub data: Arc<Table>,
}

impl TableNode {
    pub fn new(table: Table) -> Self {
        Self {
            id: table.id.clone(),
            node_type: default_node_type(),
            position: Position::default(),
            data: Arc::new(table),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn table(&self) -> &Table {
        &self.data
    }

    /// Mutable access; clones the table only if a snapshot still shares it
    pub fn table_mut(&mut self) -> &mut Table {
        Arc::make_mut(&mut self.data)
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    pub fn submodel_index(&self) -> usize {
        self.data.submodel_index
    }
}

/// Ребро графа - связь между двумя таблицами верхнего уровня
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub id: EdgeId,
    pub source: TableId,
    pub target: TableId,
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl Relationship {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            cardinality: Cardinality::default(),
        }
    }

    /// Relationship with the conventional `e-<source>-<target>` id
    pub fn between(source: &str, target: &str) -> Self {
        Self::new(format!("e-{}-{}", source, target), source, target)
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn touches(&self, table_id: &str) -> bool {
        self.source == table_id || self.target == table_id
    }

    /// The endpoint opposite to `table_id`, if the edge touches it
    pub fn other_end(&self, table_id: &str) -> Option<&str> {
        if self.source == table_id {
            Some(&self.target)
        } else if self.target == table_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// A declared access pattern: the collections one query touches
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Query {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub full_query: String,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub highlighted_words: Vec<String>,
}

impl Query {
    pub fn new(id: impl Into<String>, collections: &[&str]) -> Self {
        Self {
            id: id.into(),
            full_query: String::new(),
            collections: collections.iter().map(|name| name.to_string()).collect(),
            highlighted_words: Vec::new(),
        }
    }

    pub fn with_text(mut self, full_query: impl Into<String>) -> Self {
        self.full_query = full_query.into();
        self
    }
}

/// Where a table sits in the forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub parent: Option<TableId>,
    pub root: TableId,
    /// 0 for top-level tables
    pub depth: usize,
}

/// Parent-pointer index over every table of the forest
#[derive(Debug, Clone, Default)]
pub struct TableIndex {
    entries: HashMap<TableId, TableEntry>,
}

impl TableIndex {
    pub fn build(nodes: &[TableNode]) -> Self {
        let mut index = Self::default();
        for node in nodes {
            index.insert_subtree(node.table(), None, &node.id, 0);
        }
        index
    }

    pub fn insert_subtree(
        &mut self,
        table: &Table,
        parent: Option<&str>,
        root: &str,
        depth: usize,
    ) {
        self.entries.insert(
            table.id.clone(),
            TableEntry {
                parent: parent.map(str::to_string),
                root: root.to_string(),
                depth,
            },
        );
        for nested in &table.nested_tables {
            self.insert_subtree(nested, Some(&table.id), root, depth + 1);
        }
    }

    pub fn remove_subtree(&mut self, table: &Table) {
        self.entries.remove(&table.id);
        for nested in &table.nested_tables {
            self.remove_subtree(nested);
        }
    }

    pub fn get(&self, table_id: &str) -> Option<&TableEntry> {
        self.entries.get(table_id)
    }

    pub fn contains(&self, table_id: &str) -> bool {
        self.entries.contains_key(table_id)
    }

    pub fn parent_of(&self, table_id: &str) -> Option<&str> {
        self.entries.get(table_id)?.parent.as_deref()
    }

    pub fn root_of(&self, table_id: &str) -> Option<&str> {
        self.entries.get(table_id).map(|entry| entry.root.as_str())
    }

    pub fn is_top_level(&self, table_id: &str) -> bool {
        self.entries
            .get(table_id)
            .is_some_and(|entry| entry.parent.is_none())
    }

    /// Ids from just below the root down to `table_id` (empty for a top-level table)
    pub fn path_below_root(&self, table_id: &str) -> Option<Vec<TableId>> {
        let mut path = Vec::new();
        let mut current = self.entries.get(table_id)?;
        let mut current_id = table_id;
        while let Some(parent) = current.parent.as_deref() {
            path.push(current_id.to_string());
            current_id = parent;
            current = self.entries.get(parent)?;
        }
        path.reverse();
        Some(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Follows `path` down from `root`
pub fn descend<'a>(root: &'a Table, path: &[TableId]) -> Option<&'a Table> {
    let mut current = root;
    for id in path {
        current = current.nested_tables.iter().find(|table| table.id == *id)?;
    }
    Some(current)
}

/// Follows `path` down from `root`, un-sharing each table on the way
pub fn descend_mut<'a>(root: &'a mut Table, path: &[TableId]) -> Option<&'a mut Table> {
    let mut current = root;
    for id in path {
        current = match current.nested_tables.iter_mut().find(|table| table.id == *id) {
            Some(child) => Arc::make_mut(child),
            None => return None,
        };
    }
    Some(current)
}
