//! Stored document shapes and the adapters between them and the in-memory model
//!
//! A stored version groups its tables by submodel. Loading flattens the
//! submodels back into one node list and stamps every table, nested ones
//! included, with the array index of the submodel it came from.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{SchemaError, SchemaResult};
use super::schema::{
    Cardinality, Column, Position, Query, Relationship, TABLE_NODE_TYPE, Table, TableNode,
};
use super::versioning::{Solution, Submodel, Version, partition_into_submodels};

fn default_node_type() -> String {
    TABLE_NODE_TYPE.to_string()
}

/// Top-level table as stored
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct NodeBackend {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,
    #[serde(default)]
    pub cols: Option<Vec<Column>>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_nodes: Option<Vec<NestedNode>>,
}

/// Embedded table as stored; it has no position of its own
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct NestedNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cols: Option<Vec<Column>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested_nodes: Option<Vec<NestedNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct EdgeBackend {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SubmodelBackend {
    #[serde(default)]
    pub nodes: Vec<NodeBackend>,
    #[serde(default)]
    pub edges: Vec<EdgeBackend>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct VersionBackend {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub solution_id: String,
    #[serde(default)]
    pub submodels: Vec<SubmodelBackend>,
}

/// A stored solution: its versions, its declared queries and a preview image
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SolutionModel {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub versions: Vec<VersionBackend>,
    #[serde(default)]
    pub last_version_saved: Option<String>,
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub src_img: String,
}

// ============================================================================
// In-memory -> stored
// ============================================================================

fn nested_to_backend(table: &Table) -> NestedNode {
    NestedNode {
        id: table.id.clone(),
        name: table.label.clone(),
        cols: Some(table.columns.clone()),
        nested_nodes: Some(table.nested_tables.iter().map(|t| nested_to_backend(t)).collect()),
        cardinality: table.cardinality,
    }
}

pub fn node_to_backend(node: &TableNode) -> NodeBackend {
    let table = node.table();
    NodeBackend {
        id: node.id.clone(),
        name: table.label.clone(),
        node_type: node.node_type.clone(),
        cols: Some(table.columns.clone()),
        position: node.position,
        nested_nodes: Some(table.nested_tables.iter().map(|t| nested_to_backend(t)).collect()),
    }
}

pub fn edge_to_backend(edge: &Relationship) -> EdgeBackend {
    EdgeBackend {
        id: edge.id.clone(),
        source: edge.source.clone(),
        target: edge.target.clone(),
        cardinality: Some(edge.cardinality),
    }
}

pub fn submodel_to_backend(submodel: &Submodel) -> SubmodelBackend {
    SubmodelBackend {
        nodes: submodel.nodes.iter().map(node_to_backend).collect(),
        edges: submodel.edges.iter().map(edge_to_backend).collect(),
    }
}

/// Partitions the version into submodels and renders the stored document
pub fn version_to_backend(version: &Version) -> VersionBackend {
    let submodels = partition_into_submodels(&version.nodes, &version.edges);
    VersionBackend {
        id: version.id.clone(),
        description: version.description.clone(),
        solution_id: version.solution_id.clone(),
        submodels: submodels.iter().map(submodel_to_backend).collect(),
    }
}

// ============================================================================
// Stored -> in-memory
// ============================================================================

fn columns_of(id: &str, cols: &Option<Vec<Column>>) -> SchemaResult<Vec<Column>> {
    cols.clone().ok_or_else(|| SchemaError::SerializationMismatch {
        node_id: id.to_string(),
        reason: "missing cols".to_string(),
    })
}

fn nested_from_backend(nested: &NestedNode, submodel_index: usize) -> SchemaResult<Table> {
    let nested_tables = nested
        .nested_nodes
        .iter()
        .flatten()
        .map(|child| nested_from_backend(child, submodel_index).map(Arc::new))
        .collect::<SchemaResult<Vec<_>>>()?;

    Ok(Table {
        id: nested.id.clone(),
        label: nested.name.clone(),
        columns: columns_of(&nested.id, &nested.cols)?,
        nested_tables,
        submodel_index,
        cardinality: nested.cardinality,
    })
}

pub fn node_from_backend(node: &NodeBackend, submodel_index: usize) -> SchemaResult<TableNode> {
    let nested_tables = node
        .nested_nodes
        .iter()
        .flatten()
        .map(|child| nested_from_backend(child, submodel_index).map(Arc::new))
        .collect::<SchemaResult<Vec<_>>>()?;

    let table = Table {
        id: node.id.clone(),
        label: node.name.clone(),
        columns: columns_of(&node.id, &node.cols)?,
        nested_tables,
        submodel_index,
        cardinality: None,
    };

    Ok(TableNode {
        id: node.id.clone(),
        node_type: node.node_type.clone(),
        position: node.position,
        data: Arc::new(table),
    })
}

pub fn edge_from_backend(edge: &EdgeBackend) -> Relationship {
    Relationship {
        id: edge.id.clone(),
        source: edge.source.clone(),
        target: edge.target.clone(),
        cardinality: edge.cardinality.unwrap_or_default(),
    }
}

/// Flattens the submodels of a stored version. Fails on the first node whose
/// shape cannot be mapped, without producing a partial version.
pub fn version_from_backend(backend: &VersionBackend) -> SchemaResult<Version> {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for (submodel_index, submodel) in backend.submodels.iter().enumerate() {
        for node in &submodel.nodes {
            nodes.push(node_from_backend(node, submodel_index)?);
        }
        edges.extend(submodel.edges.iter().map(edge_from_backend));
    }

    Ok(Version {
        id: backend.id.clone(),
        description: backend.description.clone(),
        solution_id: backend.solution_id.clone(),
        nodes,
        edges,
    })
}

pub fn solution_from_model(model: &SolutionModel) -> SchemaResult<Solution> {
    let versions = model
        .versions
        .iter()
        .map(version_from_backend)
        .collect::<SchemaResult<Vec<_>>>()?;

    Ok(Solution {
        id: model.id.clone(),
        name: model.name.clone(),
        versions,
        queries: model.queries.clone(),
        last_version_saved: model.last_version_saved.clone(),
    })
}
