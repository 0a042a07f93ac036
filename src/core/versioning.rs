//! Versions, submodel partitioning and persistence flows
//!
//! A version is saved as a list of submodels, one per connected component of
//! the relationship graph. Saves are gated by [`dirty_hash`]: when the
//! fingerprint of a version did not change since it was last saved or loaded
//! the store is not called at all.

use std::collections::HashSet;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::config::Config;
use super::connectivity::{Diagram, build_graph};
use super::error::{SchemaError, SchemaResult, StoreError};
use super::fingerprint::dirty_hash;
use super::schema::{Query, Relationship, TableId, TableNode};
use super::serialization::{
    VersionBackend, solution_from_model, version_from_backend, version_to_backend,
};
use super::store::VersionStore;

// ============================================================================
// Model
// ============================================================================

/// A connected component of top-level tables with its internal relationships
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Submodel {
    pub nodes: Vec<TableNode>,
    pub edges: Vec<Relationship>,
}

impl Submodel {
    pub fn table_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }
}

/// A design alternative within a solution
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Version {
    pub id: String,
    pub description: String,
    pub solution_id: String,
    pub nodes: Vec<TableNode>,
    pub edges: Vec<Relationship>,
}

impl Version {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        solution_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            solution_id: solution_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Snapshot of a diagram. Subtrees are shared until either side edits them.
    pub fn from_diagram(
        id: impl Into<String>,
        description: impl Into<String>,
        solution_id: impl Into<String>,
        diagram: &Diagram,
    ) -> Self {
        Self {
            nodes: diagram.nodes().to_vec(),
            edges: diagram.edges().to_vec(),
            ..Self::new(id, description, solution_id)
        }
    }

    pub fn to_diagram(&self) -> Diagram {
        Diagram::from_parts(self.nodes.clone(), self.edges.clone())
    }

    pub fn fingerprint(&self) -> String {
        dirty_hash(&self.nodes, &self.edges)
    }
}

/// A modelling problem: its versions and the queries they are measured against
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Solution {
    pub id: String,
    pub name: String,
    pub versions: Vec<Version>,
    pub queries: Vec<Query>,
    pub last_version_saved: Option<String>,
}

impl Solution {
    pub fn version(&self, version_id: &str) -> Option<&Version> {
        self.versions.iter().find(|version| version.id == version_id)
    }
}

// ============================================================================
// Partitioning
// ============================================================================

/// Groups top-level tables into connected components.
///
/// Components are ordered by their first table in `nodes`, members by
/// depth-first preorder. Each submodel keeps only the edges whose both ends
/// are inside it; edges naming unknown tables are dropped.
pub fn partition_into_submodels(nodes: &[TableNode], edges: &[Relationship]) -> Vec<Submodel> {
    let graph = build_graph(nodes, edges);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut submodels = Vec::new();

    for start in nodes {
        if visited.contains(start.id.as_str()) {
            continue;
        }

        let mut members: Vec<&str> = Vec::new();
        let mut stack: Vec<&str> = vec![start.id.as_str()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            members.push(current);
            if let Some(neighbors) = graph.get(current) {
                for neighbor in neighbors.iter().rev() {
                    if !visited.contains(neighbor.as_str()) {
                        stack.push(neighbor.as_str());
                    }
                }
            }
        }

        let member_set: HashSet<&str> = members.iter().copied().collect();
        let submodel_nodes = members
            .iter()
            .filter_map(|id| nodes.iter().find(|node| node.id == *id))
            .cloned()
            .collect();
        let submodel_edges = edges
            .iter()
            .filter(|edge| {
                member_set.contains(edge.source.as_str())
                    && member_set.contains(edge.target.as_str())
            })
            .cloned()
            .collect();

        submodels.push(Submodel {
            nodes: submodel_nodes,
            edges: submodel_edges,
        });
    }

    submodels
}

/// Submodel membership as plain ids
pub fn submodel_membership(nodes: &[TableNode], edges: &[Relationship]) -> Vec<Vec<TableId>> {
    partition_into_submodels(nodes, edges)
        .iter()
        .map(|submodel| submodel.table_ids().into_iter().map(str::to_string).collect())
        .collect()
}

// ============================================================================
// Descriptions
// ============================================================================

const COPY_MARKER: &str = "copia";

/// Removes a trailing `(copia)` or `(copia N)` marker, ignoring case
fn strip_copy_suffix(description: &str) -> &str {
    let trimmed = description.trim_end();
    let Some(body) = trimmed.strip_suffix(')') else {
        return description;
    };
    let Some(open) = body.rfind('(') else {
        return description;
    };

    let inner = &body[open + 1..];
    let is_marker = inner.len() >= COPY_MARKER.len()
        && inner.is_char_boundary(COPY_MARKER.len())
        && inner[..COPY_MARKER.len()].eq_ignore_ascii_case(COPY_MARKER)
        && {
            let rest = inner[COPY_MARKER.len()..].trim_start();
            rest.chars().all(|c| c.is_ascii_digit())
        };

    if is_marker {
        body[..open].trim_end()
    } else {
        description
    }
}

/// Description of a duplicate: the base name (without any copy marker)
/// followed by `(copia)` or `(copia N)`, where `N` counts the versions whose
/// description already starts with the base name.
pub fn duplicate_description(original: &str, versions: &[Version]) -> String {
    let base = strip_copy_suffix(original).trim();
    let base_lower = base.to_lowercase();
    let copies = versions
        .iter()
        .filter(|version| version.description.to_lowercase().starts_with(&base_lower))
        .count();

    if copies == 0 {
        format!("{} ({})", base, COPY_MARKER)
    } else {
        format!("{} ({} {})", base, COPY_MARKER, copies)
    }
}

/// Description of a new empty version
pub fn empty_version_description(versions: &[Version]) -> String {
    format!("Versión {}", versions.len() + 1)
}

// ============================================================================
// Save gate
// ============================================================================

/// Last fingerprint persisted for each `(solution, version)` pair.
///
/// Assumes a single writer per version.
#[derive(Debug, Default)]
pub struct SaveGate {
    fingerprints: DashMap<(String, String), String>,
}

impl SaveGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self, solution_id: &str, version_id: &str, fingerprint: &str) -> bool {
        self.fingerprints
            .get(&(solution_id.to_string(), version_id.to_string()))
            .is_some_and(|last| last.value() == fingerprint)
    }

    pub fn record(&self, solution_id: &str, version_id: &str, fingerprint: String) {
        self.fingerprints
            .insert((solution_id.to_string(), version_id.to_string()), fingerprint);
    }

    pub fn forget(&self, solution_id: &str, version_id: &str) {
        self.fingerprints
            .remove(&(solution_id.to_string(), version_id.to_string()));
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// What a save did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveOutcome {
    Saved { fingerprint: String },
    Skipped,
}

// ============================================================================
// Persistence flows
// ============================================================================

fn from_store(err: StoreError) -> SchemaError {
    match err {
        StoreError::SolutionNotFound(id) => SchemaError::SolutionNotFound(id),
        StoreError::VersionNotFound(id) => SchemaError::VersionNotFound(id),
        other => SchemaError::Persistence(other),
    }
}

/// Saves, loads and forks versions through a [`VersionStore`]
pub struct VersionSync<S: VersionStore> {
    store: S,
    gate: SaveGate,
    skip_unchanged: bool,
}

impl<S: VersionStore> VersionSync<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            gate: SaveGate::new(),
            skip_unchanged: true,
        }
    }

    pub fn with_config(store: S, config: &Config) -> Self {
        Self {
            skip_unchanged: config.skip_unchanged_saves,
            ..Self::new(store)
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gate(&self) -> &SaveGate {
        &self.gate
    }

    /// Persists the diagram as the given version unless nothing changed since
    /// the last save or load. The fingerprint is recorded only after the store
    /// accepted the write.
    pub async fn save(
        &self,
        solution_id: &str,
        version_id: &str,
        description: &str,
        diagram: &Diagram,
    ) -> SchemaResult<SaveOutcome> {
        let fingerprint = dirty_hash(diagram.nodes(), diagram.edges());
        if self.skip_unchanged && self.gate.is_unchanged(solution_id, version_id, &fingerprint) {
            tracing::debug!("Version {} unchanged, skipping save", version_id);
            return Ok(SaveOutcome::Skipped);
        }

        let version = Version::from_diagram(version_id, description, solution_id, diagram);
        let backend = version_to_backend(&version);
        let submodels = backend.submodels.len();
        self.store
            .patch_version(solution_id, version_id, backend)
            .await
            .map_err(from_store)?;

        self.gate.record(solution_id, version_id, fingerprint.clone());
        tracing::info!(
            "Saved version {} of solution {} ({} submodel(s))",
            version_id,
            solution_id,
            submodels
        );
        Ok(SaveOutcome::Saved { fingerprint })
    }

    pub async fn load_solution(&self, solution_id: &str) -> SchemaResult<Solution> {
        let model = self
            .store
            .fetch_solution(solution_id)
            .await
            .map_err(from_store)?;
        solution_from_model(&model)
    }

    /// Loads a version into `diagram`. On any failure the diagram is left as it was.
    pub async fn load(
        &self,
        solution_id: &str,
        version_id: &str,
        diagram: &mut Diagram,
    ) -> SchemaResult<Version> {
        let model = self
            .store
            .fetch_solution(solution_id)
            .await
            .map_err(from_store)?;
        let backend = model
            .versions
            .iter()
            .find(|version| version.id == version_id)
            .ok_or_else(|| SchemaError::VersionNotFound(version_id.to_string()))?;
        let version = version_from_backend(backend)?;

        diagram.replace_with(version.nodes.clone(), version.edges.clone());
        self.gate
            .record(solution_id, version_id, version.fingerprint());
        tracing::info!(
            "Loaded version {} of solution {} ({} table(s))",
            version_id,
            solution_id,
            version.nodes.len()
        );
        Ok(version)
    }

    /// Creates a copy of a stored version under a `(copia N)` description
    pub async fn duplicate(&self, solution_id: &str, version_id: &str) -> SchemaResult<Version> {
        let solution = self.load_solution(solution_id).await?;
        let original = solution
            .version(version_id)
            .ok_or_else(|| SchemaError::VersionNotFound(version_id.to_string()))?;

        let copy = Version {
            id: String::new(),
            description: duplicate_description(&original.description, &solution.versions),
            solution_id: solution_id.to_string(),
            nodes: original.nodes.clone(),
            edges: original.edges.clone(),
        };
        self.create(solution_id, &copy).await
    }

    /// Creates a version without tables
    pub async fn create_empty(&self, solution_id: &str) -> SchemaResult<Version> {
        let solution = self.load_solution(solution_id).await?;
        let version = Version::new(
            String::new(),
            empty_version_description(&solution.versions),
            solution_id,
        );
        self.create(solution_id, &version).await
    }

    /// Changes the description of a stored version, leaving its tables untouched
    pub async fn rename(
        &self,
        solution_id: &str,
        version_id: &str,
        description: &str,
    ) -> SchemaResult<Version> {
        let model = self
            .store
            .fetch_solution(solution_id)
            .await
            .map_err(from_store)?;
        let mut backend: VersionBackend = model
            .versions
            .into_iter()
            .find(|version| version.id == version_id)
            .ok_or_else(|| SchemaError::VersionNotFound(version_id.to_string()))?;
        backend.description = description.to_string();

        let updated = self
            .store
            .patch_version(solution_id, version_id, backend)
            .await
            .map_err(from_store)?;
        version_from_backend(&updated)
    }

    async fn create(&self, solution_id: &str, version: &Version) -> SchemaResult<Version> {
        let created = self
            .store
            .create_version(solution_id, version_to_backend(version))
            .await
            .map_err(from_store)?;
        let created = version_from_backend(&created)?;

        self.gate
            .record(solution_id, &created.id, created.fingerprint());
        tracing::info!(
            "Created version {} '{}' in solution {}",
            created.id,
            created.description,
            solution_id
        );
        Ok(created)
    }
}
