//! Persistence of solutions and their versions
//!
//! The engine only talks to a [`VersionStore`]. Two implementations ship with
//! the crate: an in-memory store and a JSON file holding an array of solutions.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::error::StoreError;
use super::serialization::{SolutionModel, VersionBackend};

/// Backend holding solutions and their versions
pub trait VersionStore: Send + Sync {
    fn fetch_solution(
        &self,
        solution_id: &str,
    ) -> impl Future<Output = Result<SolutionModel, StoreError>> + Send;

    /// Replaces a stored version; the stored `_id` is kept
    fn patch_version(
        &self,
        solution_id: &str,
        version_id: &str,
        version: VersionBackend,
    ) -> impl Future<Output = Result<VersionBackend, StoreError>> + Send;

    /// Appends a version; the store assigns the `_id`
    fn create_version(
        &self,
        solution_id: &str,
        version: VersionBackend,
    ) -> impl Future<Output = Result<VersionBackend, StoreError>> + Send;
}

fn patch_in(
    solution: &mut SolutionModel,
    version_id: &str,
    mut version: VersionBackend,
) -> Result<VersionBackend, StoreError> {
    let slot = solution
        .versions
        .iter_mut()
        .find(|stored| stored.id == version_id)
        .ok_or_else(|| StoreError::VersionNotFound(version_id.to_string()))?;

    version.id = version_id.to_string();
    version.solution_id = solution.id.clone();
    *slot = version.clone();
    solution.last_version_saved = Some(version_id.to_string());
    Ok(version)
}

fn create_in(solution: &mut SolutionModel, mut version: VersionBackend) -> VersionBackend {
    if version.id.is_empty() {
        version.id = Uuid::new_v4().to_string();
    }
    version.solution_id = solution.id.clone();
    solution.versions.push(version.clone());
    version
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store kept in process memory. Counts writes and can be switched offline.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    solutions: RwLock<HashMap<String, SolutionModel>>,
    writes: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solutions(solutions: impl IntoIterator<Item = SolutionModel>) -> Self {
        let map = solutions
            .into_iter()
            .map(|solution| (solution.id.clone(), solution))
            .collect();
        Self {
            solutions: RwLock::new(map),
            ..Self::default()
        }
    }

    pub async fn insert(&self, solution: SolutionModel) {
        self.solutions
            .write()
            .await
            .insert(solution.id.clone(), solution);
    }

    /// Number of successful patch and create calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl VersionStore for MemoryVersionStore {
    async fn fetch_solution(&self, solution_id: &str) -> Result<SolutionModel, StoreError> {
        self.check_online()?;
        self.solutions
            .read()
            .await
            .get(solution_id)
            .cloned()
            .ok_or_else(|| StoreError::SolutionNotFound(solution_id.to_string()))
    }

    async fn patch_version(
        &self,
        solution_id: &str,
        version_id: &str,
        version: VersionBackend,
    ) -> Result<VersionBackend, StoreError> {
        self.check_online()?;
        let mut solutions = self.solutions.write().await;
        let solution = solutions
            .get_mut(solution_id)
            .ok_or_else(|| StoreError::SolutionNotFound(solution_id.to_string()))?;
        let patched = patch_in(solution, version_id, version)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(patched)
    }

    async fn create_version(
        &self,
        solution_id: &str,
        version: VersionBackend,
    ) -> Result<VersionBackend, StoreError> {
        self.check_online()?;
        let mut solutions = self.solutions.write().await;
        let solution = solutions
            .get_mut(solution_id)
            .ok_or_else(|| StoreError::SolutionNotFound(solution_id.to_string()))?;
        let created = create_in(solution, version);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// Store backed by a JSON file containing an array of solutions.
/// A missing file reads as an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read_all(&self) -> Result<Vec<SolutionModel>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Adds or replaces a solution
    pub async fn upsert_solution(&self, solution: SolutionModel) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut solutions = self.read_unlocked().await?;
        match solutions.iter_mut().find(|stored| stored.id == solution.id) {
            Some(stored) => *stored = solution,
            None => solutions.push(solution),
        }
        self.write_unlocked(&solutions).await
    }

    async fn read_unlocked(&self) -> Result<Vec<SolutionModel>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sibling file the store is written to before it replaces the original
    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_unlocked(&self, solutions: &[SolutionModel]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(solutions)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        tracing::debug!("Wrote {} solution(s) to {}", solutions.len(), self.path.display());
        Ok(())
    }

    async fn modify<T>(
        &self,
        solution_id: &str,
        change: impl FnOnce(&mut SolutionModel) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let mut solutions = self.read_unlocked().await?;
        let solution = solutions
            .iter_mut()
            .find(|stored| stored.id == solution_id)
            .ok_or_else(|| StoreError::SolutionNotFound(solution_id.to_string()))?;
        let result = change(solution)?;
        self.write_unlocked(&solutions).await?;
        Ok(result)
    }
}

impl VersionStore for JsonFileStore {
    async fn fetch_solution(&self, solution_id: &str) -> Result<SolutionModel, StoreError> {
        self.read_all()
            .await?
            .into_iter()
            .find(|solution| solution.id == solution_id)
            .ok_or_else(|| StoreError::SolutionNotFound(solution_id.to_string()))
    }

    async fn patch_version(
        &self,
        solution_id: &str,
        version_id: &str,
        version: VersionBackend,
    ) -> Result<VersionBackend, StoreError> {
        self.modify(solution_id, |solution| patch_in(solution, version_id, version))
            .await
    }

    async fn create_version(
        &self,
        solution_id: &str,
        version: VersionBackend,
    ) -> Result<VersionBackend, StoreError> {
        self.modify(solution_id, |solution| Ok(create_in(solution, version)))
            .await
    }
}
