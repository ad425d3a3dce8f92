//! Build record store.

use crate::core::{Build, BuildStatus, Environment, StepResult};
use crate::errors::PipelineError;
use crate::progress::{NoOpProgress, ProgressChannel};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Partial update applied to a build's top-level fields.
#[derive(Debug, Clone, Default)]
pub struct BuildPatch {
    /// New overall status.
    pub status: Option<BuildStatus>,
    /// New version string.
    pub version: Option<String>,
}

impl BuildPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: BuildStatus) -> Self {
        Self {
            status: Some(status),
            version: None,
        }
    }
}

/// Persists build aggregates with per-step atomic updates.
///
/// Every successful write raises a change event into the progress channel.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Persists a new build.
    async fn create(&self, build: Build) -> Result<(), PipelineError>;

    /// Fetches a build by id.
    async fn get(&self, id: Uuid) -> Result<Build, PipelineError>;

    /// Replaces a single step result, by catalog index.
    async fn update_step(
        &self,
        id: Uuid,
        index: usize,
        step: StepResult,
    ) -> Result<(), PipelineError>;

    /// Applies a partial update to the build's top-level fields.
    async fn update_fields(&self, id: Uuid, patch: BuildPatch) -> Result<(), PipelineError>;

    /// Latest build for an environment matching a predicate, newest first.
    async fn latest_where(
        &self,
        environment: Environment,
        predicate: &(dyn for<'a> Fn(&'a Build) -> bool + Sync),
    ) -> Result<Option<Build>, PipelineError>;

    /// Latest build for an environment.
    async fn latest(&self, environment: Environment) -> Result<Option<Build>, PipelineError> {
        self.latest_where(environment, &|_| true).await
    }

    /// Recent builds for an environment, newest first.
    async fn history(
        &self,
        environment: Environment,
        limit: usize,
    ) -> Result<Vec<Build>, PipelineError>;

    /// Next monotonic build number for an environment.
    async fn next_build_number(&self, environment: Environment) -> Result<u64, PipelineError>;
}

/// In-memory build store.
pub struct MemoryBuildStore {
    builds: DashMap<Uuid, Build>,
    order: Mutex<Vec<Uuid>>,
    numbers: DashMap<Environment, u64>,
    progress: Arc<dyn ProgressChannel>,
}

impl MemoryBuildStore {
    /// Creates a store that discards change events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_progress(Arc::new(NoOpProgress))
    }

    /// Creates a store forwarding change events to the given channel.
    #[must_use]
    pub fn with_progress(progress: Arc<dyn ProgressChannel>) -> Self {
        Self {
            builds: DashMap::new(),
            order: Mutex::new(Vec::new()),
            numbers: DashMap::new(),
            progress,
        }
    }
}

impl Default for MemoryBuildStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildStore for MemoryBuildStore {
    async fn create(&self, build: Build) -> Result<(), PipelineError> {
        let id = build.id;
        let status = build.status;
        self.builds.insert(id, build);
        self.order.lock().push(id);
        self.progress.build_update(id, status);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Build, PipelineError> {
        self.builds
            .get(&id)
            .map(|b| b.clone())
            .ok_or(PipelineError::BuildNotFound(id))
    }

    async fn update_step(
        &self,
        id: Uuid,
        index: usize,
        step: StepResult,
    ) -> Result<(), PipelineError> {
        let mut entry = self
            .builds
            .get_mut(&id)
            .ok_or(PipelineError::BuildNotFound(id))?;
        if entry.status.is_terminal() {
            return Err(PipelineError::BuildTerminal(id));
        }

        let slot = entry
            .steps
            .get_mut(index)
            .ok_or(PipelineError::StepIndexOutOfRange { build_id: id, index })?;
        *slot = step.clone();
        drop(entry);

        self.progress.step_update(id, &step);
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, patch: BuildPatch) -> Result<(), PipelineError> {
        let mut entry = self
            .builds
            .get_mut(&id)
            .ok_or(PipelineError::BuildNotFound(id))?;
        // Finished builds are a historical record. The transition into a
        // terminal status is the last write a build accepts.
        if entry.status.is_terminal() {
            return Err(PipelineError::BuildTerminal(id));
        }

        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(version) = patch.version {
            entry.version = version;
        }
        let status = entry.status;
        drop(entry);

        self.progress.build_update(id, status);
        Ok(())
    }

    async fn latest_where(
        &self,
        environment: Environment,
        predicate: &(dyn for<'a> Fn(&'a Build) -> bool + Sync),
    ) -> Result<Option<Build>, PipelineError> {
        let order = self.order.lock().clone();
        for id in order.iter().rev() {
            if let Some(build) = self.builds.get(id) {
                if build.environment == environment && predicate(&build) {
                    return Ok(Some(build.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn history(
        &self,
        environment: Environment,
        limit: usize,
    ) -> Result<Vec<Build>, PipelineError> {
        let order = self.order.lock().clone();
        let builds = order
            .iter()
            .rev()
            .filter_map(|id| self.builds.get(id).map(|b| b.clone()))
            .filter(|b| b.environment == environment)
            .take(limit)
            .collect();
        Ok(builds)
    }

    async fn next_build_number(&self, environment: Environment) -> Result<u64, PipelineError> {
        let mut counter = self.numbers.entry(environment).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
