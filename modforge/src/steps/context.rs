//! Step execution context and the shared services behind it.

use super::logger::StepLogger;
use super::notify::{Notifier, TracingNotifier};
use crate::cancellation::CancellationToken;
use crate::config::{EnvPaths, PipelineConfig};
use crate::core::{Build, Environment, LogSink};
use crate::errors::StepError;
use crate::process::{ProcessRunner, ProcessTracker};
use crate::progress::{NoOpProgress, ProgressChannel};
use crate::queue::ServerLock;
use crate::store::{
    BuildStore, MemoryBuildStore, MemoryReleaseStore, MemoryWorkshopStore, ReleaseStore,
    WorkshopStore,
};
use std::sync::Arc;
use uuid::Uuid;

/// Shared infrastructure handed to every step.
pub struct StepServices {
    /// Build record store.
    pub builds: Arc<dyn BuildStore>,
    /// Release store.
    pub releases: Arc<dyn ReleaseStore>,
    /// Workshop mod record store.
    pub workshop: Arc<dyn WorkshopStore>,
    /// Live progress channel.
    pub progress: Arc<dyn ProgressChannel>,
    /// Registry of spawned processes.
    pub tracker: Arc<ProcessTracker>,
    /// Fleet-wide server lock.
    pub server_lock: Arc<ServerLock>,
    /// Global guard serializing every touch of the published repository
    /// tree across environments.
    pub repo_guard: Arc<tokio::sync::Mutex<()>>,
    /// Deploy announcement sink.
    pub notifier: Arc<dyn Notifier>,
    /// Pipeline configuration.
    pub config: Arc<PipelineConfig>,
}

impl StepServices {
    /// Creates services backed entirely by in-memory implementations.
    #[must_use]
    pub fn in_memory(config: PipelineConfig) -> Arc<Self> {
        Self::in_memory_with_progress(config, Arc::new(NoOpProgress))
    }

    /// In-memory services publishing to the given progress channel.
    #[must_use]
    pub fn in_memory_with_progress(
        config: PipelineConfig,
        progress: Arc<dyn ProgressChannel>,
    ) -> Arc<Self> {
        Arc::new(Self {
            builds: Arc::new(MemoryBuildStore::with_progress(progress.clone())),
            releases: Arc::new(MemoryReleaseStore::new()),
            workshop: Arc::new(MemoryWorkshopStore::new()),
            progress: progress.clone(),
            tracker: ProcessTracker::new(),
            server_lock: Arc::new(ServerLock::new(progress)),
            repo_guard: Arc::new(tokio::sync::Mutex::new(())),
            notifier: Arc::new(TracingNotifier),
            config: Arc::new(config),
        })
    }
}

impl std::fmt::Debug for StepServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepServices").finish_non_exhaustive()
    }
}

/// Everything one step sees while it runs.
pub struct StepContext {
    build: Build,
    step_index: usize,
    services: Arc<StepServices>,
    logger: Arc<StepLogger>,
    cancel: Arc<CancellationToken>,
}

impl StepContext {
    /// Creates a context for one step of one build.
    #[must_use]
    pub fn new(
        build: Build,
        step_index: usize,
        services: Arc<StepServices>,
        logger: Arc<StepLogger>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            build,
            step_index,
            services,
            logger,
            cancel,
        }
    }

    /// Snapshot of the build this step belongs to.
    #[must_use]
    pub fn build(&self) -> &Build {
        &self.build
    }

    /// The build id.
    #[must_use]
    pub fn build_id(&self) -> Uuid {
        self.build.id
    }

    /// Catalog index of the running step.
    #[must_use]
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// The build's environment.
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.build.environment
    }

    /// The version being built.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.build.version
    }

    /// Shared services.
    #[must_use]
    pub fn services(&self) -> &Arc<StepServices> {
        &self.services
    }

    /// Pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.services.config
    }

    /// The per-step logger.
    #[must_use]
    pub fn logger(&self) -> &Arc<StepLogger> {
        &self.logger
    }

    /// The logger as a sink for lower layers.
    #[must_use]
    pub fn log_sink(&self) -> Arc<dyn LogSink> {
        self.logger.clone()
    }

    /// The build's cancellation token.
    #[must_use]
    pub fn cancel(&self) -> &Arc<CancellationToken> {
        &self.cancel
    }

    /// Records a warning and lets the step continue in degraded mode. The
    /// step will end as Warning instead of Success.
    pub fn warn(&self, text: &str) {
        self.logger.warning(text);
    }

    /// Tree roots for the build's environment.
    ///
    /// # Errors
    ///
    /// `StepError::Setup` when the environment has no configured paths.
    pub fn paths(&self) -> Result<&EnvPaths, StepError> {
        self.services
            .config
            .env_paths(self.environment())
            .map_err(|e| StepError::Setup(e.to_string()))
    }

    /// A process runner wired to the shared tracker.
    #[must_use]
    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.services.tracker.clone())
    }
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("build_id", &self.build.id)
            .field("step_index", &self.step_index)
            .field("environment", &self.build.environment)
            .finish()
    }
}
