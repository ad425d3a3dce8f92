//! Build queue and per-environment workers.
//!
//! At most one build per environment runs at any instant. Each environment
//! has its own FIFO of queued builds and one worker draining it; workers for
//! different environments run concurrently, with cross-environment
//! repository access serialized by the shared repository guard inside the
//! deploy and backup steps.

mod server_lock;


pub use server_lock::ServerLock;

use crate::cancellation::CancellationToken;
use crate::core::{Build, BuildStatus, CommitInfo, Environment, LogSink, StepResult, StepStatus};
use crate::errors::{PipelineError, StepError};
use crate::steps::{StepCatalog, StepContext, StepLogger, StepServices};
use crate::store::BuildPatch;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use uuid::Uuid;

struct ActiveBuild {
    id: Uuid,
    cancel: Arc<CancellationToken>,
}

#[derive(Default)]
struct EnvState {
    pending: Mutex<VecDeque<Uuid>>,
    active: Mutex<Option<ActiveBuild>>,
    wake: Notify,
}

/// Accepts build requests and runs them, one at a time per environment.
pub struct BuildQueue {
    services: Arc<StepServices>,
    catalogs: HashMap<Environment, StepCatalog>,
    states: HashMap<Environment, Arc<EnvState>>,
}

impl BuildQueue {
    /// Creates a queue over the given services and step catalogs.
    #[must_use]
    pub fn new(services: Arc<StepServices>, catalogs: HashMap<Environment, StepCatalog>) -> Arc<Self> {
        let states = catalogs
            .keys()
            .map(|environment| (*environment, Arc::new(EnvState::default())))
            .collect();
        Arc::new(Self {
            services,
            catalogs,
            states,
        })
    }

    /// Spawns one background worker per environment with a catalog.
    pub fn start(self: &Arc<Self>) {
        for environment in self.catalogs.keys().copied() {
            let queue = Arc::clone(self);
            tokio::spawn(async move {
                queue.worker_loop(environment).await;
            });
        }
    }

    async fn worker_loop(self: Arc<Self>, environment: Environment) {
        let Some(state) = self.states.get(&environment) else {
            return;
        };
        loop {
            match Self::claim_next(state) {
                Some((build_id, cancel)) => self.run_build(environment, build_id, cancel).await,
                None => state.wake.notified().await,
            }
        }
    }

    /// Pops the next queued build and installs it as the environment's
    /// active build in one critical section, so at any instant `cancel`
    /// sees the build as either queued or active.
    fn claim_next(state: &EnvState) -> Option<(Uuid, Arc<CancellationToken>)> {
        let mut pending = state.pending.lock();
        let build_id = pending.pop_front()?;
        let cancel = CancellationToken::new();
        *state.active.lock() = Some(ActiveBuild {
            id: build_id,
            cancel: Arc::clone(&cancel),
        });
        Some((build_id, cancel))
    }

    /// Creates a build for the environment's catalog, persists it and
    /// appends it to the environment queue. Returns immediately.
    ///
    /// # Errors
    ///
    /// `PipelineError::MissingCatalog` for an unconfigured environment,
    /// plus store failures.
    pub async fn request_build(
        &self,
        environment: Environment,
        version: impl Into<String>,
        commit: CommitInfo,
    ) -> Result<Uuid, PipelineError> {
        let catalog = self
            .catalogs
            .get(&environment)
            .ok_or(PipelineError::MissingCatalog(environment))?;
        let state = self
            .states
            .get(&environment)
            .ok_or(PipelineError::MissingCatalog(environment))?;

        let number = self.services.builds.next_build_number(environment).await?;
        let build = Build::new(
            environment,
            number,
            version,
            commit,
            &catalog.step_names(),
        );
        let build_id = build.id;

        self.services.builds.create(build).await?;
        state.pending.lock().push_back(build_id);
        state.wake.notify_one();

        info!(build_id = %build_id, environment = %environment, number, "build queued");
        Ok(build_id)
    }

    /// Queues a fresh build of the same version and commit as an earlier
    /// build. Returns the new build's id.
    ///
    /// # Errors
    ///
    /// `PipelineError::BuildNotFound` plus anything `request_build` raises.
    pub async fn rebuild(&self, build_id: Uuid) -> Result<Uuid, PipelineError> {
        let previous = self.services.builds.get(build_id).await?;
        self.request_build(previous.environment, previous.version, previous.commit)
            .await
    }

    /// Cancels a build. A queued build is removed and marked Cancelled; a
    /// running build has its token cancelled and every tracked process
    /// killed. Returns false if the build is neither queued nor running.
    ///
    /// # Errors
    ///
    /// Store failures while marking a queued build Cancelled.
    pub async fn cancel(&self, build_id: Uuid) -> Result<bool, PipelineError> {
        for state in self.states.values() {
            // Pending first: the worker claims the active slot inside the
            // pending lock, so a build that is gone from the queue here is
            // already visible as active below.
            let was_queued = {
                let mut pending = state.pending.lock();
                match pending.iter().position(|id| *id == build_id) {
                    Some(position) => {
                        pending.remove(position);
                        true
                    }
                    None => false,
                }
            };
            if was_queued {
                self.services
                    .builds
                    .update_fields(build_id, BuildPatch::status(BuildStatus::Cancelled))
                    .await?;
                info!(build_id = %build_id, "queued build cancelled");
                return Ok(true);
            }

            let is_active = state
                .active
                .lock()
                .as_ref()
                .filter(|active| active.id == build_id)
                .map(|active| Arc::clone(&active.cancel));
            if let Some(cancel) = is_active {
                cancel.cancel("cancelled by operator");
                let killed = self.services.tracker.kill_build(build_id);
                info!(build_id = %build_id, killed, "running build cancelled");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of builds waiting for an environment's worker.
    #[must_use]
    pub fn queue_length(&self, environment: Environment) -> usize {
        self.states
            .get(&environment)
            .map_or(0, |state| state.pending.lock().len())
    }

    /// The build currently running for an environment, if any.
    #[must_use]
    pub fn active_build(&self, environment: Environment) -> Option<Uuid> {
        self.states
            .get(&environment)
            .and_then(|state| state.active.lock().as_ref().map(|active| active.id))
    }

    /// Dequeues and runs at most one build to completion. Returns the id of
    /// the build that ran. For callers driving the queue without background
    /// workers.
    pub async fn run_next(&self, environment: Environment) -> Option<Uuid> {
        let state = self.states.get(&environment)?;
        let (build_id, cancel) = Self::claim_next(state)?;
        self.run_build(environment, build_id, cancel).await;
        Some(build_id)
    }

    async fn run_build(
        &self,
        environment: Environment,
        build_id: Uuid,
        cancel: Arc<CancellationToken>,
    ) {
        let outcome = self.execute_steps(environment, build_id, &cancel).await;
        let final_status = match outcome {
            Ok(status) => status,
            Err(e) => {
                error!(build_id = %build_id, error = %e, "build infrastructure failure");
                BuildStatus::Error
            }
        };

        if let Err(e) = self
            .services
            .builds
            .update_fields(build_id, BuildPatch::status(final_status))
            .await
        {
            error!(build_id = %build_id, error = %e, "failed to persist final build status");
        }

        // However the build ended, never leave the fleet locked.
        self.services.server_lock.release_if_held(build_id);

        if let Some(state) = self.states.get(&environment) {
            *state.active.lock() = None;
        }
        info!(build_id = %build_id, status = %final_status, "build finished");
    }

    async fn execute_steps(
        &self,
        environment: Environment,
        build_id: Uuid,
        cancel: &Arc<CancellationToken>,
    ) -> Result<BuildStatus, PipelineError> {
        let catalog = self
            .catalogs
            .get(&environment)
            .ok_or(PipelineError::MissingCatalog(environment))?;
        let builds = &self.services.builds;

        builds
            .update_fields(build_id, BuildPatch::status(BuildStatus::Running))
            .await?;

        let mut warned = false;
        for (index, step) in catalog.iter().enumerate() {
            if cancel.is_cancelled() {
                // Later steps stay Pending; only the interrupted one is
                // marked Cancelled.
                return Ok(BuildStatus::Cancelled);
            }

            let logger = Arc::new(StepLogger::new(build_id, index, self.services.progress.clone()));
            let snapshot = builds.get(build_id).await?;
            let ctx = StepContext::new(
                snapshot,
                index,
                Arc::clone(&self.services),
                Arc::clone(&logger),
                Arc::clone(cancel),
            );

            let mut result = StepResult::pending(step.name(), index);
            if !step.guard(&ctx).await {
                result.finish(StepStatus::Skipped);
                builds.update_step(build_id, index, result).await?;
                continue;
            }

            result.begin();
            builds.update_step(build_id, index, result.clone()).await?;

            let outcome = match step.setup(&ctx).await {
                Ok(()) => step.execute(&ctx).await,
                Err(e) => Err(e),
            };
            let status = match outcome {
                Ok(()) if logger.has_warnings() => StepStatus::Warning,
                Ok(()) => StepStatus::Success,
                Err(StepError::Cancelled) => StepStatus::Cancelled,
                Err(e) => {
                    logger.error(&e.to_string());
                    warn!(build_id = %build_id, step = step.name(), error = %e, "step failed");
                    StepStatus::Error
                }
            };

            result.log = logger.lines();
            result.finish(status);
            builds.update_step(build_id, index, result).await?;

            match status {
                StepStatus::Cancelled => return Ok(BuildStatus::Cancelled),
                StepStatus::Error => return Ok(BuildStatus::Error),
                StepStatus::Warning => warned = true,
                _ => {}
            }
        }

        Ok(if warned {
            BuildStatus::Warning
        } else {
            BuildStatus::Success
        })
    }
}

impl std::fmt::Debug for BuildQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildQueue")
            .field("environments", &self.catalogs.keys().collect::<Vec<_>>())
            .finish()
    }
}
