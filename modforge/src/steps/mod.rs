//! Steps: the units of pipeline work.
//!
//! Each step has a three-phase lifecycle: `guard` (cheap skip check),
//! `setup` (resolve preconditions; failure is fatal), `execute` (the work).
//! Steps never call each other; composition is only through catalog
//! ordering.

mod backup;
mod catalog;
mod clean;
mod compile;
mod context;
mod deploy;
mod lock;
mod logger;
mod merge;
mod notify;
mod release;
mod stage_output;
mod workshop;

pub use backup::BackupRepoStep;
pub use catalog::{default_catalogs, CatalogEntry, StepCatalog};
pub use clean::CleanStep;
pub use compile::ModCompileStep;
pub use context::{StepContext, StepServices};
pub use deploy::DeployStep;
pub use lock::ServerLockStep;
pub use logger::StepLogger;
pub use merge::MergeBranchStep;
pub use notify::{Notifier, NotifyStep, TracingNotifier};
pub use release::{PublishReleaseStep, ReleaseDraftStep};
pub use stage_output::StageOutputStep;
pub use workshop::WorkshopReconcileStep;

use crate::errors::StepError;
use async_trait::async_trait;

#[cfg(test)]
pub(crate) mod harness {
    use super::{StepContext, StepLogger, StepServices};
    use crate::cancellation::CancellationToken;
    use crate::config::{EnvPaths, PipelineConfig};
    use crate::core::{Build, CommitInfo, Environment};
    use std::path::Path;
    use std::sync::Arc;

    pub(crate) fn env_paths(root: &Path, environment: Environment) -> EnvPaths {
        let base = root.join(environment.key());
        EnvPaths {
            server_root: base.join("server"),
            build_root: base.join("build"),
            repo_root: base.join("repo"),
            backup_root: base.join("backup"),
        }
    }

    /// A config whose trees all live under one temp root.
    pub(crate) fn config_under(root: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::new(root.join("sources"), root.join("sources"));
        for environment in Environment::ALL {
            config = config.with_environment(environment, env_paths(root, environment));
        }
        config
    }

    /// Context for one step of a fresh single-step build.
    pub(crate) fn step_context(
        services: &Arc<StepServices>,
        environment: Environment,
        version: &str,
        step_name: &str,
    ) -> (StepContext, Arc<StepLogger>) {
        let build = Build::new(
            environment,
            1,
            version,
            CommitInfo::new("abc123def", "test commit", "casey"),
            &[step_name],
        );
        let logger = Arc::new(StepLogger::new(build.id, 0, services.progress.clone()));
        let ctx = StepContext::new(
            build,
            0,
            services.clone(),
            logger.clone(),
            CancellationToken::new(),
        );
        (ctx, logger)
    }
}

/// One unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync {
    /// The step's catalog name.
    fn name(&self) -> &str;

    /// Cheap skip check. False means skip, not failure.
    async fn guard(&self, _ctx: &StepContext) -> bool {
        true
    }

    /// Resolves dependencies and preconditions. Failure here is fatal.
    async fn setup(&self, _ctx: &StepContext) -> Result<(), StepError> {
        Ok(())
    }

    /// The work.
    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError>;
}
