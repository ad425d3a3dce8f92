//! Deploying the build tree to the published repository.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use crate::fsync::{FileSynchronizer, SyncOptions};
use async_trait::async_trait;

/// Reconciles the published repository tree against the build tree.
///
/// Dev and release-candidate deploys delete repository files absent from
/// the build; release deploys keep them, since the release repository
/// retains some previously-published content.
#[derive(Debug, Clone, Copy)]
pub struct DeployStep {
    delete_removed: bool,
}

impl DeployStep {
    /// A deploy that mirrors the build tree exactly.
    #[must_use]
    pub fn mirroring() -> Self {
        Self {
            delete_removed: true,
        }
    }

    /// A deploy that only adds and updates, never deletes.
    #[must_use]
    pub fn additive() -> Self {
        Self {
            delete_removed: false,
        }
    }
}

#[async_trait]
impl Step for DeployStep {
    fn name(&self) -> &str {
        "deploy"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let paths = ctx.paths()?;
        let build_root = paths.build_root.clone();
        let repo_root = paths.repo_root.clone();
        let options = SyncOptions {
            delete_removed: self.delete_removed,
            sidecar_suffixes: ctx.config().sidecar_suffixes.clone(),
        };

        let _guard = ctx.services().repo_guard.lock().await;
        ctx.cancel().check()?;

        let report = FileSynchronizer::new()
            .sync(&build_root, &repo_root, &options, ctx.cancel())
            .await?;

        if report.is_noop() {
            ctx.logger().info("repository already up to date");
        } else {
            ctx.logger().info(&format!("deployed: {report}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Environment;
    use crate::steps::harness;
    use crate::steps::StepServices;
    use tempfile::TempDir;
    use tokio::fs;

    async fn seed(ctx: &crate::steps::StepContext) -> (std::path::PathBuf, std::path::PathBuf) {
        let paths = ctx.paths().unwrap();
        let build = paths.build_root.clone();
        let repo = paths.repo_root.clone();

        fs::create_dir_all(&build).await.unwrap();
        fs::write(build.join("core.pbo"), "v2").await.unwrap();
        fs::create_dir_all(&repo).await.unwrap();
        fs::write(repo.join("core.pbo"), "v1").await.unwrap();
        fs::write(repo.join("stale.pbo"), "old").await.unwrap();
        fs::write(repo.join("stale.pbo.zsync"), "sidecar").await.unwrap();
        (build, repo)
    }

    #[tokio::test]
    async fn test_mirroring_deploy_deletes_stale_files() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, logger) =
            harness::step_context(&services, Environment::Dev, "1.0.0", "deploy");
        let (_build, repo) = seed(&ctx).await;

        DeployStep::mirroring().execute(&ctx).await.unwrap();

        assert_eq!(
            fs::read_to_string(repo.join("core.pbo")).await.unwrap(),
            "v2"
        );
        assert!(fs::metadata(repo.join("stale.pbo")).await.is_err());
        assert!(fs::metadata(repo.join("stale.pbo.zsync")).await.is_err());
        assert!(!logger.has_warnings());
    }

    #[tokio::test]
    async fn test_additive_deploy_keeps_stale_files() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Release, "1.0.0", "deploy");
        let (_build, repo) = seed(&ctx).await;

        DeployStep::additive().execute(&ctx).await.unwrap();

        assert_eq!(
            fs::read_to_string(repo.join("core.pbo")).await.unwrap(),
            "v2"
        );
        assert!(fs::metadata(repo.join("stale.pbo")).await.is_ok());
    }
}
