//! Repository backup.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use crate::fsync::{copy_tree, remove_tree};
use async_trait::async_trait;

/// Snapshots the published repository tree into the backup location
/// before a deploy touches it.
///
/// Takes the global repository guard: backups never observe a repository
/// mid-deploy, whichever environment is deploying.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackupRepoStep;

#[async_trait]
impl Step for BackupRepoStep {
    fn name(&self) -> &str {
        "backup_repo"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let paths = ctx.paths()?;
        let repo_root = paths.repo_root.clone();
        let backup_root = paths.backup_root.clone();

        let _guard = ctx.services().repo_guard.lock().await;
        ctx.cancel().check().map_err(StepError::from)?;

        remove_tree(&backup_root).await?;
        let copied = copy_tree(&repo_root, &backup_root, ctx.cancel()).await?;

        ctx.logger()
            .info(&format!("backed up {copied} repository files"));
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

    #[tokio::test]
    async fn test_backup_replaces_previous_snapshot() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Rc, "1.0.0", "backup_repo");

        let paths = ctx.paths().unwrap();
        let repo = paths.repo_root.clone();
        let backup = paths.backup_root.clone();

        fs::create_dir_all(&repo).await.unwrap();
        fs::write(repo.join("current.pbo"), "current").await.unwrap();
        fs::create_dir_all(&backup).await.unwrap();
        fs::write(backup.join("ancient.pbo"), "ancient").await.unwrap();

        BackupRepoStep.execute(&ctx).await.unwrap();

        assert!(fs::metadata(backup.join("current.pbo")).await.is_ok());
        assert!(fs::metadata(backup.join("ancient.pbo")).await.is_err());
    }

    #[tokio::test]
    async fn test_backup_of_empty_repo_is_ok() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Dev, "1.0.0", "backup_repo");

        BackupRepoStep.execute(&ctx).await.unwrap();
    }
}
