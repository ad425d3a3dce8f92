//! Build tree cleanup.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use crate::fsync::remove_tree;
use async_trait::async_trait;
use tokio::fs;

/// Resets the environment's build tree to an empty directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanStep;

#[async_trait]
impl Step for CleanStep {
    fn name(&self) -> &str {
        "clean"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let build_root = ctx.paths()?.build_root.clone();

        remove_tree(&build_root).await?;
        fs::create_dir_all(&build_root).await?;

        ctx.logger()
            .info(&format!("cleaned {}", build_root.display()));
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

    #[tokio::test]
    async fn test_clean_resets_build_tree() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Dev, "1.0.0", "clean");

        let build_root = ctx.paths().unwrap().build_root.clone();
        fs::create_dir_all(build_root.join("old")).await.unwrap();
        fs::write(build_root.join("old/stale.pbo"), "stale")
            .await
            .unwrap();

        CleanStep.execute(&ctx).await.unwrap();

        assert!(fs::metadata(&build_root).await.is_ok());
        assert!(fs::metadata(build_root.join("old")).await.is_err());
    }

    #[tokio::test]
    async fn test_clean_tolerates_missing_tree() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Rc, "1.0.0", "clean");

        CleanStep.execute(&ctx).await.unwrap();
        assert!(fs::metadata(&ctx.paths().unwrap().build_root).await.is_ok());
    }
}
