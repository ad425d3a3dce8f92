//! Staging compiled output into the build tree.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use crate::fsync::copy_tree;
use async_trait::async_trait;

/// Copies every sub-project's compiled output into the build tree, one
/// subdirectory per project.
#[derive(Debug, Default, Clone, Copy)]
pub struct StageOutputStep;

#[async_trait]
impl Step for StageOutputStep {
    fn name(&self) -> &str {
        "stage_output"
    }

    async fn guard(&self, ctx: &StepContext) -> bool {
        !ctx.config().projects.is_empty()
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let build_root = ctx.paths()?.build_root.clone();
        let config = ctx.config();

        for project in &config.projects {
            let output_dir = config.project_output_dir(project);
            let target = build_root.join(&project.name);

            let copied = copy_tree(&output_dir, &target, ctx.cancel()).await?;
            ctx.logger()
                .info(&format!("staged {copied} files for {}", project.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::core::Environment;
    use crate::steps::harness;
    use crate::steps::StepServices;
    use tempfile::TempDir;
    use tokio::fs;

    #[tokio::test]
    async fn test_stage_copies_each_project_output() {
        let root = TempDir::new().unwrap();
        let out = root.path().join("sources/core_mod/out");
        fs::create_dir_all(out.join("addons")).await.unwrap();
        fs::write(out.join("addons/core.pbo"), "pbo").await.unwrap();

        let config = harness::config_under(root.path())
            .with_project(ProjectConfig::new("core_mod", "packer"));
        let services = StepServices::in_memory(config);
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Dev, "1.0.0", "stage_output");

        StageOutputStep.execute(&ctx).await.unwrap();

        let staged = ctx
            .paths()
            .unwrap()
            .build_root
            .join("core_mod/addons/core.pbo");
        assert!(fs::metadata(staged).await.is_ok());
    }

    #[tokio::test]
    async fn test_guard_skips_when_no_projects() {
        let root = TempDir::new().unwrap();
        let services = StepServices::in_memory(harness::config_under(root.path()));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Dev, "1.0.0", "stage_output");

        assert!(!StageOutputStep.guard(&ctx).await);
    }
}
