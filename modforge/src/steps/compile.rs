//! Sub-project compilation.

use super::{Step, StepContext};
use crate::config::ProjectConfig;
use crate::core::LogSink;
use crate::errors::StepError;
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

/// Compiles one sub-project with its configured external tool.
///
/// The tool's output is judged line by line: unexcluded error lines fail
/// the step even on a zero exit, and quiet mode or the allow list can
/// tolerate routine non-zero exits.
#[derive(Debug, Clone)]
pub struct ModCompileStep {
    name: String,
    project: ProjectConfig,
}

impl ModCompileStep {
    /// Creates a compile step for one project.
    #[must_use]
    pub fn new(project: ProjectConfig) -> Self {
        Self {
            name: format!("compile:{}", project.name),
            project,
        }
    }
}

#[async_trait]
impl Step for ModCompileStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, ctx: &StepContext) -> Result<(), StepError> {
        let project_dir = ctx.config().project_dir(&self.project);
        if fs::metadata(&project_dir).await.is_err() {
            return Err(StepError::Setup(format!(
                "project directory {} does not exist",
                project_dir.display()
            )));
        }

        ctx.config()
            .tool(&self.project.tool)
            .map_err(|e| StepError::Setup(e.to_string()))?;
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let config = ctx.config();
        let project_dir = config.project_dir(&self.project);
        let tool = config
            .tool(&self.project.tool)
            .map_err(|e| StepError::Setup(e.to_string()))?;
        let spec = self
            .project
            .run_spec(&project_dir, tool, config.process_timeout_secs);

        debug!(project = %self.project.name, "compiling");
        let output = ctx
            .runner()
            .run(ctx.build_id(), &spec, ctx.log_sink(), ctx.cancel())
            .await?;

        ctx.logger().info(&format!(
            "{} compiled (exit code {})",
            self.project.name, output.exit_code
        ));
        Ok(())
    }
}
