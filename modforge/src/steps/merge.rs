//! Branch merge after a release.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use crate::vcs::GitCli;
use async_trait::async_trait;

/// Merges the release branch back into the development branch once the
/// release has shipped.
///
/// A failed merge (conflicts, diverged history) degrades the build to
/// Warning rather than failing it: the content is already published, the
/// merge just needs a human.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeBranchStep;

#[async_trait]
impl Step for MergeBranchStep {
    fn name(&self) -> &str {
        "merge_branch"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let config = ctx.config();
        let git = GitCli::new(config.git_work_dir.clone());
        let source = config.release_branch.clone();
        let target = config.dev_branch.clone();

        match git.merge_into(&source, &target).await {
            Ok(()) => {
                ctx.logger()
                    .info(&format!("merged {source} into {target}"));
            }
            Err(e) => ctx.warn(&format!("merge of {source} into {target} failed: {e}")),
        }
        Ok(())
    }
}
