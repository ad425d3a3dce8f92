//! Release draft creation and publication.

use super::{Step, StepContext};
use crate::core::{CommitRange, LogSink};
use crate::errors::StepError;
use async_trait::async_trait;

/// Ensures a draft release document exists for the version being built.
///
/// Runs on the release-candidate track. The first candidate build for a
/// version creates the draft; later candidates find it and leave it
/// alone, so operator changelog edits survive rebuilds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReleaseDraftStep;

#[async_trait]
impl Step for ReleaseDraftStep {
    fn name(&self) -> &str {
        "release_draft"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let version = ctx.version().to_string();
        let releases = &ctx.services().releases;

        if let Some(existing) = releases.get(&version).await? {
            if existing.published {
                ctx.warn(&format!("version {version} is already published"));
            } else {
                ctx.logger()
                    .info(&format!("draft for {version} already exists"));
            }
            return Ok(());
        }

        let from = releases
            .latest_published()
            .await?
            .map(|r| r.commit_range.to)
            .unwrap_or_default();
        let range = CommitRange::new(from, ctx.build().commit.sha.clone());

        releases.create_draft(&version, range).await?;
        ctx.logger().info(&format!("created draft for {version}"));
        Ok(())
    }
}

/// Publishes the draft for the version being released, exactly once.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishReleaseStep;

#[async_trait]
impl Step for PublishReleaseStep {
    fn name(&self) -> &str {
        "publish_release"
    }

    async fn setup(&self, ctx: &StepContext) -> Result<(), StepError> {
        let version = ctx.version();
        ctx.services()
            .releases
            .get_draft(version)
            .await?
            .map(|_| ())
            .ok_or_else(|| StepError::Setup(format!("no draft release for version {version}")))
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let version = ctx.version().to_string();
        let release = ctx.services().releases.publish(&version).await?;

        ctx.logger().info(&format!(
            "published {} covering {}..{}",
            release.version, release.commit_range.from, release.commit_range.to
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::Environment;
    use crate::steps::harness;
    use crate::steps::StepServices;
    use std::sync::Arc;

    fn services() -> Arc<StepServices> {
        StepServices::in_memory(PipelineConfig::new("/src", "/src"))
    }

    #[tokio::test]
    async fn test_first_candidate_creates_draft() {
        let services = services();
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Rc, "2.0.0", "release_draft");

        ReleaseDraftStep.execute(&ctx).await.unwrap();

        let draft = services.releases.get_draft("2.0.0").await.unwrap().unwrap();
        assert_eq!(draft.commit_range.to, "abc123def");
        assert_eq!(draft.commit_range.from, "");
    }

    #[tokio::test]
    async fn test_draft_range_starts_at_previous_release() {
        let services = services();
        services
            .releases
            .create_draft("1.0.0", CommitRange::new("", "oldersha"))
            .await
            .unwrap();
        services.releases.publish("1.0.0").await.unwrap();

        let (ctx, _logger) =
            harness::step_context(&services, Environment::Rc, "2.0.0", "release_draft");
        ReleaseDraftStep.execute(&ctx).await.unwrap();

        let draft = services.releases.get_draft("2.0.0").await.unwrap().unwrap();
        assert_eq!(draft.commit_range.from, "oldersha");
    }

    #[tokio::test]
    async fn test_rebuild_keeps_existing_draft() {
        let services = services();
        let (ctx, logger) =
            harness::step_context(&services, Environment::Rc, "2.0.0", "release_draft");

        ReleaseDraftStep.execute(&ctx).await.unwrap();
        let draft = services.releases.get_draft("2.0.0").await.unwrap().unwrap();
        let created = draft.created_at;

        ReleaseDraftStep.execute(&ctx).await.unwrap();
        assert!(!logger.has_warnings());

        let kept = services.releases.get_draft("2.0.0").await.unwrap().unwrap();
        assert_eq!(kept.created_at, created);
    }

    #[tokio::test]
    async fn test_publish_requires_draft() {
        let services = services();
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Release, "2.0.0", "publish_release");

        let result = PublishReleaseStep.setup(&ctx).await;
        assert!(matches!(result, Err(StepError::Setup(_))));
    }

    #[tokio::test]
    async fn test_publish_flips_draft_once() {
        let services = services();
        services
            .releases
            .create_draft("2.0.0", CommitRange::new("a", "b"))
            .await
            .unwrap();

        let (ctx, _logger) =
            harness::step_context(&services, Environment::Release, "2.0.0", "publish_release");

        PublishReleaseStep.setup(&ctx).await.unwrap();
        PublishReleaseStep.execute(&ctx).await.unwrap();

        let release = services.releases.get("2.0.0").await.unwrap().unwrap();
        assert!(release.published);

        // A rerun against the published version fails setup, not execute.
        let again = PublishReleaseStep.setup(&ctx).await;
        assert!(matches!(again, Err(StepError::Setup(_))));
    }
}
