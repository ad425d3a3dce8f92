//! Deploy announcements.

use super::{Step, StepContext};
use crate::core::{Environment, LogSink};
use crate::errors::StepError;
use async_trait::async_trait;
use tracing::info;

/// Sink for "a new build is live" announcements.
///
/// Delivery is best effort: a failed announcement degrades the build to
/// Warning, it never fails it.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announces a deployed version for an environment.
    async fn announce(&self, environment: Environment, version: &str) -> Result<(), String>;
}

/// Notifier that writes announcements to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn announce(&self, environment: Environment, version: &str) -> Result<(), String> {
        info!(environment = %environment, version = %version, "build deployed");
        Ok(())
    }
}

/// Announces the deployed build through the configured notifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyStep;

#[async_trait]
impl Step for NotifyStep {
    fn name(&self) -> &str {
        "notify"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let environment = ctx.environment();
        let version = ctx.version().to_string();

        match ctx
            .services()
            .notifier
            .announce(environment, &version)
            .await
        {
            Ok(()) => {
                ctx.logger()
                    .info(&format!("announced {version} on {environment}"));
            }
            Err(e) => ctx.warn(&format!("announcement failed: {e}")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::config::PipelineConfig;
    use crate::core::{Build, CommitInfo};
    use crate::process::ProcessTracker;
    use crate::progress::NoOpProgress;
    use crate::queue::ServerLock;
    use crate::steps::{StepLogger, StepServices};
    use crate::store::{MemoryBuildStore, MemoryReleaseStore, MemoryWorkshopStore};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn announce(&self, _environment: Environment, _version: &str) -> Result<(), String> {
            Err("webhook unreachable".to_string())
        }
    }

    struct RecordingNotifier {
        calls: Mutex<Vec<(Environment, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn announce(&self, environment: Environment, version: &str) -> Result<(), String> {
            self.calls.lock().push((environment, version.to_string()));
            Ok(())
        }
    }

    fn context_with(notifier: Arc<dyn Notifier>) -> (StepContext, Arc<StepLogger>) {
        let progress: Arc<NoOpProgress> = Arc::new(NoOpProgress);
        let services = Arc::new(StepServices {
            builds: Arc::new(MemoryBuildStore::new()),
            releases: Arc::new(MemoryReleaseStore::new()),
            workshop: Arc::new(MemoryWorkshopStore::new()),
            progress: progress.clone(),
            tracker: ProcessTracker::new(),
            server_lock: Arc::new(ServerLock::new(progress)),
            repo_guard: Arc::new(tokio::sync::Mutex::new(())),
            notifier,
            config: Arc::new(PipelineConfig::new("/src", "/src")),
        });

        let build = Build::new(
            Environment::Dev,
            1,
            "1.4.0",
            CommitInfo::default(),
            &["notify"],
        );
        let logger = Arc::new(StepLogger::new(build.id, 0, services.progress.clone()));
        let ctx = StepContext::new(build, 0, services, logger.clone(), CancellationToken::new());
        (ctx, logger)
    }

    #[tokio::test]
    async fn test_notify_announces_version_and_environment() {
        let notifier = Arc::new(RecordingNotifier {
            calls: Mutex::new(Vec::new()),
        });
        let (ctx, _logger) = context_with(notifier.clone());

        NotifyStep.execute(&ctx).await.unwrap();

        let calls = notifier.calls.lock();
        assert_eq!(calls.as_slice(), &[(Environment::Dev, "1.4.0".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_announcement_degrades_to_warning() {
        let (ctx, logger) = context_with(Arc::new(FailingNotifier));

        NotifyStep.execute(&ctx).await.unwrap();
        assert!(logger.has_warnings());
    }
}
