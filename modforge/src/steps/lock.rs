//! Server fleet locking.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use async_trait::async_trait;

/// Locks the game-server fleet for the duration of the build.
///
/// The matching unlock is not a step: the build worker releases the lock
/// unconditionally after the last step, whatever the outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServerLockStep;

#[async_trait]
impl Step for ServerLockStep {
    fn name(&self) -> &str {
        "server_lock"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        ctx.services()
            .server_lock
            .acquire(ctx.build_id())
            .map_err(|e| StepError::Failed(e.to_string()))?;

        ctx.logger().info("server fleet locked");
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
    use uuid::Uuid;

    #[tokio::test]
    async fn test_lock_step_acquires_for_build() {
        let services = StepServices::in_memory(PipelineConfig::new("/src", "/src"));
        let (ctx, _logger) =
            harness::step_context(&services, Environment::Release, "2.0.0", "server_lock");

        ServerLockStep.execute(&ctx).await.unwrap();
        assert!(services.server_lock.is_locked());
    }

    #[tokio::test]
    async fn test_lock_step_fails_when_held_elsewhere() {
        let services = StepServices::in_memory(PipelineConfig::new("/src", "/src"));
        services.server_lock.acquire(Uuid::new_v4()).unwrap();

        let (ctx, _logger) =
            harness::step_context(&services, Environment::Release, "2.0.0", "server_lock");

        let result = ServerLockStep.execute(&ctx).await;
        assert!(matches!(result, Err(StepError::Failed(_))));
    }
}
