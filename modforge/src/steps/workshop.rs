//! Workshop mod reconciliation at release time.

use super::{Step, StepContext};
use crate::core::LogSink;
use crate::errors::StepError;
use async_trait::async_trait;

/// Collapses `*PendingRelease` workshop statuses to their terminal
/// counterparts, stamping the released version.
///
/// Runs after the release deploy has synchronized the staged content, so
/// the records only flip once the files are actually live. Idempotent: a
/// rebuild finds nothing left to collapse.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkshopReconcileStep;

#[async_trait]
impl Step for WorkshopReconcileStep {
    fn name(&self) -> &str {
        "workshop_reconcile"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let version = ctx.version().to_string();
        let store = &ctx.services().workshop;

        let mut collapsed = 0;
        for mut record in store.list().await? {
            if record.collapse_pending(&version) {
                ctx.logger().info(&format!(
                    "{} ({}) is now {}",
                    record.name, record.id, record.status
                ));
                store.save(record).await?;
                collapsed += 1;
            }
        }

        if collapsed == 0 {
            ctx.logger().info("no workshop changes pending release");
        } else {
            ctx.logger()
                .info(&format!("reconciled {collapsed} workshop mods"));
        }
        Ok(())
    }
}
