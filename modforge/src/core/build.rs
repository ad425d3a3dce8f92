//! The build aggregate: one pipeline execution for one environment/commit.

use super::environment::Environment;
use super::step::{StepResult, StepStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Source-commit metadata carried on a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit sha.
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    /// Author name.
    pub author: String,
}

impl CommitInfo {
    /// Creates commit metadata.
    #[must_use]
    pub fn new(
        sha: impl Into<String>,
        message: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            author: author.into(),
        }
    }

    /// Returns the abbreviated sha used in log output.
    #[must_use]
    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(8);
        &self.sha[..end]
    }
}

/// The overall status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Queued, waiting for the environment worker.
    Pending,
    /// Currently executing.
    Running,
    /// All steps succeeded.
    Success,
    /// Completed, but at least one step warned.
    Warning,
    /// A step failed; later steps did not run.
    Error,
    /// Cancelled by an operator.
    Cancelled,
}

impl Default for BuildStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl BuildStatus {
    /// Returns true once the build can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One pipeline execution for one environment/commit.
///
/// Created by a trigger, mutated once per step by the queue, immutable once
/// terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    /// Build id.
    pub id: Uuid,
    /// Target environment.
    pub environment: Environment,
    /// Monotonic build number, per environment.
    pub number: u64,
    /// Version string being built.
    pub version: String,
    /// Source-commit metadata.
    pub commit: CommitInfo,
    /// Ordered step results, one per catalog entry.
    pub steps: Vec<StepResult>,
    /// Overall status.
    pub status: BuildStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Build {
    /// Creates a queued build with pending step results seeded from the
    /// catalog's step names, in catalog order.
    #[must_use]
    pub fn new(
        environment: Environment,
        number: u64,
        version: impl Into<String>,
        commit: CommitInfo,
        step_names: &[&str],
    ) -> Self {
        let steps = step_names
            .iter()
            .enumerate()
            .map(|(index, name)| StepResult::pending(*name, index))
            .collect();

        Self {
            id: Uuid::new_v4(),
            environment,
            number,
            version: version.into(),
            commit,
            steps,
            status: BuildStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Returns true if any step ended in a warning.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Warning)
    }

    /// Returns the step currently running, if any.
    #[must_use]
    pub fn running_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.status == StepStatus::Running)
    }
}
