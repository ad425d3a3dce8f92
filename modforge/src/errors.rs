//! Error types for the pipeline.

use crate::core::Environment;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Infrastructure-level pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No build with the given id exists.
    #[error("build not found: {0}")]
    BuildNotFound(Uuid),

    /// Step index outside the build's catalog range.
    #[error("step index {index} out of range for build {build_id}")]
    StepIndexOutOfRange {
        /// The build being updated.
        build_id: Uuid,
        /// The offending index.
        index: usize,
    },

    /// A terminal build was written to.
    #[error("build {0} is terminal and cannot be updated")]
    BuildTerminal(Uuid),

    /// No release document for the given version.
    #[error("release not found: {0}")]
    ReleaseNotFound(String),

    /// A draft already exists for the version.
    #[error("release {0} already has a draft")]
    DraftExists(String),

    /// The release was already published.
    #[error("release {0} is already published")]
    AlreadyPublished(String),

    /// No workshop record with the given id.
    #[error("workshop mod not found: {0}")]
    WorkshopModNotFound(String),

    /// Two catalog entries share a name.
    #[error("duplicate step name '{0}' in catalog")]
    DuplicateStepName(String),

    /// No catalog registered for the environment.
    #[error("no step catalog for environment '{0}'")]
    MissingCatalog(Environment),

    /// Configuration is missing a required entry.
    #[error("configuration error: {0}")]
    Config(String),

    /// The server lock is held by another build.
    #[error("server lock held by build {0}")]
    ServerLockHeld(Uuid),

    /// The operation was interrupted by cancellation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by a single step's setup or execute phase.
#[derive(Debug, Error)]
pub enum StepError {
    /// Setup could not resolve a precondition; fatal for the build.
    #[error("setup failed: {0}")]
    Setup(String),

    /// The step's work failed.
    #[error("{0}")]
    Failed(String),

    /// An external process exited with a disallowed code.
    #[error("process exited with code {code}")]
    ExitCode {
        /// The exit code.
        code: i32,
    },

    /// An external process emitted unexcluded error output.
    #[error("process reported {count} error line(s)")]
    ErrorLines {
        /// Number of classified error lines.
        count: usize,
    },

    /// An external process exceeded its timeout.
    #[error("process timed out after {0:?}")]
    Timeout(Duration),

    /// The build was cancelled while the step ran.
    #[error("step cancelled")]
    Cancelled,

    /// IO error inside the step.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for StepError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled(_) => Self::Cancelled,
            other => Self::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = PipelineError::DuplicateStepName("compile".to_string());
        assert_eq!(err.to_string(), "duplicate step name 'compile' in catalog");

        let err = StepError::ExitCode { code: 3 };
        assert_eq!(err.to_string(), "process exited with code 3");
    }

    #[test]
    fn test_cancelled_maps_across_layers() {
        let err: StepError = PipelineError::Cancelled("operator".to_string()).into();
        assert!(matches!(err, StepError::Cancelled));

        let err: StepError = PipelineError::BuildNotFound(Uuid::nil()).into();
        assert!(matches!(err, StepError::Failed(_)));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
