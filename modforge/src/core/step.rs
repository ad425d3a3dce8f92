//! Step results and their tagged log lines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tag attached to a step log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTag {
    /// Routine output.
    Info,
    /// Degraded-mode notice; the step kept going.
    Warning,
    /// Error output.
    Error,
}

impl fmt::Display for LogTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A single timestamped, tagged line of step output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// When the line was recorded.
    pub at: DateTime<Utc>,
    /// Severity tag.
    pub tag: LogTag,
    /// The line text.
    pub text: String,
}

impl LogLine {
    /// Creates a log line stamped with the current time.
    #[must_use]
    pub fn now(tag: LogTag, text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            tag,
            text: text.into(),
        }
    }
}

/// Sink for tagged step output lines.
///
/// Implemented by the per-step logger; taken by the process runner and the
/// file synchronizer so lower layers can stream output without knowing about
/// the step machinery.
pub trait LogSink: Send + Sync {
    /// Records one tagged line.
    fn log(&self, tag: LogTag, text: &str);

    /// Records a routine line.
    fn info(&self, text: &str) {
        self.log(LogTag::Info, text);
    }

    /// Records a degraded-mode notice.
    fn warning(&self, text: &str) {
        self.log(LogTag::Warning, text);
    }

    /// Records an error line.
    fn error(&self, text: &str) {
        self.log(LogTag::Error, text);
    }
}

/// The execution status of one step within a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not run yet.
    Pending,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Success,
    /// Completed with a degraded-mode warning.
    Warning,
    /// Failed; the pipeline stops here.
    Error,
    /// Interrupted by build cancellation.
    Cancelled,
    /// Guard declined; the step did not run.
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl StepStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns true if the pipeline may continue past this step.
    #[must_use]
    pub fn allows_continuation(&self) -> bool {
        matches!(self, Self::Success | Self::Warning | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// The recorded outcome of one catalog step.
///
/// Owned exclusively by its build; updated in place by index, never
/// reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step name from the catalog.
    pub name: String,
    /// Fixed catalog index.
    pub index: usize,
    /// Current status.
    pub status: StepStatus,
    /// Append-only tagged log lines.
    #[serde(default)]
    pub log: Vec<LogLine>,
    /// When execution started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When execution ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StepResult {
    /// Creates a pending result for a catalog entry.
    #[must_use]
    pub fn pending(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            status: StepStatus::Pending,
            log: Vec::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Marks the step running and stamps the start time.
    pub fn begin(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Marks the step terminal with the given status and stamps the end time.
    pub fn finish(&mut self, status: StepStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Returns the wall-clock duration in milliseconds, if the step ran.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
