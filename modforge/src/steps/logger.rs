//! Per-step logger.

use crate::core::{LogLine, LogSink, LogTag};
use crate::progress::ProgressChannel;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Timestamps and tags a step's output lines, keeps them for persistence,
/// and forwards each one to the live progress channel as it arrives.
pub struct StepLogger {
    build_id: Uuid,
    step_index: usize,
    lines: Mutex<Vec<LogLine>>,
    warned: AtomicBool,
    progress: Arc<dyn ProgressChannel>,
}

impl StepLogger {
    /// Creates a logger for one step of one build.
    #[must_use]
    pub fn new(build_id: Uuid, step_index: usize, progress: Arc<dyn ProgressChannel>) -> Self {
        Self {
            build_id,
            step_index,
            lines: Mutex::new(Vec::new()),
            warned: AtomicBool::new(false),
            progress,
        }
    }

    /// Snapshot of all lines recorded so far.
    #[must_use]
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().clone()
    }

    /// True once any warning line was recorded. Drives the step's
    /// Success-vs-Warning outcome.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.warned.load(Ordering::SeqCst)
    }
}

impl LogSink for StepLogger {
    fn log(&self, tag: LogTag, text: &str) {
        if tag == LogTag::Warning {
            self.warned.store(true, Ordering::SeqCst);
        }
        let line = LogLine::now(tag, text);
        self.lines.lock().push(line.clone());
        self.progress.log_line(self.build_id, self.step_index, &line);
    }
}

impl std::fmt::Debug for StepLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepLogger")
            .field("build_id", &self.build_id)
            .field("step_index", &self.step_index)
            .field("lines", &self.lines.lock().len())
            .finish()
    }
}
