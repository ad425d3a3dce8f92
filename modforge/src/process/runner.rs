//! Runs one external command under pipeline control.
//!
//! Output is pumped line-by-line into the step logger as it arrives, so
//! progress is live rather than buffered to completion. Two readers drain
//! stdout and stderr concurrently; both feed one shared classifier so an
//! ignore-error gate spans streams.

use super::classify::{GateMarkers, LineClassifier, LineVerdict};
use super::tracker::ProcessTracker;
use crate::cancellation::CancellationToken;
use crate::core::LogSink;
use crate::errors::StepError;
use futures::future::OptionFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

fn default_timeout_secs() -> u64 {
    1800
}

/// Everything needed to run and judge one external command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    /// Working directory for the child.
    pub working_dir: PathBuf,
    /// Executable to spawn.
    pub program: PathBuf,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-process timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Suppresses routine non-zero exits: with quiet set, only error lines
    /// fail the step.
    #[serde(default)]
    pub quiet: bool,
    /// Exit codes counted as success besides zero.
    #[serde(default)]
    pub allowed_exit_codes: Vec<i32>,
    /// Substrings whose lines are never classified as errors.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Regex patterns promoting stdout lines to error candidates.
    #[serde(default)]
    pub error_patterns: Vec<String>,
    /// Optional ignore-error gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateMarkers>,
}

impl RunSpec {
    /// Creates a spec with default judgement knobs.
    #[must_use]
    pub fn new(working_dir: impl Into<PathBuf>, program: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            program: program.into(),
            args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            quiet: false,
            allowed_exit_codes: Vec::new(),
            exclusions: Vec::new(),
            error_patterns: Vec::new(),
            gate: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Enables quiet mode.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Allows an extra success exit code.
    #[must_use]
    pub fn allow_exit_code(mut self, code: i32) -> Self {
        self.allowed_exit_codes.push(code);
        self
    }

    /// Adds an exclusion substring.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclusions.push(pattern.into());
        self
    }

    /// Adds an error regex pattern.
    #[must_use]
    pub fn error_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.error_patterns.push(pattern.into());
        self
    }

    /// Sets the ignore-error gate.
    #[must_use]
    pub fn gate(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.gate = Some(GateMarkers::new(start, end));
        self
    }

    fn exit_allowed(&self, code: i32) -> bool {
        code == 0 || self.quiet || self.allowed_exit_codes.contains(&code)
    }
}

/// What the child did, for callers that continue after non-fatal runs.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOutput {
    /// Exit code, -1 if terminated by a signal.
    pub exit_code: i32,
    /// Number of lines classified as errors.
    pub error_lines: usize,
}

/// Spawns and supervises one external command per call.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tracker: Arc<ProcessTracker>,
}

impl ProcessRunner {
    /// Creates a runner backed by the given tracker.
    #[must_use]
    pub fn new(tracker: Arc<ProcessTracker>) -> Self {
        Self { tracker }
    }

    /// Runs the command to completion.
    ///
    /// Fails if any unexcluded error line appears or the exit code is
    /// disallowed. On cancellation, out-of-band kill or timeout the child is
    /// killed before returning.
    ///
    /// # Errors
    ///
    /// `StepError::Cancelled`, `StepError::Timeout`, `StepError::ErrorLines`,
    /// `StepError::ExitCode`, or `StepError::Failed` on spawn problems.
    pub async fn run(
        &self,
        build_id: Uuid,
        spec: &RunSpec,
        log: Arc<dyn LogSink>,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, StepError> {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let classifier = LineClassifier::new(
            spec.exclusions.clone(),
            &spec.error_patterns,
            spec.gate.clone(),
        )
        .map_err(StepError::Failed)?;
        let classifier = Arc::new(Mutex::new(classifier));
        let error_count = Arc::new(AtomicUsize::new(0));

        debug!(
            build_id = %build_id,
            program = %spec.program.display(),
            args = ?spec.args,
            "spawning external tool"
        );

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                StepError::Failed(format!("failed to spawn {}: {e}", spec.program.display()))
            })?;

        let mut guard = self.tracker.register(build_id, child.id());

        let stdout_task = child.stdout.take().map(|out| {
            pump_lines(out, false, Arc::clone(&classifier), Arc::clone(&error_count), Arc::clone(&log))
        });
        let stderr_task = child.stderr.take().map(|err| {
            pump_lines(err, true, Arc::clone(&classifier), Arc::clone(&error_count), Arc::clone(&log))
        });

        let timeout = Duration::from_secs(spec.timeout_secs);
        let status = tokio::select! {
            status = child.wait() => status.map_err(StepError::Io)?,
            () = cancel.cancelled() => {
                kill_child(&mut child).await;
                return Err(StepError::Cancelled);
            }
            () = guard.killed() => {
                kill_child(&mut child).await;
                return Err(StepError::Cancelled);
            }
            () = tokio::time::sleep(timeout) => {
                kill_child(&mut child).await;
                return Err(StepError::Timeout(timeout));
            }
        };
        drop(guard);

        // Let both readers drain remaining buffered output before judging.
        let _ = futures::join!(
            OptionFuture::from(stdout_task),
            OptionFuture::from(stderr_task)
        );

        let exit_code = status.code().unwrap_or(-1);
        let error_lines = error_count.load(Ordering::SeqCst);
        let output = ProcessOutput {
            exit_code,
            error_lines,
        };

        if error_lines > 0 {
            return Err(StepError::ErrorLines { count: error_lines });
        }
        if !spec.exit_allowed(exit_code) {
            return Err(StepError::ExitCode { code: exit_code });
        }

        Ok(output)
    }
}

fn pump_lines<R>(
    reader: R,
    from_error_stream: bool,
    classifier: Arc<Mutex<LineClassifier>>,
    error_count: Arc<AtomicUsize>,
    log: Arc<dyn LogSink>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let verdict = classifier.lock().classify(&line, from_error_stream);
            match verdict {
                LineVerdict::Error => {
                    error_count.fetch_add(1, Ordering::SeqCst);
                    log.error(&line);
                }
                LineVerdict::Ok => log.info(&line),
            }
        }
    })
}

async fn kill_child(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
}
