//! Progress channel trait and implementations.

use crate::core::{BuildStatus, LogLine, StepResult};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// An event pushed to live observers.
///
/// Events may interleave across builds but are never reordered within one
/// build: all of a build's events are published from its single worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A step changed status or was persisted.
    StepUpdate {
        /// The build the step belongs to.
        build_id: Uuid,
        /// Snapshot of the step result.
        step: StepResult,
    },
    /// A step emitted a log line.
    LogLine {
        /// The build the line belongs to.
        build_id: Uuid,
        /// Catalog index of the emitting step.
        step_index: usize,
        /// The line.
        line: LogLine,
    },
    /// A build's overall status changed.
    BuildUpdate {
        /// The build.
        build_id: Uuid,
        /// New overall status.
        status: BuildStatus,
    },
    /// The fleet-wide server lock changed state.
    LockState {
        /// True while a deploy holds the lock.
        locked: bool,
    },
}

/// Push interface for live progress.
///
/// All methods are fire-and-forget: they must never block or fail the
/// pipeline.
pub trait ProgressChannel: Send + Sync {
    /// Publishes a step snapshot.
    fn step_update(&self, build_id: Uuid, step: &StepResult);

    /// Publishes one step log line.
    fn log_line(&self, build_id: Uuid, step_index: usize, line: &LogLine);

    /// Publishes a build status change.
    fn build_update(&self, build_id: Uuid, status: BuildStatus);

    /// Publishes the server-lock state.
    fn lock_state(&self, locked: bool);
}

/// Discards all events. Default when no observer is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressChannel for NoOpProgress {
    fn step_update(&self, _build_id: Uuid, _step: &StepResult) {}
    fn log_line(&self, _build_id: Uuid, _step_index: usize, _line: &LogLine) {}
    fn build_update(&self, _build_id: Uuid, _status: BuildStatus) {}
    fn lock_state(&self, _locked: bool) {}
}

/// Fans events out to any number of subscribers over a tokio broadcast
/// channel. Slow subscribers lag and drop events rather than backpressure
/// the pipeline.
#[derive(Debug)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgress {
    /// Creates a channel with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes a new observer.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    fn publish(&self, event: ProgressEvent) {
        // send only errors when there are no subscribers; that is fine.
        if self.sender.send(event).is_err() {
            debug!("progress event dropped: no subscribers");
        }
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ProgressChannel for BroadcastProgress {
    fn step_update(&self, build_id: Uuid, step: &StepResult) {
        self.publish(ProgressEvent::StepUpdate {
            build_id,
            step: step.clone(),
        });
    }

    fn log_line(&self, build_id: Uuid, step_index: usize, line: &LogLine) {
        self.publish(ProgressEvent::LogLine {
            build_id,
            step_index,
            line: line.clone(),
        });
    }

    fn build_update(&self, build_id: Uuid, status: BuildStatus) {
        self.publish(ProgressEvent::BuildUpdate { build_id, status });
    }

    fn lock_state(&self, locked: bool) {
        self.publish(ProgressEvent::LockState { locked });
    }
}

/// Collects events in memory, for tests.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    events: parking_lot::RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgress {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns collected step updates for one build, in arrival order.
    #[must_use]
    pub fn step_updates(&self, build_id: Uuid) -> Vec<StepResult> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::StepUpdate { build_id: id, step } if *id == build_id => {
                    Some(step.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Returns the recorded lock-state transitions.
    #[must_use]
    pub fn lock_states(&self) -> Vec<bool> {
        self.events
            .read()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::LockState { locked } => Some(*locked),
                _ => None,
            })
            .collect()
    }
}

impl ProgressChannel for CollectingProgress {
    fn step_update(&self, build_id: Uuid, step: &StepResult) {
        self.events.write().push(ProgressEvent::StepUpdate {
            build_id,
            step: step.clone(),
        });
    }

    fn log_line(&self, build_id: Uuid, step_index: usize, line: &LogLine) {
        self.events.write().push(ProgressEvent::LogLine {
            build_id,
            step_index,
            line: line.clone(),
        });
    }

    fn build_update(&self, build_id: Uuid, status: BuildStatus) {
        self.events
            .write()
            .push(ProgressEvent::BuildUpdate { build_id, status });
    }

    fn lock_state(&self, locked: bool) {
        self.events.write().push(ProgressEvent::LockState { locked });
    }
}
