//! Registry of live external processes, keyed by build id.
//!
//! An explicit instance injected into the process runner; no ambient state.
//! Lets an out-of-band action (cancel, crash cleanup) find and kill every
//! process belonging to a given build.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct TrackedProcess {
    token: u64,
    pid: Option<u32>,
    kill_tx: watch::Sender<bool>,
}

/// Concurrent registry of processes spawned on behalf of builds.
#[derive(Debug, Default)]
pub struct ProcessTracker {
    processes: DashMap<Uuid, Vec<TrackedProcess>>,
    next_token: AtomicU64,
}

impl ProcessTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a process for a build.
    ///
    /// The returned guard deregisters on drop, so no stale entry survives a
    /// finished or crashed run. The runner listens on the guard for
    /// out-of-band kill requests.
    #[must_use]
    pub fn register(self: &Arc<Self>, build_id: Uuid, pid: Option<u32>) -> ProcessGuard {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (kill_tx, kill_rx) = watch::channel(false);

        self.processes.entry(build_id).or_default().push(TrackedProcess {
            token,
            pid,
            kill_tx,
        });
        debug!(build_id = %build_id, pid = ?pid, "registered process");

        ProcessGuard {
            tracker: Arc::clone(self),
            build_id,
            token,
            kill_rx,
        }
    }

    /// Signals every registered process of a build to be killed.
    ///
    /// Returns the number of processes signalled. The actual kill happens in
    /// the runner that owns each child handle.
    pub fn kill_build(&self, build_id: Uuid) -> usize {
        let Some(entry) = self.processes.get(&build_id) else {
            return 0;
        };
        let mut signalled = 0;
        for process in entry.iter() {
            if process.kill_tx.send(true).is_ok() {
                signalled += 1;
            }
        }
        debug!(build_id = %build_id, signalled, "kill requested for build processes");
        signalled
    }

    /// Number of live registrations for a build.
    #[must_use]
    pub fn active_count(&self, build_id: Uuid) -> usize {
        self.processes.get(&build_id).map_or(0, |v| v.len())
    }

    /// Pids of live registrations for a build, where known.
    #[must_use]
    pub fn pids(&self, build_id: Uuid) -> Vec<u32> {
        self.processes
            .get(&build_id)
            .map_or_else(Vec::new, |v| v.iter().filter_map(|p| p.pid).collect())
    }

    fn deregister(&self, build_id: Uuid, token: u64) {
        if let Some(mut entry) = self.processes.get_mut(&build_id) {
            entry.retain(|p| p.token != token);
            if entry.is_empty() {
                drop(entry);
                self.processes.remove_if(&build_id, |_, v| v.is_empty());
            }
        }
    }
}

/// Live registration of one process. Deregisters on drop.
#[derive(Debug)]
pub struct ProcessGuard {
    tracker: Arc<ProcessTracker>,
    build_id: Uuid,
    token: u64,
    kill_rx: watch::Receiver<bool>,
}

impl ProcessGuard {
    /// The build this process belongs to.
    #[must_use]
    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// Completes when an out-of-band kill was requested for this process.
    pub async fn killed(&mut self) {
        // A closed channel can only mean the tracker entry went away, which
        // never happens while the guard is alive; treat it as never-resolves.
        loop {
            if *self.kill_rx.borrow() {
                return;
            }
            if self.kill_rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        self.tracker.deregister(self.build_id, self.token);
    }
}
