//! Fleet-wide server lock.
//!
//! A remote-flag model, not an in-process mutex: it prevents operator fleet
//! actions from racing a deploy in progress. Written solely by the single
//! active release build's worker.

use crate::errors::PipelineError;
use crate::progress::ProgressChannel;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Flag locking the game-server fleet during a deploy.
pub struct ServerLock {
    holder: Mutex<Option<Uuid>>,
    progress: Arc<dyn ProgressChannel>,
}

impl ServerLock {
    /// Creates an unlocked flag broadcasting state changes to `progress`.
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressChannel>) -> Self {
        Self {
            holder: Mutex::new(None),
            progress,
        }
    }

    /// True while any build holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Acquires the lock for a build. Re-acquiring by the same build is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// `PipelineError::ServerLockHeld` if another build holds it.
    pub fn acquire(&self, build_id: Uuid) -> Result<(), PipelineError> {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) if current != build_id => Err(PipelineError::ServerLockHeld(current)),
            Some(_) => Ok(()),
            None => {
                *holder = Some(build_id);
                drop(holder);
                info!(build_id = %build_id, "server fleet locked");
                self.progress.lock_state(true);
                Ok(())
            }
        }
    }

    /// Releases the lock if the given build holds it. Returns true if the
    /// lock was released.
    ///
    /// Called unconditionally after every build so the fleet can never end
    /// up permanently locked.
    pub fn release_if_held(&self, build_id: Uuid) -> bool {
        let mut holder = self.holder.lock();
        if *holder == Some(build_id) {
            *holder = None;
            drop(holder);
            info!(build_id = %build_id, "server fleet unlocked");
            self.progress.lock_state(false);
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for ServerLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLock")
            .field("holder", &*self.holder.lock())
            .finish()
    }
}
