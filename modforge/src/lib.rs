//! # Modforge
//!
//! Build-and-release pipeline for a game content mod package distributed
//! across three deployment tracks (development, release-candidate,
//! production).
//!
//! The pipeline compiles independently-versioned sub-projects with external
//! tools, assembles them into environment-specific file trees, reconciles
//! those trees against a published content repository, and ships dated
//! releases:
//!
//! - **Step-based execution**: ordered per-environment catalogs of
//!   guard/setup/execute steps
//! - **Process supervision**: line-classified tool output, timeouts,
//!   out-of-band kill
//! - **One build per environment**: queue workers serialize each track
//! - **Live progress**: every store write fans out to subscribers
//! - **Cancel and rebuild**: cooperative cancellation down to the spawned
//!   processes
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use modforge::prelude::*;
//!
//! let config = PipelineConfig::from_json(&document)?;
//! let services = StepServices::in_memory_with_progress(config, progress);
//! let queue = BuildQueue::new(services, default_catalogs(&services.config)?);
//! queue.start();
//!
//! let build_id = queue
//!     .request_build(Environment::Dev, "1.4.0", commit)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod fsync;
pub mod observability;
pub mod process;
pub mod progress;
pub mod queue;
pub mod steps;
pub mod store;
pub mod vcs;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EnvPaths, PipelineConfig, ProjectConfig};
    pub use crate::core::{
        Build, BuildStatus, CommitInfo, CommitRange, Environment, LogLine, LogSink, LogTag,
        Release, StepResult, StepStatus, WorkshopMod, WorkshopStatus,
    };
    pub use crate::errors::{PipelineError, StepError};
    pub use crate::fsync::{FileSynchronizer, SyncOptions, SyncReport};
    pub use crate::process::{ProcessOutput, ProcessRunner, ProcessTracker, RunSpec};
    pub use crate::progress::{
        BroadcastProgress, NoOpProgress, ProgressChannel, ProgressEvent,
    };
    pub use crate::queue::{BuildQueue, ServerLock};
    pub use crate::steps::{
        default_catalogs, Step, StepCatalog, StepContext, StepServices,
    };
    pub use crate::store::{
        BuildPatch, BuildStore, MemoryBuildStore, MemoryReleaseStore, MemoryWorkshopStore,
        ReleaseStore, WorkshopStore,
    };
    pub use crate::vcs::GitCli;
}
