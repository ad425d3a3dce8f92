//! Core domain types: builds, steps, releases, workshop mods.

mod build;
mod environment;
mod release;
mod step;
mod workshop;

pub use build::{Build, BuildStatus, CommitInfo};
pub use environment::Environment;
pub use release::{CommitRange, Release};
pub use step::{LogLine, LogSink, LogTag, StepResult, StepStatus};
pub use workshop::{WorkshopMod, WorkshopStatus};
