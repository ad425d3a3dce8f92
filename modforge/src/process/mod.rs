//! External process supervision: spawning, output classification, tracking.

mod classify;
mod runner;
mod tracker;

pub use classify::{GateMarkers, LineClassifier, LineVerdict};
pub use runner::{ProcessOutput, ProcessRunner, RunSpec};
pub use tracker::{ProcessGuard, ProcessTracker};
