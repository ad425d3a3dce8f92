//! Persistence seams: builds, releases, workshop mod records.
//!
//! Traits model the narrow contracts consumed from the excluded data-access
//! layer; the in-memory implementations back tests and single-host
//! deployments.

mod build;
mod release;
mod workshop;

pub use build::{BuildPatch, BuildStore, MemoryBuildStore};
pub use release::{MemoryReleaseStore, ReleaseStore};
pub use workshop::{MemoryWorkshopStore, WorkshopStore};
