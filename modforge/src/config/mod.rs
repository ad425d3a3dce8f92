//! Typed pipeline configuration.

mod settings;

pub use settings::{EnvPaths, PipelineConfig, ProjectConfig};
