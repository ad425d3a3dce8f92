//! Pipeline settings: root paths, tool locations, projects, feature flags.

use crate::core::Environment;
use crate::errors::PipelineError;
use crate::process::{GateMarkers, RunSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn default_output_dir() -> String {
    "out".to_string()
}

fn default_sidecar_suffixes() -> Vec<String> {
    vec![".zsync".to_string(), ".md5".to_string()]
}

fn default_process_timeout_secs() -> u64 {
    1800
}

fn default_release_branch() -> String {
    "release".to_string()
}

fn default_dev_branch() -> String {
    "develop".to_string()
}

/// Per-environment file tree roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvPaths {
    /// Game-server installation root for this track.
    pub server_root: PathBuf,
    /// Tree the build is assembled into.
    pub build_root: PathBuf,
    /// Published content repository reconciled against the build tree.
    pub repo_root: PathBuf,
    /// Backup location for the repository tree.
    pub backup_root: PathBuf,
}

/// One independently-versioned sub-project and how to compile it.
///
/// Ignore-error gates and exclusion lists are independent knobs; a project
/// may configure either, both, or neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Sub-project name; also its directory under the sources root.
    pub name: String,
    /// Key into the tool table for the compiler executable.
    pub tool: String,
    /// Compiler arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Compiled-output directory, relative to the project directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Suppress routine non-zero exits of this project's tool.
    #[serde(default)]
    pub quiet: bool,
    /// Extra success exit codes.
    #[serde(default)]
    pub allowed_exit_codes: Vec<i32>,
    /// Error-classification exclusion substrings.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Regex patterns promoting stdout lines to error candidates.
    #[serde(default)]
    pub error_patterns: Vec<String>,
    /// Optional ignore-error gate for noisy startup banners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateMarkers>,
}

impl ProjectConfig {
    /// Creates a project with default judgement knobs.
    #[must_use]
    pub fn new(name: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
            args: Vec::new(),
            output_dir: default_output_dir(),
            quiet: false,
            allowed_exit_codes: Vec::new(),
            exclusions: Vec::new(),
            error_patterns: Vec::new(),
            gate: None,
        }
    }

    /// Builds the run spec for compiling this project.
    #[must_use]
    pub fn run_spec(&self, project_dir: &Path, tool_path: &Path, timeout_secs: u64) -> RunSpec {
        let mut spec = RunSpec::new(project_dir, tool_path)
            .args(self.args.iter().cloned())
            .timeout(std::time::Duration::from_secs(timeout_secs));
        if self.quiet {
            spec = spec.quiet();
        }
        for code in &self.allowed_exit_codes {
            spec = spec.allow_exit_code(*code);
        }
        for pattern in &self.exclusions {
            spec = spec.exclude(pattern.clone());
        }
        for pattern in &self.error_patterns {
            spec = spec.error_pattern(pattern.clone());
        }
        if let Some(gate) = &self.gate {
            spec = spec.gate(gate.start.clone(), gate.end.clone());
        }
        spec
    }
}

/// Typed accessors for everything the pipeline reads from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root containing one directory per sub-project.
    pub sources_root: PathBuf,
    /// Per-environment tree roots.
    pub environments: HashMap<Environment, EnvPaths>,
    /// Named external tool locations.
    #[serde(default)]
    pub tools: HashMap<String, PathBuf>,
    /// Sub-projects compiled by every build.
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    /// Sidecar suffixes cleaned up after repository deletions.
    #[serde(default = "default_sidecar_suffixes")]
    pub sidecar_suffixes: Vec<String>,
    /// Default per-process timeout.
    #[serde(default = "default_process_timeout_secs")]
    pub process_timeout_secs: u64,
    /// Whether infrastructure updates run automatically after a deploy.
    #[serde(default)]
    pub auto_infra_updates: bool,
    /// Working directory for version-control commands.
    pub git_work_dir: PathBuf,
    /// Branch a release is cut from.
    #[serde(default = "default_release_branch")]
    pub release_branch: String,
    /// Branch the release is merged back into.
    #[serde(default = "default_dev_branch")]
    pub dev_branch: String,
}

impl PipelineConfig {
    /// Creates a minimal configuration rooted at the given paths.
    #[must_use]
    pub fn new(sources_root: impl Into<PathBuf>, git_work_dir: impl Into<PathBuf>) -> Self {
        Self {
            sources_root: sources_root.into(),
            environments: HashMap::new(),
            tools: HashMap::new(),
            projects: Vec::new(),
            sidecar_suffixes: default_sidecar_suffixes(),
            process_timeout_secs: default_process_timeout_secs(),
            auto_infra_updates: false,
            git_work_dir: git_work_dir.into(),
            release_branch: default_release_branch(),
            dev_branch: default_dev_branch(),
        }
    }

    /// Parses configuration from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed documents.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Registers tree roots for an environment.
    #[must_use]
    pub fn with_environment(mut self, environment: Environment, paths: EnvPaths) -> Self {
        self.environments.insert(environment, paths);
        self
    }

    /// Registers an external tool location.
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.tools.insert(name.into(), path.into());
        self
    }

    /// Adds a sub-project.
    #[must_use]
    pub fn with_project(mut self, project: ProjectConfig) -> Self {
        self.projects.push(project);
        self
    }

    /// Tree roots for an environment.
    ///
    /// # Errors
    ///
    /// `PipelineError::Config` if the environment has no configured paths.
    pub fn env_paths(&self, environment: Environment) -> Result<&EnvPaths, PipelineError> {
        self.environments.get(&environment).ok_or_else(|| {
            PipelineError::Config(format!("no paths configured for environment '{environment}'"))
        })
    }

    /// Location of a named external tool.
    ///
    /// # Errors
    ///
    /// `PipelineError::Config` if the tool is not configured.
    pub fn tool(&self, name: &str) -> Result<&Path, PipelineError> {
        self.tools
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| PipelineError::Config(format!("tool '{name}' not configured")))
    }

    /// Directory of a sub-project under the sources root.
    #[must_use]
    pub fn project_dir(&self, project: &ProjectConfig) -> PathBuf {
        self.sources_root.join(&project.name)
    }

    /// Compiled-output directory of a sub-project.
    #[must_use]
    pub fn project_output_dir(&self, project: &ProjectConfig) -> PathBuf {
        self.project_dir(project).join(&project.output_dir)
    }
}
