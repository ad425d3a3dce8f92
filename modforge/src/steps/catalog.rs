//! Static per-environment step tables.

use super::{
    BackupRepoStep, CleanStep, DeployStep, MergeBranchStep, ModCompileStep, NotifyStep,
    PublishReleaseStep, ReleaseDraftStep, ServerLockStep, StageOutputStep, Step,
    WorkshopReconcileStep,
};
use crate::config::PipelineConfig;
use crate::core::Environment;
use crate::errors::PipelineError;
use std::collections::HashMap;
use std::sync::Arc;

/// A shared step instance in a catalog.
pub type CatalogEntry = Arc<dyn Step>;

/// Ordered step table for one environment. Catalog order is execution
/// order; names are unique within a catalog.
#[derive(Clone)]
pub struct StepCatalog {
    steps: Vec<CatalogEntry>,
}

impl StepCatalog {
    /// Builds a catalog from an ordered step list.
    ///
    /// # Errors
    ///
    /// `PipelineError::DuplicateStepName` when two entries share a name.
    pub fn new(steps: Vec<CatalogEntry>) -> Result<Self, PipelineError> {
        let mut seen = std::collections::HashSet::new();
        for step in &steps {
            if !seen.insert(step.name().to_string()) {
                return Err(PipelineError::DuplicateStepName(step.name().to_string()));
            }
        }
        Ok(Self { steps })
    }

    /// Step names in execution order; seeds a new build's result list.
    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True for a catalog with no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The step at a catalog index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.steps.get(index)
    }

    /// Iterates steps in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.steps.iter()
    }
}

impl std::fmt::Debug for StepCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepCatalog")
            .field("steps", &self.step_names())
            .finish()
    }
}

/// The standard step tables, one per environment.
///
/// Dev and release-candidate builds mirror the build tree into the
/// repository; release builds lock the fleet, keep previously-published
/// files, reconcile workshop records, publish the release document and
/// merge the release branch back.
///
/// # Errors
///
/// `PipelineError::DuplicateStepName` when two configured sub-projects
/// share a name.
pub fn default_catalogs(
    config: &PipelineConfig,
) -> Result<HashMap<Environment, StepCatalog>, PipelineError> {
    let compile_steps = |steps: &mut Vec<CatalogEntry>| {
        for project in &config.projects {
            steps.push(Arc::new(ModCompileStep::new(project.clone())));
        }
    };

    let mut dev: Vec<CatalogEntry> = vec![Arc::new(CleanStep)];
    compile_steps(&mut dev);
    dev.push(Arc::new(StageOutputStep));
    dev.push(Arc::new(DeployStep::mirroring()));
    dev.push(Arc::new(NotifyStep));

    let mut rc: Vec<CatalogEntry> = vec![Arc::new(CleanStep)];
    compile_steps(&mut rc);
    rc.push(Arc::new(StageOutputStep));
    rc.push(Arc::new(ReleaseDraftStep));
    rc.push(Arc::new(DeployStep::mirroring()));
    rc.push(Arc::new(NotifyStep));

    let mut release: Vec<CatalogEntry> = vec![Arc::new(ServerLockStep), Arc::new(CleanStep)];
    compile_steps(&mut release);
    release.push(Arc::new(StageOutputStep));
    release.push(Arc::new(BackupRepoStep));
    release.push(Arc::new(DeployStep::additive()));
    release.push(Arc::new(WorkshopReconcileStep));
    release.push(Arc::new(PublishReleaseStep));
    release.push(Arc::new(MergeBranchStep));
    release.push(Arc::new(NotifyStep));

    let mut catalogs = HashMap::new();
    catalogs.insert(Environment::Dev, StepCatalog::new(dev)?);
    catalogs.insert(Environment::Rc, StepCatalog::new(rc)?);
    catalogs.insert(Environment::Release, StepCatalog::new(release)?);
    Ok(catalogs)
}
