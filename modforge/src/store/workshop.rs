//! Workshop mod record store.

use crate::core::WorkshopMod;
use crate::errors::PipelineError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Persists one record per tracked workshop mod.
#[async_trait]
pub trait WorkshopStore: Send + Sync {
    /// All tracked records.
    async fn list(&self) -> Result<Vec<WorkshopMod>, PipelineError>;

    /// Fetches a record by workshop item id.
    async fn get(&self, id: &str) -> Result<WorkshopMod, PipelineError>;

    /// Inserts or replaces a record.
    async fn save(&self, record: WorkshopMod) -> Result<(), PipelineError>;
}

/// In-memory workshop store.
#[derive(Debug, Default)]
pub struct MemoryWorkshopStore {
    records: DashMap<String, WorkshopMod>,
}

impl MemoryWorkshopStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkshopStore for MemoryWorkshopStore {
    async fn list(&self) -> Result<Vec<WorkshopMod>, PipelineError> {
        let mut records: Vec<_> = self.records.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<WorkshopMod, PipelineError> {
        self.records
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| PipelineError::WorkshopModNotFound(id.to_string()))
    }

    async fn save(&self, record: WorkshopMod) -> Result<(), PipelineError> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }
}
