//! Release document store.

use crate::core::{CommitRange, Release};
use crate::errors::PipelineError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Persists one release document per shipped version.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Fetches the draft for a version, if one exists and is unpublished.
    async fn get_draft(&self, version: &str) -> Result<Option<Release>, PipelineError>;

    /// Creates a draft for a version.
    ///
    /// # Errors
    ///
    /// `PipelineError::DraftExists` if the version already has a document.
    async fn create_draft(
        &self,
        version: &str,
        commit_range: CommitRange,
    ) -> Result<Release, PipelineError>;

    /// Publishes the draft for a version, exactly once.
    async fn publish(&self, version: &str) -> Result<Release, PipelineError>;

    /// Fetches any release document for a version.
    async fn get(&self, version: &str) -> Result<Option<Release>, PipelineError>;

    /// The most recently published release, if any.
    async fn latest_published(&self) -> Result<Option<Release>, PipelineError>;
}

/// In-memory release store.
#[derive(Debug, Default)]
pub struct MemoryReleaseStore {
    releases: DashMap<String, Release>,
}

impl MemoryReleaseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn get_draft(&self, version: &str) -> Result<Option<Release>, PipelineError> {
        Ok(self
            .releases
            .get(version)
            .filter(|r| !r.published)
            .map(|r| r.clone()))
    }

    async fn create_draft(
        &self,
        version: &str,
        commit_range: CommitRange,
    ) -> Result<Release, PipelineError> {
        if self.releases.contains_key(version) {
            return Err(PipelineError::DraftExists(version.to_string()));
        }
        let release = Release::draft(version, commit_range);
        self.releases.insert(version.to_string(), release.clone());
        Ok(release)
    }

    async fn publish(&self, version: &str) -> Result<Release, PipelineError> {
        let mut entry = self
            .releases
            .get_mut(version)
            .ok_or_else(|| PipelineError::ReleaseNotFound(version.to_string()))?;

        if !entry.publish() {
            return Err(PipelineError::AlreadyPublished(version.to_string()));
        }
        Ok(entry.clone())
    }

    async fn get(&self, version: &str) -> Result<Option<Release>, PipelineError> {
        Ok(self.releases.get(version).map(|r| r.clone()))
    }

    async fn latest_published(&self) -> Result<Option<Release>, PipelineError> {
        let latest = self
            .releases
            .iter()
            .filter(|r| r.published)
            .max_by_key(|r| r.published_at)
            .map(|r| r.clone());
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_draft_lifecycle() {
        let store = MemoryReleaseStore::new();

        assert!(store.get_draft("2.0.0").await.unwrap().is_none());

        store
            .create_draft("2.0.0", CommitRange::new("v1.9.0", "abc"))
            .await
            .unwrap();
        assert!(store.get_draft("2.0.0").await.unwrap().is_some());

        let duplicate = store.create_draft("2.0.0", CommitRange::default()).await;
        assert!(matches!(duplicate, Err(PipelineError::DraftExists(_))));
    }

    #[tokio::test]
    async fn test_publish_exactly_once() {
        let store = MemoryReleaseStore::new();
        store
            .create_draft("2.0.0", CommitRange::default())
            .await
            .unwrap();

        let published = store.publish("2.0.0").await.unwrap();
        assert!(published.published);

        // Published releases are no longer drafts.
        assert!(store.get_draft("2.0.0").await.unwrap().is_none());

        let again = store.publish("2.0.0").await;
        assert!(matches!(again, Err(PipelineError::AlreadyPublished(_))));

        let missing = store.publish("9.9.9").await;
        assert!(matches!(missing, Err(PipelineError::ReleaseNotFound(_))));
    }

    #[tokio::test]
    async fn test_latest_published() {
        let store = MemoryReleaseStore::new();
        assert!(store.latest_published().await.unwrap().is_none());

        store.create_draft("1.0.0", CommitRange::default()).await.unwrap();
        store.create_draft("1.1.0", CommitRange::default()).await.unwrap();
        store.publish("1.0.0").await.unwrap();
        store.publish("1.1.0").await.unwrap();

        let latest = store.latest_published().await.unwrap().unwrap();
        assert_eq!(latest.version, "1.1.0");
    }
}
