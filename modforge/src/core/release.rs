//! Release documents: one per shipped version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The commit range a release covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRange {
    /// Range start (exclusive), usually the previous release's sha or tag.
    pub from: String,
    /// Range end (inclusive): the sha being released.
    pub to: String,
}

impl CommitRange {
    /// Creates a commit range.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// One shipped (or about-to-ship) version of the mod package.
///
/// Created as a draft on the first release-candidate build for a version;
/// transitions draft -> published exactly once, by the publish step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Version string.
    pub version: String,
    /// False while the release is a draft.
    pub published: bool,
    /// Operator-edited changelog.
    pub changelog: String,
    /// Commit range covered by this release.
    pub commit_range: CommitRange,
    /// Draft creation time.
    pub created_at: DateTime<Utc>,
    /// Publication time, once published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    /// Creates a new draft release.
    #[must_use]
    pub fn draft(version: impl Into<String>, commit_range: CommitRange) -> Self {
        Self {
            version: version.into(),
            published: false,
            changelog: String::new(),
            commit_range,
            created_at: Utc::now(),
            published_at: None,
        }
    }

    /// Marks the release published. Returns false if it already was.
    pub fn publish(&mut self) -> bool {
        if self.published {
            return false;
        }
        self.published = true;
        self.published_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_is_unpublished() {
        let release = Release::draft("2.0.0", CommitRange::new("v1.9.0", "abc123"));
        assert!(!release.published);
        assert!(release.published_at.is_none());
    }

    #[test]
    fn test_publish_exactly_once() {
        let mut release = Release::draft("2.0.0", CommitRange::default());

        assert!(release.publish());
        assert!(release.published);
        assert!(release.published_at.is_some());

        // Second publish is a no-op.
        assert!(!release.publish());
    }
}
