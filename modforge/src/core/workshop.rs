//! Workshop mod records and their install/update/uninstall lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a tracked workshop mod.
///
/// `*PendingRelease` statuses are set by operator action outside the
/// pipeline; only the release-time reconciliation step collapses them to
/// their terminal counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkshopStatus {
    /// Not part of the package.
    Uninstalled,
    /// Operator queued an install; content not yet staged.
    PendingInstall,
    /// Part of the published package.
    Installed,
    /// Operator queued an update; content not yet staged.
    PendingUpdate,
    /// Staged for first publication with the next release.
    InstalledPendingRelease,
    /// Updated content staged for the next release.
    UpdatedPendingRelease,
    /// Removal staged for the next release.
    UninstalledPendingRelease,
}

impl WorkshopStatus {
    /// Returns true for the statuses the release step is allowed to collapse.
    #[must_use]
    pub fn is_pending_release(&self) -> bool {
        matches!(
            self,
            Self::InstalledPendingRelease
                | Self::UpdatedPendingRelease
                | Self::UninstalledPendingRelease
        )
    }
}

impl fmt::Display for WorkshopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Uninstalled => "uninstalled",
            Self::PendingInstall => "pending_install",
            Self::Installed => "installed",
            Self::PendingUpdate => "pending_update",
            Self::InstalledPendingRelease => "installed_pending_release",
            Self::UpdatedPendingRelease => "updated_pending_release",
            Self::UninstalledPendingRelease => "uninstalled_pending_release",
        };
        f.write_str(text)
    }
}

/// One tracked externally-sourced add-on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkshopMod {
    /// Workshop item id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: WorkshopStatus,
    /// Version of the package that first shipped this mod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_added: Option<String>,
    /// Version of the package that last updated this mod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl WorkshopMod {
    /// Creates a record in the given status.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: WorkshopStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            first_added: None,
            last_updated: None,
        }
    }

    /// Collapses a `*PendingRelease` status to its terminal counterpart,
    /// stamping `version` as first-added or last-updated.
    ///
    /// Returns true if the record changed. Idempotent for any record that is
    /// not pending release.
    pub fn collapse_pending(&mut self, version: &str) -> bool {
        match self.status {
            WorkshopStatus::InstalledPendingRelease => {
                self.status = WorkshopStatus::Installed;
                self.first_added = Some(version.to_string());
                self.last_updated = Some(version.to_string());
                true
            }
            WorkshopStatus::UpdatedPendingRelease => {
                self.status = WorkshopStatus::Installed;
                self.last_updated = Some(version.to_string());
                true
            }
            WorkshopStatus::UninstalledPendingRelease => {
                self.status = WorkshopStatus::Uninstalled;
                self.last_updated = Some(version.to_string());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_installed_pending() {
        let mut record = WorkshopMod::new("123", "ACE", WorkshopStatus::InstalledPendingRelease);

        assert!(record.collapse_pending("2.1.0"));
        assert_eq!(record.status, WorkshopStatus::Installed);
        assert_eq!(record.first_added.as_deref(), Some("2.1.0"));
        assert_eq!(record.last_updated.as_deref(), Some("2.1.0"));
    }

    #[test]
    fn test_collapse_updated_pending_keeps_first_added() {
        let mut record = WorkshopMod::new("123", "ACE", WorkshopStatus::UpdatedPendingRelease);
        record.first_added = Some("1.0.0".to_string());

        assert!(record.collapse_pending("2.1.0"));
        assert_eq!(record.status, WorkshopStatus::Installed);
        assert_eq!(record.first_added.as_deref(), Some("1.0.0"));
        assert_eq!(record.last_updated.as_deref(), Some("2.1.0"));
    }

    #[test]
    fn test_collapse_uninstalled_pending() {
        let mut record = WorkshopMod::new("456", "TFAR", WorkshopStatus::UninstalledPendingRelease);

        assert!(record.collapse_pending("2.1.0"));
        assert_eq!(record.status, WorkshopStatus::Uninstalled);
    }

    #[test]
    fn test_collapse_is_idempotent_when_not_pending() {
        let mut record = WorkshopMod::new("123", "ACE", WorkshopStatus::Installed);
        record.first_added = Some("1.0.0".to_string());

        assert!(!record.collapse_pending("2.1.0"));
        assert_eq!(record.status, WorkshopStatus::Installed);
        assert_eq!(record.first_added.as_deref(), Some("1.0.0"));
        assert!(record.last_updated.is_none());
    }

    #[test]
    fn test_operator_pending_statuses_not_collapsed() {
        let mut record = WorkshopMod::new("789", "CUP", WorkshopStatus::PendingInstall);
        assert!(!record.collapse_pending("2.1.0"));
        assert_eq!(record.status, WorkshopStatus::PendingInstall);
    }
}
