//! Registry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Properties of one tag as reported by the registry.
///
/// `marked_for_deletion` is the only mutable state and is owned by the run
/// that fetched the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// Tag name, unique within a repository.
    pub name: String,
    /// Digest of the manifest the tag points to.
    pub digest: String,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Last update time; registries order listings by this field.
    pub last_updated_on: DateTime<Utc>,
    /// Whether the registry allows deleting the tag.
    pub can_delete: bool,
    /// Set by the retention evaluator.
    #[serde(default, skip_serializing)]
    pub marked_for_deletion: bool,
}

impl TagRecord {
    /// Creates a deletable, unmarked tag record with both timestamps set to `updated`.
    #[must_use]
    pub fn new(name: impl Into<String>, digest: impl Into<String>, updated: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            digest: digest.into(),
            created_on: updated,
            last_updated_on: updated,
            can_delete: true,
            marked_for_deletion: false,
        }
    }

    /// Sets the registry delete permission.
    #[must_use]
    pub const fn with_can_delete(mut self, can_delete: bool) -> Self {
        self.can_delete = can_delete;
        self
    }
}

/// Properties of one manifest as reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// Manifest digest.
    pub digest: String,
    /// Tags currently pointing at this manifest.
    pub tags: Vec<String>,
    /// Last update time, when the registry reports it.
    pub last_updated_on: Option<DateTime<Utc>>,
}

impl ManifestRecord {
    /// Creates a manifest record.
    #[must_use]
    pub fn new(digest: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            digest: digest.into(),
            tags,
            last_updated_on: None,
        }
    }

    /// Returns `true` if no tag references this manifest.
    #[must_use]
    pub fn is_orphaned(&self) -> bool {
        self.tags.is_empty()
    }
}
