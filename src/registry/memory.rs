//! In-memory registry.
//!
//! Behaves like a registry for the purposes of a retention run: deleting a
//! tag detaches it from its manifest, deleting a manifest drops its tags.
//! Faults can be injected per tag, per manifest and per listing, every call
//! is recorded, and an optional latency makes concurrency observable.

use super::{RegistryClient, RegistryError, RegistryResult, TagOrder};
use crate::models::{ManifestRecord, TagRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call received by the [`InMemoryRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    /// `list_tag_properties`
    ListTags {
        /// Repository name.
        repository: String,
    },
    /// `get_tag_properties`
    GetTag {
        /// Repository name.
        repository: String,
        /// Tag name.
        tag: String,
    },
    /// `delete_tag`
    DeleteTag {
        /// Repository name.
        repository: String,
        /// Tag name.
        tag: String,
    },
    /// `list_manifest_properties`
    ListManifests {
        /// Repository name.
        repository: String,
    },
    /// `get_manifest_properties`
    GetManifest {
        /// Repository name.
        repository: String,
        /// Digest or tag.
        reference: String,
    },
    /// `delete_manifest`
    DeleteManifest {
        /// Repository name.
        repository: String,
        /// Digest or tag.
        reference: String,
    },
}

impl RegistryCall {
    /// Returns `true` for calls that modify the registry.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::DeleteTag { .. } | Self::DeleteManifest { .. })
    }
}

#[derive(Debug, Default)]
struct RepositoryState {
    tags: Vec<TagRecord>,
    manifests: Vec<ManifestRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    repositories: HashMap<String, RepositoryState>,
    tag_faults: HashMap<(String, String), RegistryError>,
    manifest_faults: HashMap<(String, String), RegistryError>,
    tag_listing_faults: HashMap<String, RegistryError>,
    manifest_listing_faults: HashMap<String, RegistryError>,
    calls: Vec<RegistryCall>,
}

/// In-process [`RegistryClient`].
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a tag, creating or extending the manifest its digest names.
    pub fn push_tag(&self, repository: &str, tag: TagRecord) {
        let mut inner = self.lock();
        let repo = inner.repositories.entry(repository.to_string()).or_default();
        match repo.manifests.iter_mut().find(|m| m.digest == tag.digest) {
            Some(manifest) => manifest.tags.push(tag.name.clone()),
            None => repo
                .manifests
                .push(ManifestRecord::new(tag.digest.clone(), vec![tag.name.clone()])),
        }
        repo.tags.push(tag);
    }

    /// Adds a manifest as-is; use an empty tag list for an orphan.
    pub fn push_manifest(&self, repository: &str, manifest: ManifestRecord) {
        let mut inner = self.lock();
        inner
            .repositories
            .entry(repository.to_string())
            .or_default()
            .manifests
            .push(manifest);
    }

    /// Makes every read or delete of `tag` fail with `error`.
    pub fn fail_tag(&self, repository: &str, tag: &str, error: RegistryError) {
        self.lock()
            .tag_faults
            .insert((repository.to_string(), tag.to_string()), error);
    }

    /// Makes every read or delete of the manifest `digest` fail with `error`.
    pub fn fail_manifest(&self, repository: &str, digest: &str, error: RegistryError) {
        self.lock()
            .manifest_faults
            .insert((repository.to_string(), digest.to_string()), error);
    }

    /// Makes tag listing of `repository` fail with `error`.
    pub fn fail_tag_listing(&self, repository: &str, error: RegistryError) {
        self.lock()
            .tag_listing_faults
            .insert(repository.to_string(), error);
    }

    /// Makes manifest listing of `repository` fail with `error`.
    pub fn fail_manifest_listing(&self, repository: &str, error: RegistryError) {
        self.lock()
            .manifest_listing_faults
            .insert(repository.to_string(), error);
    }

    /// Every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RegistryCall> {
        self.lock().calls.clone()
    }

    /// Calls that modified the registry.
    #[must_use]
    pub fn destructive_calls(&self) -> Vec<RegistryCall> {
        self.calls()
            .into_iter()
            .filter(RegistryCall::is_destructive)
            .collect()
    }

    /// Current tag names of `repository`, in insertion order.
    #[must_use]
    pub fn tag_names(&self, repository: &str) -> Vec<String> {
        self.lock()
            .repositories
            .get(repository)
            .map(|repo| repo.tags.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Current manifest digests of `repository`, in insertion order.
    #[must_use]
    pub fn manifest_digests(&self, repository: &str) -> Vec<String> {
        self.lock()
            .repositories
            .get(repository)
            .map(|repo| repo.manifests.iter().map(|m| m.digest.clone()).collect())
            .unwrap_or_default()
    }

    /// Highest number of calls observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call<T, F>(&self, call: RegistryCall, op: F) -> RegistryResult<T>
    where
        F: FnOnce(&mut Inner) -> RegistryResult<T> + Send,
    {
        {
            self.lock().calls.push(call);
        }
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let result = {
            let mut inner = self.lock();
            op(&mut *inner)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn repository_mut<'a>(
    inner: &'a mut Inner,
    repository: &str,
) -> RegistryResult<&'a mut RepositoryState> {
    inner
        .repositories
        .get_mut(repository)
        .ok_or_else(|| RegistryError::NotFound(format!("repository {repository}")))
}

fn tag_fault(inner: &Inner, repository: &str, tag: &str) -> Option<RegistryError> {
    inner
        .tag_faults
        .get(&(repository.to_string(), tag.to_string()))
        .cloned()
}

fn manifest_fault(inner: &Inner, repository: &str, reference: &str) -> Option<RegistryError> {
    inner
        .manifest_faults
        .get(&(repository.to_string(), reference.to_string()))
        .cloned()
}

fn find_manifest(repo: &RepositoryState, reference: &str) -> Option<usize> {
    repo.manifests
        .iter()
        .position(|m| m.digest == reference || m.tags.iter().any(|t| t == reference))
}

impl RegistryClient for InMemoryRegistry {
    async fn list_tag_properties(
        &self,
        repository: &str,
        order: TagOrder,
    ) -> RegistryResult<Vec<TagRecord>> {
        let call = RegistryCall::ListTags {
            repository: repository.to_string(),
        };
        self.call(call, |inner| {
            if let Some(err) = inner.tag_listing_faults.get(repository) {
                return Err(err.clone());
            }
            let mut tags = repository_mut(inner, repository)?.tags.clone();
            match order {
                TagOrder::LastUpdatedDescending => {
                    tags.sort_by(|a, b| b.last_updated_on.cmp(&a.last_updated_on));
                },
                TagOrder::LastUpdatedAscending => {
                    tags.sort_by(|a, b| a.last_updated_on.cmp(&b.last_updated_on));
                },
            }
            Ok(tags)
        })
        .await
    }

    async fn get_tag_properties(&self, repository: &str, tag: &str) -> RegistryResult<TagRecord> {
        let call = RegistryCall::GetTag {
            repository: repository.to_string(),
            tag: tag.to_string(),
        };
        self.call(call, |inner| {
            if let Some(err) = tag_fault(inner, repository, tag) {
                return Err(err);
            }
            repository_mut(inner, repository)?
                .tags
                .iter()
                .find(|t| t.name == tag)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(format!("tag {repository}:{tag}")))
        })
        .await
    }

    async fn delete_tag(&self, repository: &str, tag: &str) -> RegistryResult<()> {
        let call = RegistryCall::DeleteTag {
            repository: repository.to_string(),
            tag: tag.to_string(),
        };
        self.call(call, |inner| {
            if let Some(err) = tag_fault(inner, repository, tag) {
                return Err(err);
            }
            let repo = repository_mut(inner, repository)?;
            let position = repo
                .tags
                .iter()
                .position(|t| t.name == tag)
                .ok_or_else(|| RegistryError::NotFound(format!("tag {repository}:{tag}")))?;
            if !repo.tags[position].can_delete {
                return Err(RegistryError::Forbidden(format!(
                    "tag {repository}:{tag} is locked against deletion"
                )));
            }
            let removed = repo.tags.remove(position);
            if let Some(manifest) = repo.manifests.iter_mut().find(|m| m.digest == removed.digest) {
                manifest.tags.retain(|t| t != tag);
            }
            Ok(())
        })
        .await
    }

    async fn list_manifest_properties(
        &self,
        repository: &str,
    ) -> RegistryResult<Vec<ManifestRecord>> {
        let call = RegistryCall::ListManifests {
            repository: repository.to_string(),
        };
        self.call(call, |inner| {
            if let Some(err) = inner.manifest_listing_faults.get(repository) {
                return Err(err.clone());
            }
            Ok(repository_mut(inner, repository)?.manifests.clone())
        })
        .await
    }

    async fn get_manifest_properties(
        &self,
        repository: &str,
        digest_or_tag: &str,
    ) -> RegistryResult<ManifestRecord> {
        let call = RegistryCall::GetManifest {
            repository: repository.to_string(),
            reference: digest_or_tag.to_string(),
        };
        self.call(call, |inner| {
            if let Some(err) = manifest_fault(inner, repository, digest_or_tag) {
                return Err(err);
            }
            let repo = repository_mut(inner, repository)?;
            find_manifest(repo, digest_or_tag)
                .and_then(|index| repo.manifests.get(index).cloned())
                .ok_or_else(|| {
                    RegistryError::NotFound(format!("manifest {repository}@{digest_or_tag}"))
                })
        })
        .await
    }

    async fn delete_manifest(&self, repository: &str, digest_or_tag: &str) -> RegistryResult<()> {
        let call = RegistryCall::DeleteManifest {
            repository: repository.to_string(),
            reference: digest_or_tag.to_string(),
        };
        self.call(call, |inner| {
            if let Some(err) = manifest_fault(inner, repository, digest_or_tag) {
                return Err(err);
            }
            let repo = repository_mut(inner, repository)?;
            let index = find_manifest(repo, digest_or_tag).ok_or_else(|| {
                RegistryError::NotFound(format!("manifest {repository}@{digest_or_tag}"))
            })?;
            let removed = repo.manifests.remove(index);
            repo.tags.retain(|t| t.digest != removed.digest);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn at(minutes: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .expect("valid timestamp")
            + ChronoDuration::minutes(minutes)
    }

    #[tokio::test]
    async fn test_locked_tag_delete_is_forbidden() {
        let registry = InMemoryRegistry::new();
        registry.push_tag(
            "app",
            TagRecord::new("pinned", "sha256:01", at(0)).with_can_delete(false),
        );

        let err = registry
            .delete_tag("app", "pinned")
            .await
            .expect_err("locked tag");
        assert_eq!(err.kind(), "forbidden");
        assert_eq!(registry.tag_names("app"), vec!["pinned"]);
        assert!(
            registry
                .get_tag_properties("app", "pinned")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_listing_orders_by_last_update() {
        let registry = InMemoryRegistry::new();
        registry.push_tag("app", TagRecord::new("old", "sha256:01", at(0)));
        registry.push_tag("app", TagRecord::new("new", "sha256:02", at(10)));
        registry.push_tag("app", TagRecord::new("mid", "sha256:03", at(5)));

        let desc = registry
            .list_tag_properties("app", TagOrder::LastUpdatedDescending)
            .await
            .expect("listing succeeds");
        let names: Vec<&str> = desc.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["new", "mid", "old"]);

        let asc = registry
            .list_tag_properties("app", TagOrder::LastUpdatedAscending)
            .await
            .expect("listing succeeds");
        assert_eq!(asc.first().map(|t| t.name.as_str()), Some("old"));
    }

    #[tokio::test]
    async fn test_delete_tag_orphans_manifest() {
        let registry = InMemoryRegistry::new();
        registry.push_tag("app", TagRecord::new("v1", "sha256:01", at(0)));

        registry.delete_tag("app", "v1").await.expect("delete succeeds");

        let manifests = registry
            .list_manifest_properties("app")
            .await
            .expect("listing succeeds");
        assert_eq!(manifests.len(), 1);
        assert!(manifests[0].is_orphaned());
        assert!(registry.tag_names("app").is_empty());
    }

    #[tokio::test]
    async fn test_shared_digest_stays_tagged() {
        let registry = InMemoryRegistry::new();
        registry.push_tag("app", TagRecord::new("v1", "sha256:01", at(0)));
        registry.push_tag("app", TagRecord::new("stable", "sha256:01", at(1)));

        registry.delete_tag("app", "v1").await.expect("delete succeeds");

        let manifest = registry
            .get_manifest_properties("app", "sha256:01")
            .await
            .expect("manifest exists");
        assert_eq!(manifest.tags, vec!["stable".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_fault_and_missing_repository() {
        let registry = InMemoryRegistry::new();
        registry.push_tag("app", TagRecord::new("v1", "sha256:01", at(0)));
        registry.fail_tag("app", "v1", RegistryError::Forbidden("locked".to_string()));

        let err = registry.delete_tag("app", "v1").await.expect_err("fault injected");
        assert_eq!(err.kind(), "forbidden");

        let err = registry
            .list_tag_properties("missing", TagOrder::default())
            .await
            .expect_err("unknown repository");
        assert_eq!(err.kind(), "not_found");
        assert_eq!(registry.destructive_calls().len(), 1);
    }
}
