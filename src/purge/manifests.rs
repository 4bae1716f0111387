//! Orphaned manifest reclamation.

use super::{UnitOutcome, WorkerPool};
use crate::models::{ManifestRecord, PurgeStats};
use crate::registry::RegistryClient;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Deletes manifests that no tag references.
///
/// Must run after tag deletion so that manifests orphaned by it are seen.
pub struct ManifestReclaimer<R> {
    client: Arc<R>,
    pool: WorkerPool,
}

impl<R> ManifestReclaimer<R>
where
    R: RegistryClient + 'static,
{
    /// Creates a reclaimer.
    #[must_use]
    pub const fn new(client: Arc<R>, pool: WorkerPool) -> Self {
        Self { client, pool }
    }

    /// Deletes (or, with `dry_run`, reads back) every untagged manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Enumeration`] if the manifest listing fails; no unit
    /// is submitted in that case. Individual delete failures are counted in
    /// the returned stats instead.
    #[instrument(
        name = "tagsweep.purge.manifests",
        skip_all,
        fields(component = "purge", operation = "manifests", repository = %repository, dry_run = dry_run)
    )]
    pub async fn reclaim_orphans(&self, repository: &str, dry_run: bool) -> Result<PurgeStats> {
        let start = Instant::now();
        let manifests = self
            .client
            .list_manifest_properties(repository)
            .await
            .map_err(|source| Error::Enumeration {
                repository: repository.to_string(),
                operation: "list manifests",
                source,
            })?;

        let listed = manifests.len();
        let jobs: Vec<_> = manifests
            .into_iter()
            .filter(ManifestRecord::is_orphaned)
            .map(|manifest| {
                let client = Arc::clone(&self.client);
                let repo = repository.to_string();
                let digest = manifest.digest.clone();
                let job = async move {
                    if dry_run {
                        client.get_manifest_properties(&repo, &digest).await.map(drop)
                    } else {
                        client.delete_manifest(&repo, &digest).await
                    }
                };
                (manifest.digest, job)
            })
            .collect();

        info!(listed, orphaned = jobs.len(), "Enumerated manifests");

        let mut stats = PurgeStats::new(dry_run);
        let outcomes = self
            .pool
            .run_all(jobs, |outcome| log_outcome(repository, dry_run, outcome))
            .await;
        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => stats.record_success(),
                Err(e) => stats.record_failure(e.kind()),
            }
        }
        stats.elapsed = start.elapsed();

        metrics::counter!(
            "tagsweep_manifests_deleted_total",
            "dry_run" => dry_run.to_string()
        )
        .increment(u64::try_from(stats.succeeded).unwrap_or(u64::MAX));

        Ok(stats)
    }
}

fn log_outcome(repository: &str, dry_run: bool, outcome: &UnitOutcome<String>) {
    let digest = &outcome.target;
    match &outcome.result {
        Ok(()) if dry_run => info!(
            digest = %digest,
            repository,
            "Manifest has no tags and would be deleted (dry run)"
        ),
        Ok(()) => info!(
            digest = %digest,
            repository,
            "Manifest has no tags and was deleted"
        ),
        Err(e) => {
            metrics::counter!(
                "tagsweep_unit_failures_total",
                "phase" => "manifests",
                "kind" => e.kind()
            )
            .increment(1);
            warn!(
                digest = %digest,
                repository,
                error_kind = e.kind(),
                error = %e,
                "Problems deleting manifest"
            );
        },
    }
}
