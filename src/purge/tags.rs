//! Tag deletion.

use super::{UnitOutcome, WorkerPool};
use crate::models::{ClassificationResult, PurgeStats};
use crate::registry::RegistryClient;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// The tag a unit operates on.
#[derive(Debug, Clone)]
struct TagTarget {
    name: String,
    digest: String,
    group: String,
}

/// Deletes the tags a [`ClassificationResult`] marks for deletion.
///
/// Buckets are processed one after another; within a bucket every marked
/// tag is an independent unit on the shared [`WorkerPool`].
pub struct TagPurger<R> {
    client: Arc<R>,
    pool: WorkerPool,
}

impl<R> TagPurger<R>
where
    R: RegistryClient + 'static,
{
    /// Creates a purger.
    #[must_use]
    pub const fn new(client: Arc<R>, pool: WorkerPool) -> Self {
        Self { client, pool }
    }

    /// Deletes (or, with `dry_run`, reads back) every marked tag.
    ///
    /// Unmarked tags are logged as kept. A tag that sits in several buckets
    /// is submitted once, from the first bucket that reaches it. A tag the
    /// registry refuses to delete is a failed unit like any other. The
    /// returned stats count one outcome per submitted unit, whatever its
    /// result.
    #[instrument(
        name = "tagsweep.purge.tags",
        skip_all,
        fields(component = "purge", operation = "tags", repository = %repository, dry_run = dry_run)
    )]
    pub async fn delete_flagged(
        &self,
        repository: &str,
        result: &ClassificationResult,
        dry_run: bool,
    ) -> PurgeStats {
        let start = Instant::now();
        let mut stats = PurgeStats::new(dry_run);
        let mut submitted = HashSet::new();

        for bucket in result.buckets() {
            let mut jobs = Vec::new();

            for (index, tag) in result.members(bucket) {
                if !tag.marked_for_deletion {
                    info!(
                        tag = %tag.name,
                        digest = %tag.digest,
                        repository,
                        group = bucket.name(),
                        "Kept tag"
                    );
                    continue;
                }
                if !submitted.insert(index) {
                    debug!(
                        tag = %tag.name,
                        group = bucket.name(),
                        "Tag already submitted from another group"
                    );
                    continue;
                }

                let target = TagTarget {
                    name: tag.name.clone(),
                    digest: tag.digest.clone(),
                    group: bucket.name().to_string(),
                };
                let client = Arc::clone(&self.client);
                let repo = repository.to_string();
                let name = tag.name.clone();
                let job = async move {
                    if dry_run {
                        client.get_tag_properties(&repo, &name).await.map(drop)
                    } else {
                        client.delete_tag(&repo, &name).await
                    }
                };
                jobs.push((target, job));
            }

            if jobs.is_empty() {
                continue;
            }

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
        }

        stats.elapsed = start.elapsed();

        metrics::counter!(
            "tagsweep_tags_deleted_total",
            "dry_run" => dry_run.to_string()
        )
        .increment(u64::try_from(stats.succeeded).unwrap_or(u64::MAX));

        info!(
            attempted = stats.attempted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "Tag purge completed"
        );

        stats
    }
}

fn log_outcome(repository: &str, dry_run: bool, outcome: &UnitOutcome<TagTarget>) {
    let tag = &outcome.target;
    match &outcome.result {
        Ok(()) if dry_run => info!(
            tag = %tag.name,
            digest = %tag.digest,
            repository,
            group = %tag.group,
            "Would delete tag (dry run)"
        ),
        Ok(()) => info!(
            tag = %tag.name,
            digest = %tag.digest,
            repository,
            group = %tag.group,
            "Deleted tag"
        ),
        Err(e) => {
            metrics::counter!(
                "tagsweep_unit_failures_total",
                "phase" => "tags",
                "kind" => e.kind()
            )
            .increment(1);
            warn!(
                tag = %tag.name,
                digest = %tag.digest,
                repository,
                group = %tag.group,
                error_kind = e.kind(),
                error = %e,
                "Problems deleting tag"
            );
        },
    }
}
