//! Retention pipeline orchestration.

use super::{RepositoryReport, RunSummary};
use crate::config::TagsweepConfig;
use crate::models::TagGroup;
use crate::observability::SUMMARY_TARGET;
use crate::purge::{ManifestReclaimer, TagPurger, WorkerPool};
use crate::registry::{RegistryClient, TagOrder};
use crate::retention::{RetentionEvaluator, TagClassifier};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Runs the retention pipeline over repositories.
///
/// Repositories are processed one after another. Within a repository the
/// order is: list tags, classify, evaluate, delete tags, reclaim manifests.
/// One [`WorkerPool`] serves both deletion phases of every repository.
pub struct RetentionService<R> {
    client: Arc<R>,
    groups: Vec<TagGroup>,
    tags: TagPurger<R>,
    manifests: ManifestReclaimer<R>,
    dry_run: bool,
    delete_others: bool,
}

impl<R> RetentionService<R>
where
    R: RegistryClient + 'static,
{
    /// Creates a service from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a group uses the reserved `others`
    /// name, or [`Error::InvalidPattern`] if a group pattern does not compile.
    pub fn new(client: Arc<R>, config: &TagsweepConfig) -> Result<Self> {
        let groups = config.compile_groups()?;
        let pool = WorkerPool::new(config.pool_config());
        Ok(Self {
            tags: TagPurger::new(Arc::clone(&client), pool.clone()),
            manifests: ManifestReclaimer::new(Arc::clone(&client), pool),
            client,
            groups,
            dry_run: config.dry_run,
            delete_others: config.delete_others,
        })
    }

    /// Compiled tag groups, in name order.
    #[must_use]
    pub fn groups(&self) -> &[TagGroup] {
        &self.groups
    }

    /// Runs the pipeline for every repository and logs the run totals.
    pub async fn run(&self, repositories: &[String]) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        for repository in repositories {
            summary.push(self.run_repository(repository).await);
        }

        summary.elapsed = start.elapsed();
        info!(target: SUMMARY_TARGET, "{}", summary.totals_line());
        info!(
            repositories = summary.reports.len(),
            deleted_tags = summary.totals.deleted_tags,
            deleted_manifests = summary.totals.deleted_manifests,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            dry_run = self.dry_run,
            "Retention run completed"
        );
        summary
    }

    /// Runs the pipeline for one repository.
    ///
    /// A tag listing failure skips the repository. A manifest listing failure
    /// is logged and leaves the tag results in place.
    #[instrument(
        name = "tagsweep.repository",
        skip_all,
        fields(
            component = "service",
            repository = %repository,
            dry_run = self.dry_run,
            delete_others = self.delete_others
        )
    )]
    pub async fn run_repository(&self, repository: &str) -> RepositoryReport {
        let start = Instant::now();
        let mut report = RepositoryReport::new(repository);

        let tags = match self
            .client
            .list_tag_properties(repository, TagOrder::LastUpdatedDescending)
            .await
        {
            Ok(tags) => tags,
            Err(source) => {
                let err = Error::Enumeration {
                    repository: repository.to_string(),
                    operation: "list tags",
                    source,
                };
                warn!(error = %err, "Could not list tags, skipping repository");
                metrics::counter!("tagsweep_repositories_total", "status" => "skipped")
                    .increment(1);
                report.listing_error = Some(err);
                report.elapsed = start.elapsed();
                info!(target: SUMMARY_TARGET, "{}", report.summary_line());
                return report;
            },
        };

        let listed = tags.len();
        let mut classification = TagClassifier::new(&self.groups).classify(tags);
        RetentionEvaluator::new(&self.groups).evaluate(&mut classification, self.delete_others);
        info!(
            listed,
            marked = classification.marked_count(),
            buckets = classification.buckets().len(),
            "Retention evaluated"
        );

        let tag_stats = self
            .tags
            .delete_flagged(repository, &classification, self.dry_run)
            .await;
        report.counters.deleted_tags = tag_stats.succeeded;
        info!("{}", tag_stats.summary("tags"));
        report.tags = Some(tag_stats);

        match self.manifests.reclaim_orphans(repository, self.dry_run).await {
            Ok(stats) => {
                report.counters.deleted_manifests = stats.succeeded;
                info!("{}", stats.summary("manifests"));
                report.manifests = Some(stats);
            },
            Err(err) => {
                warn!(error = %err, "Problems reclaiming orphaned manifests");
                report.reclaim_error = Some(err);
            },
        }

        report.elapsed = start.elapsed();
        metrics::counter!("tagsweep_repositories_total", "status" => "processed").increment(1);
        info!(target: SUMMARY_TARGET, "{}", report.summary_line());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManifestRecord, TagRecord};
    use crate::registry::{InMemoryRegistry, RegistryError};
    use chrono::{Duration, Utc};

    fn config() -> TagsweepConfig {
        TagsweepConfig::new()
            .with_registry_address("reg.example.com")
            .with_repository("app/api")
            .with_group("release", r"^v\d+", 1)
    }

    fn seeded() -> Arc<InMemoryRegistry> {
        let registry = Arc::new(InMemoryRegistry::new());
        let now = Utc::now();
        registry.push_tag("app/api", TagRecord::new("v2", "sha256:02", now));
        registry.push_tag(
            "app/api",
            TagRecord::new("v1", "sha256:01", now - Duration::hours(1)),
        );
        registry.push_manifest("app/api", ManifestRecord::new("sha256:00", Vec::new()));
        registry
    }

    #[tokio::test]
    async fn test_pipeline_counts_tags_and_orphans() {
        let registry = seeded();
        let service = RetentionService::new(Arc::clone(&registry), &config()).expect("valid");

        let report = service.run_repository("app/api").await;

        assert!(report.was_listed());
        assert_eq!(report.counters.deleted_tags, 1);
        // sha256:01 is orphaned by the tag deletion, sha256:00 already was.
        assert_eq!(report.counters.deleted_manifests, 2);
        assert_eq!(registry.tag_names("app/api"), vec!["v2"]);
        assert_eq!(registry.manifest_digests("app/api"), vec!["sha256:02"]);
    }

    #[tokio::test]
    async fn test_reclaim_failure_keeps_tag_results() {
        let registry = seeded();
        registry.fail_manifest_listing(
            "app/api",
            RegistryError::Status {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let service = RetentionService::new(Arc::clone(&registry), &config()).expect("valid");

        let report = service.run_repository("app/api").await;

        assert_eq!(report.counters.deleted_tags, 1);
        assert_eq!(report.counters.deleted_manifests, 0);
        assert!(report.manifests.is_none());
        assert!(matches!(report.reclaim_error, Some(Error::Enumeration { .. })));
    }

    #[test]
    fn test_invalid_group_rejected_at_construction() {
        let registry = Arc::new(InMemoryRegistry::new());
        let config = config().with_group("broken", "[", 1);
        assert!(RetentionService::new(registry, &config).is_err());
    }

    #[test]
    fn test_reserved_group_rejected_at_construction() {
        let registry = Arc::new(InMemoryRegistry::new());
        let config = config().with_group("others", ".*", 1);
        assert!(matches!(
            RetentionService::new(registry, &config),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_newest_tags_kept_whatever_the_insertion_order() {
        let registry = Arc::new(InMemoryRegistry::new());
        let now = Utc::now();
        // Oldest first, so only a newest-first listing keeps v3.
        for (name, hours) in [("v1", 3), ("v2", 2), ("v3", 1)] {
            registry.push_tag(
                "app/api",
                TagRecord::new(name, format!("sha256:{name}"), now - Duration::hours(hours)),
            );
        }
        let service = RetentionService::new(Arc::clone(&registry), &config()).expect("valid");

        let report = service.run_repository("app/api").await;

        assert_eq!(report.counters.deleted_tags, 2);
        assert_eq!(registry.tag_names("app/api"), vec!["v3"]);
    }
}
