//! Per-repository and per-run results.

use crate::Error;
use crate::models::{PurgeStats, RepositoryRunCounters};
use std::time::Duration;

/// Outcome of the retention pipeline for one repository.
#[derive(Debug)]
pub struct RepositoryReport {
    /// Repository name.
    pub repository: String,
    /// Tags and manifests removed (or that would be removed in a dry run).
    pub counters: RepositoryRunCounters,
    /// Tag phase results; `None` when the tags could not be listed.
    pub tags: Option<PurgeStats>,
    /// Manifest phase results; `None` when the phase did not complete.
    pub manifests: Option<PurgeStats>,
    /// Tag listing failure. The repository was skipped.
    pub listing_error: Option<Error>,
    /// Manifest listing failure. Tag results still stand.
    pub reclaim_error: Option<Error>,
    /// Wall time for the whole repository.
    pub elapsed: Duration,
}

impl RepositoryReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            counters: RepositoryRunCounters::default(),
            tags: None,
            manifests: None,
            listing_error: None,
            reclaim_error: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns `true` if the repository's tags were listed.
    #[must_use]
    pub const fn was_listed(&self) -> bool {
        self.listing_error.is_none()
    }

    /// Number of unit failures across both phases.
    #[must_use]
    pub fn failed_units(&self) -> usize {
        self.tags.as_ref().map_or(0, |s| s.failed) + self.manifests.as_ref().map_or(0, |s| s.failed)
    }

    /// The summary-sink line for this repository.
    #[must_use]
    pub fn summary_line(&self) -> String {
        if let Some(err) = &self.listing_error {
            return format!("{} -> skipped: {err}", self.repository);
        }
        let tag_secs = self.tags.as_ref().map_or(0.0, |s| s.elapsed.as_secs_f64());
        let manifest_secs = self
            .manifests
            .as_ref()
            .map_or(0.0, |s| s.elapsed.as_secs_f64());
        format!(
            "{} -> {tag_secs:.2}s Deleting {} Tags | {manifest_secs:.2}s Deleting {} Manifests | {:.2}s Total Elapsed Time",
            self.repository,
            self.counters.deleted_tags,
            self.counters.deleted_manifests,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One report per processed repository, in processing order.
    pub reports: Vec<RepositoryReport>,
    /// Counters summed over all repositories.
    pub totals: RepositoryRunCounters,
    /// Wall time for the whole run.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Adds a repository report and folds its counters into the totals.
    pub fn push(&mut self, report: RepositoryReport) {
        self.totals += report.counters;
        self.reports.push(report);
    }

    /// Returns `true` if any repository could not be listed.
    #[must_use]
    pub fn has_listing_failures(&self) -> bool {
        self.reports.iter().any(|r| !r.was_listed())
    }

    /// Returns the report for `repository`.
    #[must_use]
    pub fn report(&self, repository: &str) -> Option<&RepositoryReport> {
        self.reports.iter().find(|r| r.repository == repository)
    }

    /// The closing summary-sink line.
    #[must_use]
    pub fn totals_line(&self) -> String {
        format!(
            "{} Tags Deleted Total | {} Manifests Deleted Total",
            self.totals.deleted_tags, self.totals.deleted_manifests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;

    fn listed(repository: &str, tags: usize, manifests: usize) -> RepositoryReport {
        let mut report = RepositoryReport::new(repository);
        report.counters = RepositoryRunCounters {
            deleted_tags: tags,
            deleted_manifests: manifests,
        };
        let mut tag_stats = PurgeStats::new(false);
        tag_stats.elapsed = Duration::from_millis(1500);
        report.tags = Some(tag_stats);
        let mut manifest_stats = PurgeStats::new(false);
        manifest_stats.elapsed = Duration::from_millis(250);
        report.manifests = Some(manifest_stats);
        report.elapsed = Duration::from_secs(2);
        report
    }

    #[test]
    fn test_summary_line_format() {
        let report = listed("app/api", 3, 1);
        assert_eq!(
            report.summary_line(),
            "app/api -> 1.50s Deleting 3 Tags | 0.25s Deleting 1 Manifests | 2.00s Total Elapsed Time"
        );
    }

    #[test]
    fn test_skipped_repository_line() {
        let mut report = RepositoryReport::new("app/gone");
        report.listing_error = Some(Error::Enumeration {
            repository: "app/gone".to_string(),
            operation: "list tags",
            source: RegistryError::NotFound("app/gone".to_string()),
        });
        assert!(!report.was_listed());
        assert!(report.summary_line().starts_with("app/gone -> skipped: failed to list tags"));
    }

    #[test]
    fn test_totals_fold_across_reports() {
        let mut summary = RunSummary::default();
        summary.push(listed("a", 2, 1));
        summary.push(listed("b", 5, 0));

        assert_eq!(summary.totals.deleted_tags, 7);
        assert_eq!(summary.totals.deleted_manifests, 1);
        assert_eq!(
            summary.totals_line(),
            "7 Tags Deleted Total | 1 Manifests Deleted Total"
        );
        assert!(!summary.has_listing_failures());
        assert!(summary.report("b").is_some());
    }
}
