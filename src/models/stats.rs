//! Run statistics.

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::time::Duration;

/// Per-repository deletion counters.
///
/// Only ever updated on the task that collects unit outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryRunCounters {
    /// Tags deleted (or verified, in dry-run mode).
    pub deleted_tags: usize,
    /// Manifests deleted (or verified, in dry-run mode).
    pub deleted_manifests: usize,
}

impl AddAssign for RepositoryRunCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.deleted_tags += rhs.deleted_tags;
        self.deleted_manifests += rhs.deleted_manifests;
    }
}

/// Outcome of one purge phase (tags or manifests) for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Units submitted to the worker pool.
    pub attempted: usize,
    /// Units that completed successfully.
    pub succeeded: usize,
    /// Units that failed.
    pub failed: usize,
    /// Failure counts keyed by error kind.
    pub failures_by_kind: BTreeMap<&'static str, usize>,
    /// Whether destructive calls were replaced by reads.
    pub dry_run: bool,
    /// Wall time of the phase.
    pub elapsed: Duration,
}

impl PurgeStats {
    /// Creates empty stats for a phase.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Records a successful unit.
    pub const fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    /// Records a failed unit of the given kind.
    pub fn record_failure(&mut self, kind: &'static str) {
        self.attempted += 1;
        self.failed += 1;
        *self.failures_by_kind.entry(kind).or_insert(0) += 1;
    }

    /// Returns `true` if any unit failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self, noun: &str) -> String {
        let action = if self.dry_run {
            "would delete"
        } else {
            "deleted"
        };
        let mut line = format!(
            "{action} {}/{} {noun} in {:.2}s",
            self.succeeded,
            self.attempted,
            self.elapsed.as_secs_f64()
        );
        if self.has_failures() {
            let kinds: Vec<String> = self
                .failures_by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            line.push_str(&format!(" ({} failed: {})", self.failed, kinds.join(", ")));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_add_assign() {
        let mut total = RepositoryRunCounters::default();
        total += RepositoryRunCounters {
            deleted_tags: 3,
            deleted_manifests: 1,
        };
        total += RepositoryRunCounters {
            deleted_tags: 2,
            deleted_manifests: 0,
        };
        assert_eq!(total.deleted_tags, 5);
        assert_eq!(total.deleted_manifests, 1);
    }

    #[test]
    fn test_attempted_tracks_every_outcome() {
        let mut stats = PurgeStats::new(false);
        stats.record_success();
        stats.record_failure("not_found");
        stats.record_failure("not_found");
        assert_eq!(stats.attempted, 3);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.failures_by_kind.get("not_found"), Some(&2));
    }

    #[test]
    fn test_summary_dry_run_with_failures() {
        let mut stats = PurgeStats::new(true);
        stats.record_success();
        stats.record_failure("transport");
        let summary = stats.summary("tags");
        assert!(summary.starts_with("would delete 1/2 tags"));
        assert!(summary.contains("1 failed: transport: 1"));
    }

    #[test]
    fn test_summary_clean_run() {
        let mut stats = PurgeStats::new(false);
        stats.record_success();
        let summary = stats.summary("manifests");
        assert!(summary.starts_with("deleted 1/1 manifests"));
        assert!(!summary.contains("failed"));
    }
}
