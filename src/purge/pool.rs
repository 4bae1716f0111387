//! Bounded worker pool.
//!
//! A semaphore bulkhead in front of a `JoinSet`. Every unit is spawned
//! immediately but waits for a permit before touching the registry, so at
//! most `max_concurrent` registry calls are in flight across all phases
//! that share the pool.

use crate::registry::{RegistryError, RegistryResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Default number of concurrent registry operations.
pub const DEFAULT_MAX_CONCURRENT: usize = 20;

/// Converts usize to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn usize_to_f64(value: usize) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum concurrent units.
    ///
    /// Default: 20.
    pub max_concurrent: usize,

    /// Per-unit timeout; `None` waits indefinitely.
    ///
    /// Default: `None`.
    pub operation_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolConfig {
    /// Creates the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            operation_timeout: None,
        }
    }

    /// Sets the maximum concurrent units.
    #[must_use]
    pub const fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the per-unit timeout.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// Result of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome<K> {
    /// What the unit operated on.
    pub target: K,
    /// `Ok` if the registry call succeeded.
    pub result: RegistryResult<()>,
}

impl<K> UnitOutcome<K> {
    /// Returns `true` if the unit succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Concurrency-limited executor for registry units.
///
/// Cloning is cheap and clones share the same permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    config: PoolConfig,
}

impl WorkerPool {
    /// Creates a pool; a `max_concurrent` of zero is raised to one.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self { semaphore, config }
    }

    /// Returns the current number of free permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Runs every job and waits for all of them.
    ///
    /// `on_complete` is called on the calling task for each outcome, in
    /// completion order. The returned vector has exactly one outcome per
    /// job: a job whose task panics or is cancelled is reported as
    /// [`RegistryError::Aborted`].
    pub async fn run_all<K, Fut, C>(
        &self,
        jobs: Vec<(K, Fut)>,
        mut on_complete: C,
    ) -> Vec<UnitOutcome<K>>
    where
        K: Send + 'static,
        Fut: Future<Output = RegistryResult<()>> + Send + 'static,
        C: FnMut(&UnitOutcome<K>),
    {
        let mut targets: Vec<Option<K>> = Vec::with_capacity(jobs.len());
        let mut set = JoinSet::new();

        for (slot, (target, job)) in jobs.into_iter().enumerate() {
            targets.push(Some(target));
            let semaphore = Arc::clone(&self.semaphore);
            let timeout = self.config.operation_timeout;
            set.spawn(async move { (slot, run_unit(semaphore, timeout, job).await) });
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        while let Some(joined) = set.join_next().await {
            metrics::gauge!("tagsweep_pool_available_permits")
                .set(usize_to_f64(self.semaphore.available_permits()));
            let (slot, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "Worker pool task failed to report");
                    continue;
                },
            };
            if let Some(target) = targets.get_mut(slot).and_then(Option::take) {
                let outcome = UnitOutcome { target, result };
                on_complete(&outcome);
                outcomes.push(outcome);
            }
        }

        // Slots never reported are units whose wrapper task itself was lost.
        for target in targets.into_iter().flatten() {
            let outcome = UnitOutcome {
                target,
                result: Err(RegistryError::Aborted("unit task lost".to_string())),
            };
            on_complete(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }
}

/// Waits for a permit, then runs `job` on its own task so a panic inside the
/// registry client surfaces as an error instead of taking the slot with it.
async fn run_unit<Fut>(
    semaphore: Arc<Semaphore>,
    timeout: Option<Duration>,
    job: Fut,
) -> RegistryResult<()>
where
    Fut: Future<Output = RegistryResult<()>> + Send + 'static,
{
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return Err(RegistryError::Aborted("worker pool closed".to_string()));
    };

    let handle = tokio::spawn(async move {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, job)
                .await
                .unwrap_or(Err(RegistryError::Timeout(limit))),
            None => job.await,
        }
    });

    handle
        .await
        .unwrap_or_else(|e| Err(RegistryError::Aborted(e.to_string())))
}
