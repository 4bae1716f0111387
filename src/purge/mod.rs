//! Concurrent deletion.
//!
//! Both purge phases submit one unit of work per tag or manifest to a shared
//! [`WorkerPool`]. A unit either deletes its target or, in dry-run mode,
//! reads it back. Unit failures are reported as values and never abort the
//! rest of the batch.
//!
//! # Example
//!
//! ```rust,ignore
//! use tagsweep::purge::{ManifestReclaimer, PoolConfig, TagPurger, WorkerPool};
//!
//! let pool = WorkerPool::new(PoolConfig::default());
//! let tags = TagPurger::new(Arc::clone(&client), pool.clone())
//!     .delete_flagged("app/api", &classification, dry_run)
//!     .await;
//! let manifests = ManifestReclaimer::new(client, pool)
//!     .reclaim_orphans("app/api", dry_run)
//!     .await?;
//! ```

mod manifests;
mod pool;
mod tags;

pub use manifests::ManifestReclaimer;
pub use pool::{DEFAULT_MAX_CONCURRENT, PoolConfig, UnitOutcome, WorkerPool};
pub use tags::TagPurger;
