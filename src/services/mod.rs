//! Business logic services.
//!
//! Services wire the registry client, retention rules and worker pool into
//! the per-repository pipeline.

mod report;
mod retention;

pub use report::{RepositoryReport, RunSummary};
pub use retention::RetentionService;
