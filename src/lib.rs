//! # Tagsweep
//!
//! Retention policy engine for container registry image tags.
//!
//! Tagsweep classifies the tags of a repository into named groups by regex,
//! keeps the N most recently updated tags of each group, deletes the rest and
//! finally reclaims manifests that no longer carry any tag.
//!
//! ## Pipeline
//!
//! For every configured repository, sequentially:
//!
//! 1. List tags ordered by last update time (newest first)
//! 2. [`TagClassifier`] builds the group buckets
//! 3. [`RetentionEvaluator`] marks everything beyond each group's keep count
//! 4. [`TagPurger`] deletes marked tags through a bounded worker pool
//! 5. [`ManifestReclaimer`] deletes manifests left without tags
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagsweep::{RetentionService, TagsweepConfig};
//! use tagsweep::registry::AcrClient;
//!
//! let config = TagsweepConfig::load_from_file("config.yaml".as_ref())?;
//! config.validate()?;
//! let client = Arc::new(AcrClient::from_env(config.registry_address()?)?);
//! let service = RetentionService::new(client, &config)?;
//! let summary = service.run(&config.repositories).await;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod purge;
pub mod registry;
pub mod retention;
pub mod services;

pub use config::TagsweepConfig;
pub use models::{
    ClassificationResult, GroupSpec, ManifestRecord, OTHERS_BUCKET, PurgeStats,
    RepositoryRunCounters, TagGroup, TagRecord,
};
pub use purge::{ManifestReclaimer, PoolConfig, TagPurger, WorkerPool};
pub use registry::{RegistryClient, RegistryError, TagOrder};
pub use retention::{RetentionEvaluator, TagClassifier};
pub use services::{RepositoryReport, RetentionService, RunSummary};

/// Error type for tagsweep operations.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Registry address or repository list missing, config file unreadable |
/// | `InvalidPattern` | A tag group regex does not compile |
/// | `Enumeration` | Listing tags or manifests of a repository fails |
/// | `OperationFailed` | Log file, subscriber or client initialization fails |
///
/// Failures of a single tag or manifest operation are not `Error`s; they are
/// carried as [`RegistryError`] values inside unit outcomes.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Required configuration is missing or malformed.
    ///
    /// Fatal: the run aborts before any repository is processed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tag group pattern failed to compile.
    #[error("invalid pattern for tag group '{group}': {cause}")]
    InvalidPattern {
        /// Name of the offending group.
        group: String,
        /// Regex compiler message.
        cause: String,
    },

    /// A registry listing call failed.
    ///
    /// Aborts only the step that needed the listing, for one repository.
    #[error("failed to {operation} for repository '{repository}': {source}")]
    Enumeration {
        /// Repository being enumerated.
        repository: String,
        /// The listing operation, e.g. `list manifests`.
        operation: &'static str,
        /// The registry failure.
        #[source]
        source: RegistryError,
    },

    /// An ambient operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` for errors that must abort the whole run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidPattern { .. })
    }
}

/// Result type alias for tagsweep operations.
pub type Result<T> = std::result::Result<T, Error>;
