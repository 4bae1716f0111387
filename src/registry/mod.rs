//! Registry collaborator.
//!
//! The retention core talks to a registry only through [`RegistryClient`].
//! Two implementations ship with the crate:
//!
//! - [`AcrClient`]: Azure Container Registry REST API over `reqwest`
//! - [`InMemoryRegistry`]: in-process registry for tests and rehearsals

mod acr;
mod memory;

pub use acr::{AcrClient, Credential};
pub use memory::{InMemoryRegistry, RegistryCall};

use crate::models::{ManifestRecord, TagRecord};
use std::future::Future;
use std::time::Duration;
use thiserror::Error as ThisError;

/// Ordering requested when listing tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagOrder {
    /// Newest update first. Retention decisions depend on this order.
    #[default]
    LastUpdatedDescending,
    /// Oldest update first.
    LastUpdatedAscending,
}

impl TagOrder {
    /// Query value understood by the ACR `orderby` parameter.
    #[must_use]
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::LastUpdatedDescending => "timedesc",
            Self::LastUpdatedAscending => "timeasc",
        }
    }
}

/// Failure of a single registry call.
///
/// Carried as a value inside unit outcomes so that failure categories can be
/// counted and asserted on.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RegistryError {
    /// The tag, manifest or repository does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The registry refused the operation (401/403 or a locked resource).
    #[error("access denied: {0}")]
    Forbidden(String),

    /// Any other non-success HTTP status.
    #[error("registry returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// Connection, TLS or request construction failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("malformed registry response: {0}")]
    Decode(String),

    /// The call exceeded the configured operation timeout.
    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The unit task was cancelled or panicked before reporting.
    #[error("unit aborted: {0}")]
    Aborted(String),
}

impl RegistryError {
    /// Stable category name used in logs and statistics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Status { .. } => "status",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Timeout(_) => "timeout",
            Self::Aborted(_) => "aborted",
        }
    }

    /// Maps a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: u16, resource: &str, message: String) -> Self {
        match status {
            404 => Self::NotFound(resource.to_string()),
            401 | 403 => Self::Forbidden(format!("{resource}: {message}")),
            _ => Self::Status { status, message },
        }
    }
}

/// Result type for registry calls.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Capabilities the retention core needs from a container registry.
///
/// Implementations must be shareable across worker tasks; every returned
/// future must be `Send`.
pub trait RegistryClient: Send + Sync {
    /// Lists tag properties of `repository` in the requested order.
    fn list_tag_properties(
        &self,
        repository: &str,
        order: TagOrder,
    ) -> impl Future<Output = RegistryResult<Vec<TagRecord>>> + Send;

    /// Fetches the properties of one tag.
    fn get_tag_properties(
        &self,
        repository: &str,
        tag: &str,
    ) -> impl Future<Output = RegistryResult<TagRecord>> + Send;

    /// Deletes one tag. The manifest it pointed to is left in place.
    fn delete_tag(
        &self,
        repository: &str,
        tag: &str,
    ) -> impl Future<Output = RegistryResult<()>> + Send;

    /// Lists manifest properties of `repository`, including associated tags.
    fn list_manifest_properties(
        &self,
        repository: &str,
    ) -> impl Future<Output = RegistryResult<Vec<ManifestRecord>>> + Send;

    /// Fetches the properties of one manifest by digest or tag.
    fn get_manifest_properties(
        &self,
        repository: &str,
        digest_or_tag: &str,
    ) -> impl Future<Output = RegistryResult<ManifestRecord>> + Send;

    /// Deletes one manifest by digest or tag.
    fn delete_manifest(
        &self,
        repository: &str,
        digest_or_tag: &str,
    ) -> impl Future<Output = RegistryResult<()>> + Send;
}
