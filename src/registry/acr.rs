//! Azure Container Registry REST client.
//!
//! Uses the registry's data-plane API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list tags | `GET /acr/v1/{repo}/_tags?orderby=timedesc` |
//! | get tag | `GET /acr/v1/{repo}/_tags/{tag}` |
//! | delete tag | `DELETE /acr/v1/{repo}/_tags/{tag}` |
//! | list manifests | `GET /acr/v1/{repo}/_manifests` |
//! | get manifest | `GET /acr/v1/{repo}/_manifests/{digest}` |
//! | delete manifest | `DELETE /v2/{repo}/manifests/{digest}` |
//!
//! Listings are paginated through `Link: <...>; rel="next"` headers.
//! Credentials are taken as-is from the environment; no token exchange is
//! performed.

use super::{RegistryClient, RegistryError, RegistryResult, TagOrder};
use crate::models::{ManifestRecord, TagRecord};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Environment variable holding the basic-auth user name.
pub const USERNAME_ENV: &str = "TAGSWEEP_REGISTRY_USERNAME";
/// Environment variable holding the basic-auth password.
pub const PASSWORD_ENV: &str = "TAGSWEEP_REGISTRY_PASSWORD";
/// Environment variable holding a bearer access token.
pub const TOKEN_ENV: &str = "TAGSWEEP_REGISTRY_TOKEN";

const PAGE_SIZE: usize = 100;

/// Pre-acquired registry credential.
#[derive(Clone)]
pub enum Credential {
    /// HTTP basic auth (admin user or token credentials).
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: SecretString,
    },
    /// Bearer access token.
    Bearer(SecretString),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer(_) => f.write_str("Bearer([REDACTED])"),
        }
    }
}

impl Credential {
    /// Reads a credential from the environment.
    ///
    /// A bearer token wins over basic auth; `None` if neither is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        if let Ok(token) = std::env::var(TOKEN_ENV)
            && !token.is_empty()
        {
            return Some(Self::Bearer(SecretString::from(token)));
        }
        match (std::env::var(USERNAME_ENV), std::env::var(PASSWORD_ENV)) {
            (Ok(username), Ok(password)) if !username.is_empty() => Some(Self::Basic {
                username,
                password: SecretString::from(password),
            }),
            _ => None,
        }
    }

    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            },
            Self::Bearer(token) => request.bearer_auth(token.expose_secret()),
        }
    }
}

/// Client for one Azure Container Registry.
#[derive(Debug, Clone)]
pub struct AcrClient {
    http: reqwest::Client,
    endpoint: String,
    credential: Option<Credential>,
}

impl AcrClient {
    /// Creates a client for `address` (`myregistry.azurecr.io` or a full URL).
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the HTTP client cannot be built.
    pub fn new(address: &str, credential: Option<Credential>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::OperationFailed {
                operation: "build_http_client".to_string(),
                cause: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: normalize_endpoint(address),
            credential,
        })
    }

    /// Creates a client using [`Credential::from_env`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the HTTP client cannot be built.
    pub fn from_env(address: &str) -> Result<Self> {
        Self::new(address, Credential::from_env())
    }

    /// Normalized endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        // `Link` targets may be absolute.
        let url = if path_and_query.starts_with("http://") || path_and_query.starts_with("https://")
        {
            path_and_query.to_string()
        } else {
            format!("{}{path_and_query}", self.endpoint)
        };
        let request = self.http.request(method, url);
        match &self.credential {
            Some(credential) => credential.apply(request),
            None => request,
        }
    }

    async fn send(&self, method: Method, path: &str, resource: &str) -> RegistryResult<Response> {
        debug!(%method, path, "registry request");
        let response = self
            .request(method, path)
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or_default().to_string());
        Err(RegistryError::from_status(status.as_u16(), resource, message))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        resource: &str,
    ) -> RegistryResult<(T, Option<String>)> {
        let response = self.send(Method::GET, path, resource).await?;
        let next = next_link(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;
        let value = serde_json::from_str(&body).map_err(|e| RegistryError::Decode(e.to_string()))?;
        Ok((value, next))
    }
}

/// Prefixes `https://` when no scheme is given and strips trailing slashes.
fn normalize_endpoint(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Extracts the `rel="next"` target of a `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        params
            .split(';')
            .any(|p| p.trim().replace(' ', "") == "rel=\"next\"")
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeableAttributes {
    #[serde(default = "default_true")]
    delete_enabled: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagAttributes {
    name: String,
    digest: String,
    created_time: DateTime<Utc>,
    last_update_time: DateTime<Utc>,
    changeable_attributes: Option<ChangeableAttributes>,
}

impl From<TagAttributes> for TagRecord {
    fn from(attrs: TagAttributes) -> Self {
        Self {
            name: attrs.name,
            digest: attrs.digest,
            created_on: attrs.created_time,
            last_updated_on: attrs.last_update_time,
            can_delete: attrs
                .changeable_attributes
                .is_none_or(|a| a.delete_enabled),
            marked_for_deletion: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<TagAttributes>,
}

#[derive(Debug, Deserialize)]
struct TagEnvelope {
    tag: TagAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestAttributes {
    digest: String,
    #[serde(default)]
    tags: Vec<String>,
    last_update_time: Option<DateTime<Utc>>,
}

impl From<ManifestAttributes> for ManifestRecord {
    fn from(attrs: ManifestAttributes) -> Self {
        Self {
            digest: attrs.digest,
            tags: attrs.tags,
            last_updated_on: attrs.last_update_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestList {
    #[serde(default)]
    manifests: Vec<ManifestAttributes>,
}

#[derive(Debug, Deserialize)]
struct ManifestEnvelope {
    manifest: ManifestAttributes,
}

impl RegistryClient for AcrClient {
    async fn list_tag_properties(
        &self,
        repository: &str,
        order: TagOrder,
    ) -> RegistryResult<Vec<TagRecord>> {
        let mut tags = Vec::new();
        let mut path = Some(format!(
            "/acr/v1/{repository}/_tags?orderby={}&n={PAGE_SIZE}",
            order.as_query()
        ));
        while let Some(current) = path.take() {
            let (page, next): (TagList, _) = self.get_json(&current, repository).await?;
            tags.extend(page.tags.into_iter().map(TagRecord::from));
            path = next;
        }
        Ok(tags)
    }

    async fn get_tag_properties(&self, repository: &str, tag: &str) -> RegistryResult<TagRecord> {
        let resource = format!("tag {repository}:{tag}");
        let (envelope, _): (TagEnvelope, _) = self
            .get_json(&format!("/acr/v1/{repository}/_tags/{tag}"), &resource)
            .await?;
        Ok(envelope.tag.into())
    }

    async fn delete_tag(&self, repository: &str, tag: &str) -> RegistryResult<()> {
        let resource = format!("tag {repository}:{tag}");
        self.send(
            Method::DELETE,
            &format!("/acr/v1/{repository}/_tags/{tag}"),
            &resource,
        )
        .await
        .map(drop)
    }

    async fn list_manifest_properties(
        &self,
        repository: &str,
    ) -> RegistryResult<Vec<ManifestRecord>> {
        let mut manifests = Vec::new();
        let mut path = Some(format!("/acr/v1/{repository}/_manifests?n={PAGE_SIZE}"));
        while let Some(current) = path.take() {
            let (page, next): (ManifestList, _) = self.get_json(&current, repository).await?;
            manifests.extend(page.manifests.into_iter().map(ManifestRecord::from));
            path = next;
        }
        Ok(manifests)
    }

    async fn get_manifest_properties(
        &self,
        repository: &str,
        digest_or_tag: &str,
    ) -> RegistryResult<ManifestRecord> {
        let resource = format!("manifest {repository}@{digest_or_tag}");
        let (envelope, _): (ManifestEnvelope, _) = self
            .get_json(
                &format!("/acr/v1/{repository}/_manifests/{digest_or_tag}"),
                &resource,
            )
            .await?;
        Ok(envelope.manifest.into())
    }

    async fn delete_manifest(&self, repository: &str, digest_or_tag: &str) -> RegistryResult<()> {
        let resource = format!("manifest {repository}@{digest_or_tag}");
        self.send(
            Method::DELETE,
            &format!("/v2/{repository}/manifests/{digest_or_tag}"),
            &resource,
        )
        .await
        .map(drop)
    }
}
