//! Issuer-keyed provider cache with single-flight fetch deduplication.
//!
//! Resolution performs OIDC discovery followed by a JWK Set fetch. The
//! resulting entry is shared with readers as an immutable snapshot:
//! rotation swaps the entry wholesale and never disturbs a reader that
//! still holds the previous one. Concurrent fetches for one issuer
//! coalesce into a single network operation; distinct issuers proceed
//! independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::provider::{JwkSet, ProviderMetadata};

/// Timeout for discovery and JWKS requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Why an issuer could not be resolved.
#[non_exhaustive]
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The provider could not be reached.
    #[error("provider request failed: {reason}")]
    Network {
        /// Transport-level failure description.
        reason: String,
    },

    /// The request deadline elapsed mid-fetch.
    #[error("provider request timed out")]
    Timeout,

    /// Discovery responded with a non-2xx status.
    #[error("discovery returned HTTP {status}")]
    DiscoveryStatus {
        /// The status received.
        status: u16,
    },

    /// The JWKS endpoint responded with a non-2xx status.
    #[error("JWKS fetch returned HTTP {status}")]
    JwksStatus {
        /// The status received.
        status: u16,
    },

    /// The provider returned something that is not the expected JSON.
    #[error("malformed provider response: {reason}")]
    Malformed {
        /// Parse failure description.
        reason: String,
    },

    /// The discovery document carries no `jwks_uri`.
    #[error("discovery document has no jwks_uri")]
    MissingJwksUri,
}

impl ResolveError {
    /// Whether the failure was a deadline elapsing, as opposed to a
    /// statement about the provider's response.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed {
                reason: err.to_string(),
            }
        } else {
            Self::Network {
                reason: err.to_string(),
            }
        }
    }
}

/// Immutable (metadata, JWK Set) snapshot for one issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// The discovery document projection.
    pub metadata: ProviderMetadata,
    /// The JWK Set fetched from `metadata.jwks_uri`.
    pub jwks: JwkSet,
}

/// Serialized form of the cache, for warm-starting a later instance.
///
/// Opaque beyond the round-trip guarantee: restoring it yields a cache
/// that answers the same resolutions without network I/O.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerializedProviders(pub(crate) HashMap<String, ProviderEntry>);

type Entries = HashMap<String, Arc<ProviderEntry>>;
type Inflight = Shared<BoxFuture<'static, Result<Arc<ProviderEntry>, ResolveError>>>;

/// Issuer-keyed cache of provider metadata and signing keys.
pub struct ProviderCache {
    entries: Arc<ArcSwap<Entries>>,
    inflight: Arc<Mutex<HashMap<String, Inflight>>>,
    http: reqwest::Client,
}

impl ProviderCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::from_serialized(SerializedProviders::default())
    }

    /// A cache primed with previously serialized entries.
    ///
    /// Restored entries serve as-is until a miss or a rotation refetches
    /// them.
    pub fn from_serialized(providers: SerializedProviders) -> Self {
        let entries: Entries = providers
            .0
            .into_iter()
            .map(|(iss, entry)| (iss, Arc::new(entry)))
            .collect();
        Self {
            entries: Arc::new(ArcSwap::from_pointee(entries)),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            http: default_http_client(),
        }
    }

    /// Snapshot of every cached entry.
    pub fn serialize(&self) -> SerializedProviders {
        let entries = self.entries.load();
        SerializedProviders(
            entries
                .iter()
                .map(|(iss, entry)| (iss.clone(), ProviderEntry::clone(entry)))
                .collect(),
        )
    }

    /// Returns the provider entry for `iss`, fetching it on first use.
    pub async fn resolve(&self, iss: &str) -> Result<Arc<ProviderEntry>, ResolveError> {
        if let Some(entry) = self.entries.load().get(iss) {
            return Ok(Arc::clone(entry));
        }
        self.refresh(iss).await
    }

    /// Forces a fresh JWK Set fetch for `iss`.
    ///
    /// The cached discovery document is reused when present. The returned
    /// entry carries at least the JWKS published by this rotation, so a
    /// caller retrying a key match against it never sees a stale set.
    pub async fn rotate(&self, iss: &str) -> Result<Arc<ProviderEntry>, ResolveError> {
        debug!(issuer = iss, "rotating provider keys");
        self.refresh(iss).await
    }

    /// Single-flight fetch of metadata and JWKS for one issuer.
    ///
    /// The first caller registers a shared future; everyone arriving
    /// while it is in flight awaits the same result. The future itself
    /// publishes the entry and deregisters before completing, so no
    /// waiter can observe a completed fetch that was never stored.
    #[instrument(skip(self))]
    async fn refresh(&self, iss: &str) -> Result<Arc<ProviderEntry>, ResolveError> {
        let mut inflight = self.inflight.lock().await;
        if let Some(pending) = inflight.get(iss) {
            let pending = pending.clone();
            drop(inflight);
            return pending.await;
        }

        let fut: BoxFuture<'static, Result<Arc<ProviderEntry>, ResolveError>> = {
            let http = self.http.clone();
            let iss = iss.to_string();
            let entries = Arc::clone(&self.entries);
            let registry = Arc::clone(&self.inflight);
            let cached_metadata = entries.load().get(&iss).map(|e| e.metadata.clone());
            Box::pin(async move {
                let result = fetch_entry(&http, &iss, cached_metadata).await;
                if let Ok(entry) = &result {
                    let entry = Arc::clone(entry);
                    entries.rcu(|current| {
                        let mut next = Entries::clone(current);
                        next.insert(iss.clone(), Arc::clone(&entry));
                        next
                    });
                }
                registry.lock().await.remove(&iss);
                result
            })
        };
        let shared = fut.shared();
        inflight.insert(iss.to_string(), shared.clone());
        drop(inflight);

        shared.await
    }
}

impl Default for ProviderCache {
    fn default() -> Self {
        Self::new()
    }
}

fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Discovery (unless the document is already cached) followed by the
/// JWKS fetch.
async fn fetch_entry(
    http: &reqwest::Client,
    iss: &str,
    cached_metadata: Option<ProviderMetadata>,
) -> Result<Arc<ProviderEntry>, ResolveError> {
    let metadata = match cached_metadata {
        Some(metadata) => metadata,
        None => discover(http, iss).await?,
    };

    let response = http.get(&metadata.jwks_uri).send().await?;
    if !response.status().is_success() {
        return Err(ResolveError::JwksStatus {
            status: response.status().as_u16(),
        });
    }
    let jwks: JwkSet = response.json().await?;

    info!(issuer = iss, keys = jwks.keys.len(), "provider JWKS updated");
    Ok(Arc::new(ProviderEntry { metadata, jwks }))
}

/// Fetches `{iss}/.well-known/openid-configuration`.
async fn discover(http: &reqwest::Client, iss: &str) -> Result<ProviderMetadata, ResolveError> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        iss.trim_end_matches('/')
    );
    let response = http.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(ResolveError::DiscoveryStatus {
            status: response.status().as_u16(),
        });
    }
    let metadata: ProviderMetadata = response.json().await?;
    if metadata.jwks_uri.trim().is_empty() {
        return Err(ResolveError::MissingJwksUri);
    }
    Ok(metadata)
}
