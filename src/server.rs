//! Resource-server construction and route mounting.

use std::sync::Arc;

use url::Url;

use crate::middleware::AuthLayer;
use crate::options::AuthOptions;
use crate::provider::{ProviderCache, SerializedProviders};

/// A resource server: one provider cache shared by every route mount.
///
/// Cloning is cheap and shares the cache.
#[derive(Clone)]
pub struct ResourceServer {
    providers: Arc<ProviderCache>,
    base_uri: Option<Url>,
}

impl ResourceServer {
    /// A server with an empty provider cache.
    pub fn new() -> Self {
        Self {
            providers: Arc::new(ProviderCache::new()),
            base_uri: None,
        }
    }

    /// A server primed with previously serialized provider entries.
    ///
    /// Restored entries are used as-is until a miss or rotation triggers
    /// a refetch.
    pub fn from_serialized(providers: SerializedProviders) -> Self {
        Self {
            providers: Arc::new(ProviderCache::from_serialized(providers)),
            base_uri: None,
        }
    }

    /// Sets the canonical base URI, used to reconstruct the target URI
    /// for DPoP `htu` checks.
    pub fn with_base_uri(mut self, base_uri: Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    /// Snapshot of the provider cache for warm-starting a later instance.
    pub fn serialize(&self) -> SerializedProviders {
        self.providers.serialize()
    }

    /// Shared handle to the provider cache.
    pub fn providers(&self) -> Arc<ProviderCache> {
        Arc::clone(&self.providers)
    }

    /// Builds the authentication middleware for one route mount.
    pub fn authenticate(&self, options: AuthOptions) -> AuthLayer {
        AuthLayer::new(
            Arc::clone(&self.providers),
            Arc::new(options),
            self.base_uri.clone(),
        )
    }
}

impl Default for ResourceServer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_cache() {
        let server = ResourceServer::new();
        let clone = server.clone();
        assert!(Arc::ptr_eq(&server.providers(), &clone.providers()));
    }

    #[test]
    fn test_empty_serialization_round_trips() {
        let server = ResourceServer::new();
        let serialized = server.serialize();
        let json = serde_json::to_string(&serialized).unwrap();
        let restored: SerializedProviders = serde_json::from_str(&json).unwrap();
        ResourceServer::from_serialized(restored);
    }
}
