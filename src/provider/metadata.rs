//! OIDC discovery document projection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Provider metadata, projected from the discovery document.
///
/// Only `issuer` and `jwks_uri` are read; the remaining members are
/// carried through `extra` so a serialized cache round-trips the document
/// as fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier, as published by the provider.
    pub issuer: String,
    /// Where the provider publishes its JWK Set.
    #[serde(default)]
    pub jwks_uri: String,
    /// Remaining discovery members, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
