//! OAuth 2.0 resource-server authentication.
//!
//! Validates bearer credentials presented to HTTP endpoints using JWTs
//! signed by OpenID Connect providers. Three credential shapes are
//! accepted: plain bearer access tokens, legacy proof-of-possession
//! wrapper tokens, and DPoP-bound access tokens. Each request runs through
//! a single ordered pipeline (extraction, decoding, proof-of-possession
//! verification, allow/deny policy, signing-key resolution with live
//! rotation, signature verification, temporal validation and scope
//! enforcement) and every failure maps onto a precise RFC 6750 challenge
//! response.
//!
//! Provider metadata and JWK Sets are discovered lazily, cached per
//! issuer, and rotated on demand when a signing key cannot be matched.
//! The cache can be serialized and restored so a server warm-starts
//! without network I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod challenge;
pub mod credential;
pub mod dpop;
pub mod error;
pub mod middleware;
pub mod options;
pub mod pipeline;
pub mod provider;
pub mod server;

pub use credential::{Audience, Claims, Credential, DecodedJwt, TokenType};
pub use error::AuthError;
pub use middleware::{AuthLayer, AuthService};
pub use options::{AuthOptions, Filter, FilterSet};
pub use pipeline::{AuthContext, RequestContext, ValidationPipeline};
pub use provider::{
    Jwk, JwkSet, ProviderCache, ProviderEntry, ProviderMetadata, ResolveError,
    SerializedProviders,
};
pub use server::ResourceServer;
