//! Provider metadata and signing-key resolution.
//!
//! An issuer URL resolves to a [`ProviderEntry`]: the discovery document
//! projection plus the JWK Set published at its `jwks_uri`. Entries are
//! cached per issuer and rotated on demand when a signing key cannot be
//! matched.

mod cache;
mod jwks;
mod metadata;

pub use cache::{ProviderCache, ProviderEntry, ResolveError, SerializedProviders};
pub use jwks::{Jwk, JwkSet};
pub use metadata::ProviderMetadata;
