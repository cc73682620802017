//! JWK thumbprint calculation per RFC 7638.
//!
//! Binds DPoP proofs to access tokens through the `cnf.jkt` claim.
//! Comparison is constant-time.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::provider::Jwk;

/// Calculates JWK thumbprints per RFC 7638.
pub struct JwkThumbprint;

impl JwkThumbprint {
    /// Computes the base64url SHA-256 thumbprint of a JWK.
    ///
    /// Per RFC 7638, the digest covers only the required members of the
    /// key, in lexicographic order with no whitespace.
    #[must_use]
    pub fn compute(jwk: &Jwk) -> String {
        let canonical = Self::canonical_json(jwk);
        let digest = Sha256::digest(canonical.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// The canonical JSON representation for thumbprint calculation.
    fn canonical_json(jwk: &Jwk) -> String {
        match jwk.kty.as_str() {
            "EC" => format!(
                r#"{{"crv":"{}","kty":"EC","x":"{}","y":"{}"}}"#,
                jwk.crv.as_deref().unwrap_or(""),
                jwk.x.as_deref().unwrap_or(""),
                jwk.y.as_deref().unwrap_or(""),
            ),
            "RSA" => format!(
                r#"{{"e":"{}","kty":"RSA","n":"{}"}}"#,
                jwk.e.as_deref().unwrap_or(""),
                jwk.n.as_deref().unwrap_or(""),
            ),
            _ => serde_json::to_string(jwk).unwrap_or_default(),
        }
    }

    /// Verifies a thumbprint against a JWK in constant time.
    #[must_use]
    pub fn verify(jwk: &Jwk, expected: &str) -> bool {
        let computed = Self::compute(jwk);
        let computed = computed.as_bytes();
        let expected = expected.as_bytes();

        if computed.len() != expected.len() {
            return false;
        }
        computed.ct_eq(expected).into()
    }
}
