//! DPoP proof verification (RFC 9449) and key binding (RFC 7638).
//!
//! A DPoP-bound access token is only as good as the per-request proof
//! that accompanies it: a short-lived JWT signed by the client-held key,
//! binding the request method and target URI to the key the access token
//! was issued for.

mod proof;
mod thumbprint;

pub use proof::{DpopClaims, DpopProof};
pub use thumbprint::JwkThumbprint;

use url::Url;

use crate::credential::Claims;
use crate::error::AuthError;

/// Request-derived context a proof is checked against.
#[derive(Debug, Clone, Copy)]
pub struct HttpContext<'a> {
    /// Uppercase HTTP method.
    pub method: &'a str,
    /// Request path, as received.
    pub path: &'a str,
    /// `Host` header, when present.
    pub host: Option<&'a str>,
    /// The server's canonical base URI.
    pub base_uri: Option<&'a Url>,
}

/// Verifies a DPoP proof against the access token and request.
///
/// Order: decode the proof, verify its signature under the header `jwk`,
/// bind the key to the access token via `cnf.jkt`, then check `htu` and
/// `htm`. Every failure is an invalid-token rejection with a
/// step-specific description.
///
/// The proof's `jti` and `iat` are carried through [`DpopClaims`] but no
/// replay window is tracked here.
pub fn verify_proof(
    raw_proof: &str,
    access_claims: &Claims,
    http: &HttpContext<'_>,
) -> Result<(), AuthError> {
    let proof = DpopProof::parse(raw_proof)?;
    proof.verify_signature()?;

    let jkt = access_claims
        .cnf
        .as_ref()
        .and_then(|cnf| cnf.jkt.as_deref())
        .ok_or_else(|| AuthError::invalid_token("Access token has no cnf.jkt confirmation"))?;
    if !JwkThumbprint::verify(&proof.jwk, jkt) {
        return Err(AuthError::invalid_token(
            "DPoP key does not match the token cnf.jkt thumbprint",
        ));
    }

    let base_uri = http
        .base_uri
        .ok_or_else(|| AuthError::invalid_token("No base URI configured for DPoP validation"))?;
    let expected_htu = expected_target_uri(base_uri, http.host, http.path);
    if proof.claims.htu != expected_htu {
        return Err(AuthError::invalid_token(format!(
            "DPoP htu mismatch: expected {expected_htu}, got {}",
            proof.claims.htu
        )));
    }

    if proof.claims.htm != http.method {
        return Err(AuthError::invalid_token(format!(
            "DPoP htm mismatch: expected {}, got {}",
            http.method, proof.claims.htm
        )));
    }

    Ok(())
}

/// Reconstructs `scheme://host/path` for the `htu` check.
///
/// The request `Host` replaces the configured host only when it is a
/// subdomain of it: a dot-aligned suffix match from the right.
fn expected_target_uri(base_uri: &Url, request_host: Option<&str>, path: &str) -> String {
    let mut authority = base_uri.host_str().unwrap_or_default().to_string();
    if let Some(port) = base_uri.port() {
        authority = format!("{authority}:{port}");
    }
    if let Some(host) = request_host {
        if host
            .strip_suffix(&authority)
            .is_some_and(|prefix| prefix.ends_with('.'))
        {
            authority = host.to_string();
        }
    }
    format!("{}://{}{}", base_uri.scheme(), authority, path)
}
