//! Compact-JWS decoding without verification.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::credential::Claims;
use crate::provider::Jwk;

/// Decoded JOSE header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoseHeader {
    /// Declared algorithm. Never trusted on its own: verification is
    /// restricted to the algorithms of the matched key.
    pub alg: String,
    /// Key ID used for signing-key selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Token type marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Embedded public key; DPoP proofs carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
    /// Remaining header members, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A structurally valid JWT: parsed header and payload, unverified.
#[derive(Debug, Clone)]
pub struct DecodedJwt {
    /// The JOSE header.
    pub header: JoseHeader,
    /// The payload claims.
    pub claims: Claims,
    /// The original compact form, kept for signature verification.
    pub raw: String,
}

impl DecodedJwt {
    /// Decodes the three compact-JWS segments.
    ///
    /// Structure only: exactly three base64url segments with valid JSON
    /// in header and payload. The signature segment is decoded for
    /// well-formedness but not verified.
    pub fn decode(raw: &str) -> Option<Self> {
        let mut segments = raw.split('.');
        let (header, payload, signature) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return None,
        };

        let header: JoseHeader = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).ok()?).ok()?;
        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        URL_SAFE_NO_PAD.decode(signature).ok()?;

        Some(Self {
            header,
            claims,
            raw: raw.to_string(),
        })
    }
}
