//! DPoP proof JWT parsing and signature verification.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;

use crate::error::AuthError;
use crate::provider::Jwk;

#[derive(Debug, Clone, Deserialize)]
struct ProofHeader {
    typ: Option<String>,
    alg: String,
    jwk: Option<Jwk>,
}

/// DPoP proof claims.
#[derive(Debug, Clone, Deserialize)]
pub struct DpopClaims {
    /// Unique proof identifier. Carried, not tracked.
    pub jti: Option<String>,
    /// HTTP method the proof covers.
    pub htm: String,
    /// HTTP target URI the proof covers.
    pub htu: String,
    /// Issued-at timestamp. Carried, not tracked.
    pub iat: Option<i64>,
}

/// A parsed DPoP proof: the client's public key, its claims, and the raw
/// compact form for signature verification.
#[derive(Debug, Clone)]
pub struct DpopProof {
    /// Public key embedded in the proof header.
    pub jwk: Jwk,
    /// The proof claims.
    pub claims: DpopClaims,
    alg: Algorithm,
    raw: String,
}

impl DpopProof {
    /// Parses a compact-JWS proof without verifying it.
    ///
    /// The header must declare `typ: dpop+jwt`, an `ES256` or `RS256`
    /// algorithm, and carry the signing public key as `jwk`.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let mut segments = raw.split('.');
        let (header, payload) = match (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            (Some(h), Some(p), Some(_), None) => (h, p),
            _ => return Err(AuthError::invalid_token("DPoP proof is not a JWT")),
        };

        let header: ProofHeader = decode_segment(header)
            .ok_or_else(|| AuthError::invalid_token("Malformed DPoP proof header"))?;
        if header.typ.as_deref() != Some("dpop+jwt") {
            return Err(AuthError::invalid_token(
                "DPoP proof typ header is not dpop+jwt",
            ));
        }
        let alg = match header.alg.as_str() {
            "ES256" => Algorithm::ES256,
            "RS256" => Algorithm::RS256,
            other => {
                return Err(AuthError::invalid_token(format!(
                    "Unsupported DPoP proof algorithm: {other}"
                )))
            }
        };
        let jwk = header
            .jwk
            .ok_or_else(|| AuthError::invalid_token("DPoP proof header has no jwk"))?;

        let claims: DpopClaims = decode_segment(payload)
            .ok_or_else(|| AuthError::invalid_token("Malformed DPoP proof payload"))?;

        Ok(Self {
            jwk,
            claims,
            alg,
            raw: raw.to_string(),
        })
    }

    /// Verifies the proof signature under its own header `jwk`.
    pub fn verify_signature(&self) -> Result<(), AuthError> {
        let key = self
            .jwk
            .decoding_key()
            .ok_or_else(|| AuthError::invalid_token("DPoP proof jwk is not a usable key"))?;

        let mut validation = Validation::new(self.alg);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<serde_json::Value>(&self.raw, &key, &validation)
            .map(|_| ())
            .map_err(|_| AuthError::invalid_token("DPoP proof signature is invalid"))
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Option<T> {
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).ok()?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof_segments(header: serde_json::Value, payload: serde_json::Value) -> String {
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload.to_string()),
            URL_SAFE_NO_PAD.encode(b"sig"),
        )
    }

    fn ec_jwk() -> serde_json::Value {
        serde_json::json!({
            "kty": "EC", "crv": "P-256",
            "x": "WbbXwVQpNcx4JpLfTo0qjQLwpHA4cb9YNQKM7VjPMns",
            "y": "6Pbt6dwxAeS7yHp7YV4GHKaGMPaY2dSzfb0V4L5Vooo",
        })
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({
            "jti": "proof-1",
            "htm": "POST",
            "htu": "https://api.example.test/resource",
            "iat": 1_700_000_000,
        })
    }

    #[test]
    fn test_parse_well_formed() {
        let raw = proof_segments(
            serde_json::json!({"typ": "dpop+jwt", "alg": "ES256", "jwk": ec_jwk()}),
            payload(),
        );
        let proof = DpopProof::parse(&raw).unwrap();
        assert_eq!(proof.claims.htm, "POST");
        assert_eq!(proof.claims.jti.as_deref(), Some("proof-1"));
        assert_eq!(proof.jwk.kty, "EC");
    }

    #[test]
    fn test_parse_rejects_wrong_typ() {
        let raw = proof_segments(
            serde_json::json!({"typ": "JWT", "alg": "ES256", "jwk": ec_jwk()}),
            payload(),
        );
        assert!(DpopProof::parse(&raw).is_err());
    }

    #[test]
    fn test_parse_rejects_unsupported_alg() {
        let raw = proof_segments(
            serde_json::json!({"typ": "dpop+jwt", "alg": "HS256", "jwk": ec_jwk()}),
            payload(),
        );
        assert!(DpopProof::parse(&raw).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_jwk() {
        let raw = proof_segments(
            serde_json::json!({"typ": "dpop+jwt", "alg": "ES256"}),
            payload(),
        );
        assert!(DpopProof::parse(&raw).is_err());
    }

    #[test]
    fn test_parse_rejects_non_jwt() {
        assert!(DpopProof::parse("not-a-proof").is_err());
    }
}
