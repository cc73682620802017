//! JSON Web Key material.

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single JSON Web Key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (`RSA`, `EC`).
    pub kty: String,
    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Intended use (`sig`, `enc`).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Declared algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// EC curve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// EC x coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// EC y coordinate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Whether this key may be used for signature verification.
    pub fn is_signing_key(&self) -> bool {
        matches!(self.key_use.as_deref(), None | Some("sig"))
    }

    /// The algorithms a verification against this key accepts.
    ///
    /// Restricted to the key's declared `alg` when present, otherwise to
    /// the asymmetric family implied by the key material. An empty set
    /// means the key cannot verify anything: `none` and the HMAC family
    /// are never accepted.
    pub fn allowed_algorithms(&self) -> Vec<Algorithm> {
        if let Some(alg) = self.alg.as_deref() {
            return alg
                .parse::<Algorithm>()
                .ok()
                .filter(is_asymmetric)
                .into_iter()
                .collect();
        }
        match self.kty.as_str() {
            "RSA" => vec![
                Algorithm::RS256,
                Algorithm::RS384,
                Algorithm::RS512,
                Algorithm::PS256,
                Algorithm::PS384,
                Algorithm::PS512,
            ],
            "EC" => match self.crv.as_deref() {
                Some("P-256") => vec![Algorithm::ES256],
                Some("P-384") => vec![Algorithm::ES384],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Builds a verification key from the JWK members.
    pub fn decoding_key(&self) -> Option<DecodingKey> {
        match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_ref()?;
                let e = self.e.as_ref()?;
                DecodingKey::from_rsa_components(n, e).ok()
            }
            "EC" => {
                let crv = self.crv.as_deref().unwrap_or("P-256");
                if !matches!(crv, "P-256" | "P-384") {
                    warn!(crv, "unsupported EC curve, rejecting key");
                    return None;
                }
                let x = self.x.as_ref()?;
                let y = self.y.as_ref()?;
                DecodingKey::from_ec_components(x, y).ok()
            }
            other => {
                warn!(kty = other, "unsupported key type");
                None
            }
        }
    }
}

/// An ordered set of JSON Web Keys, as published at `jwks_uri`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The keys, in publication order.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Selects the signing key for a JWT header.
    ///
    /// Keys marked for encryption are ignored. A `kid` in the header
    /// picks the first key with the same `kid`; without one, a sole
    /// remaining signing key is used. Anything else is a miss, which
    /// signals the caller to rotate the provider and retry once.
    pub fn select(&self, kid: Option<&str>) -> Option<&Jwk> {
        let mut signing = self.keys.iter().filter(|k| k.is_signing_key());
        match kid {
            Some(kid) => signing.find(|k| k.kid.as_deref() == Some(kid)),
            None => {
                let first = signing.next()?;
                if signing.next().is_some() {
                    None
                } else {
                    Some(first)
                }
            }
        }
    }
}

fn is_asymmetric(alg: &Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
