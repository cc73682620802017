//! Credential variants and their verification operations.
//!
//! A decoded JWT is classified into one of three shapes: a plain bearer
//! access token, a legacy proof-of-possession wrapper, or a DPoP-bound
//! access token. The pipeline drives every shape through the same
//! operations; only the proof-of-possession step differs per variant.

mod claims;
mod jwt;

pub use claims::{Audience, Claims, Confirmation};
pub use jwt::{DecodedJwt, JoseHeader};

use chrono::Utc;
use jsonwebtoken::Validation;

use crate::dpop::{self, HttpContext};
use crate::error::AuthError;
use crate::provider::{Jwk, JwkSet};

/// The scheme a credential reached the request with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// `Authorization: Bearer`, or a query/body parameter.
    Bearer,
    /// `Authorization: DPoP`.
    Dpop,
}

/// A decoded credential in one of the three accepted shapes.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Plain bearer access token.
    Access(DecodedJwt),
    /// Legacy proof-of-possession wrapper (`token_type == "pop"`).
    Pop(DecodedJwt),
    /// DPoP-bound access token plus the raw `DPoP` proof header.
    Dpop {
        /// The decoded access token.
        jwt: DecodedJwt,
        /// The raw proof JWT from the `DPoP` request header.
        proof: Option<String>,
    },
}

impl Credential {
    /// Classifies a decoded JWT per the request that carried it.
    ///
    /// A `token_type` claim of `"pop"` wins over the transport scheme; a
    /// `dpop` scheme otherwise produces a DPoP credential.
    pub fn from_parts(jwt: DecodedJwt, token_type: TokenType, dpop_proof: Option<String>) -> Self {
        if jwt.claims.token_type.as_deref() == Some("pop") {
            Self::Pop(jwt)
        } else if token_type == TokenType::Dpop {
            Self::Dpop {
                jwt,
                proof: dpop_proof,
            }
        } else {
            Self::Access(jwt)
        }
    }

    /// The decoded access token.
    pub fn jwt(&self) -> &DecodedJwt {
        match self {
            Self::Access(jwt) | Self::Pop(jwt) => jwt,
            Self::Dpop { jwt, .. } => jwt,
        }
    }

    /// The token's claims.
    pub fn claims(&self) -> &Claims {
        &self.jwt().claims
    }

    /// The `iss` claim.
    pub fn iss(&self) -> Option<&str> {
        self.claims().iss.as_deref()
    }

    /// The `sub` claim.
    pub fn sub(&self) -> Option<&str> {
        self.claims().sub.as_deref()
    }

    /// The `aud` claim.
    pub fn aud(&self) -> Option<&Audience> {
        self.claims().aud.as_ref()
    }

    /// Whether this credential requires proof-of-possession verification.
    pub fn is_pop_token(&self) -> bool {
        !matches!(self, Self::Access(_))
    }

    /// Selects the signing key for this credential from a JWK Set.
    ///
    /// `None` signals the caller to rotate the provider and retry once.
    pub fn resolve_key<'a>(&self, jwks: &'a JwkSet) -> Option<&'a Jwk> {
        jwks.select(self.jwt().header.kid.as_deref())
    }

    /// Verifies the compact-JWS signature under `jwk`.
    ///
    /// The accepted algorithm set comes from the matched key, so a header
    /// swapped to `none` or an HMAC algorithm cannot verify.
    pub fn verify_signature(&self, jwk: &Jwk) -> bool {
        let algorithms = jwk.allowed_algorithms();
        let Some(first) = algorithms.first() else {
            return false;
        };
        let Some(key) = jwk.decoding_key() else {
            return false;
        };

        let mut validation = Validation::new(*first);
        validation.algorithms = algorithms;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<serde_json::Value>(&self.jwt().raw, &key, &validation).is_ok()
    }

    /// Rejects expired tokens against the current wall clock, no skew.
    pub fn validate_expiry(&self) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();
        match self.claims().exp {
            Some(exp) if exp > now => Ok(()),
            Some(_) => Err(AuthError::invalid_token("Access token is expired")),
            None => Err(AuthError::invalid_token("Access token has no expiration")),
        }
    }

    /// Rejects tokens presented before their `nbf` claim. Absent `nbf`
    /// passes.
    pub fn validate_not_before(&self) -> Result<(), AuthError> {
        let now = Utc::now().timestamp();
        match self.claims().nbf {
            Some(nbf) if nbf > now => {
                Err(AuthError::invalid_token("Access token is not yet valid"))
            }
            _ => Ok(()),
        }
    }

    /// Every required scope must appear in the token's `scope` claim.
    pub fn validate_scope(&self, required: &[String]) -> Result<(), AuthError> {
        if required.is_empty() {
            return Ok(());
        }
        let granted = self.claims().scopes();
        if required.iter().all(|s| granted.contains(s.as_str())) {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope {
                required: required.to_vec(),
            })
        }
    }

    /// Runs the proof-of-possession check appropriate to the variant.
    ///
    /// Plain access tokens pass trivially.
    pub fn validate_pop(&self, http: &HttpContext<'_>) -> Result<(), AuthError> {
        match self {
            Self::Access(_) => Ok(()),
            Self::Pop(jwt) => validate_legacy_pop(jwt),
            Self::Dpop { jwt, proof } => {
                let proof = proof
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_token("DPoP proof header missing"))?;
                dpop::verify_proof(proof, &jwt.claims, http)
            }
        }
    }
}

/// Legacy proof-of-possession wrapper shape check.
///
/// The wrapper must carry a confirmation claim and the inner access
/// token; the inner token itself is opaque at this layer.
fn validate_legacy_pop(jwt: &DecodedJwt) -> Result<(), AuthError> {
    if jwt.claims.cnf.is_none() {
        return Err(AuthError::invalid_token("PoP token has no cnf claim"));
    }
    if !jwt.claims.extra.contains_key("at") {
        return Err(AuthError::invalid_token(
            "PoP token has no inner access token",
        ));
    }
    Ok(())
}
