//! Ordered credential validation.
//!
//! One request, one pass: extraction, requirement, decoding,
//! proof-of-possession, policy, key resolution and signature, temporal
//! claims, scope. The first failure is terminal and carries the outward
//! response shape; nothing downstream of it runs.

mod extract;

pub use extract::{extract, Extracted, RequestContext};

use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::credential::{Claims, Credential, DecodedJwt, TokenType};
use crate::dpop::HttpContext;
use crate::error::AuthError;
use crate::options::{AuthOptions, FilterSet};
use crate::provider::ProviderCache;

/// Verified claims published to the request on success.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified claims of the access token.
    pub claims: Claims,
    /// The decoded JWT, populated when `token_property` is configured.
    pub token: Option<DecodedJwt>,
    /// Extension key the claims are published under.
    pub claims_property: String,
    /// Extension key the decoded JWT is published under.
    pub token_property: Option<String>,
}

/// Per-request validation pipeline.
///
/// Cheap to build; everything shared across requests lives in the
/// provider cache.
pub struct ValidationPipeline {
    providers: Arc<ProviderCache>,
    options: Arc<AuthOptions>,
    base_uri: Option<Url>,
}

impl ValidationPipeline {
    /// Builds a pipeline for one route mount.
    pub fn new(
        providers: Arc<ProviderCache>,
        options: Arc<AuthOptions>,
        base_uri: Option<Url>,
    ) -> Self {
        Self {
            providers,
            options,
            base_uri,
        }
    }

    /// Runs the full validation sequence for one request.
    ///
    /// `Ok(None)` is the `optional` pass-through: no credential was
    /// presented and none is required.
    pub async fn run(&self, request: &RequestContext) -> Result<Option<AuthContext>, AuthError> {
        let extracted = extract(request, self.options.query)?;

        let Some(extracted) = extracted else {
            if self.options.optional {
                return Ok(None);
            }
            return Err(AuthError::MissingCredential);
        };

        let jwt = DecodedJwt::decode(&extracted.token)
            .ok_or_else(|| AuthError::invalid_token("Access token is not a JWT"))?;
        let credential = Credential::from_parts(jwt, extracted.token_type, request.dpop_proof.clone());

        if credential.is_pop_token() {
            let http = HttpContext {
                method: &request.method,
                path: &request.path,
                host: request.host.as_deref(),
                base_uri: self.base_uri.as_ref(),
            };
            credential.validate_pop(&http)?;
        }

        if let Some(allow) = self.options.allow.as_ref() {
            check_allow(allow, &credential, extracted.token_type)?;
        }
        if let Some(deny) = self.options.deny.as_ref() {
            check_deny(deny, &credential)?;
        }

        self.verify_key_and_signature(&credential).await?;

        credential.validate_expiry()?;
        credential.validate_not_before()?;

        credential.validate_scope(&self.options.scopes)?;

        let claims = credential.claims().clone();
        let token = self
            .options
            .token_property
            .is_some()
            .then(|| credential.jwt().clone());
        Ok(Some(AuthContext {
            claims,
            token,
            claims_property: self.options.claims_property.clone(),
            token_property: self.options.token_property.clone(),
        }))
    }

    /// Resolves the signing key, rotating the provider once on a miss,
    /// then verifies the signature.
    async fn verify_key_and_signature(&self, credential: &Credential) -> Result<(), AuthError> {
        let iss = credential
            .iss()
            .filter(|iss| !iss.is_empty())
            .ok_or_else(|| AuthError::invalid_token("Access token has no issuer"))?
            .to_string();

        let provider = self.providers.resolve(&iss).await?;
        let jwk = match credential.resolve_key(&provider.jwks) {
            Some(jwk) => jwk.clone(),
            None => {
                debug!(issuer = %iss, "no matching signing key, rotating");
                let provider = self.providers.rotate(&iss).await?;
                credential
                    .resolve_key(&provider.jwks)
                    .cloned()
                    .ok_or_else(|| {
                        AuthError::invalid_token("Cannot find key to verify JWT signature")
                    })?
            }
        };

        if !credential.verify_signature(&jwk) {
            return Err(AuthError::InvalidSignature);
        }
        Ok(())
    }
}

/// Allow filters: every configured filter must pass.
///
/// The audience filter only applies to bearer-typed credentials;
/// possession-bound tokens prove their audience by possession.
fn check_allow(
    allow: &FilterSet,
    credential: &Credential,
    token_type: TokenType,
) -> Result<(), AuthError> {
    if let Some(filter) = allow.issuers.as_ref() {
        let pass = credential
            .iss()
            .map(|iss| filter.matches_scalar(iss))
            .unwrap_or(false);
        if !pass {
            return Err(AuthError::access_denied("Issuer is not allowed"));
        }
    }
    if let Some(filter) = allow.audience.as_ref() {
        if token_type == TokenType::Bearer {
            let pass = credential
                .aud()
                .map(|aud| filter.matches_audience(aud))
                .unwrap_or(false);
            if !pass {
                return Err(AuthError::access_denied("Audience is not allowed"));
            }
        }
    }
    if let Some(filter) = allow.subjects.as_ref() {
        let pass = credential
            .sub()
            .map(|sub| filter.matches_scalar(sub))
            .unwrap_or(false);
        if !pass {
            return Err(AuthError::access_denied("Subject is not allowed"));
        }
    }
    Ok(())
}

/// Deny filters: any configured filter matching rejects the token.
///
/// Absent sub-filters never match, absent claims never match.
fn check_deny(deny: &FilterSet, credential: &Credential) -> Result<(), AuthError> {
    if let Some(filter) = deny.issuers.as_ref() {
        if credential
            .iss()
            .is_some_and(|iss| filter.matches_scalar(iss))
        {
            return Err(AuthError::access_denied("Issuer is denied"));
        }
    }
    if let Some(filter) = deny.audience.as_ref() {
        if credential
            .aud()
            .is_some_and(|aud| filter.matches_audience(aud))
        {
            return Err(AuthError::access_denied("Audience is denied"));
        }
    }
    if let Some(filter) = deny.subjects.as_ref() {
        if credential
            .sub()
            .is_some_and(|sub| filter.matches_scalar(sub))
        {
            return Err(AuthError::access_denied("Subject is denied"));
        }
    }
    Ok(())
}
