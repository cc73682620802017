//! Error taxonomy for the validation pipeline.
//!
//! Every failure a pipeline can produce maps onto exactly one outward
//! response shape: an HTTP status, an optional RFC 6750 `error` code, and
//! an optional human-readable description. The first failure in a
//! pipeline is terminal; nothing downstream of it runs.

use http::StatusCode;
use thiserror::Error;

use crate::provider::ResolveError;

/// A terminal pipeline failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AuthError {
    /// Malformed input at the HTTP layer: multiple credential sources, a
    /// bad `Authorization` shape, or a forbidden query-string credential.
    #[error("invalid request: {description}")]
    InvalidRequest {
        /// What was wrong with the request.
        description: String,
    },

    /// No credential was presented and authentication is required.
    #[error("credential required")]
    MissingCredential,

    /// The presented token failed validation: not a JWT, a failed
    /// proof-of-possession check, no resolvable signing key, or a
    /// temporal claim out of range.
    #[error("invalid token: {description}")]
    InvalidToken {
        /// Which check rejected the token.
        description: String,
    },

    /// Signature verification returned false for the matched key.
    #[error("token signature verification failed")]
    InvalidSignature,

    /// An allow or deny filter rejected the token.
    #[error("access denied: {description}")]
    AccessDenied {
        /// The failing claim.
        description: String,
    },

    /// One or more required scopes are missing from the token.
    #[error("insufficient scope")]
    InsufficientScope {
        /// The scopes the route requires.
        required: Vec<String>,
    },

    /// Provider discovery or JWKS retrieval failed; the token cannot be
    /// validated.
    #[error(transparent)]
    Upstream(#[from] ResolveError),

    /// Unexpected internal failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// 400 `invalid_request` failure.
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::InvalidRequest {
            description: description.into(),
        }
    }

    /// 401 `invalid_token` failure.
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::InvalidToken {
            description: description.into(),
        }
    }

    /// 403 `access_denied` failure.
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::AccessDenied {
            description: description.into(),
        }
    }

    /// The HTTP status this failure produces.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::MissingCredential | Self::InvalidToken { .. } | Self::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            Self::AccessDenied { .. } | Self::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            // A deadline elapsing mid-fetch is an internal condition, not
            // a statement about the token.
            Self::Upstream(err) if err.is_timeout() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The RFC 6750 `error` parameter, when the failure carries one.
    ///
    /// Missing-credential and failed-signature responses are bare: they
    /// challenge without an error code.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidRequest { .. } => Some("invalid_request"),
            Self::InvalidToken { .. } => Some("invalid_token"),
            Self::AccessDenied { .. } => Some("access_denied"),
            Self::InsufficientScope { .. } => Some("insufficient_scope"),
            Self::Upstream(err) if !err.is_timeout() => Some("invalid_token"),
            _ => None,
        }
    }

    /// The RFC 6750 `error_description` parameter, when one applies.
    pub fn description(&self) -> Option<String> {
        match self {
            Self::InvalidRequest { description }
            | Self::InvalidToken { description }
            | Self::AccessDenied { description } => Some(description.clone()),
            Self::InsufficientScope { .. } => Some("Insufficient scope".to_string()),
            Self::Upstream(err) if !err.is_timeout() => {
                Some("Unable to retrieve token signing keys".to_string())
            }
            _ => None,
        }
    }

    /// Whether the response carries a `WWW-Authenticate` challenge.
    ///
    /// Challenges are written on 401 and 403 responses only.
    pub fn challenges(&self) -> bool {
        matches!(
            self.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AuthError::invalid_request("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::MissingCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::invalid_token("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidSignature.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::access_denied("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::InsufficientScope { required: vec![] }.status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_bare_responses_have_no_error_code() {
        assert_eq!(AuthError::MissingCredential.error_code(), None);
        assert_eq!(AuthError::InvalidSignature.error_code(), None);
    }

    #[test]
    fn test_upstream_failures_map_to_invalid_token() {
        let err = AuthError::from(ResolveError::MissingJwksUri);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), Some("invalid_token"));
    }

    #[test]
    fn test_upstream_timeout_maps_to_internal() {
        let err = AuthError::from(ResolveError::Timeout);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), None);
        assert!(!err.challenges());
    }
}
