//! Credential extraction from the request surface.

use crate::credential::TokenType;
use crate::error::AuthError;

/// The request surface the pipeline consumes.
///
/// Built by the middleware adapter; carries everything extraction and
/// proof-of-possession verification need, nothing else.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Uppercase HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// `Host` header.
    pub host: Option<String>,
    /// `Authorization` header.
    pub authorization: Option<String>,
    /// Raw `DPoP` proof header.
    pub dpop_proof: Option<String>,
    /// `access_token` query parameter.
    pub query_token: Option<String>,
    /// `access_token` form-body parameter.
    pub body_token: Option<String>,
    /// `Content-Type` header.
    pub content_type: Option<String>,
}

/// A credential candidate and the scheme that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// The raw credential.
    pub token: String,
    /// The detected scheme.
    pub token_type: TokenType,
}

/// Applies the extraction rules to the three credential sources.
///
/// `Ok(None)` means no credential was presented. The `Authorization`
/// header must split into exactly two whitespace-separated components
/// with a `Bearer` or `DPoP` scheme (case-insensitive); the query source
/// is opt-in; the body source requires a form content type. More than
/// one source yielding a credential is a malformed request.
pub fn extract(
    request: &RequestContext,
    allow_query: bool,
) -> Result<Option<Extracted>, AuthError> {
    let mut candidates: Vec<Extracted> = Vec::new();

    if let Some(authorization) = request.authorization.as_deref() {
        let mut parts = authorization.split_whitespace();
        let (scheme, credentials) = match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(credentials), None) => (scheme, credentials),
            _ => {
                return Err(AuthError::invalid_request("Invalid Authorization header"));
            }
        };
        let token_type = if scheme.eq_ignore_ascii_case("bearer") {
            TokenType::Bearer
        } else if scheme.eq_ignore_ascii_case("dpop") {
            TokenType::Dpop
        } else {
            return Err(AuthError::invalid_request(
                "Unsupported authorization scheme",
            ));
        };
        candidates.push(Extracted {
            token: credentials.to_string(),
            token_type,
        });
    }

    if let Some(token) = request.query_token.as_deref() {
        // RFC 6750 §2.3 discourages the query string; it is opt-in.
        if !allow_query {
            return Err(AuthError::invalid_request(
                "Query string credentials are not permitted",
            ));
        }
        candidates.push(Extracted {
            token: token.to_string(),
            token_type: TokenType::Bearer,
        });
    }

    if let Some(token) = request.body_token.as_deref() {
        let form = request
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/x-www-form-urlencoded"));
        if form {
            candidates.push(Extracted {
                token: token.to_string(),
                token_type: TokenType::Bearer,
            });
        }
    }

    if candidates.len() > 1 {
        return Err(AuthError::invalid_request("Multiple authentication methods"));
    }
    Ok(candidates.pop())
}
