//! RFC 6750 `WWW-Authenticate` challenge encoding.

use crate::error::AuthError;

/// Builder for `WWW-Authenticate` challenge header values.
///
/// Parameters are emitted in insertion order as comma-separated
/// `key="value"` pairs. Values are quoted literally without escaping.
/// The scheme is always `Bearer`.
#[derive(Debug, Default)]
pub struct Challenge {
    params: Vec<(&'static str, String)>,
}

impl Challenge {
    /// An empty challenge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a challenge parameter.
    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Renders the header value.
    pub fn encode(&self) -> String {
        if self.params.is_empty() {
            return "Bearer".to_string();
        }
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| format!("{key}=\"{value}\""))
            .collect();
        format!("Bearer {}", params.join(", "))
    }

    /// The challenge for a pipeline failure, when one applies.
    ///
    /// 401 and 403 responses challenge; 400 and 500 responses do not.
    /// A bare challenge carries only the realm.
    pub fn for_error(error: &AuthError, realm: Option<&str>) -> Option<String> {
        if !error.challenges() {
            return None;
        }
        let mut challenge = Challenge::new();
        if let Some(realm) = realm {
            challenge = challenge.param("realm", realm);
        }
        if let Some(code) = error.error_code() {
            challenge = challenge.param("error", code);
        }
        if let Some(description) = error.description() {
            challenge = challenge.param("error_description", description);
        }
        if let AuthError::InsufficientScope { required } = error {
            challenge = challenge.param("scope", required.join(" "));
        }
        Some(challenge.encode())
    }
}
