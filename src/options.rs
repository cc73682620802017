//! Per-route authentication options and policy filters.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::credential::Audience;

/// A policy filter over one claim.
///
/// The shape is fixed when options are built; the pipeline never probes
/// it at runtime.
#[derive(Clone)]
pub enum Filter {
    /// Membership in a fixed list. For list-valued `aud` claims the test
    /// is non-empty intersection.
    List(Vec<String>),
    /// Arbitrary predicate, invoked with the raw claim value.
    Predicate(Arc<dyn Fn(&Value) -> bool + Send + Sync>),
}

impl Filter {
    /// A list filter.
    pub fn list<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// A predicate filter.
    pub fn predicate(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Applies the filter to a scalar claim (`iss`, `sub`).
    pub(crate) fn matches_scalar(&self, claim: &str) -> bool {
        match self {
            Self::List(values) => values.iter().any(|v| v == claim),
            Self::Predicate(f) => f(&Value::String(claim.to_string())),
        }
    }

    /// Applies the filter to the `aud` claim, whatever its shape.
    pub(crate) fn matches_audience(&self, aud: &Audience) -> bool {
        match self {
            Self::List(values) => aud.values().iter().any(|a| values.iter().any(|v| v == a)),
            Self::Predicate(f) => f(&serde_json::to_value(aud).unwrap_or(Value::Null)),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(values) => f.debug_tuple("List").field(values).finish(),
            Self::Predicate(_) => f.debug_tuple("Predicate").finish(),
        }
    }
}

impl<S: Into<String>> From<Vec<S>> for Filter {
    fn from(values: Vec<S>) -> Self {
        Self::list(values)
    }
}

/// Filters over the issuer, audience and subject claims.
///
/// An unset member skips (allow) or never matches (deny).
#[derive(Clone, Debug, Default)]
pub struct FilterSet {
    /// Filter over the `iss` claim.
    pub issuers: Option<Filter>,
    /// Filter over the `aud` claim.
    pub audience: Option<Filter>,
    /// Filter over the `sub` claim.
    pub subjects: Option<Filter>,
}

impl FilterSet {
    /// An empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the issuer filter.
    pub fn issuers(mut self, filter: impl Into<Filter>) -> Self {
        self.issuers = Some(filter.into());
        self
    }

    /// Sets the audience filter.
    pub fn audience(mut self, filter: impl Into<Filter>) -> Self {
        self.audience = Some(filter.into());
        self
    }

    /// Sets the subject filter.
    pub fn subjects(mut self, filter: impl Into<Filter>) -> Self {
        self.subjects = Some(filter.into());
        self
    }
}

/// Options for one authenticated route mount. All optional.
#[derive(Clone, Debug)]
pub struct AuthOptions {
    /// `realm` parameter echoed in challenges.
    pub realm: Option<String>,
    /// Scopes the route requires; empty skips the scope check.
    pub scopes: Vec<String>,
    /// Allowlist filters.
    pub allow: Option<FilterSet>,
    /// Denylist filters.
    pub deny: Option<FilterSet>,
    /// Permit `?access_token=` credentials. Off by default per
    /// RFC 6750 §2.3.
    pub query: bool,
    /// Allow unauthenticated requests through.
    pub optional: bool,
    /// Write the error body directly. When false the body is deferred to
    /// a surrounding error handler.
    pub handle_errors: bool,
    /// Additionally publish the decoded JWT under this extension key.
    pub token_property: Option<String>,
    /// Extension key the verified claims are published under.
    pub claims_property: String,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            realm: None,
            scopes: Vec::new(),
            allow: None,
            deny: None,
            query: false,
            optional: false,
            handle_errors: true,
            token_property: None,
            claims_property: "claims".to_string(),
        }
    }
}

impl AuthOptions {
    /// Options with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the challenge realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Sets the required scopes.
    pub fn with_scopes<I>(mut self, scopes: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the allowlist filters.
    pub fn with_allow(mut self, allow: FilterSet) -> Self {
        self.allow = Some(allow);
        self
    }

    /// Sets the denylist filters.
    pub fn with_deny(mut self, deny: FilterSet) -> Self {
        self.deny = Some(deny);
        self
    }

    /// Permits query-string credentials.
    pub fn with_query(mut self, query: bool) -> Self {
        self.query = query;
        self
    }

    /// Allows unauthenticated pass-through.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Controls whether the middleware writes the error body itself.
    pub fn with_handle_errors(mut self, handle_errors: bool) -> Self {
        self.handle_errors = handle_errors;
        self
    }

    /// Publishes the decoded JWT under the given extension key.
    pub fn with_token_property(mut self, name: impl Into<String>) -> Self {
        self.token_property = Some(name.into());
        self
    }

    /// Changes the extension key the claims are published under.
    pub fn with_claims_property(mut self, name: impl Into<String>) -> Self {
        self.claims_property = name.into();
        self
    }
}
