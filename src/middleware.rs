//! Tower middleware adapter.
//!
//! Bridges the validation pipeline onto `http` request/response types:
//! snapshots the request surface, runs the pipeline, and renders the
//! outcome. Verified claims land in the request extensions; failures
//! become status plus challenge, with the body written directly or
//! deferred to a surrounding error handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, StatusCode};
use tower::{Layer, Service};
use tracing::debug;
use url::Url;

use crate::challenge::Challenge;
use crate::error::AuthError;
use crate::options::AuthOptions;
use crate::pipeline::{RequestContext, ValidationPipeline};
use crate::provider::ProviderCache;

/// Largest form body the middleware buffers to read `access_token`.
const FORM_BODY_LIMIT: usize = 64 * 1024;

/// Tagged failure attached to deferred error responses.
///
/// Present in the response extensions when `handle_errors` is false, so
/// a surrounding handler can render the body the middleware withheld.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// The status the response carries.
    pub status: StatusCode,
    /// RFC 6750 `error` code, when one applies.
    pub error: Option<&'static str>,
    /// RFC 6750 `error_description`, when one applies.
    pub error_description: Option<String>,
}

/// Layer form of the authentication middleware.
///
/// Built by [`crate::ResourceServer::authenticate`]; one per route mount,
/// all sharing the server's provider cache.
#[derive(Clone)]
pub struct AuthLayer {
    providers: Arc<ProviderCache>,
    options: Arc<AuthOptions>,
    base_uri: Option<Url>,
}

impl AuthLayer {
    pub(crate) fn new(
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
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            providers: Arc::clone(&self.providers),
            options: Arc::clone(&self.options),
            base_uri: self.base_uri.clone(),
        }
    }
}

/// The authentication middleware service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    providers: Arc<ProviderCache>,
    options: Arc<AuthOptions>,
    base_uri: Option<Url>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let providers = Arc::clone(&self.providers);
        let options = Arc::clone(&self.options);
        let base_uri = self.base_uri.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (context, req) = match snapshot_request(req).await {
                Ok(pair) => pair,
                Err(error) => return Ok(error_response(&error, &options)),
            };

            let pipeline = ValidationPipeline::new(providers, Arc::clone(&options), base_uri);
            match pipeline.run(&context).await {
                Ok(Some(auth)) => {
                    let mut req = req;
                    req.extensions_mut().insert(auth);
                    inner.call(req).await
                }
                Ok(None) => inner.call(req).await,
                Err(error) => {
                    debug!(%error, "request rejected");
                    Ok(error_response(&error, &options))
                }
            }
        })
    }
}

/// Snapshots the request surface the pipeline consumes.
///
/// Form bodies are buffered so the `access_token` parameter can be read,
/// then restored for the downstream service.
async fn snapshot_request(
    req: Request<Body>,
) -> Result<(RequestContext, Request<Body>), AuthError> {
    let (parts, body) = req.into_parts();

    let header_string = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let authorization = header_string(header::AUTHORIZATION);
    let host = header_string(header::HOST);
    let content_type = header_string(header::CONTENT_TYPE);
    let dpop_proof = parts
        .headers
        .get("dpop")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let query_token = parts.uri.query().and_then(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "access_token")
            .map(|(_, value)| value.into_owned())
    });

    let form = content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("application/x-www-form-urlencoded"));
    let (body_token, body) = if form {
        let bytes = axum::body::to_bytes(body, FORM_BODY_LIMIT)
            .await
            .map_err(|err| AuthError::invalid_request(format!("Unreadable request body: {err}")))?;
        let token = url::form_urlencoded::parse(&bytes)
            .find(|(key, _)| key == "access_token")
            .map(|(_, value)| value.into_owned());
        (token, Body::from(bytes))
    } else {
        (None, body)
    };

    let context = RequestContext {
        method: parts.method.as_str().to_uppercase(),
        path: parts.uri.path().to_string(),
        host,
        authorization,
        dpop_proof,
        query_token,
        body_token,
        content_type,
    };
    Ok((context, Request::from_parts(parts, body)))
}

/// Renders a pipeline failure as an HTTP response.
///
/// Exactly one outcome per request: the body is written here, or the
/// tagged error rides the response extensions for a surrounding handler.
fn error_response(error: &AuthError, options: &AuthOptions) -> Response<Body> {
    let status = error.status();
    let mut builder = Response::builder().status(status);

    if let Some(challenge) = Challenge::for_error(error, options.realm.as_deref()) {
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            builder = builder.header(header::WWW_AUTHENTICATE, value);
        }
    }

    if options.handle_errors {
        match error.error_code() {
            Some(code) => {
                let payload = serde_json::json!({
                    "error": code,
                    "error_description": error.description(),
                });
                builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap_or_default()
            }
            None => builder.body(Body::empty()).unwrap_or_default(),
        }
    } else {
        let mut response = builder.body(Body::empty()).unwrap_or_default();
        response.extensions_mut().insert(ErrorContext {
            status,
            error: error.error_code(),
            error_description: error.description(),
        });
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_writes_challenge_and_body() {
        let options = AuthOptions::new().with_realm("api");
        let response = error_response(&AuthError::invalid_token("Access token is expired"), &options);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(challenge.starts_with("Bearer "));
        assert!(challenge.contains(r#"error="invalid_token""#));
    }

    #[test]
    fn test_bad_request_has_no_challenge() {
        let options = AuthOptions::new().with_realm("api");
        let response = error_response(&AuthError::invalid_request("x"), &options);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_deferred_errors_ride_extensions() {
        let options = AuthOptions::new().with_handle_errors(false);
        let response = error_response(&AuthError::invalid_token("bad"), &options);

        let context = response.extensions().get::<ErrorContext>().unwrap();
        assert_eq!(context.status, StatusCode::UNAUTHORIZED);
        assert_eq!(context.error, Some("invalid_token"));
        // The challenge is still the middleware's promise.
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_some());
    }
}
