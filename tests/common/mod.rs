//! Shared test helpers: a mock OIDC provider and token minting.
//!
//! The provider is a lightweight axum server on an ephemeral port serving
//! a discovery document and a mutable JWKS, with per-endpoint hit
//! counters. Tokens are signed with fixture keys: RSA-2048 for access
//! tokens, EC P-256 for DPoP proofs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::json;
use tokio::sync::RwLock;

use oauth2_resource_server::dpop::JwkThumbprint;
use oauth2_resource_server::Jwk;

/// A running mock provider.
pub struct MockProvider {
    /// Issuer URL (`http://127.0.0.1:<port>`).
    pub issuer: String,
    /// The JWKS document currently served; swap it to simulate rotation.
    pub jwks: Arc<RwLock<serde_json::Value>>,
    /// Discovery endpoint hit count.
    pub discovery_hits: Arc<AtomicUsize>,
    /// JWKS endpoint hit count.
    pub jwks_hits: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockProvider {
    pub fn discovery_count(&self) -> usize {
        self.discovery_hits.load(Ordering::SeqCst)
    }

    pub fn jwks_count(&self) -> usize {
        self.jwks_hits.load(Ordering::SeqCst)
    }

    /// Stops the server, so later fetches fail.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

#[derive(Clone)]
struct ProviderState {
    issuer: String,
    jwks: Arc<RwLock<serde_json::Value>>,
    discovery_hits: Arc<AtomicUsize>,
    jwks_hits: Arc<AtomicUsize>,
}

async fn discovery_document(State(state): State<ProviderState>) -> Json<serde_json::Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "issuer": state.issuer,
        "jwks_uri": format!("{}/jwks.json", state.issuer),
    }))
}

async fn jwks_document(State(state): State<ProviderState>) -> Json<serde_json::Value> {
    state.jwks_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.jwks.read().await.clone())
}

/// Starts a mock provider serving the given JWKS document.
pub async fn start_provider(initial_jwks: serde_json::Value) -> MockProvider {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let issuer = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    let state = ProviderState {
        issuer: issuer.clone(),
        jwks: Arc::new(RwLock::new(initial_jwks)),
        discovery_hits: Arc::new(AtomicUsize::new(0)),
        jwks_hits: Arc::new(AtomicUsize::new(0)),
    };

    let app = Router::new()
        .route("/.well-known/openid-configuration", get(discovery_document))
        .route("/jwks.json", get(jwks_document))
        .with_state(state.clone());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProvider {
        issuer,
        jwks: state.jwks,
        discovery_hits: state.discovery_hits,
        jwks_hits: state.jwks_hits,
        handle,
    }
}

/// Fixture RSA-2048 signing key (test-only).
pub fn rsa_encoding_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(include_bytes!("../fixtures/rsa_private.pem")).unwrap()
}

/// Public JWK for the fixture RSA key, `kid: "k1"`.
pub fn rsa_public_jwk() -> serde_json::Value {
    serde_json::from_str(include_str!("../fixtures/rsa_public.jwk.json")).unwrap()
}

/// Fixture EC P-256 signing key for DPoP proofs (test-only).
pub fn ec_encoding_key() -> EncodingKey {
    EncodingKey::from_ec_pem(include_bytes!("../fixtures/ec_private.pem")).unwrap()
}

/// Public JWK for the fixture EC key.
pub fn ec_public_jwk() -> serde_json::Value {
    serde_json::from_str(include_str!("../fixtures/ec_public.jwk.json")).unwrap()
}

/// RFC 7638 thumbprint of the fixture EC key, for `cnf.jkt` claims.
pub fn ec_jkt() -> String {
    let jwk: Jwk = serde_json::from_value(ec_public_jwk()).unwrap();
    JwkThumbprint::compute(&jwk)
}

/// Signs an RS256 access token with the fixture RSA key.
pub fn sign_access_token(claims: &serde_json::Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    jsonwebtoken::encode(&header, claims, &rsa_encoding_key()).unwrap()
}

/// Signs an ES256 DPoP proof with the fixture EC key embedded as `jwk`.
pub fn sign_dpop_proof(claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::ES256);
    header.typ = Some("dpop+jwt".to_string());
    header.jwk = Some(serde_json::from_value(ec_public_jwk()).unwrap());
    jsonwebtoken::encode(&header, claims, &ec_encoding_key()).unwrap()
}
