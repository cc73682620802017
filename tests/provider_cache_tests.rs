//! Provider cache behaviour: single-flight, rotation, serialization.

mod common;

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use futures::future::join_all;
use serde_json::json;

use common::{rsa_public_jwk, start_provider};
use oauth2_resource_server::{ProviderCache, ResolveError, ResourceServer};

#[tokio::test]
async fn test_resolve_discovers_and_caches() {
    let provider = start_provider(json!({"keys": [rsa_public_jwk()]})).await;
    let cache = ProviderCache::new();

    let entry = cache.resolve(&provider.issuer).await.unwrap();
    assert_eq!(entry.metadata.issuer, provider.issuer);
    assert_eq!(entry.jwks.keys.len(), 1);
    assert_eq!(provider.discovery_count(), 1);
    assert_eq!(provider.jwks_count(), 1);

    // Second resolution is served from the cache.
    cache.resolve(&provider.issuer).await.unwrap();
    assert_eq!(provider.discovery_count(), 1);
    assert_eq!(provider.jwks_count(), 1);
}

#[tokio::test]
async fn test_concurrent_resolutions_single_flight() {
    let provider = start_provider(json!({"keys": [rsa_public_jwk()]})).await;
    let cache = Arc::new(ProviderCache::new());

    let resolutions = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        let issuer = provider.issuer.clone();
        tokio::spawn(async move { cache.resolve(&issuer).await })
    });
    let results = join_all(resolutions).await;

    for result in results {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(provider.discovery_count(), 1);
    assert_eq!(provider.jwks_count(), 1);
}

#[tokio::test]
async fn test_rotation_swaps_atomically_and_keeps_old_snapshots() {
    let provider = start_provider(json!({"keys": [rsa_public_jwk()]})).await;
    let cache = ProviderCache::new();

    let before = cache.resolve(&provider.issuer).await.unwrap();
    assert_eq!(before.jwks.keys[0].kid.as_deref(), Some("k1"));

    let mut rotated = rsa_public_jwk();
    rotated["kid"] = json!("k2");
    *provider.jwks.write().await = json!({"keys": [rotated]});

    let after = cache.rotate(&provider.issuer).await.unwrap();
    assert_eq!(after.jwks.keys[0].kid.as_deref(), Some("k2"));

    // The reader holding the previous snapshot is undisturbed.
    assert_eq!(before.jwks.keys[0].kid.as_deref(), Some("k1"));

    // The swapped entry is what subsequent resolutions observe.
    let resolved = cache.resolve(&provider.issuer).await.unwrap();
    assert_eq!(resolved.jwks.keys[0].kid.as_deref(), Some("k2"));

    // Rotation reuses the cached discovery document.
    assert_eq!(provider.discovery_count(), 1);
    assert_eq!(provider.jwks_count(), 2);
}

#[tokio::test]
async fn test_serialized_cache_answers_without_network() {
    let provider = start_provider(json!({"keys": [rsa_public_jwk()]})).await;
    let server = ResourceServer::new();
    server.providers().resolve(&provider.issuer).await.unwrap();

    let serialized = server.serialize();
    let json_form = serde_json::to_string(&serialized).unwrap();

    // The provider goes away entirely; the restored server still answers.
    provider.shutdown();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let restored = ResourceServer::from_serialized(serde_json::from_str(&json_form).unwrap());
    let entry = restored.providers().resolve(&provider.issuer).await.unwrap();
    assert_eq!(entry.metadata.issuer, provider.issuer);
    assert_eq!(entry.jwks.keys[0].kid.as_deref(), Some("k1"));
}

#[tokio::test]
async fn test_unreachable_provider_is_a_network_error() {
    let cache = ProviderCache::new();
    let err = cache.resolve("http://127.0.0.1:1").await.unwrap_err();
    assert!(matches!(err, ResolveError::Network { .. }));
}

#[tokio::test]
async fn test_missing_discovery_document_is_a_status_error() {
    let provider = start_provider(json!({"keys": []})).await;
    // A nested path the provider does not serve.
    let issuer = format!("{}/tenants/none", provider.issuer);

    let cache = ProviderCache::new();
    let err = cache.resolve(&issuer).await.unwrap_err();
    assert!(matches!(err, ResolveError::DiscoveryStatus { status: 404 }));
}

#[tokio::test]
async fn test_discovery_without_jwks_uri_rejected() {
    // A provider whose discovery document omits jwks_uri.
    async fn bare_discovery() -> Json<serde_json::Value> {
        Json(json!({"issuer": "https://bare.test"}))
    }
    let app = Router::new().route("/.well-known/openid-configuration", get(bare_discovery));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let issuer = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let cache = ProviderCache::new();
    let err = cache.resolve(&issuer).await.unwrap_err();
    assert!(matches!(err, ResolveError::MissingJwksUri));
}
