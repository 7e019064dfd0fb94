//! Identity translation integration tests.
//!
//! Drives the full router with `tower::ServiceExt::oneshot`. The backend,
//! the JWKS endpoint and the metadata server are wiremock servers.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use gateway_test_utils::{
    jwks_url, mount_identity_failure, mount_identity_token, mount_jwks, TestKeypair,
    TestUserTokenBuilder, JWKS_PATH, METADATA_IDENTITY_PATH, TEST_AUDIENCE, TEST_ISSUER,
};
use http_body_util::BodyExt;
use identity_gateway::auth::{JwksClient, JwtUserTokenVerifier, UserTokenPayload, VerificationSettings};
use identity_gateway::config::{load_config, RawEnvironment};
use identity_gateway::errors::WWW_AUTHENTICATE_CHALLENGE;
use identity_gateway::handlers::ProxyState;
use identity_gateway::middleware::{
    translate_identity, AuthState, ServiceIdentityMode, UserIdentityMode,
};
use identity_gateway::routes;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BFF_AUDIENCE: &str = "https://bff.internal";
const MINTED_TOKEN: &str = "minted-service-token";

/// Backend that answers every request with 200.
async fn backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("backend-ok"))
        .mount(&server)
        .await;
    server
}

fn app_for(pairs: &[(&str, &str)]) -> Router {
    let env: RawEnvironment = pairs.iter().map(|(k, v)| (*k, *v)).collect();
    let (config, _) = load_config(&env).unwrap();
    routes::build_app(&config).unwrap()
}

fn request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri("/api/items?page=2");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Authorization headers the backend received, in arrival order.
async fn forwarded_authorization(server: &MockServer) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| {
            r.headers
                .get("authorization")
                .map(|v| v.to_str().unwrap().to_string())
        })
        .collect()
}

/// Production environment wired to the given collaborators.
fn production_env<'a>(
    backend: &'a str,
    jwks: &'a str,
    metadata: &'a str,
) -> Vec<(&'a str, &'a str)> {
    vec![
        ("NODE_ENV", "production"),
        ("BFF_BASE_URL", backend),
        ("BFF_AUDIENCE", BFF_AUDIENCE),
        ("JWT_JWKS_URI", jwks),
        ("JWT_ISSUER", TEST_ISSUER),
        ("JWT_AUDIENCE", TEST_AUDIENCE),
        ("FIREBASE_PROJECT_ID", "test-project"),
        ("GCE_METADATA_HOST", metadata),
    ]
}

// ============================================================================
// Development
// ============================================================================

#[tokio::test]
async fn test_development_defaults_forward_without_credentials() -> Result<()> {
    let backend = backend().await;
    let backend_uri = backend.uri();
    let app = app_for(&[("NODE_ENV", "development"), ("BFF_BASE_URL", backend_uri.as_str())]);

    let response = app.oneshot(request(None)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let received = backend.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url.path(), "/api/items");
    assert_eq!(received[0].url.query(), Some("page=2"));
    assert!(received[0].headers.get("authorization").is_none());

    Ok(())
}

#[tokio::test]
async fn test_development_mock_token_replaces_user_credential() -> Result<()> {
    let backend = backend().await;
    let backend_uri = backend.uri();
    let app = app_for(&[
        ("NODE_ENV", "development"),
        ("BFF_BASE_URL", backend_uri.as_str()),
        ("MOCK_SERVICE_TOKEN", "dev-service-token"),
    ]);

    let response = app.oneshot(request(Some("Bearer user-credential"))).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        forwarded_authorization(&backend).await,
        vec![Some("Bearer dev-service-token".to_string())]
    );

    Ok(())
}

#[tokio::test]
async fn test_development_skip_verification_still_mints_service_token() -> Result<()> {
    let backend = backend().await;
    let metadata = MockServer::start().await;
    mount_identity_token(&metadata, "aud-1", MINTED_TOKEN).await;

    let backend_uri = backend.uri();
    let metadata_uri = metadata.uri();
    let app = app_for(&[
        ("NODE_ENV", "development"),
        ("BFF_BASE_URL", backend_uri.as_str()),
        ("BFF_AUDIENCE", "aud-1"),
        ("SKIP_GOOGLE_AUTH", "false"),
        ("GCE_METADATA_HOST", metadata_uri.as_str()),
    ]);

    let response = app.oneshot(request(None)).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        forwarded_authorization(&backend).await,
        vec![Some(format!("Bearer {MINTED_TOKEN}"))]
    );

    Ok(())
}

#[tokio::test]
async fn test_mock_identity_reaches_inner_handler() -> Result<()> {
    let env: RawEnvironment = [
        ("NODE_ENV", "development"),
        ("MOCK_USER_SUB", "local-user"),
        ("MOCK_USER_EMAIL", "local@example.com"),
    ]
    .into_iter()
    .collect();
    let (config, _) = load_config(&env).unwrap();
    let auth = Arc::new(AuthState::from_config(&config).unwrap());

    let app = Router::new()
        .route(
            "/whoami",
            get(|Extension(user): Extension<UserTokenPayload>| async move {
                format!("{}|{}", user.sub, user.email.unwrap_or_default())
            }),
        )
        .layer(axum::middleware::from_fn_with_state(auth, translate_identity));

    let response = app
        .oneshot(Request::builder().uri("/whoami").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await?.to_bytes();
    assert_eq!(&bytes[..], b"local-user|local@example.com");

    Ok(())
}

// ============================================================================
// Production
// ============================================================================

#[tokio::test]
async fn test_production_valid_token_is_re_signed() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let metadata = MockServer::start().await;
    let keypair = TestKeypair::new(1, "idp-key-01");
    mount_jwks(&idp, vec![keypair.jwk_json()]).await;
    mount_identity_token(&metadata, BFF_AUDIENCE, MINTED_TOKEN).await;

    let backend_uri = backend.uri();
    let jwks = jwks_url(&idp);
    let metadata_uri = metadata.uri();
    let app = app_for(&production_env(&backend_uri, &jwks, &metadata_uri));

    let user_token = keypair.sign(&TestUserTokenBuilder::new().for_user("user-42").build());
    let response = app
        .oneshot(request(Some(&format!("Bearer {user_token}"))))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let forwarded = forwarded_authorization(&backend).await;
    assert_eq!(forwarded, vec![Some(format!("Bearer {MINTED_TOKEN}"))]);
    assert!(!forwarded[0].as_deref().unwrap().contains(&user_token));

    Ok(())
}

#[tokio::test]
async fn test_production_wrong_signer_is_rejected_before_minting() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let metadata = MockServer::start().await;
    let published = TestKeypair::new(1, "idp-key-01");
    let attacker = TestKeypair::new(2, "idp-key-01");
    mount_jwks(&idp, vec![published.jwk_json()]).await;
    Mock::given(method("GET"))
        .and(path(METADATA_IDENTITY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(MINTED_TOKEN))
        .expect(0)
        .mount(&metadata)
        .await;

    let backend_uri = backend.uri();
    let jwks = jwks_url(&idp);
    let metadata_uri = metadata.uri();
    let app = app_for(&production_env(&backend_uri, &jwks, &metadata_uri));

    let forged = attacker.sign(&TestUserTokenBuilder::new().build());
    let response = app
        .oneshot(request(Some(&format!("Bearer {forged}"))))
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        WWW_AUTHENTICATE_CHALLENGE
    );
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");
    assert!(backend.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_production_missing_header_is_rejected() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let metadata = MockServer::start().await;

    let backend_uri = backend.uri();
    let jwks = jwks_url(&idp);
    let metadata_uri = metadata.uri();
    let app = app_for(&production_env(&backend_uri, &jwks, &metadata_uri));

    let response = app.oneshot(request(None)).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Authorization header required");
    assert!(backend.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_production_malformed_header_is_rejected() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let metadata = MockServer::start().await;

    let backend_uri = backend.uri();
    let jwks = jwks_url(&idp);
    let metadata_uri = metadata.uri();
    let app = app_for(&production_env(&backend_uri, &jwks, &metadata_uri));

    let response = app.oneshot(request(Some("Basic dXNlcjpwYXNz"))).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["message"], "Invalid Authorization header format");

    Ok(())
}

#[tokio::test]
async fn test_production_minting_failure_is_bad_gateway() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let metadata = MockServer::start().await;
    let keypair = TestKeypair::new(1, "idp-key-01");
    mount_jwks(&idp, vec![keypair.jwk_json()]).await;
    mount_identity_failure(&metadata, 500).await;

    let backend_uri = backend.uri();
    let jwks = jwks_url(&idp);
    let metadata_uri = metadata.uri();
    let app = app_for(&production_env(&backend_uri, &jwks, &metadata_uri));

    let user_token = keypair.sign(&TestUserTokenBuilder::new().build());
    let response = app
        .oneshot(request(Some(&format!("Bearer {user_token}"))))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "TOKEN_GENERATION_FAILED");
    assert!(backend.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_production_jwks_outage_is_service_unavailable() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let metadata = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&idp)
        .await;

    let backend_uri = backend.uri();
    let jwks = jwks_url(&idp);
    let metadata_uri = metadata.uri();
    let app = app_for(&production_env(&backend_uri, &jwks, &metadata_uri));

    let user_token = TestKeypair::new(1, "idp-key-01").sign(&TestUserTokenBuilder::new().build());
    let response = app
        .oneshot(request(Some(&format!("Bearer {user_token}"))))
        .await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    Ok(())
}

// ============================================================================
// Key rotation
// ============================================================================

#[tokio::test]
async fn test_rotated_signing_key_is_picked_up() -> Result<()> {
    let backend = backend().await;
    let idp = MockServer::start().await;
    let old_key = TestKeypair::new(1, "idp-key-01");
    let new_key = TestKeypair::new(3, "idp-key-02");

    // First fetch sees only the old key; later fetches see both
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "keys": [old_key.jwk_json()] })),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&idp)
        .await;
    mount_jwks(&idp, vec![old_key.jwk_json(), new_key.jwk_json()]).await;

    let jwks = Arc::new(
        JwksClient::new(Url::parse(&jwks_url(&idp))?).with_min_refresh_interval(Duration::ZERO),
    );
    let verifier = JwtUserTokenVerifier::new(
        VerificationSettings::new(TEST_ISSUER, TEST_AUDIENCE),
        None,
        Some(jwks),
    )?;
    let auth = Arc::new(AuthState::new(
        UserIdentityMode::Verify(Arc::new(verifier)),
        ServiceIdentityMode::Mock(None),
    ));
    let proxy = Arc::new(ProxyState::new(Url::parse(&backend.uri())?, false));
    let app = routes::build_routes(auth, proxy, &Default::default());

    let before = old_key.sign(&TestUserTokenBuilder::new().build());
    let response = app
        .clone()
        .oneshot(request(Some(&format!("Bearer {before}"))))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let after = new_key.sign(&TestUserTokenBuilder::new().build());
    let response = app
        .oneshot(request(Some(&format!("Bearer {after}"))))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(backend.received_requests().await.unwrap().len(), 2);

    Ok(())
}
