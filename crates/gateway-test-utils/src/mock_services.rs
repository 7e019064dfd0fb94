//! Wiremock helpers for the gateway's HTTP collaborators.
//!
//! - A JWKS endpoint serving public keys
//! - A Google metadata server minting identity tokens

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the JWKS mock is served on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Identity-token path on the metadata server.
pub const METADATA_IDENTITY_PATH: &str =
    "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Full JWKS URL for a mock server.
pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}

/// Serve `keys` as a JWKS document.
pub async fn mount_jwks(server: &MockServer, keys: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "keys": keys })))
        .mount(server)
        .await;
}

/// Mint `token` for requests that carry `Metadata-Flavor: Google` and ask
/// for `audience`.
pub async fn mount_identity_token(server: &MockServer, audience: &str, token: &str) {
    Mock::given(method("GET"))
        .and(path(METADATA_IDENTITY_PATH))
        .and(header("Metadata-Flavor", "Google"))
        .and(query_param("audience", audience))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_string(token))
        .mount(server)
        .await;
}

/// Fail every identity-token request with `status`.
pub async fn mount_identity_failure(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path(METADATA_IDENTITY_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
