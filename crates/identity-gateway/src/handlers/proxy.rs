//! Forwarding handler.
//!
//! Sends the translated request to the backend with the same method, path,
//! query and body, and relays the backend's response. Hop-by-hop headers and
//! `Host` are not forwarded in either direction.

use crate::errors::GatewayError;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Largest request body the gateway buffers before forwarding.
pub const MAX_FORWARD_BODY_BYTES: usize = 32 * 1024 * 1024;

static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

/// Backend target and the client used to reach it.
pub struct ProxyState {
    target: Url,
    http_client: reqwest::Client,
    log_body_sizes: bool,
}

impl ProxyState {
    pub fn new(target: Url, log_body_sizes: bool) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gw.proxy", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            target,
            http_client,
            log_body_sizes,
        }
    }

    /// Backend URL for a request path and query.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.target.clone();
        let base = self.target.path().trim_end_matches('/');
        url.set_path(&format!("{base}{path}"));
        url.set_query(query);
        url
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded
}

/// Forward the request to the backend.
#[instrument(skip_all, fields(method = %req.method(), path = %req.uri().path()))]
pub async fn forward(
    State(state): State<Arc<ProxyState>>,
    req: Request,
) -> Result<Response, GatewayError> {
    let (parts, body) = req.into_parts();
    let url = state.upstream_url(parts.uri.path(), parts.uri.query());

    let body = to_bytes(body, MAX_FORWARD_BODY_BYTES).await.map_err(|e| {
        tracing::debug!(target: "gw.proxy", error = %e, "Failed to read request body");
        GatewayError::Upstream("request body could not be read".to_string())
    })?;

    if state.log_body_sizes {
        tracing::debug!(target: "gw.proxy", request_body_bytes = body.len(), "Forwarding request body");
    }

    let upstream = state
        .http_client
        .request(parts.method, url)
        .headers(strip_hop_by_hop(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(target: "gw.proxy", error = %e, "Backend request failed");
            GatewayError::Upstream(format!("backend request failed: {e}"))
        })?;

    let status = upstream.status();
    let headers = strip_hop_by_hop(upstream.headers());
    let bytes = upstream.bytes().await.map_err(|e| {
        tracing::warn!(target: "gw.proxy", error = %e, "Failed to read backend response");
        GatewayError::Upstream(format!("backend response unreadable: {e}"))
    })?;

    if state.log_body_sizes {
        tracing::debug!(target: "gw.proxy", response_body_bytes = bytes.len(), status = %status, "Relaying response body");
    }

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
