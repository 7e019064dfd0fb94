//! Service identity token minting.
//!
//! The gateway's own identity is proven to the backend with a short-lived
//! token minted per request by the Google metadata server. Tokens are not
//! cached: every forwarded request carries a fresh one.

use crate::errors::GatewayError;
use async_trait::async_trait;
use common::secret::SecretString;
use std::time::Duration;
use tracing::instrument;
use url::Url;

const IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Mints a service identity token scoped to an audience.
#[async_trait]
pub trait ServiceTokenGenerator: Send + Sync {
    /// # Errors
    ///
    /// `GatewayError::TokenGeneration` if no token could be minted.
    async fn generate_id_token(&self, audience: &str) -> Result<SecretString, GatewayError>;
}

/// [`ServiceTokenGenerator`] backed by the Google metadata server.
pub struct MetadataServiceTokenGenerator {
    identity_url: Url,
    http_client: reqwest::Client,
}

impl MetadataServiceTokenGenerator {
    /// Create a generator for `metadata_host`.
    ///
    /// `metadata_host` is a `host[:port]` as in `GCE_METADATA_HOST`; a full
    /// `http(s)://` base URL is also accepted.
    ///
    /// # Errors
    ///
    /// `GatewayError::Internal` if the host does not form a valid URL.
    pub fn new(metadata_host: &str) -> Result<Self, GatewayError> {
        let base = if metadata_host.starts_with("http://") || metadata_host.starts_with("https://")
        {
            metadata_host.trim_end_matches('/').to_string()
        } else {
            format!("http://{metadata_host}")
        };

        let identity_url = Url::parse(&format!("{base}{IDENTITY_PATH}")).map_err(|e| {
            tracing::error!(target: "gw.auth.service_token", error = %e, "Invalid metadata host");
            GatewayError::Internal
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gw.auth.service_token", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Ok(Self {
            identity_url,
            http_client,
        })
    }

    pub fn identity_url(&self) -> &Url {
        &self.identity_url
    }
}

#[async_trait]
impl ServiceTokenGenerator for MetadataServiceTokenGenerator {
    #[instrument(skip(self))]
    async fn generate_id_token(&self, audience: &str) -> Result<SecretString, GatewayError> {
        let response = self
            .http_client
            .get(self.identity_url.clone())
            .query(&[("audience", audience), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gw.auth.service_token", error = %e, "Metadata server unreachable");
                GatewayError::TokenGeneration(format!("metadata server unreachable: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: "gw.auth.service_token",
                status = %status,
                "Metadata server refused to mint identity token"
            );
            return Err(GatewayError::TokenGeneration(format!(
                "metadata server returned {status}"
            )));
        }

        let body = response.text().await.map_err(|e| {
            tracing::error!(target: "gw.auth.service_token", error = %e, "Failed to read identity token");
            GatewayError::TokenGeneration("failed to read identity token".to_string())
        })?;

        let token = body.trim();
        if token.is_empty() {
            tracing::error!(target: "gw.auth.service_token", "Metadata server returned an empty token");
            return Err(GatewayError::TokenGeneration(
                "metadata server returned an empty token".to_string(),
            ));
        }

        tracing::debug!(target: "gw.auth.service_token", audience = %audience, "Service token minted");
        Ok(SecretString::from(token.to_string()))
    }
}
