//! JWKS client for fetching and caching the identity provider's public keys.
//!
//! Keys are cached by `kid` with a TTL. A token signed with an unseen `kid`
//! (the provider rotated its keys) triggers a refresh, rate-limited so that
//! random `kid` values cannot force a fetch per request.
//!
//! # Concurrency
//!
//! The cache lock is never held across the network fetch. Concurrent misses
//! may both refresh; the last writer wins and both observe a complete key set.
//!
//! A failed fetch is remembered separately from the last successful one.
//! Until the minimum refresh interval has passed, further lookups that would
//! need the network fail fast with `KeySetUnavailable`.

use crate::errors::GatewayError;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;
use url::Url;

/// Default cache TTL in seconds (5 minutes).
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Default minimum spacing between miss-driven refreshes.
const DEFAULT_MIN_REFRESH_INTERVAL_SECONDS: u64 = 10;

/// JSON Web Key from a JWKS endpoint.
///
/// Covers RSA keys (`n`, `e`) and OKP/Ed25519 keys (`crv`, `x`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type: `RSA` or `OKP`.
    pub kty: String,

    /// Key ID. Keys without one can never be selected and are skipped.
    #[serde(default)]
    pub kid: String,

    #[serde(default)]
    pub crv: Option<String>,

    /// Ed25519 public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
    expires_at: Instant,
}

/// Thread-safe JWKS client.
pub struct JwksClient {
    jwks_url: Url,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    last_failed_fetch: Mutex<Option<Instant>>,
    cache_ttl: Duration,
    min_refresh_interval: Duration,
}

impl JwksClient {
    pub fn new(jwks_url: Url) -> Self {
        Self::with_ttl(jwks_url, Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS))
    }

    /// Create a client with a custom cache TTL.
    pub fn with_ttl(jwks_url: Url, cache_ttl: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "gw.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            last_failed_fetch: Mutex::new(None),
            cache_ttl,
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_INTERVAL_SECONDS),
        }
    }

    /// Set the minimum spacing between refreshes triggered by an unknown `kid`,
    /// and between retries after a failed fetch.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Get a JWK by key ID.
    ///
    /// Serves from cache when possible. Refreshes when the cache is empty or
    /// expired, or when `kid` is unknown and the last fetch is older than the
    /// minimum refresh interval. No fetch is attempted within that interval
    /// of a failed one.
    ///
    /// # Errors
    ///
    /// - `GatewayError::KeySetUnavailable` if the JWKS cannot be fetched or a
    ///   recent fetch failed.
    /// - `GatewayError::Authentication` if `kid` is not in the key set.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, GatewayError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Instant::now();
                if cached.expires_at > now {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "gw.auth.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    if now.duration_since(cached.fetched_at) < self.min_refresh_interval {
                        tracing::debug!(
                            target: "gw.auth.jwks",
                            kid = %kid,
                            "Unknown key ID, refresh suppressed by rate limit"
                        );
                        return Err(GatewayError::invalid_token());
                    }
                    tracing::debug!(target: "gw.auth.jwks", kid = %kid, "Unknown key ID, refreshing JWKS");
                }
            }
        }

        self.check_retry_backoff().await?;

        let keys = match self.fetch_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                *self.last_failed_fetch.lock().await = Some(Instant::now());
                return Err(e);
            }
        };
        let found = keys.get(kid).cloned();
        self.install(keys).await;

        found.ok_or_else(|| {
            tracing::warn!(target: "gw.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
            GatewayError::invalid_token()
        })
    }

    async fn check_retry_backoff(&self) -> Result<(), GatewayError> {
        let last_failed = *self.last_failed_fetch.lock().await;
        match last_failed {
            Some(at) if at.elapsed() < self.min_refresh_interval => {
                tracing::debug!(target: "gw.auth.jwks", "JWKS fetch suppressed after recent failure");
                Err(GatewayError::KeySetUnavailable(
                    "JWKS endpoint recently failed".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn install(&self, keys: HashMap<String, Jwk>) {
        *self.last_failed_fetch.lock().await = None;
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: now,
            expires_at: now + self.cache_ttl,
        });
    }

    #[instrument(skip(self))]
    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, GatewayError> {
        tracing::debug!(target: "gw.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(self.jwks_url.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "gw.auth.jwks", error = %e, "Failed to fetch JWKS");
                GatewayError::KeySetUnavailable(format!("JWKS fetch failed: {e}"))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "gw.auth.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(GatewayError::KeySetUnavailable(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "gw.auth.jwks", error = %e, "Failed to parse JWKS response");
            GatewayError::KeySetUnavailable("JWKS response is not a valid key set".to_string())
        })?;

        let keys: HashMap<String, Jwk> = jwks
            .keys
            .into_iter()
            .filter(|key| !key.kid.is_empty())
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::info!(
            target: "gw.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        Ok(keys)
    }
}
