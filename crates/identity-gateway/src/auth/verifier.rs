//! End-user token verification.
//!
//! Verifies signature, issuer, audience and expiry of an inbound bearer token
//! against a static public key or a key resolved from the JWKS by `kid`.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 and EdDSA are accepted, and the key type must match `alg`
//! - `iat` is validated with clock skew tolerance
//! - Every rejection carries the same generic message

use crate::auth::claims::{UserClaims, UserTokenPayload};
use crate::auth::jwks::{Jwk, JwksClient};
use crate::auth::AuthSetupError;
use crate::errors::GatewayError;
use async_trait::async_trait;
use common::jwt::{
    decode_ed25519_public_key_jwk, decode_ed25519_public_key_pem, decode_header, validate_iat,
    DEFAULT_CLOCK_SKEW,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Default tolerance applied to `exp`.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(60);

/// Verifies an inbound end-user token.
#[async_trait]
pub trait UserTokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// `GatewayError::Authentication` when the token is rejected;
    /// `GatewayError::KeySetUnavailable` when keys cannot be fetched.
    async fn verify(&self, token: &str) -> Result<UserTokenPayload, GatewayError>;
}

/// Claims every accepted token must match.
#[derive(Debug, Clone)]
pub struct VerificationSettings {
    pub issuer: String,
    pub audience: String,
    pub leeway: Duration,
    pub clock_skew: Duration,
}

impl VerificationSettings {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway: DEFAULT_LEEWAY,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// Statically configured verification key.
#[derive(Clone)]
pub struct StaticKey {
    algorithm: Algorithm,
    key: DecodingKey,
}

impl StaticKey {
    /// Parses an RSA or Ed25519 public key.
    ///
    /// Accepts an RSA PEM, an Ed25519 SPKI PEM, or a bare Ed25519 key in
    /// base64 (with or without PEM armor).
    ///
    /// # Errors
    ///
    /// `AuthSetupError::InvalidPublicKey` if none of the forms match.
    pub fn parse(raw: &str) -> Result<Self, AuthSetupError> {
        let pem = raw.trim().replace("\\n", "\n");

        if let Ok(key) = DecodingKey::from_rsa_pem(pem.as_bytes()) {
            return Ok(Self {
                algorithm: Algorithm::RS256,
                key,
            });
        }
        if let Ok(key) = DecodingKey::from_ed_pem(pem.as_bytes()) {
            return Ok(Self {
                algorithm: Algorithm::EdDSA,
                key,
            });
        }
        match decode_ed25519_public_key_pem(&pem) {
            Ok(bytes) if bytes.len() == 32 => Ok(Self {
                algorithm: Algorithm::EdDSA,
                key: DecodingKey::from_ed_der(&bytes),
            }),
            _ => Err(AuthSetupError::InvalidPublicKey),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// JWT verifier backed by a static key, a JWKS, or both.
///
/// Tokens with a `kid` are resolved through the JWKS when one is configured;
/// tokens without one (or when no JWKS is configured) use the static key.
pub struct JwtUserTokenVerifier {
    settings: VerificationSettings,
    static_key: Option<StaticKey>,
    jwks_client: Option<Arc<JwksClient>>,
}

impl JwtUserTokenVerifier {
    /// # Errors
    ///
    /// `AuthSetupError::NoKeyMaterial` if neither a static key nor a JWKS
    /// client is supplied.
    pub fn new(
        settings: VerificationSettings,
        static_key: Option<StaticKey>,
        jwks_client: Option<Arc<JwksClient>>,
    ) -> Result<Self, AuthSetupError> {
        if static_key.is_none() && jwks_client.is_none() {
            return Err(AuthSetupError::NoKeyMaterial);
        }
        Ok(Self {
            settings,
            static_key,
            jwks_client,
        })
    }

    async fn resolve_key(
        &self,
        kid: Option<&str>,
        algorithm: Algorithm,
    ) -> Result<DecodingKey, GatewayError> {
        if let (Some(kid), Some(jwks)) = (kid, self.jwks_client.as_ref()) {
            let jwk = jwks.get_key(kid).await?;
            return decoding_key_from_jwk(&jwk, algorithm);
        }

        match &self.static_key {
            Some(key) if key.algorithm == algorithm => Ok(key.key.clone()),
            Some(key) => {
                tracing::debug!(
                    target: "gw.auth.verifier",
                    token_alg = ?algorithm,
                    key_alg = ?key.algorithm,
                    "Token algorithm does not match static key"
                );
                Err(GatewayError::invalid_token())
            }
            None => {
                tracing::debug!(target: "gw.auth.verifier", "Token has no kid and no static key is configured");
                Err(GatewayError::invalid_token())
            }
        }
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[self.settings.issuer.as_str()]);
        validation.set_audience(&[self.settings.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.settings.leeway.as_secs();
        validation.validate_exp = true;
        validation
    }
}

#[async_trait]
impl UserTokenVerifier for JwtUserTokenVerifier {
    /// Verify a token and return the identity it carries.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Algorithm allow-list (RS256, EdDSA)
    /// 3. Key resolution by `kid` (JWKS) or static key
    /// 4. Signature, `iss`, `aud`, `exp` (with leeway)
    /// 5. `iat` with clock skew tolerance
    #[instrument(skip_all)]
    async fn verify(&self, token: &str) -> Result<UserTokenPayload, GatewayError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "gw.auth.verifier", error = ?e, "Token header rejected");
            GatewayError::invalid_token()
        })?;

        let algorithm = match header.alg.as_str() {
            "RS256" => Algorithm::RS256,
            "EdDSA" => Algorithm::EdDSA,
            other => {
                tracing::debug!(target: "gw.auth.verifier", alg = %other, "Unsupported token algorithm");
                return Err(GatewayError::invalid_token());
            }
        };

        let kid = header.kid.as_deref().filter(|k| !k.is_empty());
        let key = self.resolve_key(kid, algorithm).await?;

        let token_data =
            decode::<UserClaims>(token, &key, &self.validation(algorithm)).map_err(|e| {
                tracing::debug!(target: "gw.auth.verifier", error = %e, "Token verification failed");
                GatewayError::invalid_token()
            })?;

        if let Some(iat) = token_data.claims.iat {
            if let Err(e) = validate_iat(iat, self.settings.clock_skew) {
                tracing::debug!(target: "gw.auth.verifier", error = ?e, "Token iat validation failed");
                return Err(GatewayError::invalid_token());
            }
        }

        tracing::debug!(target: "gw.auth.verifier", "Token verified");
        Ok(token_data.claims.into())
    }
}

/// Build a decoding key from a JWK, checking it matches the token's `alg`.
fn decoding_key_from_jwk(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, GatewayError> {
    if let Some(alg) = &jwk.alg {
        let matches = matches!(
            (alg.as_str(), algorithm),
            ("RS256", Algorithm::RS256) | ("EdDSA", Algorithm::EdDSA)
        );
        if !matches {
            tracing::warn!(target: "gw.auth.verifier", kid = %jwk.kid, jwk_alg = %alg, "JWK algorithm does not match token");
            return Err(GatewayError::invalid_token());
        }
    }

    match (jwk.kty.as_str(), algorithm) {
        ("RSA", Algorithm::RS256) => {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                tracing::error!(target: "gw.auth.verifier", kid = %jwk.kid, "RSA JWK missing n or e");
                return Err(GatewayError::invalid_token());
            };
            DecodingKey::from_rsa_components(n, e).map_err(|e| {
                tracing::error!(target: "gw.auth.verifier", kid = %jwk.kid, error = %e, "Invalid RSA JWK");
                GatewayError::invalid_token()
            })
        }
        ("OKP", Algorithm::EdDSA) => {
            if jwk.crv.as_deref().is_some_and(|crv| crv != "Ed25519") {
                tracing::warn!(target: "gw.auth.verifier", kid = %jwk.kid, "Unsupported OKP curve");
                return Err(GatewayError::invalid_token());
            }
            let x = jwk.x.as_deref().ok_or_else(|| {
                tracing::error!(target: "gw.auth.verifier", kid = %jwk.kid, "JWK missing x field");
                GatewayError::invalid_token()
            })?;
            let bytes = decode_ed25519_public_key_jwk(x).map_err(|e| {
                tracing::error!(target: "gw.auth.verifier", error = %e, "Invalid public key encoding");
                GatewayError::invalid_token()
            })?;
            Ok(DecodingKey::from_ed_der(&bytes))
        }
        (kty, _) => {
            tracing::warn!(target: "gw.auth.verifier", kid = %jwk.kid, kty = %kty, "JWK key type does not match token algorithm");
            Err(GatewayError::invalid_token())
        }
    }
}
