//! Identity translation middleware.
//!
//! Runs the two-phase pipeline on every request:
//!
//! ```text
//! InboundRequest --verify_user--> VerifiedRequest --attach_service_identity--> ForwardRequest
//!   (end-user token)                (identity)                                  (service token)
//! ```
//!
//! The end-user `Authorization` value is consumed in Phase 1 and is not
//! reachable from a `ForwardRequest`, so it can never be forwarded. The
//! request is only mutated after both phases succeed.

use crate::auth::{
    AuthSetupError, JwksClient, JwtUserTokenVerifier, MetadataServiceTokenGenerator,
    ServiceTokenGenerator, StaticKey, UserTokenPayload, UserTokenVerifier, VerificationSettings,
};
use crate::config::{DevelopmentConfig, ProductionConfig, ValidatedAppConfig};
use crate::errors::GatewayError;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use common::jwt::parse_bearer;
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// How Phase 1 establishes the end-user identity.
#[derive(Clone)]
pub enum UserIdentityMode {
    /// Verify the bearer token.
    Verify(Arc<dyn UserTokenVerifier>),

    /// Attach a fixed identity without looking at the request.
    Mock(UserTokenPayload),
}

/// How Phase 2 establishes the gateway's own identity.
#[derive(Clone)]
pub enum ServiceIdentityMode {
    /// Mint a token scoped to `audience` for every request.
    Mint {
        generator: Arc<dyn ServiceTokenGenerator>,
        audience: String,
    },

    /// Inject a fixed token, or no `Authorization` header at all.
    Mock(Option<SecretString>),
}

/// Request as seen before Phase 1.
pub struct InboundRequest {
    authorization: Option<SecretString>,
}

impl InboundRequest {
    pub fn new(authorization: Option<&str>) -> Self {
        Self {
            authorization: authorization.map(|v| SecretString::from(v.to_string())),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            authorization: headers
                .get(AUTHORIZATION)
                .map(|v| SecretString::from(String::from_utf8_lossy(v.as_bytes()).into_owned())),
        }
    }
}

/// Request after Phase 1: the identity is established.
#[derive(Debug)]
pub struct VerifiedRequest {
    pub user: UserTokenPayload,
}

/// Request after Phase 2: ready to forward.
#[derive(Debug)]
pub struct ForwardRequest {
    pub user: UserTokenPayload,

    /// Outbound credential; `None` forwards without `Authorization`.
    pub authorization: Option<SecretString>,
}

impl ForwardRequest {
    /// Write the outbound credential and the identity onto `req`.
    ///
    /// # Errors
    ///
    /// `GatewayError::Internal` if the token is not a valid header value.
    /// `req` is untouched in that case.
    pub fn apply<B>(self, req: &mut axum::http::Request<B>) -> Result<(), GatewayError> {
        let value = match &self.authorization {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                    .map_err(|_| {
                        tracing::error!(target: "gw.middleware.auth", "Service token is not a valid header value");
                        GatewayError::Internal
                    })?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        let headers = req.headers_mut();
        headers.remove(AUTHORIZATION);
        if let Some(value) = value {
            headers.insert(AUTHORIZATION, value);
        }
        req.extensions_mut().insert(self.user);
        Ok(())
    }
}

/// State for the identity translation middleware.
#[derive(Clone)]
pub struct AuthState {
    pub user_identity: UserIdentityMode,
    pub service_identity: ServiceIdentityMode,

    /// Log minted service tokens at debug level.
    pub log_minted_tokens: bool,
}

impl AuthState {
    pub fn new(user_identity: UserIdentityMode, service_identity: ServiceIdentityMode) -> Self {
        Self {
            user_identity,
            service_identity,
            log_minted_tokens: false,
        }
    }

    /// Wire the verifier and generator described by `config`.
    ///
    /// # Errors
    ///
    /// `AuthSetupError` if key material or the metadata host is unusable.
    pub fn from_config(config: &ValidatedAppConfig) -> Result<Self, AuthSetupError> {
        let (user_identity, service_identity) = match config {
            ValidatedAppConfig::Development(dev) => (
                development_user_identity(dev)?,
                development_service_identity(dev)?,
            ),
            ValidatedAppConfig::Production(prod) => (
                production_user_identity(prod)?,
                mint(&prod.google.metadata_host, &prod.base.backend_audience)?,
            ),
        };

        Ok(Self {
            user_identity,
            service_identity,
            log_minted_tokens: config.logging().enable_bff_token_logging,
        })
    }

    /// Phase 1: establish the end-user identity.
    ///
    /// # Errors
    ///
    /// `GatewayError::Authentication` when the header is missing, malformed
    /// or rejected by the verifier.
    pub async fn verify_user(&self, inbound: InboundRequest) -> Result<VerifiedRequest, GatewayError> {
        let verifier = match &self.user_identity {
            UserIdentityMode::Mock(user) => {
                tracing::debug!(target: "gw.middleware.auth", "Verification skipped, attaching mock identity");
                return Ok(VerifiedRequest { user: user.clone() });
            }
            UserIdentityMode::Verify(verifier) => verifier,
        };

        let header = inbound.authorization.ok_or_else(|| {
            tracing::debug!(target: "gw.middleware.auth", "Missing Authorization header");
            GatewayError::Authentication("Authorization header required".to_string())
        })?;

        let token = parse_bearer(header.expose_secret()).map_err(|_| {
            tracing::debug!(target: "gw.middleware.auth", "Invalid Authorization header format");
            GatewayError::Authentication("Invalid Authorization header format".to_string())
        })?;

        let user = verifier.verify(token).await?;
        Ok(VerifiedRequest { user })
    }

    /// Phase 2: replace the credential with the gateway's own identity.
    ///
    /// # Errors
    ///
    /// `GatewayError::TokenGeneration` if minting fails.
    pub async fn attach_service_identity(
        &self,
        verified: VerifiedRequest,
    ) -> Result<ForwardRequest, GatewayError> {
        let authorization = match &self.service_identity {
            ServiceIdentityMode::Mock(token) => {
                tracing::debug!(
                    target: "gw.middleware.auth",
                    mock_token = token.is_some(),
                    "Service token minting skipped"
                );
                token.clone()
            }
            ServiceIdentityMode::Mint {
                generator,
                audience,
            } => {
                let token = generator.generate_id_token(audience).await?;
                if self.log_minted_tokens {
                    tracing::debug!(
                        target: "gw.middleware.auth",
                        audience = %audience,
                        service_token = %token.expose_secret(),
                        "Minted service token"
                    );
                }
                Some(token)
            }
        };

        Ok(ForwardRequest {
            user: verified.user,
            authorization,
        })
    }

    /// Run both phases.
    ///
    /// # Errors
    ///
    /// The first failing phase's error. Phase 2 does not run if Phase 1 fails.
    pub async fn process(&self, inbound: InboundRequest) -> Result<ForwardRequest, GatewayError> {
        let verified = self.verify_user(inbound).await?;
        self.attach_service_identity(verified).await
    }
}

fn development_user_identity(dev: &DevelopmentConfig) -> Result<UserIdentityMode, AuthSetupError> {
    let user_token = &dev.user_token;
    if user_token.skip_verification {
        return Ok(UserIdentityMode::Mock(UserTokenPayload::from(
            &user_token.mock_user,
        )));
    }

    let issuer = user_token
        .issuer
        .clone()
        .ok_or(AuthSetupError::MissingSetting("JWT_ISSUER"))?;
    let audience = user_token
        .audience
        .clone()
        .ok_or(AuthSetupError::MissingSetting("JWT_AUDIENCE"))?;
    let static_key = user_token
        .public_key
        .as_deref()
        .map(StaticKey::parse)
        .transpose()?;
    let jwks_client = user_token
        .jwks_uri
        .clone()
        .map(|uri| Arc::new(JwksClient::new(uri)));

    let verifier = JwtUserTokenVerifier::new(
        VerificationSettings::new(issuer, audience),
        static_key,
        jwks_client,
    )?;
    Ok(UserIdentityMode::Verify(Arc::new(verifier)))
}

fn development_service_identity(
    dev: &DevelopmentConfig,
) -> Result<ServiceIdentityMode, AuthSetupError> {
    if dev.google.skip_auth {
        return Ok(ServiceIdentityMode::Mock(dev.google.mock_token.clone()));
    }
    mint(&dev.google.metadata_host, &dev.base.backend_audience)
}

fn production_user_identity(prod: &ProductionConfig) -> Result<UserIdentityMode, AuthSetupError> {
    let user_token = &prod.user_token;
    let static_key = user_token
        .public_key
        .as_deref()
        .map(StaticKey::parse)
        .transpose()?;

    let verifier = JwtUserTokenVerifier::new(
        VerificationSettings::new(user_token.issuer.clone(), user_token.audience.clone()),
        static_key,
        Some(Arc::new(JwksClient::new(user_token.jwks_uri.clone()))),
    )?;
    Ok(UserIdentityMode::Verify(Arc::new(verifier)))
}

fn mint(metadata_host: &str, audience: &str) -> Result<ServiceIdentityMode, AuthSetupError> {
    let generator = MetadataServiceTokenGenerator::new(metadata_host)
        .map_err(|_| AuthSetupError::InvalidMetadataHost)?;
    Ok(ServiceIdentityMode::Mint {
        generator: Arc::new(generator),
        audience: audience.to_string(),
    })
}

/// Identity translation middleware.
///
/// Use with `axum::middleware::from_fn_with_state`. On success the outbound
/// `Authorization` header carries the service token (or is absent) and the
/// [`UserTokenPayload`] is stored in request extensions. On failure the
/// request is not forwarded and the error is rendered by
/// [`GatewayError`]'s `IntoResponse`.
#[instrument(skip_all, name = "gw.middleware.auth")]
pub async fn translate_identity(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let inbound = InboundRequest::from_headers(req.headers());
    let forward = state.process(inbound).await?;
    forward.apply(&mut req)?;

    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts exactly one token value.
    struct StubVerifier {
        accepted: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl UserTokenVerifier for StubVerifier {
        async fn verify(&self, token: &str) -> Result<UserTokenPayload, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if token == self.accepted {
                Ok(UserTokenPayload {
                    sub: "verified-user".to_string(),
                    email: None,
                    name: None,
                })
            } else {
                Err(GatewayError::invalid_token())
            }
        }
    }

    struct StubGenerator {
        result: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ServiceTokenGenerator for StubGenerator {
        async fn generate_id_token(&self, audience: &str) -> Result<SecretString, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.result {
                Ok(token) => Ok(SecretString::from(format!("{token}:{audience}"))),
                Err(()) => Err(GatewayError::TokenGeneration("stub failure".to_string())),
            }
        }
    }

    fn verifier(accepted: &'static str) -> Arc<StubVerifier> {
        Arc::new(StubVerifier {
            accepted,
            calls: AtomicUsize::new(0),
        })
    }

    fn generator(result: Result<&'static str, ()>) -> Arc<StubGenerator> {
        Arc::new(StubGenerator {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    fn mock_user() -> UserTokenPayload {
        UserTokenPayload {
            sub: "dev-user".to_string(),
            email: Some("dev@example.com".to_string()),
            name: None,
        }
    }

    fn mint_with(generator: Arc<StubGenerator>) -> ServiceIdentityMode {
        ServiceIdentityMode::Mint {
            generator,
            audience: "aud-1".to_string(),
        }
    }

    // =========================================================================
    // Phase 1
    // =========================================================================

    #[tokio::test]
    async fn test_mock_identity_ignores_missing_header() {
        let state = AuthState::new(
            UserIdentityMode::Mock(mock_user()),
            ServiceIdentityMode::Mock(None),
        );

        let first = state.verify_user(InboundRequest::new(None)).await.unwrap();
        let second = state.verify_user(InboundRequest::new(None)).await.unwrap();

        assert_eq!(first.user, mock_user());
        assert_eq!(second.user, first.user);
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let v = verifier("good");
        let state = AuthState::new(UserIdentityMode::Verify(v.clone()), ServiceIdentityMode::Mock(None));

        let err = state.verify_user(InboundRequest::new(None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Authentication(msg) if msg == "Authorization header required"));
        assert_eq!(v.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_bearer_header_is_rejected() {
        let state = AuthState::new(
            UserIdentityMode::Verify(verifier("good")),
            ServiceIdentityMode::Mock(None),
        );

        for header in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   ", "good"] {
            let err = state
                .verify_user(InboundRequest::new(Some(header)))
                .await
                .unwrap_err();
            assert!(
                matches!(&err, GatewayError::Authentication(msg) if msg == "Invalid Authorization header format"),
                "{header}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_bearer_scheme_is_case_insensitive() {
        let state = AuthState::new(
            UserIdentityMode::Verify(verifier("good")),
            ServiceIdentityMode::Mock(None),
        );

        let verified = state
            .verify_user(InboundRequest::new(Some("bearer good")))
            .await
            .unwrap();
        assert_eq!(verified.user.sub, "verified-user");
    }

    // =========================================================================
    // Phase 2 and composition
    // =========================================================================

    #[tokio::test]
    async fn test_phase_two_not_attempted_when_phase_one_fails() {
        let g = generator(Ok("svc"));
        let state = AuthState::new(UserIdentityMode::Verify(verifier("good")), mint_with(g.clone()));

        let err = state
            .process(InboundRequest::new(Some("Bearer bad")))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Authentication(_)));
        assert_eq!(g.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_minted_token_scoped_to_audience() {
        let state = AuthState::new(
            UserIdentityMode::Verify(verifier("good")),
            mint_with(generator(Ok("svc"))),
        );

        let forward = state
            .process(InboundRequest::new(Some("Bearer good")))
            .await
            .unwrap();

        assert_eq!(forward.user.sub, "verified-user");
        assert_eq!(
            forward.authorization.unwrap().expose_secret(),
            "svc:aud-1"
        );
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let state = AuthState::new(
            UserIdentityMode::Mock(mock_user()),
            mint_with(generator(Err(()))),
        );

        let err = state.process(InboundRequest::new(None)).await.unwrap_err();
        assert!(matches!(err, GatewayError::TokenGeneration(_)));
    }

    #[tokio::test]
    async fn test_skip_auth_without_mock_token_drops_header() {
        let state = AuthState::new(
            UserIdentityMode::Mock(mock_user()),
            ServiceIdentityMode::Mock(None),
        );

        let forward = state
            .process(InboundRequest::new(Some("Bearer end-user-token")))
            .await
            .unwrap();
        assert!(forward.authorization.is_none());
    }

    // =========================================================================
    // Request mutation
    // =========================================================================

    #[test]
    fn test_apply_replaces_header_and_attaches_identity() {
        let mut req = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer end-user-token")
            .body(())
            .unwrap();

        ForwardRequest {
            user: mock_user(),
            authorization: Some(SecretString::from("service-token")),
        }
        .apply(&mut req)
        .unwrap();

        let values: Vec<_> = req.headers().get_all(AUTHORIZATION).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values.first().unwrap().to_str().unwrap(), "Bearer service-token");
        assert!(values.first().unwrap().is_sensitive());
        assert_eq!(req.extensions().get::<UserTokenPayload>(), Some(&mock_user()));
    }

    #[test]
    fn test_apply_without_token_removes_header() {
        let mut req = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer end-user-token")
            .body(())
            .unwrap();

        ForwardRequest {
            user: mock_user(),
            authorization: None,
        }
        .apply(&mut req)
        .unwrap();

        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_apply_rejects_invalid_token_without_mutation() {
        let mut req = axum::http::Request::builder()
            .header(AUTHORIZATION, "Bearer end-user-token")
            .body(())
            .unwrap();

        let result = ForwardRequest {
            user: mock_user(),
            authorization: Some(SecretString::from("bad\ntoken")),
        }
        .apply(&mut req);

        assert!(matches!(result, Err(GatewayError::Internal)));
        assert_eq!(
            req.headers().get(AUTHORIZATION).unwrap(),
            "Bearer end-user-token"
        );
        assert!(req.extensions().get::<UserTokenPayload>().is_none());
    }

    #[test]
    fn test_inbound_debug_is_redacted() {
        let inbound = InboundRequest::new(Some("Bearer secret-end-user-token"));
        let debug = format!("{:?}", inbound.authorization);
        assert!(!debug.contains("secret-end-user-token"));
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }
}
