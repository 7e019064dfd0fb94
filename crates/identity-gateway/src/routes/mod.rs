//! HTTP routes for the Identity Gateway.
//!
//! Every path is handled by the forwarding fallback, behind the identity
//! translation middleware.

use crate::auth::AuthSetupError;
use crate::config::{LoggingConfig, ValidatedAppConfig};
use crate::handlers::{self, ProxyState};
use crate::middleware::{translate_identity, AuthState};
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the application routes.
///
/// Creates an Axum router with:
/// - a fallback that forwards every request to the backend
/// - identity translation ahead of forwarding
/// - TraceLayer for request logging, when enabled
/// - 30 second request timeout
pub fn build_routes(auth: Arc<AuthState>, proxy: Arc<ProxyState>, logging: &LoggingConfig) -> Router {
    let mut router = Router::new()
        .fallback(handlers::forward)
        .with_state(proxy)
        .layer(middleware::from_fn_with_state(auth, translate_identity));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (outermost)
    // 2. TraceLayer - Log request details
    // 3. translate_identity - Verify and re-sign (innermost)
    if logging.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.layer(TimeoutLayer::new(Duration::from_secs(30)))
}

/// Wire middleware and forwarding state from a validated configuration.
///
/// # Errors
///
/// `AuthSetupError` if verification or minting cannot be set up.
pub fn build_app(config: &ValidatedAppConfig) -> Result<Router, AuthSetupError> {
    let auth = Arc::new(AuthState::from_config(config)?);
    let logging = config.logging();
    let proxy = Arc::new(ProxyState::new(
        config.base().backend_target_url.clone(),
        logging.enable_request_body_logging,
    ));

    Ok(build_routes(auth, proxy, logging))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::{load_config, RawEnvironment};

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_build_app_from_development_defaults() {
        let env: RawEnvironment = [("NODE_ENV", "development")].into_iter().collect();
        let (config, _) = load_config(&env).unwrap();

        assert!(build_app(&config).is_ok());
    }

    #[test]
    fn test_build_app_rejects_unparseable_public_key() {
        let env: RawEnvironment = [
            ("NODE_ENV", "development"),
            ("SKIP_JWT_VERIFY", "false"),
            ("JWT_PUBLIC_KEY", "not a key"),
            ("JWT_ISSUER", "https://securetoken.google.com/demo"),
            ("JWT_AUDIENCE", "demo"),
        ]
        .into_iter()
        .collect();
        let (config, _) = load_config(&env).unwrap();

        assert!(matches!(
            build_app(&config),
            Err(AuthSetupError::InvalidPublicKey)
        ));
    }
}
