//! Development environment validator.
//!
//! Development tolerates missing infrastructure: the backend defaults to a
//! local port, verification and minting can be bypassed, and a mock identity
//! stands in for a verified user.

use super::field_validator::{is_sentinel_url, ConfigValidationResult, FieldValidator, DEFAULT_PORT};
use super::shared;
use super::types::{
    BaseConfig, DevelopmentConfig, DevelopmentGoogleConfig, DevelopmentUserTokenConfig,
    Environment, MockUser,
};
use super::{vars, RawEnvironment};
use secrecy::SecretString;

const DEFAULT_MOCK_SUB: &str = "dev-user";
const DEFAULT_MOCK_EMAIL: &str = "dev@example.com";
const DEFAULT_MOCK_NAME: &str = "Development User";

/// Validates `env` as a Development deployment.
///
/// The returned configuration is always fully populated; it is only safe to
/// use when the result is valid.
pub fn validate_development(env: &RawEnvironment) -> (DevelopmentConfig, ConfigValidationResult) {
    let mut v = FieldValidator::new();

    let port = v.port(env.get(vars::PORT), vars::PORT, DEFAULT_PORT);
    let backend_target_url = shared::backend_target_url(env, &mut v, Environment::Development);
    let backend_audience = match shared::non_empty(env, &[vars::BFF_AUDIENCE]) {
        Some(audience) => audience,
        None => shared::origin_of(&backend_target_url),
    };

    let project_id = shared::project_id(env);

    let skip_verification =
        v.boolean(env.get(vars::SKIP_JWT_VERIFY), vars::SKIP_JWT_VERIFY, true);
    let public_key = shared::non_empty(env, &[vars::JWT_PUBLIC_KEY]);
    let jwks_raw = env.get_any(&[vars::JWT_JWKS_URI]);
    let jwks_uri = jwks_raw
        .map(|raw| v.url(Some(raw), vars::JWT_JWKS_URI))
        .filter(|url| !is_sentinel_url(url));
    let issuer = shared::non_empty(env, &[vars::JWT_ISSUER])
        .or_else(|| project_id.as_deref().map(shared::firebase_issuer));
    let audience = shared::non_empty(env, &[vars::JWT_AUDIENCE]).or_else(|| project_id.clone());

    if !skip_verification {
        if public_key.is_none() && jwks_raw.is_none() {
            v.error(
                vars::JWT_JWKS_URI,
                None,
                "or JWT_PUBLIC_KEY is required when SKIP_JWT_VERIFY is false",
            );
        }
        if issuer.is_none() {
            v.error(
                vars::JWT_ISSUER,
                None,
                "is required when SKIP_JWT_VERIFY is false and no Firebase project is set",
            );
        }
        if audience.is_none() {
            v.error(
                vars::JWT_AUDIENCE,
                None,
                "is required when SKIP_JWT_VERIFY is false and no Firebase project is set",
            );
        }
    }

    let mock_user = MockUser {
        sub: shared::non_empty(env, &[vars::MOCK_USER_SUB])
            .unwrap_or_else(|| DEFAULT_MOCK_SUB.to_string()),
        email: Some(
            shared::non_empty(env, &[vars::MOCK_USER_EMAIL])
                .unwrap_or_else(|| DEFAULT_MOCK_EMAIL.to_string()),
        ),
        name: Some(
            shared::non_empty(env, &[vars::MOCK_USER_NAME])
                .unwrap_or_else(|| DEFAULT_MOCK_NAME.to_string()),
        ),
    };

    let skip_auth = v.boolean(env.get(vars::SKIP_GOOGLE_AUTH), vars::SKIP_GOOGLE_AUTH, true);
    let mock_token = shared::non_empty(env, &[vars::MOCK_SERVICE_TOKEN]).map(SecretString::from);

    let logging = shared::logging(env, &mut v, Environment::Development);

    let config = DevelopmentConfig {
        base: BaseConfig {
            port,
            backend_target_url,
            backend_audience,
        },
        user_token: DevelopmentUserTokenConfig {
            skip_verification,
            public_key,
            jwks_uri,
            issuer,
            audience,
            mock_user,
        },
        google: DevelopmentGoogleConfig {
            skip_auth,
            project_id,
            mock_token,
            metadata_host: shared::metadata_host(env),
        },
        logging,
    };

    (config, v.finish())
}
