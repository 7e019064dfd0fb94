//! Production environment validator.
//!
//! Every credential source is mandatory and no bypass exists. Missing fields
//! are all reported in one pass.

use super::field_validator::{ConfigValidationResult, FieldValidator, DEFAULT_PORT};
use super::shared;
use super::types::{
    BaseConfig, Environment, ProductionConfig, ProductionGoogleConfig, ProductionUserTokenConfig,
};
use super::{vars, RawEnvironment};

/// Development-only variables that have no effect in Production.
const IGNORED_IN_PRODUCTION: [&str; 6] = [
    vars::SKIP_JWT_VERIFY,
    vars::SKIP_GOOGLE_AUTH,
    vars::MOCK_USER_SUB,
    vars::MOCK_USER_EMAIL,
    vars::MOCK_USER_NAME,
    vars::MOCK_SERVICE_TOKEN,
];

/// Validates `env` as a Production deployment.
pub fn validate_production(env: &RawEnvironment) -> (ProductionConfig, ConfigValidationResult) {
    let mut v = FieldValidator::new();

    let port = v.port(env.get(vars::PORT), vars::PORT, DEFAULT_PORT);
    let backend_target_url = shared::backend_target_url(env, &mut v, Environment::Production);
    let backend_audience = v.required(env.get(vars::BFF_AUDIENCE), vars::BFF_AUDIENCE);

    let jwks_uri = v.url(env.get(vars::JWT_JWKS_URI), vars::JWT_JWKS_URI);
    let issuer = v.required(env.get(vars::JWT_ISSUER), vars::JWT_ISSUER);
    let audience = v.required(env.get(vars::JWT_AUDIENCE), vars::JWT_AUDIENCE);
    let public_key = shared::non_empty(env, &[vars::JWT_PUBLIC_KEY]);

    let project_id = match shared::project_id(env) {
        Some(project) => project,
        None => v.required(None, vars::FIREBASE_PROJECT_ID),
    };

    for name in IGNORED_IN_PRODUCTION {
        if env.get_any(&[name]).is_some() {
            v.warn(name, "is ignored in production");
        }
    }

    let logging = shared::logging(env, &mut v, Environment::Production);

    let config = ProductionConfig {
        base: BaseConfig {
            port,
            backend_target_url,
            backend_audience,
        },
        user_token: ProductionUserTokenConfig {
            jwks_uri,
            issuer,
            audience,
            public_key,
        },
        google: ProductionGoogleConfig {
            project_id,
            metadata_host: shared::metadata_host(env),
        },
        logging,
    };

    (config, v.finish())
}
