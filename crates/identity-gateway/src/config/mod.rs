//! Gateway configuration.
//!
//! Configuration is read once at startup from a [`RawEnvironment`] and
//! validated into a [`ValidatedAppConfig`] for exactly one environment.
//! No other component reads process environment directly.
//!
//! ```text
//! RawEnvironment -> create_validator(NODE_ENV) -> validate() -> ValidatedAppConfig
//!                                                           \-> ConfigValidationResult
//! ```

mod development;
mod factory;
mod field_validator;
mod production;
mod shared;
mod types;

pub use development::validate_development;
pub use factory::{
    create_validator, create_validator_strict, load_config, ConfigMisuse, ConfigValidator,
    InvalidConfig, UnknownEnvironment,
};
pub use field_validator::{
    is_sentinel_url, sentinel_url, ConfigError, ConfigValidationResult, ConfigWarning,
    FieldValidator, DEFAULT_PORT, SENTINEL_URL,
};
pub use production::validate_production;
pub use types::{
    BaseConfig, DevelopmentConfig, DevelopmentGoogleConfig, DevelopmentUserTokenConfig,
    Environment, LogFormat, LoggingConfig, MockUser, ProductionConfig, ProductionGoogleConfig,
    ProductionUserTokenConfig, ValidatedAppConfig,
};

use std::collections::HashMap;
use std::fmt;

/// Environment variable names read during validation.
pub mod vars {
    pub const NODE_ENV: &str = "NODE_ENV";
    pub const APP_ENV: &str = "APP_ENV";
    pub const PORT: &str = "PORT";
    pub const BFF_BASE_URL: &str = "BFF_BASE_URL";
    pub const BACKEND_TARGET_URL: &str = "BACKEND_TARGET_URL";
    pub const BFF_AUDIENCE: &str = "BFF_AUDIENCE";
    pub const SKIP_JWT_VERIFY: &str = "SKIP_JWT_VERIFY";
    pub const JWT_PUBLIC_KEY: &str = "JWT_PUBLIC_KEY";
    pub const JWT_JWKS_URI: &str = "JWT_JWKS_URI";
    pub const JWT_ISSUER: &str = "JWT_ISSUER";
    pub const JWT_AUDIENCE: &str = "JWT_AUDIENCE";
    pub const SKIP_GOOGLE_AUTH: &str = "SKIP_GOOGLE_AUTH";
    pub const FIREBASE_PROJECT_ID: &str = "FIREBASE_PROJECT_ID";
    pub const NEXT_PUBLIC_FIREBASE_PROJECT_ID: &str = "NEXT_PUBLIC_FIREBASE_PROJECT_ID";
    pub const GOOGLE_CLOUD_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";
    pub const GCE_METADATA_HOST: &str = "GCE_METADATA_HOST";
    pub const MOCK_USER_SUB: &str = "MOCK_USER_SUB";
    pub const MOCK_USER_EMAIL: &str = "MOCK_USER_EMAIL";
    pub const MOCK_USER_NAME: &str = "MOCK_USER_NAME";
    pub const MOCK_SERVICE_TOKEN: &str = "MOCK_SERVICE_TOKEN";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    pub const ENABLE_REQUEST_LOGGING: &str = "ENABLE_REQUEST_LOGGING";
    pub const ENABLE_BFF_TOKEN_LOGGING: &str = "ENABLE_BFF_TOKEN_LOGGING";
    pub const ENABLE_REQUEST_BODY_LOGGING: &str = "ENABLE_REQUEST_BODY_LOGGING";
    pub const ENABLE_FILE_LOGGING: &str = "ENABLE_FILE_LOGGING";
    pub const LOG_FILE_PATH: &str = "LOG_FILE_PATH";
    pub const GATEWAY_SECRETS: &str = "GATEWAY_SECRETS";
}

/// Read-only snapshot of environment variables.
///
/// Values are never logged; the Debug output lists variable names only.
#[derive(Clone, Default)]
pub struct RawEnvironment {
    vars: HashMap<String, String>,
}

impl RawEnvironment {
    /// Snapshot the current process environment.
    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Returns the value of the first set alias, or `None`.
    pub fn get_any(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| {
            self.get(name).filter(|v| !v.trim().is_empty())
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawEnvironment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for RawEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.vars.keys().collect();
        names.sort();
        f.debug_struct("RawEnvironment")
            .field("vars", &names)
            .finish()
    }
}
