//! Validated configuration shapes.
//!
//! [`ValidatedAppConfig`] is a tagged enum: a Production deployment has no
//! mock identity, no mock token and no bypass flags at the type level, so code
//! holding a `ProductionConfig` cannot read Development-only fields.

use secrecy::SecretString;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Deployment environment a configuration was validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields shared by both environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseConfig {
    /// Port the gateway listens on.
    pub port: u16,

    /// Backend the gateway forwards to.
    pub backend_target_url: Url,

    /// Audience minted service tokens are scoped to.
    pub backend_audience: String,
}

/// Identity attached to requests when verification is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MockUser {
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Inbound token settings for Development. Verification may be bypassed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevelopmentUserTokenConfig {
    pub skip_verification: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    pub mock_user: MockUser,
}

/// Inbound token settings for Production. Verification is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionUserTokenConfig {
    pub jwks_uri: Url,
    pub issuer: String,
    pub audience: String,

    /// Optional static key, used for tokens that carry no `kid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl ProductionUserTokenConfig {
    /// Always false; the field does not exist in this shape.
    pub fn skip_verification(&self) -> bool {
        false
    }
}

/// Outbound service identity settings for Development.
#[derive(Clone, Serialize)]
pub struct DevelopmentGoogleConfig {
    pub skip_auth: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Token injected instead of a minted one when `skip_auth` is set.
    #[serde(skip)]
    pub mock_token: Option<SecretString>,

    /// Host of the metadata server that mints identity tokens.
    pub metadata_host: String,
}

impl fmt::Debug for DevelopmentGoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevelopmentGoogleConfig")
            .field("skip_auth", &self.skip_auth)
            .field("project_id", &self.project_id)
            .field(
                "mock_token",
                &self.mock_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("metadata_host", &self.metadata_host)
            .finish()
    }
}

/// Outbound service identity settings for Production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionGoogleConfig {
    pub project_id: String,
    pub metadata_host: String,
}

impl ProductionGoogleConfig {
    /// Always false; the field does not exist in this shape.
    pub fn skip_auth(&self) -> bool {
        false
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Simple,
}

/// Logging settings, present in both environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub enable_request_logging: bool,
    pub enable_bff_token_logging: bool,
    pub enable_request_body_logging: bool,
    pub enable_file_logging: bool,
    pub file_path: PathBuf,
}

impl Default for LoggingConfig {
    /// Settings used before configuration has been validated.
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Simple,
            enable_request_logging: true,
            enable_bff_token_logging: false,
            enable_request_body_logging: false,
            enable_file_logging: false,
            file_path: PathBuf::from(super::shared::DEFAULT_LOG_FILE_PATH),
        }
    }
}

/// Complete Development configuration.
#[derive(Debug, Clone, Serialize)]
pub struct DevelopmentConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    pub user_token: DevelopmentUserTokenConfig,
    pub google: DevelopmentGoogleConfig,
    pub logging: LoggingConfig,
}

/// Complete Production configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    pub user_token: ProductionUserTokenConfig,
    pub google: ProductionGoogleConfig,
    pub logging: LoggingConfig,
}

/// Configuration for exactly one environment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "environment", rename_all = "lowercase")]
pub enum ValidatedAppConfig {
    Development(DevelopmentConfig),
    Production(ProductionConfig),
}

impl ValidatedAppConfig {
    pub fn environment(&self) -> Environment {
        match self {
            ValidatedAppConfig::Development(_) => Environment::Development,
            ValidatedAppConfig::Production(_) => Environment::Production,
        }
    }

    pub fn base(&self) -> &BaseConfig {
        match self {
            ValidatedAppConfig::Development(c) => &c.base,
            ValidatedAppConfig::Production(c) => &c.base,
        }
    }

    pub fn logging(&self) -> &LoggingConfig {
        match self {
            ValidatedAppConfig::Development(c) => &c.logging,
            ValidatedAppConfig::Production(c) => &c.logging,
        }
    }

    pub fn skip_verification(&self) -> bool {
        match self {
            ValidatedAppConfig::Development(c) => c.user_token.skip_verification,
            ValidatedAppConfig::Production(c) => c.user_token.skip_verification(),
        }
    }

    pub fn skip_auth(&self) -> bool {
        match self {
            ValidatedAppConfig::Development(c) => c.google.skip_auth,
            ValidatedAppConfig::Production(c) => c.google.skip_auth(),
        }
    }

    pub fn metadata_host(&self) -> &str {
        match self {
            ValidatedAppConfig::Development(c) => &c.google.metadata_host,
            ValidatedAppConfig::Production(c) => &c.google.metadata_host,
        }
    }
}
