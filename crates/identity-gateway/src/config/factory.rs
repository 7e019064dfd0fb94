//! Validator selection by environment name.

use super::development::validate_development;
use super::field_validator::{ConfigError, ConfigValidationResult, ConfigWarning};
use super::production::validate_production;
use super::types::{Environment, ValidatedAppConfig};
use super::{vars, RawEnvironment};
use thiserror::Error;

/// Names selecting the Production validator (case-insensitive, trimmed).
const PRODUCTION_NAMES: [&str; 2] = ["production", "staging"];

/// Names selecting the Development validator without a warning.
const DEVELOPMENT_NAMES: [&str; 3] = ["development", "dev", "test"];

/// `config()` was called before a successful `validate()`.
///
/// This is a programming error. Callers treat it as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("configuration requested before a successful validation")]
pub struct ConfigMisuse;

/// Returned by [`create_validator_strict`] for an unrecognised name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown environment '{0}'")]
pub struct UnknownEnvironment(pub String);

/// Startup configuration failure.
#[derive(Debug, Error)]
pub enum InvalidConfig {
    #[error("invalid configuration: {}", summarize(.errors))]
    Rejected {
        errors: Vec<ConfigError>,
        warnings: Vec<ConfigWarning>,
    },

    #[error(transparent)]
    Misuse(#[from] ConfigMisuse),
}

fn summarize(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validator for one environment.
///
/// Holds the draft configuration produced by the last successful
/// [`validate`](Self::validate) call.
#[derive(Debug)]
pub struct ConfigValidator {
    environment: Environment,
    name_warning: Option<ConfigWarning>,
    validated: Option<ValidatedAppConfig>,
}

impl ConfigValidator {
    fn new(environment: Environment) -> Self {
        Self {
            environment,
            name_warning: None,
            validated: None,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Runs the environment validator over `env`.
    ///
    /// The configuration is retained only when the result is valid.
    pub fn validate(&mut self, env: &RawEnvironment) -> ConfigValidationResult {
        let (config, mut result) = match self.environment {
            Environment::Development => {
                let (config, result) = validate_development(env);
                (ValidatedAppConfig::Development(config), result)
            }
            Environment::Production => {
                let (config, result) = validate_production(env);
                (ValidatedAppConfig::Production(config), result)
            }
        };

        if let Some(warning) = &self.name_warning {
            result.warnings.insert(0, warning.clone());
        }

        self.validated = result.is_valid.then_some(config);
        result
    }

    /// Returns the validated configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigMisuse`] if no validation has succeeded yet.
    pub fn config(&self) -> Result<ValidatedAppConfig, ConfigMisuse> {
        self.validated.clone().ok_or(ConfigMisuse)
    }
}

/// Selects a validator by environment name.
///
/// `production` and `staging` select Production. Any other name selects
/// Development; a non-empty unrecognised name is logged and surfaced as a
/// warning on `environment`.
pub fn create_validator(name: &str) -> ConfigValidator {
    let normalized = name.trim().to_ascii_lowercase();

    if PRODUCTION_NAMES.contains(&normalized.as_str()) {
        return ConfigValidator::new(Environment::Production);
    }

    let mut validator = ConfigValidator::new(Environment::Development);
    if !normalized.is_empty() && !DEVELOPMENT_NAMES.contains(&normalized.as_str()) {
        tracing::warn!(
            target: "gw.config",
            environment = %normalized,
            "Unrecognised environment name, using development"
        );
        validator.name_warning = Some(ConfigWarning {
            field: "environment".to_string(),
            message: format!("unrecognised environment '{normalized}', using development"),
        });
    }
    validator
}

/// Like [`create_validator`] but rejects unrecognised names.
///
/// An empty name still selects Development.
///
/// # Errors
///
/// [`UnknownEnvironment`] for a non-empty name that is neither a Production
/// nor a Development name.
pub fn create_validator_strict(name: &str) -> Result<ConfigValidator, UnknownEnvironment> {
    let normalized = name.trim().to_ascii_lowercase();

    if PRODUCTION_NAMES.contains(&normalized.as_str()) {
        Ok(ConfigValidator::new(Environment::Production))
    } else if normalized.is_empty() || DEVELOPMENT_NAMES.contains(&normalized.as_str()) {
        Ok(ConfigValidator::new(Environment::Development))
    } else {
        Err(UnknownEnvironment(name.trim().to_string()))
    }
}

/// Selects by `NODE_ENV` (or `APP_ENV`), validates and returns the
/// configuration together with its warnings.
///
/// # Errors
///
/// [`InvalidConfig::Rejected`] carrying every error found.
pub fn load_config(
    env: &RawEnvironment,
) -> Result<(ValidatedAppConfig, Vec<ConfigWarning>), InvalidConfig> {
    let name = env.get_any(&[vars::NODE_ENV, vars::APP_ENV]).unwrap_or_default();
    let mut validator = create_validator(name);
    let result = validator.validate(env);

    if !result.is_valid {
        return Err(InvalidConfig::Rejected {
            errors: result.errors,
            warnings: result.warnings,
        });
    }

    let config = validator.config()?;
    Ok((config, result.warnings))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> RawEnvironment {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_production_names_select_production() {
        for name in ["production", "PRODUCTION", " staging ", "Staging"] {
            assert_eq!(
                create_validator(name).environment(),
                Environment::Production,
                "{name}"
            );
        }
    }

    #[test]
    fn test_other_names_select_development() {
        for name in ["", "development", "test", "prod", "qa"] {
            assert_eq!(
                create_validator(name).environment(),
                Environment::Development,
                "{name}"
            );
        }
    }

    #[test]
    fn test_unknown_name_surfaces_warning() {
        let mut validator = create_validator("prod");
        let result = validator.validate(&env(&[]));

        assert!(result.is_valid);
        assert!(result.has_warning_for("environment"));
    }

    #[test]
    fn test_known_development_name_has_no_environment_warning() {
        let mut validator = create_validator("development");
        let result = validator.validate(&env(&[]));

        assert!(!result.has_warning_for("environment"));
    }

    #[test]
    fn test_strict_rejects_unknown_names() {
        assert_eq!(
            create_validator_strict("prod").unwrap_err(),
            UnknownEnvironment("prod".to_string())
        );
        assert_eq!(
            create_validator_strict("staging").unwrap().environment(),
            Environment::Production
        );
        assert_eq!(
            create_validator_strict("").unwrap().environment(),
            Environment::Development
        );
    }

    #[test]
    fn test_config_before_validate_is_misuse() {
        let validator = create_validator("development");
        assert_eq!(validator.config().unwrap_err(), ConfigMisuse);
    }

    #[test]
    fn test_config_after_failed_validate_is_misuse() {
        let mut validator = create_validator("production");
        let result = validator.validate(&env(&[]));

        assert!(!result.is_valid);
        assert!(validator.config().is_err());
    }

    #[test]
    fn test_validate_then_config() {
        let mut validator = create_validator("development");
        assert!(validator.validate(&env(&[])).is_valid);

        let config = validator.config().unwrap();
        assert_eq!(config.environment(), Environment::Development);
    }

    #[test]
    fn test_load_config_uses_node_env() {
        let (config, _) = load_config(&env(&[("NODE_ENV", "development")])).unwrap();
        assert_eq!(config.environment(), Environment::Development);

        let err = load_config(&env(&[("NODE_ENV", "production")])).unwrap_err();
        assert!(
            matches!(err, InvalidConfig::Rejected { ref errors, .. } if errors.len() == 6),
            "unexpected: {err:?}"
        );
    }

    #[test]
    fn test_load_config_falls_back_to_app_env() {
        let err = load_config(&env(&[("APP_ENV", "staging")])).unwrap_err();
        assert!(err.to_string().contains("JWT_JWKS_URI"));
    }
}
