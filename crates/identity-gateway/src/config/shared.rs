//! Validation steps shared by both environment validators.

use super::field_validator::{is_sentinel_url, sentinel_url, FieldValidator};
use super::types::{Environment, LogFormat, LoggingConfig};
use super::{vars, RawEnvironment};
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

/// Default metadata server host used to mint service identity tokens.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Default backend for local development.
pub const DEFAULT_DEVELOPMENT_TARGET: &str = "http://localhost:8081";

/// Default log file location.
pub const DEFAULT_LOG_FILE_PATH: &str = "logs/identity-gateway.log";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Project ID aliases, in priority order.
const PROJECT_ID_VARS: [&str; 3] = [
    vars::FIREBASE_PROJECT_ID,
    vars::NEXT_PUBLIC_FIREBASE_PROJECT_ID,
    vars::GOOGLE_CLOUD_PROJECT,
];

/// Trimmed, non-empty value of the first set alias.
pub fn non_empty(env: &RawEnvironment, names: &[&str]) -> Option<String> {
    env.get_any(names).map(|v| v.trim().to_string())
}

pub fn project_id(env: &RawEnvironment) -> Option<String> {
    non_empty(env, &PROJECT_ID_VARS)
}

/// Issuer used by Firebase Authentication for `project`.
pub fn firebase_issuer(project: &str) -> String {
    format!("https://securetoken.google.com/{project}")
}

pub fn metadata_host(env: &RawEnvironment) -> String {
    non_empty(env, &[vars::GCE_METADATA_HOST]).unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string())
}

/// Resolves the backend target URL.
///
/// A `BFF_BASE_URL` entry in the secret bundle overrides the plain variable.
/// Development falls back to a local default with a warning; Production
/// requires a value.
pub fn backend_target_url(
    env: &RawEnvironment,
    v: &mut FieldValidator,
    environment: Environment,
) -> Url {
    if let Some(from_bundle) = secret_bundle_target(env, v) {
        return bundle_url(&from_bundle, v);
    }

    let raw = env.get_any(&[vars::BFF_BASE_URL, vars::BACKEND_TARGET_URL]);
    match (raw, environment) {
        (Some(raw), _) => v.url(Some(raw), vars::BFF_BASE_URL),
        (None, Environment::Development) => {
            let fallback = v.optional(None, vars::BFF_BASE_URL, DEFAULT_DEVELOPMENT_TARGET);
            v.url(Some(&fallback), vars::BFF_BASE_URL)
        }
        (None, Environment::Production) => v.url(None, vars::BFF_BASE_URL),
    }
}

/// `scheme://host[:port]` of `url`, or an empty string for the sentinel.
pub fn origin_of(url: &Url) -> String {
    if is_sentinel_url(url) {
        return String::new();
    }
    url.origin().ascii_serialization()
}

/// Parses a target taken from the secret bundle. Rejections never carry the
/// value.
fn bundle_url(raw: &str, v: &mut FieldValidator) -> Url {
    match Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
        _ => {
            v.error(
                vars::GATEWAY_SECRETS,
                None,
                "entry BFF_BASE_URL is not a valid http(s) URL",
            );
            sentinel_url()
        }
    }
}

/// Reads `BFF_BASE_URL` out of the JSON secret bundle, if one is present.
///
/// Bundle values are secrets: a malformed bundle is reported without echoing
/// its content.
fn secret_bundle_target(env: &RawEnvironment, v: &mut FieldValidator) -> Option<String> {
    let raw = env.get_any(&[vars::GATEWAY_SECRETS])?;

    match serde_json::from_str::<HashMap<String, serde_json::Value>>(raw) {
        Ok(bundle) => match bundle.get(vars::BFF_BASE_URL) {
            Some(serde_json::Value::String(target)) if !target.trim().is_empty() => {
                tracing::debug!(target: "gw.config", "Backend target taken from secret bundle");
                Some(target.trim().to_string())
            }
            Some(serde_json::Value::String(_)) | None => None,
            Some(_) => {
                v.error(
                    vars::GATEWAY_SECRETS,
                    None,
                    "entry BFF_BASE_URL must be a string",
                );
                None
            }
        },
        Err(_) => {
            v.error(
                vars::GATEWAY_SECRETS,
                None,
                "must be a JSON object of string values",
            );
            None
        }
    }
}

/// Builds the logging section. Present in both environments.
pub fn logging(
    env: &RawEnvironment,
    v: &mut FieldValidator,
    environment: Environment,
) -> LoggingConfig {
    let (default_level, default_format) = match environment {
        Environment::Development => ("debug", LogFormat::Simple),
        Environment::Production => ("info", LogFormat::Json),
    };

    let level = v
        .optional(env.get(vars::LOG_LEVEL), vars::LOG_LEVEL, default_level)
        .to_ascii_lowercase();
    let level = if LOG_LEVELS.contains(&level.as_str()) {
        level
    } else {
        v.warn(
            vars::LOG_LEVEL,
            format!("unrecognised level '{level}', using '{default_level}'"),
        );
        default_level.to_string()
    };

    let format = match non_empty(env, &[vars::LOG_FORMAT]).map(|f| f.to_ascii_lowercase()) {
        None => default_format,
        Some(f) if f == "json" => LogFormat::Json,
        Some(f) if f == "simple" => LogFormat::Simple,
        Some(other) => {
            v.warn(
                vars::LOG_FORMAT,
                format!("unrecognised format '{other}', expected json or simple"),
            );
            default_format
        }
    };

    LoggingConfig {
        level,
        format,
        enable_request_logging: v.boolean(
            env.get(vars::ENABLE_REQUEST_LOGGING),
            vars::ENABLE_REQUEST_LOGGING,
            true,
        ),
        enable_bff_token_logging: v.boolean(
            env.get(vars::ENABLE_BFF_TOKEN_LOGGING),
            vars::ENABLE_BFF_TOKEN_LOGGING,
            false,
        ),
        enable_request_body_logging: v.boolean(
            env.get(vars::ENABLE_REQUEST_BODY_LOGGING),
            vars::ENABLE_REQUEST_BODY_LOGGING,
            false,
        ),
        enable_file_logging: v.boolean(
            env.get(vars::ENABLE_FILE_LOGGING),
            vars::ENABLE_FILE_LOGGING,
            false,
        ),
        file_path: PathBuf::from(
            non_empty(env, &[vars::LOG_FILE_PATH])
                .unwrap_or_else(|| DEFAULT_LOG_FILE_PATH.to_string()),
        ),
    }
}
