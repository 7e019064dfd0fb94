//! Field-level validation primitives.
//!
//! A [`FieldValidator`] is owned by exactly one validation pass. Every
//! primitive returns a usable value even when the input is rejected, so a
//! single pass surfaces every problem instead of stopping at the first one.

use serde::Serialize;
use std::fmt;
use url::Url;

/// Default port used when `PORT` is absent or rejected.
pub const DEFAULT_PORT: u16 = 8080;

/// Placeholder returned by [`FieldValidator::url`] for rejected input.
///
/// The scheme is neither `http` nor `https`, so the sentinel can never pass
/// URL validation and can never equal a configured backend target.
pub const SENTINEL_URL: &str = "invalid://invalid-url";

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];
const FALSY: [&str; 4] = ["false", "0", "no", "off"];

/// A rejected configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigError {
    /// Environment variable name.
    pub field: String,

    /// The offending value, if one was supplied.
    pub value: Option<String>,

    /// Why the value was rejected.
    pub reason: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} (got '{}')", self.field, self.reason, value),
            None => write!(f, "{} {}", self.field, self.reason),
        }
    }
}

/// A default that was substituted for a missing or unrecognised input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    /// Environment variable name.
    pub field: String,

    /// Human-readable description of the substitution.
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of one validation pass.
///
/// Errors and warnings are kept in the order the fields were checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ConfigError>,
    pub warnings: Vec<ConfigWarning>,
}

impl ConfigValidationResult {
    /// Returns the first error recorded for `field`, if any.
    pub fn error_for(&self, field: &str) -> Option<&ConfigError> {
        self.errors.iter().find(|e| e.field == field)
    }

    /// Returns true when at least one warning was recorded for `field`.
    pub fn has_warning_for(&self, field: &str) -> bool {
        self.warnings.iter().any(|w| w.field == field)
    }
}

/// Accumulates errors and warnings for one validation pass.
#[derive(Debug, Default)]
pub struct FieldValidator {
    errors: Vec<ConfigError>,
    warnings: Vec<ConfigWarning>,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trimmed value, or records an error and returns `""`.
    pub fn required(&mut self, value: Option<&str>, field: &str) -> String {
        match non_empty(value) {
            Some(v) => v.to_string(),
            None => {
                self.error(field, value, "is required");
                String::new()
            }
        }
    }

    /// Returns the trimmed value, or records a warning and returns `default`.
    pub fn optional(&mut self, value: Option<&str>, field: &str, default: &str) -> String {
        match non_empty(value) {
            Some(v) => v.to_string(),
            None => {
                self.warn(field, format!("not set, using default '{default}'"));
                default.to_string()
            }
        }
    }

    /// Parses an absolute `http`/`https` URL.
    ///
    /// Anything else records an error and yields the [`SENTINEL_URL`].
    pub fn url(&mut self, value: Option<&str>, field: &str) -> Url {
        let Some(raw) = non_empty(value) else {
            self.error(field, value, "is required");
            return sentinel_url();
        };

        match Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            Ok(parsed) => {
                self.error(
                    field,
                    value,
                    &format!("must use http or https, not '{}'", parsed.scheme()),
                );
                sentinel_url()
            }
            Err(e) => {
                self.error(field, value, &format!("is not a valid URL: {e}"));
                sentinel_url()
            }
        }
    }

    /// Parses a TCP port in `[1, 65535]`.
    ///
    /// Absent input yields `default` silently; rejected input records an
    /// error and yields `default`.
    pub fn port(&mut self, value: Option<&str>, field: &str, default: u16) -> u16 {
        let Some(raw) = non_empty(value) else {
            return default;
        };

        // `u32::from_str` accepts a leading `+`
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            self.error(field, value, "must be a valid port number");
            return default;
        }

        match raw.parse::<u32>() {
            Ok(port) if (1..=65535).contains(&port) => u16::try_from(port).unwrap_or(default),
            Ok(_) => {
                self.error(field, value, "must be between 1 and 65535");
                default
            }
            Err(_) => {
                self.error(field, value, "must be a valid port number");
                default
            }
        }
    }

    /// Parses a boolean flag (`true/1/yes/on`, `false/0/no/off`, any case).
    ///
    /// Unrecognised input records exactly one warning and yields `default`.
    pub fn boolean(&mut self, value: Option<&str>, field: &str, default: bool) -> bool {
        let Some(raw) = non_empty(value) else {
            return default;
        };

        let lowered = raw.to_ascii_lowercase();
        if TRUTHY.contains(&lowered.as_str()) {
            true
        } else if FALSY.contains(&lowered.as_str()) {
            false
        } else {
            self.warn(
                field,
                format!("unrecognised boolean '{raw}', using default '{default}'"),
            );
            default
        }
    }

    /// Records an error for a rule that is not covered by a primitive.
    pub fn error(&mut self, field: &str, value: Option<&str>, reason: &str) {
        self.errors.push(ConfigError {
            field: field.to_string(),
            value: value.map(ToString::to_string),
            reason: reason.to_string(),
        });
    }

    /// Records a warning for a rule that is not covered by a primitive.
    pub fn warn(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.push(ConfigWarning {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Consumes the accumulator and returns the immutable result.
    pub fn finish(self) -> ConfigValidationResult {
        ConfigValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Returns the sentinel URL.
#[allow(clippy::expect_used)] // Constant literal with a non-special scheme; parsing cannot fail.
pub fn sentinel_url() -> Url {
    Url::parse(SENTINEL_URL).expect("sentinel URL literal is valid")
}

/// Returns true if `url` is the rejected-input sentinel.
pub fn is_sentinel_url(url: &Url) -> bool {
    url.as_str() == SENTINEL_URL
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
