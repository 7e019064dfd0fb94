//! JWT utilities shared by the gateway's verification path.
//!
//! This module provides the token inspection helpers that run *before* any
//! signature check:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Header inspection (`kid`, `alg`) for key lookup
//! - Bearer credential parsing
//! - Ed25519 public key decoding (PEM and JWK `x` forms)
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing in this module verifies a signature; callers MUST still verify
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_header, parse_bearer, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let token = parse_bearer(header_value)?;
//! let header = decode_header(token)?;
//! // ... resolve key by kid, verify signature ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Identity-provider tokens are typically 800-1200 bytes (RS256 signature plus
/// profile claims). Anything larger than 8KB is rejected BEFORE base64 decoding
/// or signature verification.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Authorization scheme expected on inbound requests.
pub const BEARER_SCHEME: &str = "Bearer";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,

    /// Authorization header is not a `Bearer <token>` credential.
    #[error("Invalid Authorization header format")]
    NotBearer,
}

// =============================================================================
// Header Types
// =============================================================================

/// The subset of a JOSE header the gateway reads before verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm claimed by the token (e.g. `RS256`, `EdDSA`).
    pub alg: String,

    /// Key ID, if present.
    #[serde(default)]
    pub kid: Option<String>,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the credential from an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively (RFC 7235). Surrounding
/// whitespace around the token is trimmed; an empty token is rejected.
///
/// # Errors
///
/// Returns `JwtValidationError::NotBearer` for any other scheme or an empty
/// credential.
pub fn parse_bearer(header_value: &str) -> Result<&str, JwtValidationError> {
    let (scheme, credential) = header_value
        .trim()
        .split_once(' ')
        .ok_or(JwtValidationError::NotBearer)?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        tracing::debug!(target: "common.jwt", "Authorization scheme is not Bearer");
        return Err(JwtValidationError::NotBearer);
    }

    let credential = credential.trim();
    if credential.is_empty() {
        return Err(JwtValidationError::NotBearer);
    }

    Ok(credential)
}

/// Decode the JOSE header of a JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - The returned header is untrusted; `alg` must only be used to select
///   among algorithms the caller already allows
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, or invalid JSON
pub fn decode_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate
/// token pre-generation or clock synchronization issues.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
///
/// Prefer [`validate_iat`] in production code. This variant exists so that
/// boundary conditions can be unit-tested without wall-clock dependence.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: configured skews are minutes, well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode an Ed25519 public key from PEM-wrapped base64.
///
/// Strips PEM header/footer lines and decodes the base64 content. When the
/// content is a full SubjectPublicKeyInfo document (44 bytes), the 12-byte
/// algorithm prefix is dropped so the result is always the raw 32-byte key.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64 content cannot be decoded.
pub fn decode_ed25519_public_key_pem(pem: &str) -> Result<Vec<u8>, base64::DecodeError> {
    const SPKI_PREFIX_LEN: usize = 12;
    const SPKI_LEN: usize = 44;

    let b64: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .collect();

    let bytes = base64::engine::general_purpose::STANDARD.decode(b64)?;
    if bytes.len() == SPKI_LEN {
        return Ok(bytes.get(SPKI_PREFIX_LEN..).unwrap_or_default().to_vec());
    }
    Ok(bytes)
}

/// Decode an Ed25519 public key from JWK `x` field (base64url format).
///
/// # Errors
///
/// Returns `base64::DecodeError` if the base64url content cannot be decoded.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
