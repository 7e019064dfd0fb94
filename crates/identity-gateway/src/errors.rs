//! Gateway error types.
//!
//! All per-request errors map to HTTP status codes via the `IntoResponse`
//! impl. Messages returned to clients are generic; the underlying cause is
//! logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Challenge returned with every 401.
pub const WWW_AUTHENTICATE_CHALLENGE: &str =
    "Bearer realm=\"identity-gateway\", error=\"invalid_token\"";

/// Gateway error type.
///
/// Maps to HTTP status codes:
/// - Authentication: 401 Unauthorized
/// - TokenGeneration, Upstream: 502 Bad Gateway
/// - KeySetUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Phase 1 failure: the end-user credential was missing or rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Phase 2 failure: no service token could be minted.
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    /// Verification keys could not be fetched.
    #[error("Key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// The backend could not be reached.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal,
}

impl GatewayError {
    /// Generic rejection used for every token verification failure.
    pub fn invalid_token() -> Self {
        GatewayError::Authentication("The access token is invalid or expired".to_string())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Authentication(_) => 401,
            GatewayError::TokenGeneration(_) | GatewayError::Upstream(_) => 502,
            GatewayError::KeySetUnavailable(_) => 503,
            GatewayError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            GatewayError::Authentication(reason) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", reason.clone())
            }
            GatewayError::TokenGeneration(reason) => {
                tracing::error!(target: "gw.errors", reason = %reason, "Service token generation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "TOKEN_GENERATION_FAILED",
                    "Unable to obtain service credentials".to_string(),
                )
            }
            GatewayError::KeySetUnavailable(reason) => {
                tracing::warn!(target: "gw.errors", reason = %reason, "Key set unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            GatewayError::Upstream(reason) => {
                tracing::warn!(target: "gw.errors", reason = %reason, "Upstream request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "Upstream service unavailable".to_string(),
                )
            }
            GatewayError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
            );
        }

        response
    }
}
