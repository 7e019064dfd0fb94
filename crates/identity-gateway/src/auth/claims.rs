//! End-user identity extracted from a verified token.
//!
//! `sub` and `email` identify a person and are redacted in Debug output.

use crate::config::MockUser;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity attached to a request after Phase 1.
///
/// Either decoded from a verified token or substituted from the configured
/// mock user when verification is skipped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenPayload {
    /// Subject - redacted in Debug output.
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Debug for UserTokenPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserTokenPayload")
            .field("sub", &"[REDACTED]")
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .finish()
    }
}

impl From<&MockUser> for UserTokenPayload {
    fn from(user: &MockUser) -> Self {
        Self {
            sub: user.sub.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Claims decoded from an inbound token.
///
/// `iss`, `aud` and `exp` are checked by `jsonwebtoken` during decoding;
/// only the fields the gateway reads afterwards are kept here.
#[derive(Clone, Deserialize)]
pub(crate) struct UserClaims {
    pub sub: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default)]
    pub iat: Option<i64>,
}

impl From<UserClaims> for UserTokenPayload {
    fn from(claims: UserClaims) -> Self {
        Self {
            sub: claims.sub,
            email: claims.email,
            name: claims.name,
        }
    }
}
