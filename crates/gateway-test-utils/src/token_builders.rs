//! Builder patterns for test data construction
//!
//! Provides a fluent API for end-user token claims as an identity provider
//! would issue them.

use chrono::{Duration, Utc};
use serde_json::json;

/// Issuer used by default in test tokens.
pub const TEST_ISSUER: &str = "https://securetoken.google.com/test-project";

/// Audience used by default in test tokens.
pub const TEST_AUDIENCE: &str = "test-project";

/// Builder for end-user token claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestUserTokenBuilder::new()
///     .for_user("alice")
///     .issued_by("iss")
///     .for_audience("aud")
///     .expires_in(3600)
///     .build();
/// ```
pub struct TestUserTokenBuilder {
    sub: String,
    iss: String,
    aud: String,
    email: Option<String>,
    name: Option<String>,
    exp: i64,
    iat: i64,
}

impl TestUserTokenBuilder {
    /// Create a new builder: valid for one hour, default issuer and audience
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-user".to_string(),
            iss: TEST_ISSUER.to_string(),
            aud: TEST_AUDIENCE.to_string(),
            email: None,
            name: None,
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    pub fn for_audience(mut self, audience: &str) -> Self {
        self.aud = audience.to_string();
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> serde_json::Value {
        let mut claims = json!({
            "sub": self.sub,
            "iss": self.iss,
            "aud": self.aud,
            "exp": self.exp,
            "iat": self.iat,
        });
        if let Some(email) = self.email {
            claims["email"] = json!(email);
        }
        if let Some(name) = self.name {
            claims["name"] = json!(name);
        }
        claims
    }
}

impl Default for TestUserTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_valid_claims() {
        let claims = TestUserTokenBuilder::new()
            .for_user("alice")
            .issued_by("iss")
            .for_audience("aud")
            .with_email("alice@example.com")
            .build();

        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["iss"], "iss");
        assert_eq!(claims["aud"], "aud");
        assert_eq!(claims["email"], "alice@example.com");
        assert!(claims.get("name").is_none());
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_builder_default() {
        let claims = TestUserTokenBuilder::default().build();
        assert_eq!(claims["sub"], "test-user");
        assert_eq!(claims["aud"], TEST_AUDIENCE);
    }

    #[test]
    fn test_expired_token() {
        let claims = TestUserTokenBuilder::new().expires_in(-600).build();
        assert!(claims["exp"].as_i64().unwrap() < Utc::now().timestamp());
    }
}
