//! # Gateway Test Utilities
//!
//! Shared test utilities for the identity gateway.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (seeded Ed25519 keys, a fixed RSA key)
//! - A builder for end-user token claims
//! - Wiremock helpers for the JWKS endpoint and the metadata server
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = wiremock::MockServer::start().await;
//!     let keypair = TestKeypair::new(1, "key-1");
//!     mount_jwks(&server, vec![keypair.jwk_json()]).await;
//!
//!     let token = keypair.sign(&TestUserTokenBuilder::new().for_user("alice").build());
//! }
//! ```

pub mod crypto_fixtures;
pub mod mock_services;
pub mod token_builders;

pub use crypto_fixtures::*;
pub use mock_services::*;
pub use token_builders::*;
