//! Identity Gateway Library
//!
//! Reverse-proxy gateway that sits between a browser-facing frontend and a
//! backend-for-frontend (BFF). For every request it:
//!
//! - Verifies the end-user's bearer token (or attaches a mock identity)
//! - Replaces the credential with a service identity token for the backend
//! - Forwards the request with the verified identity attached
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> handlers/proxy.rs
//!                       |
//!                       +-> auth/verifier.rs, auth/service_token.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Token verification, JWKS cache, service token minting
//! - `config` - Environment-specific configuration validation
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - Forwarding handler
//! - `logging` - Tracing subscriber setup
//! - `middleware` - Identity translation middleware
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod routes;
