//! Middleware for the identity gateway.
//!
//! # Components
//!
//! - `auth` - Identity translation (verify end-user, mint service identity)

pub mod auth;

pub use auth::{
    translate_identity, AuthState, ForwardRequest, InboundRequest, ServiceIdentityMode,
    UserIdentityMode, VerifiedRequest,
};
