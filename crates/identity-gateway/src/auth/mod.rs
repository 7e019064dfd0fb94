//! Identity verification and service identity minting.
//!
//! # Components
//!
//! - `claims` - End-user identity attached to a request
//! - `jwks` - Cached JWKS client with refresh on unknown `kid`
//! - `verifier` - Inbound token verification (static key or JWKS)
//! - `service_token` - Outbound service token minting (metadata server)

pub mod claims;
pub mod jwks;
pub mod service_token;
pub mod verifier;

pub use claims::UserTokenPayload;
pub use jwks::{Jwk, JwksClient};
pub use service_token::{MetadataServiceTokenGenerator, ServiceTokenGenerator};
pub use verifier::{JwtUserTokenVerifier, StaticKey, UserTokenVerifier, VerificationSettings};

use thiserror::Error;

/// Startup failure while wiring verification or minting.
#[derive(Debug, Error)]
pub enum AuthSetupError {
    #[error("JWT_PUBLIC_KEY is not a supported RSA or Ed25519 public key")]
    InvalidPublicKey,

    #[error("token verification is enabled but no key material is configured")]
    NoKeyMaterial,

    #[error("token verification is enabled but {0} is not configured")]
    MissingSetting(&'static str),

    #[error("GCE_METADATA_HOST does not form a valid metadata server URL")]
    InvalidMetadataHost,
}
