//! Secret types for protecting credentials from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for every credential the gateway
//! handles: end-user bearer tokens in flight, minted service identity tokens,
//! the development mock token and values from the secret bundle.
//!
//! `SecretString` implements `Debug` with redaction, so any struct deriving
//! `Debug` that holds one is safe to pass to `tracing`. The value is zeroized
//! on drop.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct OutboundCredential {
//!     audience: String,
//!     token: SecretString,
//! }
//!
//! let credential = OutboundCredential {
//!     audience: "https://backend.internal".to_string(),
//!     token: SecretString::from("eyJhbGciOi..."),
//! };
//!
//! // Debug output shows the audience but not the token
//! let rendered = format!("{credential:?}");
//! assert!(!rendered.contains("eyJhbGciOi"));
//!
//! // Reading the value is always an explicit call
//! let header = format!("Bearer {}", credential.token.expose_secret());
//! # assert!(header.starts_with("Bearer "));
//! ```

pub use secrecy::{ExposeSecret, SecretString};
