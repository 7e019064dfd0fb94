//! HTTP request handlers for the identity gateway.

pub mod proxy;

pub use proxy::{forward, ProxyState};
