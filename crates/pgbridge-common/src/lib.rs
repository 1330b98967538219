//! pgbridge Common Library
//!
//! Error taxonomy, identities and settings shared by the gateway.

pub mod auth;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use auth::{Credential, Identity, PrincipalKind};
pub use config::BackendSettings;
pub use error::{BridgeError, Result};
