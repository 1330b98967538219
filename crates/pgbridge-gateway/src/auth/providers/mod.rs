//! Identity providers
//!
//! A provider turns the credential an authentication method produced into the
//! `Identity` a session runs as.

mod anonymous;
mod ticket;

pub use anonymous::AnonymousProvider;
pub use ticket::TicketIdentityProvider;

use async_trait::async_trait;
use pgbridge_common::Credential;

use super::config::AuthMethodKind;
use super::identity::AuthResult;

/// Trait for identity providers
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Whether credentials from `method` can ever identify a principal here
    fn supports(&self, method: AuthMethodKind) -> bool;

    /// Resolve the identity for a credential
    async fn identify(&self, credential: Credential) -> AuthResult;
}
