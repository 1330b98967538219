//! Ticket-based provider
//!
//! Only delegated tickets identify a principal; the session then runs as the
//! ticket's principal and the ticket is forwarded on every backend call.

use async_trait::async_trait;
use pgbridge_common::{Credential, Identity};

use super::IdentityProvider;
use crate::auth::config::AuthMethodKind;
use crate::auth::identity::AuthResult;

#[derive(Debug, Default)]
pub struct TicketIdentityProvider;

impl TicketIdentityProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl IdentityProvider for TicketIdentityProvider {
    fn name(&self) -> &str {
        "ticket_based"
    }

    fn supports(&self, method: AuthMethodKind) -> bool {
        method == AuthMethodKind::DelegatedTicket
    }

    async fn identify(&self, credential: Credential) -> AuthResult {
        match credential {
            Credential::DelegatedTicket { principal, ticket } => {
                AuthResult::Success(Identity::delegated(principal, ticket, self.name()))
            }
            other => AuthResult::InvalidCredentials(format!(
                "ticket-based identity requires a delegated ticket, user \"{}\" presented none",
                other.user()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgbridge_common::PrincipalKind;

    #[tokio::test]
    async fn test_ticket_names_principal() {
        let provider = TicketIdentityProvider::new();
        let result = provider
            .identify(Credential::DelegatedTicket {
                principal: "alice@EXAMPLE.COM".into(),
                ticket: b"tkt".to_vec(),
            })
            .await;
        match result {
            AuthResult::Success(identity) => {
                assert_eq!(identity.name, "alice@EXAMPLE.COM");
                assert_eq!(identity.kind, PrincipalKind::Delegated);
                assert_eq!(identity.delegated_ticket(), Some(&b"tkt"[..]));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_password_credential_rejected() {
        let provider = TicketIdentityProvider::new();
        let result = provider.identify(Credential::Password { user: "bob".into() }).await;
        assert!(!result.is_success());
        assert!(!provider.supports(AuthMethodKind::Password));
    }
}
