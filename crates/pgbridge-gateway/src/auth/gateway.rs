//! Authentication Gateway
//!
//! Main entry point for authentication in pgbridge. Holds the process-wide
//! method, the user table, the ticket acceptor and the identity provider. The
//! wire exchange itself lives in the connection handler.

use std::collections::HashMap;
use std::sync::Arc;

use pgbridge_common::{BridgeError, Credential, Result};
use tracing::{debug, info, warn};

use super::config::{AuthConfig, AuthMethodKind, IdentityKind};
use super::identity::AuthResult;
use super::providers::{AnonymousProvider, IdentityProvider, TicketIdentityProvider};
use super::ticket::{AcceptedTicket, StaticTicketAcceptor, TicketAcceptor};

/// The main authentication gateway
pub struct AuthGateway {
    method: AuthMethodKind,
    /// user -> password for the password method
    users: HashMap<String, String>,
    acceptor: Arc<dyn TicketAcceptor>,
    provider: Arc<dyn IdentityProvider>,
}

impl AuthGateway {
    /// Create a new auth gateway from configuration
    pub fn new(config: AuthConfig) -> Result<Self> {
        config.validate()?;

        let provider: Arc<dyn IdentityProvider> = match config.identity {
            IdentityKind::Anonymous => Arc::new(AnonymousProvider::new()),
            IdentityKind::TicketBased => Arc::new(TicketIdentityProvider::new()),
        };
        if !provider.supports(config.method) {
            return Err(BridgeError::Config(format!(
                "identity provider {} cannot identify {} credentials",
                provider.name(),
                config.method
            )));
        }
        if config.method == AuthMethodKind::Password && config.users.is_empty() {
            warn!("Password authentication configured with an empty user table; every login will fail");
        }

        info!(
            method = %config.method,
            provider = provider.name(),
            users = config.users.len(),
            tickets = config.tickets.len(),
            "Auth gateway initialized"
        );

        Ok(Self {
            method: config.method,
            acceptor: Arc::new(StaticTicketAcceptor::from_table(&config.tickets)),
            users: config.users,
            provider,
        })
    }

    /// Create a trust-everyone gateway (no auth required)
    pub fn trust() -> Self {
        Self {
            method: AuthMethodKind::NoPassword,
            users: HashMap::new(),
            acceptor: Arc::new(StaticTicketAcceptor::new()),
            provider: Arc::new(AnonymousProvider::new()),
        }
    }

    /// Replace the ticket acceptor
    pub fn with_acceptor(mut self, acceptor: Arc<dyn TicketAcceptor>) -> Self {
        self.acceptor = acceptor;
        self
    }

    pub fn method(&self) -> AuthMethodKind {
        self.method
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Check a cleartext password against the user table
    pub fn verify_password(&self, user: &str, password: &str) -> bool {
        let ok = self
            .users
            .get(user)
            .is_some_and(|expected| expected.as_bytes() == password.as_bytes());
        debug!(user = %user, ok, "Password verification");
        ok
    }

    /// Validate a client GSS token
    pub async fn accept_ticket(&self, token: &[u8]) -> Result<AcceptedTicket> {
        if token.is_empty() {
            return Err(BridgeError::auth("empty GSS token"));
        }
        let accepted = self.acceptor.accept(token).await?;
        debug!(acceptor = self.acceptor.name(), principal = %accepted.principal, "Ticket accepted");
        Ok(accepted)
    }

    /// Resolve the session identity for a verified credential
    pub async fn identify(&self, credential: Credential) -> AuthResult {
        self.provider.identify(credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_table() {
        let gateway = AuthGateway::new(
            AuthConfig::new(AuthMethodKind::Password, IdentityKind::Anonymous).with_user("alice", "secret"),
        )
        .unwrap();
        assert!(gateway.verify_password("alice", "secret"));
        assert!(!gateway.verify_password("alice", "wrong"));
        assert!(!gateway.verify_password("bob", "secret"));
        assert!(!gateway.verify_password("", ""));
    }

    #[test]
    fn test_invalid_pairing_rejected() {
        let err = AuthGateway::new(AuthConfig::new(AuthMethodKind::NoPassword, IdentityKind::TicketBased));
        assert!(matches!(err, Err(BridgeError::Config(_))));
    }

    #[tokio::test]
    async fn test_ticket_flow_identifies_principal() {
        let gateway = AuthGateway::new(
            AuthConfig::new(AuthMethodKind::DelegatedTicket, IdentityKind::TicketBased)
                .with_ticket("tkt", "alice@EXAMPLE.COM"),
        )
        .unwrap();

        assert!(gateway.accept_ticket(b"").await.is_err());
        assert!(gateway.accept_ticket(b"other").await.is_err());

        let accepted = gateway.accept_ticket(b"tkt").await.unwrap();
        let identity = gateway
            .identify(Credential::DelegatedTicket {
                principal: accepted.principal,
                ticket: b"tkt".to_vec(),
            })
            .await
            .into_result()
            .unwrap();
        assert_eq!(identity.name, "alice@EXAMPLE.COM");
        assert_eq!(identity.provider, "ticket_based");
    }

    #[tokio::test]
    async fn test_trust_is_anonymous() {
        let gateway = AuthGateway::trust();
        assert_eq!(gateway.method(), AuthMethodKind::NoPassword);
        let identity = gateway
            .identify(Credential::Anonymous { user: "x".into() })
            .await
            .into_result()
            .unwrap();
        assert!(identity.is_anonymous());
    }
}
