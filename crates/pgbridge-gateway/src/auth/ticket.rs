//! Delegated ticket acceptance
//!
//! The GSS exchange hands the client's token to a `TicketAcceptor`, which names
//! the principal and may produce a reply token for the client. Deployments with
//! a real security context plug their own acceptor in; the static acceptor
//! maps known tickets to principals.

use async_trait::async_trait;
use parking_lot::RwLock;
use pgbridge_common::{BridgeError, Result};
use std::collections::HashMap;

/// A ticket the acceptor vouched for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedTicket {
    pub principal: String,
    /// Sent back to the client as AuthenticationGSSContinue
    pub output_token: Option<Vec<u8>>,
}

/// Validates client GSS tokens
#[async_trait]
pub trait TicketAcceptor: Send + Sync {
    /// Acceptor name for logging
    fn name(&self) -> &str;

    async fn accept(&self, token: &[u8]) -> Result<AcceptedTicket>;
}

/// Acceptor backed by a fixed ticket table
#[derive(Default)]
pub struct StaticTicketAcceptor {
    tickets: RwLock<HashMap<Vec<u8>, String>>,
    reply_token: Option<Vec<u8>>,
}

impl StaticTicketAcceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a ticket -> principal table
    pub fn from_table(table: &HashMap<String, String>) -> Self {
        let acceptor = Self::new();
        for (ticket, principal) in table {
            acceptor.register(ticket.as_bytes(), principal);
        }
        acceptor
    }

    /// Answer every accepted ticket with `token`
    pub fn with_reply_token(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.reply_token = Some(token.into());
        self
    }

    pub fn register(&self, ticket: &[u8], principal: &str) {
        self.tickets.write().insert(ticket.to_vec(), principal.to_string());
    }
}

#[async_trait]
impl TicketAcceptor for StaticTicketAcceptor {
    fn name(&self) -> &str {
        "static_tickets"
    }

    async fn accept(&self, token: &[u8]) -> Result<AcceptedTicket> {
        if token.is_empty() {
            return Err(BridgeError::auth("empty GSS token"));
        }
        let principal = self
            .tickets
            .read()
            .get(token)
            .cloned()
            .ok_or_else(|| BridgeError::auth("GSS authentication failed: ticket not recognized"))?;
        Ok(AcceptedTicket {
            principal,
            output_token: self.reply_token.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_acceptor() {
        let mut table = HashMap::new();
        table.insert("tkt-1".to_string(), "alice@EXAMPLE.COM".to_string());
        let acceptor = StaticTicketAcceptor::from_table(&table);

        let accepted = acceptor.accept(b"tkt-1").await.unwrap();
        assert_eq!(accepted.principal, "alice@EXAMPLE.COM");
        assert!(accepted.output_token.is_none());

        assert!(acceptor.accept(b"tkt-2").await.is_err());
        assert!(acceptor.accept(b"").await.is_err());
    }

    #[tokio::test]
    async fn test_reply_token() {
        let acceptor = StaticTicketAcceptor::new().with_reply_token(b"mutual".to_vec());
        acceptor.register(b"t", "svc");
        let accepted = acceptor.accept(b"t").await.unwrap();
        assert_eq!(accepted.output_token.as_deref(), Some(&b"mutual"[..]));
    }
}
