//! Authenticated identities and the credentials that produced them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name reported for sessions that did not present a verifiable principal
pub const ANONYMOUS: &str = "anonymous";

/// Kind of principal behind a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    /// No verifiable principal
    Anonymous,
    /// Principal verified by username/password
    User,
    /// Principal established through a delegated ticket
    Delegated,
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrincipalKind::Anonymous => write!(f, "anonymous"),
            PrincipalKind::User => write!(f, "user"),
            PrincipalKind::Delegated => write!(f, "delegated"),
        }
    }
}

/// What the client presented during authentication.
///
/// The password itself is never retained once it has been verified.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Anonymous { user: String },
    Password { user: String },
    DelegatedTicket { principal: String, ticket: Vec<u8> },
}

impl Credential {
    /// The user name the client asked for (or the ticket's principal)
    pub fn user(&self) -> &str {
        match self {
            Credential::Anonymous { user } | Credential::Password { user } => user,
            Credential::DelegatedTicket { principal, .. } => principal,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Anonymous { user } => f.debug_struct("Anonymous").field("user", user).finish(),
            Credential::Password { user } => f.debug_struct("Password").field("user", user).finish(),
            Credential::DelegatedTicket { principal, ticket } => f
                .debug_struct("DelegatedTicket")
                .field("principal", principal)
                .field("ticket", &format_args!("<{} bytes>", ticket.len()))
                .finish(),
        }
    }
}

/// Authenticated principal bound to a session for its whole lifetime
#[derive(Debug, Clone)]
pub struct Identity {
    /// Principal name
    pub name: String,
    pub kind: PrincipalKind,
    /// Credential that produced this identity
    pub credential: Credential,
    /// Identity provider that vouched for the principal
    pub provider: String,
    pub authenticated_at: DateTime<Utc>,
}

impl Identity {
    /// Anonymous identity wrapping whatever credential was presented
    pub fn anonymous(credential: Credential, provider: impl Into<String>) -> Self {
        Self {
            name: ANONYMOUS.to_string(),
            kind: PrincipalKind::Anonymous,
            credential,
            provider: provider.into(),
            authenticated_at: Utc::now(),
        }
    }

    /// Identity for a principal established through a delegated ticket
    pub fn delegated(principal: impl Into<String>, ticket: Vec<u8>, provider: impl Into<String>) -> Self {
        let principal = principal.into();
        Self {
            name: principal.clone(),
            kind: PrincipalKind::Delegated,
            credential: Credential::DelegatedTicket { principal, ticket },
            provider: provider.into(),
            authenticated_at: Utc::now(),
        }
    }

    /// Delegated ticket to present on behalf of this identity, if any
    pub fn delegated_ticket(&self) -> Option<&[u8]> {
        match &self.credential {
            Credential::DelegatedTicket { ticket, .. } => Some(ticket),
            _ => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.kind == PrincipalKind::Anonymous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_identity_keeps_requested_user() {
        let identity = Identity::anonymous(Credential::Anonymous { user: "alice".into() }, "anonymous");
        assert!(identity.is_anonymous());
        assert_eq!(identity.name, ANONYMOUS);
        assert_eq!(identity.credential.user(), "alice");
        assert!(identity.delegated_ticket().is_none());
    }

    #[test]
    fn test_delegated_identity_exposes_ticket() {
        let identity = Identity::delegated("alice@EXAMPLE.COM", b"tkt".to_vec(), "ticket");
        assert_eq!(identity.kind, PrincipalKind::Delegated);
        assert_eq!(identity.delegated_ticket(), Some(&b"tkt"[..]));
        assert_eq!(identity.credential.user(), "alice@EXAMPLE.COM");
    }

    #[test]
    fn test_credential_debug_hides_ticket_bytes() {
        let credential = Credential::DelegatedTicket {
            principal: "svc".into(),
            ticket: vec![0xde, 0xad, 0xbe, 0xef],
        };
        let rendered = format!("{:?}", credential);
        assert!(rendered.contains("<4 bytes>"));
        assert!(!rendered.contains("222"));
    }
}
