//! Authentication configuration
//!
//! One authentication method and one identity provider are chosen for the
//! whole process. Credential tables are loaded from the environment.

use pgbridge_common::BridgeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// How clients prove who they are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethodKind {
    /// Trust every client (development/internal use)
    #[default]
    NoPassword,
    /// Cleartext password checked against the user table
    Password,
    /// GSS exchange carrying a delegated ticket
    DelegatedTicket,
}

impl FromStr for AuthMethodKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "no_password" | "nopassword" | "none" | "trust" => Ok(AuthMethodKind::NoPassword),
            "password" | "cleartext" => Ok(AuthMethodKind::Password),
            "delegated_ticket" | "gss" | "kerberos" => Ok(AuthMethodKind::DelegatedTicket),
            other => Err(BridgeError::Config(format!("unknown auth method: {}", other))),
        }
    }
}

impl fmt::Display for AuthMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethodKind::NoPassword => write!(f, "no_password"),
            AuthMethodKind::Password => write!(f, "password"),
            AuthMethodKind::DelegatedTicket => write!(f, "delegated_ticket"),
        }
    }
}

/// Who vouches for the principal once the method has succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Every session runs as the anonymous identity
    #[default]
    Anonymous,
    /// Sessions run as the principal named by a delegated ticket
    TicketBased,
}

impl FromStr for IdentityKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "anonymous" | "none" => Ok(IdentityKind::Anonymous),
            "ticket_based" | "ticket" | "kerberos" => Ok(IdentityKind::TicketBased),
            other => Err(BridgeError::Config(format!("unknown identity type: {}", other))),
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::Anonymous => write!(f, "anonymous"),
            IdentityKind::TicketBased => write!(f, "ticket_based"),
        }
    }
}

/// Main authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethodKind,

    #[serde(default)]
    pub identity: IdentityKind,

    /// user -> password, for the password method
    #[serde(default)]
    pub users: HashMap<String, String>,

    /// ticket -> principal, for the static ticket acceptor
    #[serde(default)]
    pub tickets: HashMap<String, String>,
}

impl AuthConfig {
    pub fn new(method: AuthMethodKind, identity: IdentityKind) -> Self {
        Self {
            method,
            identity,
            ..Self::default()
        }
    }

    /// Load credential tables from environment variables
    pub fn from_env(method: AuthMethodKind, identity: IdentityKind) -> Self {
        Self {
            method,
            identity,
            users: std::env::var("PGBRIDGE_AUTH_USERS")
                .map(|v| parse_pairs(&v))
                .unwrap_or_default(),
            tickets: std::env::var("PGBRIDGE_AUTH_TICKETS")
                .map(|v| parse_pairs(&v))
                .unwrap_or_default(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(user.into(), password.into());
        self
    }

    pub fn with_ticket(mut self, ticket: impl Into<String>, principal: impl Into<String>) -> Self {
        self.tickets.insert(ticket.into(), principal.into());
        self
    }

    /// Reject method/provider pairs that can never produce an identity
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.identity == IdentityKind::TicketBased && self.method != AuthMethodKind::DelegatedTicket {
            return Err(BridgeError::Config(format!(
                "identity type {} requires the delegated_ticket auth method, got {}",
                self.identity, self.method
            )));
        }
        Ok(())
    }
}

/// Parse `key:value,key:value`; malformed entries are skipped
fn parse_pairs(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (key, value) = entry.split_once(':')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_method_names() {
        assert_eq!("no-password".parse::<AuthMethodKind>().unwrap(), AuthMethodKind::NoPassword);
        assert_eq!("PASSWORD".parse::<AuthMethodKind>().unwrap(), AuthMethodKind::Password);
        assert_eq!("kerberos".parse::<AuthMethodKind>().unwrap(), AuthMethodKind::DelegatedTicket);
        assert!("ldap".parse::<AuthMethodKind>().is_err());
        assert_eq!("ticket-based".parse::<IdentityKind>().unwrap(), IdentityKind::TicketBased);
    }

    #[test]
    fn test_ticket_identity_requires_ticket_method() {
        assert!(AuthConfig::new(AuthMethodKind::Password, IdentityKind::TicketBased)
            .validate()
            .is_err());
        assert!(AuthConfig::new(AuthMethodKind::DelegatedTicket, IdentityKind::TicketBased)
            .validate()
            .is_ok());
        assert!(AuthConfig::new(AuthMethodKind::DelegatedTicket, IdentityKind::Anonymous)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("alice:secret, bob:pa:ss,broken,:nokey");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["alice"], "secret");
        assert_eq!(pairs["bob"], "pa:ss");
    }

    #[test]
    fn test_serde_names() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"method":"delegated_ticket","identity":"ticket_based"}"#).unwrap();
        assert_eq!(config.method, AuthMethodKind::DelegatedTicket);
        assert!(config.users.is_empty());
    }
}
