//! Error types shared by the pgbridge services

use std::fmt;

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error taxonomy for the gateway.
///
/// Framing, authentication and socket errors end the connection. Everything
/// else is reported to the client and the session carries on after `Sync`.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Malformed or truncated protocol message
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Bad credential or unsupported authentication exchange
    #[error("{message}")]
    Authentication {
        message: String,
        /// Distinguishes a rejected password (28P01) from other failures (28000)
        bad_password: bool,
    },

    /// Unknown prepared statement or portal, parameter mismatch
    #[error("{message}")]
    Statement {
        sqlstate: &'static str,
        message: String,
    },

    /// Backend rejected the query or a value failed conversion
    #[error("{message}")]
    Execution {
        message: String,
        /// Backend-supplied trace, one frame per line
        trace: Option<String>,
        /// Data-exception SQLSTATE for conversion failures
        sqlstate: Option<&'static str>,
    },

    /// Backend unreachable or answered with an unparsable error body
    #[error("backend request failed (status {}): {body}", status_text(.status))]
    Transport { status: Option<u16>, body: String },

    /// The in-flight backend call was cancelled by a CancelRequest
    #[error("canceling statement due to user request")]
    Cancelled,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_text(status: &Option<u16>) -> String {
    status.map(|s| s.to_string()).unwrap_or_else(|| "none".into())
}

impl BridgeError {
    pub fn protocol<E: fmt::Display>(err: E) -> Self {
        BridgeError::Protocol(err.to_string())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        BridgeError::Authentication {
            message: message.into(),
            bad_password: false,
        }
    }

    pub fn bad_password(user: &str) -> Self {
        BridgeError::Authentication {
            message: format!("password authentication failed for user \"{}\"", user),
            bad_password: true,
        }
    }

    pub fn statement(sqlstate: &'static str, message: impl Into<String>) -> Self {
        BridgeError::Statement {
            sqlstate,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BridgeError::Execution {
            message: message.into(),
            trace: None,
            sqlstate: None,
        }
    }

    /// A value that could not be converted for its declared column type
    pub fn conversion(sqlstate: &'static str, message: impl Into<String>) -> Self {
        BridgeError::Execution {
            message: message.into(),
            trace: None,
            sqlstate: Some(sqlstate),
        }
    }

    /// Whether this error must terminate the connection
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::Protocol(_) | BridgeError::Authentication { .. } | BridgeError::Io(_)
        )
    }

    /// Get the error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Protocol(_) => "PROTOCOL_VIOLATION",
            BridgeError::Authentication { .. } => "UNAUTHENTICATED",
            BridgeError::Statement { .. } => "INVALID_STATEMENT",
            BridgeError::Execution { .. } => "EXECUTION_FAILED",
            BridgeError::Transport { .. } => "UNAVAILABLE",
            BridgeError::Cancelled => "CANCELLED",
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Transport {
            status: None,
            body: format!("invalid JSON from backend: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BridgeError::Cancelled.code(), "CANCELLED");
        assert_eq!(BridgeError::protocol("bad length").code(), "PROTOCOL_VIOLATION");
        assert_eq!(BridgeError::execution("boom").code(), "EXECUTION_FAILED");
    }

    #[test]
    fn test_fatality() {
        assert!(BridgeError::protocol("x").is_fatal());
        assert!(BridgeError::bad_password("alice").is_fatal());
        assert!(!BridgeError::statement("26000", "missing").is_fatal());
        assert!(!BridgeError::Transport { status: Some(502), body: "gateway".into() }.is_fatal());
        assert!(!BridgeError::Cancelled.is_fatal());
    }

    #[test]
    fn test_transport_display() {
        let err = BridgeError::Transport { status: Some(503), body: "down".into() };
        assert_eq!(err.to_string(), "backend request failed (status 503): down");
        let err = BridgeError::Transport { status: None, body: "refused".into() };
        assert_eq!(err.to_string(), "backend request failed (status none): refused");
    }

    #[test]
    fn test_bad_password_message() {
        let err = BridgeError::bad_password("bob");
        assert_eq!(err.to_string(), "password authentication failed for user \"bob\"");
    }
}
