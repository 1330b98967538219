//! Error classification for pgbridge Gateway
//!
//! This module turns a `BridgeError` into what the client sees:
//! - the PostgreSQL SQLSTATE code and severity
//! - the origin fields (file, line, routine) and a short stack summary
//! - a category used for structured logging

use pgbridge_common::BridgeError;
use std::error::Error as _;
use std::fmt;
use std::panic::Location;
use std::path::Path;

use crate::pg_wire::protocol::constants::MAX_ERROR_STACK_FRAMES;
use crate::pg_wire::protocol::messages::{ErrorFields, Severity};

/// PostgreSQL SQLSTATE error codes
/// See: https://www.postgresql.org/docs/current/errcodes-appendix.html
pub mod sqlstate {
    // Class 08 - Connection Exception
    pub const CONNECTION_FAILURE: &str = "08006";
    pub const PROTOCOL_VIOLATION: &str = "08P01";

    // Class 22 - Data Exception
    pub const DATETIME_FIELD_OVERFLOW: &str = "22008";
    pub const INVALID_DATETIME_FORMAT: &str = "22007";
    pub const CHARACTER_NOT_IN_REPERTOIRE: &str = "22021";
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    pub const INVALID_BINARY_REPRESENTATION: &str = "22P03";

    // Class 25 - Invalid Transaction State
    pub const IN_FAILED_SQL_TRANSACTION: &str = "25P02";

    // Class 26 - Invalid SQL Statement Name
    pub const INVALID_SQL_STATEMENT_NAME: &str = "26000";

    // Class 28 - Invalid Authorization Specification
    pub const INVALID_AUTHORIZATION: &str = "28000";
    pub const INVALID_PASSWORD: &str = "28P01";

    // Class 34 - Invalid Cursor Name
    pub const INVALID_CURSOR_NAME: &str = "34000";

    // Class 42 - Syntax Error or Access Rule Violation
    pub const DUPLICATE_CURSOR: &str = "42P03";
    pub const DUPLICATE_PREPARED_STATEMENT: &str = "42P05";

    // Class 57 - Operator Intervention
    pub const QUERY_CANCELED: &str = "57014";

    // Class XX - Internal Error
    pub const INTERNAL_ERROR: &str = "XX000";
}

/// Error category for classification and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed frames, unexpected messages
    Protocol,
    /// Authentication failures
    Auth,
    /// Unknown statement/portal, parameter mismatch, transaction state
    Statement,
    /// Backend rejected the query or a value failed conversion
    Execution,
    /// Backend or client connection problems
    Connection,
    /// Cancelled by the client
    Cancelled,
    /// Internal/unknown errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Auth => write!(f, "auth"),
            ErrorCategory::Statement => write!(f, "statement"),
            ErrorCategory::Execution => write!(f, "execution"),
            ErrorCategory::Connection => write!(f, "connection"),
            ErrorCategory::Cancelled => write!(f, "cancelled"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}

/// Everything needed to build an ErrorResponse
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub severity: Severity,
    pub sqlstate: &'static str,
    pub category: ErrorCategory,
    pub message: String,
    /// Source file that raised the error
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Handler that raised the error
    pub routine: Option<String>,
    /// Stack summary, one frame per line
    pub stack: Option<String>,
}

impl ErrorInfo {
    /// Classify `err` raised by `routine`.
    ///
    /// The caller's location is recorded as the origin file and line.
    #[track_caller]
    pub fn from_error(err: &BridgeError, routine: &str) -> Self {
        let location = Location::caller();
        let (severity, sqlstate, category) = classify(err);
        let stack = match err {
            BridgeError::Execution { trace: Some(trace), .. } => summarize(trace.lines()),
            _ => source_chain(err),
        };

        Self {
            severity,
            sqlstate,
            category,
            message: err.to_string(),
            file: Some(file_name(location.file())),
            line: Some(location.line()),
            routine: Some(routine.to_string()),
            stack,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    pub fn into_fields(self) -> ErrorFields {
        ErrorFields {
            severity: self.severity,
            code: self.sqlstate.to_string(),
            message: self.message,
            file: self.file,
            line: self.line,
            routine: self.routine,
            stack: self.stack,
        }
    }
}

/// Severity, SQLSTATE and category for each error kind
pub fn classify(err: &BridgeError) -> (Severity, &'static str, ErrorCategory) {
    match err {
        BridgeError::Protocol(_) => (Severity::Fatal, sqlstate::PROTOCOL_VIOLATION, ErrorCategory::Protocol),
        BridgeError::Authentication { bad_password: true, .. } => {
            (Severity::Fatal, sqlstate::INVALID_PASSWORD, ErrorCategory::Auth)
        }
        BridgeError::Authentication { .. } => (Severity::Fatal, sqlstate::INVALID_AUTHORIZATION, ErrorCategory::Auth),
        BridgeError::Statement { sqlstate: state, .. } => (Severity::Error, *state, ErrorCategory::Statement),
        BridgeError::Execution { sqlstate: state, .. } => (
            Severity::Error,
            state.unwrap_or(sqlstate::INTERNAL_ERROR),
            ErrorCategory::Execution,
        ),
        BridgeError::Transport { .. } => (Severity::Error, sqlstate::CONNECTION_FAILURE, ErrorCategory::Connection),
        BridgeError::Cancelled => (Severity::Error, sqlstate::QUERY_CANCELED, ErrorCategory::Cancelled),
        BridgeError::Config(_) => (Severity::Fatal, sqlstate::INTERNAL_ERROR, ErrorCategory::Internal),
        BridgeError::Io(_) => (Severity::Fatal, sqlstate::CONNECTION_FAILURE, ErrorCategory::Connection),
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

fn summarize<'a>(frames: impl Iterator<Item = &'a str>) -> Option<String> {
    let frames: Vec<&str> = frames
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .take(MAX_ERROR_STACK_FRAMES)
        .collect();
    (!frames.is_empty()).then(|| frames.join("\n"))
}

fn source_chain(err: &BridgeError) -> Option<String> {
    let mut causes = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    summarize(causes.iter().map(String::as_str))
}

/// True for errors that only mean the client went away
pub fn is_disconnect(err: &BridgeError) -> bool {
    match err {
        BridgeError::Io(e) => matches!(
            e.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::ConnectionAborted
        ),
        other => {
            let msg = other.to_string().to_lowercase();
            msg.contains("early eof") || msg.contains("connection reset")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sqlstates() {
        assert_eq!(classify(&BridgeError::protocol("bad")).1, "08P01");
        assert_eq!(classify(&BridgeError::protocol("bad")).0, Severity::Fatal);
        assert_eq!(classify(&BridgeError::bad_password("bob")).1, "28P01");
        assert_eq!(classify(&BridgeError::auth("no user")).1, "28000");
        assert_eq!(classify(&BridgeError::statement("26000", "missing")).1, "26000");
        assert_eq!(classify(&BridgeError::execution("boom")).1, "XX000");
        assert_eq!(classify(&BridgeError::conversion("22007", "bad date")).1, "22007");
        assert_eq!(
            classify(&BridgeError::Transport { status: None, body: "refused".into() }).1,
            "08006"
        );
        assert_eq!(classify(&BridgeError::Cancelled).1, "57014");
        assert_eq!(classify(&BridgeError::Cancelled).0, Severity::Error);
    }

    #[test]
    fn test_origin_fields_recorded() {
        let info = ErrorInfo::from_error(&BridgeError::execution("boom"), "simple_query");
        assert_eq!(info.file.as_deref(), Some("errors.rs"));
        assert!(info.line.unwrap_or(0) > 0);
        assert_eq!(info.routine.as_deref(), Some("simple_query"));
        assert!(info.stack.is_none());
    }

    #[test]
    fn test_backend_trace_truncated() {
        let trace = (0..30).map(|i| format!("frame {}", i)).collect::<Vec<_>>().join("\n");
        let err = BridgeError::Execution {
            message: "boom".into(),
            trace: Some(trace),
            sqlstate: None,
        };
        let stack = ErrorInfo::from_error(&err, "execute").stack.unwrap();
        assert_eq!(stack.lines().count(), MAX_ERROR_STACK_FRAMES);
        assert_eq!(stack.lines().next(), Some("frame 0"));
    }

    #[test]
    fn test_io_source_in_stack() {
        let err = BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, "pipe closed"));
        let info = ErrorInfo::from_error(&err, "connection");
        assert!(info.is_fatal());
        assert_eq!(info.into_fields().code, "08006");
    }

    #[test]
    fn test_disconnect_detection() {
        let eof = BridgeError::Io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "early eof"));
        assert!(is_disconnect(&eof));
        assert!(!is_disconnect(&BridgeError::execution("boom")));
    }
}
