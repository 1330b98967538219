//! PostgreSQL wire protocol constants
//!
//! Startup request codes, authentication request codes and framing limits.

/// Protocol version 3.0 as sent in the startup packet
pub const PROTOCOL_VERSION_3: i32 = 3 << 16;

/// SSLRequest magic code
pub const SSL_REQUEST_CODE: i32 = 80877103;

/// GSSENCRequest magic code
pub const GSSENC_REQUEST_CODE: i32 = 80877104;

/// CancelRequest magic code
pub const CANCEL_REQUEST_CODE: i32 = 80877102;

/// Authentication request codes carried by 'R' messages
pub const AUTH_OK: i32 = 0;
pub const AUTH_CLEARTEXT_PASSWORD: i32 = 3;
pub const AUTH_GSS: i32 = 7;
pub const AUTH_GSS_CONTINUE: i32 = 8;

/// Maximum message size in bytes (16 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Startup packets are small; anything larger is a broken or hostile client
pub const MAX_STARTUP_PACKET_SIZE: usize = 10_000;

/// Frames kept in the 'W' field of an ErrorResponse
pub const MAX_ERROR_STACK_FRAMES: usize = 20;

/// Routine reported on authentication failures
pub const ROUTINE_CLIENT_AUTH: &str = "ClientAuthentication";
