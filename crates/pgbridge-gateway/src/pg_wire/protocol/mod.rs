//! PostgreSQL wire protocol definitions
//!
//! Contains type mappings, constants, messages and the framing codecs.

pub mod codec;
pub mod constants;
pub mod messages;
pub mod types;

pub use codec::{PgCodec, StartupCodec};
pub use messages::{
    BackendMessage, ErrorFields, FieldDescription, FrontendMessage, ProtocolError, Severity,
    StartupMessage, Target, TransactionStatus,
};
pub use types::{oid, FormatCode, PgType};
