//! PostgreSQL wire protocol handler
//!
//! - `core` - GatewayContext, PgWireServer and the accept loop
//! - `connection` - startup packets, TCP keepalive, connection lifecycle
//! - `auth` - authentication exchange
//! - `query_loop` - message dispatch and error recovery
//! - `execution` - backend calls and the Simple Query cycle
//! - `extended` - Extended Query Protocol handlers
//! - `session` / `portal` - per-connection state
//! - `messages` - protocol message builders
//! - `utils` - SQL text helpers

pub mod core;
mod auth;
mod connection;
mod execution;
mod extended;
mod messages;
mod portal;
mod query_loop;
mod session;
pub(crate) mod utils;

pub use self::core::{GatewayContext, PgWireServer};
pub use connection::serve_connection;
