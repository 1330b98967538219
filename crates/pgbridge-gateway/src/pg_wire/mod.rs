//! PostgreSQL wire protocol server
//!
//! Clients (psql, JDBC, BI tools) talk protocol 3.0 to the gateway; queries
//! are forwarded to the HTTP execution backend.

pub mod cancel;
pub mod config;
pub mod handler;
pub mod marshal;
pub mod protocol;

pub use cancel::CancelRegistry;
pub use config::PgWireConfig;
pub use handler::{serve_connection, GatewayContext, PgWireServer};
