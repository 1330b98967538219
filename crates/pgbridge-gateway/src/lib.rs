//! pgbridge Gateway
//!
//! PostgreSQL wire-protocol front end for an HTTP/JSON query engine. Clients
//! connect with any PostgreSQL driver; queries run on the backend under the
//! identity established at authentication.

pub mod auth;
pub mod backend;
pub mod errors;
pub mod pg_wire;
pub mod telemetry;

pub use backend::{HttpBackend, QueryBackend};
pub use pg_wire::{serve_connection, GatewayContext, PgWireConfig, PgWireServer};
