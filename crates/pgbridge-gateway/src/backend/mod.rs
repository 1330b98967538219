//! Backend bridge
//!
//! Queries are executed by a remote HTTP service; the gateway only sees column
//! metadata and JSON rows. `QueryBackend` is the seam between the wire session
//! and that service so tests can run sessions against an in-memory backend.

pub mod client;
pub mod model;
pub mod result;

use async_trait::async_trait;
use pgbridge_common::{Identity, Result};

pub use client::HttpBackend;
pub use model::{Column, DomainType};
pub use result::{ResultSet, Row, Value};

/// Executes queries on behalf of an authenticated identity
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Result columns of `query` without running it
    async fn schema(&self, query: &str, identity: &Identity) -> Result<Vec<Column>>;

    /// Run `query` and return a forward-only result
    async fn execute(&self, query: &str, identity: &Identity) -> Result<ResultSet>;
}
