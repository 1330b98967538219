//! PgWireServer - PostgreSQL wire protocol server
//!
//! Shared gateway context, the accept loop and per-connection task spawning.

use super::connection::{configure_tcp_keepalive, serve_connection};
use crate::auth::AuthGateway;
use crate::backend::QueryBackend;
use crate::pg_wire::cancel::CancelRegistry;
use crate::pg_wire::config::PgWireConfig;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Process-wide state every connection task shares
pub struct GatewayContext {
    pub config: Arc<PgWireConfig>,
    pub auth: Arc<AuthGateway>,
    pub backend: Arc<dyn QueryBackend>,
    pub cancel: Arc<CancelRegistry>,
    next_pid: AtomicI32,
}

impl GatewayContext {
    pub fn new(config: PgWireConfig, auth: Arc<AuthGateway>, backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            config: Arc::new(config),
            auth,
            backend,
            cancel: CancelRegistry::new(),
            next_pid: AtomicI32::new(1),
        }
    }

    /// Share an existing cancellation registry
    pub fn with_cancel_registry(mut self, cancel: Arc<CancelRegistry>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Backend pid for a new session
    pub(crate) fn next_pid(&self) -> i32 {
        self.next_pid.fetch_add(1, Ordering::Relaxed)
    }
}

/// PostgreSQL wire protocol server
pub struct PgWireServer {
    addr: SocketAddr,
    ctx: Arc<GatewayContext>,
}

impl PgWireServer {
    pub fn new(addr: SocketAddr, ctx: GatewayContext) -> Self {
        ctx.config.log_config();
        Self {
            addr,
            ctx: Arc::new(ctx),
        }
    }

    pub fn context(&self) -> &Arc<GatewayContext> {
        &self.ctx
    }

    /// Bind the listening socket and serve until the task is dropped
    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        info!(
            "Starting PostgreSQL wire protocol server on {} (auth={}, provider={})",
            self.addr,
            self.ctx.auth.method(),
            self.ctx.auth.provider_name()
        );
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (socket, peer_addr) = listener.accept().await?;
            info!("New PostgreSQL connection from {}", peer_addr);

            configure_tcp_keepalive(&socket, self.ctx.config.tcp_keepalive_secs);

            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(socket, ctx).await {
                    let err_str = e.to_string();
                    if err_str.contains("early eof") || err_str.contains("connection reset") {
                        debug!("Client disconnected: {}", err_str);
                    } else {
                        error!("Error handling PostgreSQL connection from {}: {}", peer_addr, e);
                    }
                }
            });
        }
    }
}
