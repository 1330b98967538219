//! pgbridge Gateway Service
//!
//! Accepts PostgreSQL wire-protocol connections (psql, JDBC, BI tools) and
//! runs their queries on the HTTP/JSON execution backend.

use clap::Parser;
use pgbridge_common::BackendSettings;
use pgbridge_gateway::auth::{AuthConfig, AuthGateway, AuthMethodKind, IdentityKind};
use pgbridge_gateway::{telemetry, GatewayContext, HttpBackend, PgWireConfig, PgWireServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pgbridge-gateway")]
#[command(about = "PostgreSQL wire-protocol gateway for an HTTP/JSON query backend")]
struct Args {
    /// Address to listen on for PostgreSQL clients
    #[arg(long, env = "PG_HOST", default_value = "0.0.0.0")]
    pg_host: String,

    /// PostgreSQL wire protocol port
    #[arg(long, env = "PG_PORT", default_value = "5432")]
    pg_port: u16,

    /// Backend scheme (http or https)
    #[arg(long, env = "BACKEND_PROTOCOL", default_value = "http")]
    backend_protocol: String,

    #[arg(long, env = "BACKEND_HOST", default_value = "localhost")]
    backend_host: String,

    #[arg(long, env = "BACKEND_PORT", default_value = "6300")]
    backend_port: u16,

    /// Backend connection timeout in seconds
    #[arg(long, env = "BACKEND_CONNECT_TIMEOUT_SECS", default_value = "10")]
    backend_connect_timeout_secs: u64,

    /// Whole-request timeout in seconds (0 = none)
    #[arg(long, env = "BACKEND_REQUEST_TIMEOUT_SECS", default_value = "0")]
    backend_request_timeout_secs: u64,

    /// no-password, password or delegated-ticket
    #[arg(long, env = "AUTH_METHOD", default_value = "no-password")]
    auth_method: AuthMethodKind,

    /// anonymous or ticket-based
    #[arg(long, env = "IDENTITY_TYPE", default_value = "anonymous")]
    identity_type: IdentityKind,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    telemetry::init(&args.log_level)?;

    let addr: SocketAddr = format!("{}:{}", args.pg_host, args.pg_port).parse()?;
    let settings = BackendSettings {
        connect_timeout_secs: args.backend_connect_timeout_secs,
        request_timeout_secs: args.backend_request_timeout_secs,
        ..BackendSettings::new(&args.backend_protocol, &args.backend_host, args.backend_port)
    };

    info!("Starting pgbridge Gateway");
    info!("  PostgreSQL address: {}", addr);
    info!("  Backend: {}", settings.base_url());
    info!("  Auth method: {}", args.auth_method);
    info!("  Identity type: {}", args.identity_type);

    let auth = Arc::new(AuthGateway::new(AuthConfig::from_env(args.auth_method, args.identity_type))?);
    let backend = Arc::new(HttpBackend::new(&settings)?);
    let ctx = GatewayContext::new(PgWireConfig::default(), auth, backend);
    let server = PgWireServer::new(addr, ctx);

    let pg_handle = tokio::spawn(async move {
        if let Err(e) = server.start().await {
            tracing::error!("PostgreSQL server error: {}", e);
        }
    });

    info!("pgbridge Gateway started successfully");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down pgbridge Gateway");
        }
        _ = pg_handle => {}
    }

    Ok(())
}
