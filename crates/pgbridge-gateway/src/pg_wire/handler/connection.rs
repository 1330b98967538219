//! Connection handling for PostgreSQL wire protocol
//!
//! Startup packet processing, authentication, TCP keepalive configuration and
//! the connection lifecycle. Everything after accept is generic over the
//! stream type so sessions can run over in-memory pipes.

use super::auth::perform_auth;
use super::core::GatewayContext;
use super::messages::{error_response, startup_parameters, PgFramed};
use super::query_loop::run_query_loop;
use super::session::Session;
use crate::errors::{is_disconnect, ErrorInfo};
use crate::pg_wire::protocol::constants::ROUTINE_CLIENT_AUTH;
use crate::pg_wire::protocol::{BackendMessage, StartupCodec, StartupMessage, TransactionStatus};
use futures::{SinkExt, StreamExt};
use pgbridge_common::BridgeError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Configure TCP keepalive on a socket for faster dead connection detection
pub(crate) fn configure_tcp_keepalive(stream: &tokio::net::TcpStream, keepalive_secs: u64) {
    use socket2::SockRef;

    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    let socket = SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(keepalive_secs))
        .with_interval(Duration::from_secs(keepalive_secs / 2 + 1));

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    let keepalive = keepalive.with_retries(3);

    match socket.set_tcp_keepalive(&keepalive) {
        Ok(()) => debug!("TCP keepalive configured: {}s", keepalive_secs),
        Err(e) => warn!("Failed to configure TCP keepalive: {}", e),
    }
}

/// Send one FATAL ErrorResponse and give up on the connection
async fn reject<S>(framed: &mut PgFramed<S>, info: ErrorInfo) -> Result<(), BridgeError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    framed.send(error_response(info)).await?;
    Ok(())
}

/// Serve one client connection from startup to Terminate.
///
/// Clients that go away mid-session are not an error.
pub async fn serve_connection<S>(stream: S, ctx: Arc<GatewayContext>) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut startup = Framed::new(stream, StartupCodec::new(ctx.config.max_message_size));

    // SSL/GSSENC requests may come before the real startup packet
    let (user, database) = loop {
        let packet = startup.next().await;
        match packet {
            None => return Ok(()),
            Some(Ok(StartupMessage::SslRequest)) => {
                debug!("SSL negotiation requested, declining");
                startup.get_mut().write_all(b"N").await?;
                startup.get_mut().flush().await?;
            }
            Some(Ok(StartupMessage::GssEncRequest)) => {
                debug!("GSSAPI encryption requested, declining");
                startup.get_mut().write_all(b"N").await?;
                startup.get_mut().flush().await?;
            }
            Some(Ok(StartupMessage::CancelRequest { process_id, secret_key })) => {
                ctx.cancel.cancel(process_id, secret_key);
                return Ok(());
            }
            Some(Ok(msg @ StartupMessage::Startup { .. })) => {
                let user = msg.param("user").filter(|u| !u.is_empty()).map(str::to_string);
                let database = msg.param("database").map(str::to_string);
                break (user, database);
            }
            Some(Err(e)) => {
                let err = BridgeError::from(e);
                let mut framed = startup.map_codec(StartupCodec::ready);
                reject(&mut framed, ErrorInfo::from_error(&err, "ProcessStartupPacket")).await?;
                return Err(err.into());
            }
        }
    };

    let mut framed = startup.map_codec(StartupCodec::ready);

    let Some(user) = user else {
        let info = ErrorInfo::from_error(
            &BridgeError::auth("no PostgreSQL user name specified in startup packet"),
            ROUTINE_CLIENT_AUTH,
        );
        reject(&mut framed, info).await?;
        return Ok(());
    };
    debug!(user = %user, database = ?database, "Startup packet received");

    let identity = match perform_auth(&mut framed, &ctx.auth, &user).await {
        Ok(identity) => identity,
        Err(e) if is_disconnect(&e) => {
            debug!(user = %user, "Client disconnected during authentication");
            return Ok(());
        }
        Err(e) => {
            warn!(user = %user, error = %e, "Authentication failed");
            reject(&mut framed, ErrorInfo::from_error(&e, ROUTINE_CLIENT_AUTH)).await?;
            return Ok(());
        }
    };

    let pid = ctx.next_pid();
    let secret_key: i32 = rand::random();
    let registration = ctx.cancel.register(pid, secret_key);

    framed.feed(BackendMessage::AuthenticationOk).await?;
    for param in startup_parameters(&ctx.config.server_version) {
        framed.feed(param).await?;
    }
    framed
        .feed(BackendMessage::BackendKeyData {
            process_id: pid,
            secret_key,
        })
        .await?;
    framed.send(BackendMessage::ReadyForQuery(TransactionStatus::Idle)).await?;
    info!(pid, user = %user, identity = %identity.name, "Session ready");

    let mut session = Session::new(identity, registration);
    match run_query_loop(&mut framed, &ctx, &mut session).await {
        Ok(()) => {
            info!(pid, "Session closed");
            Ok(())
        }
        Err(e) if is_disconnect(&e) => {
            debug!(pid, "Client disconnected: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
