//! Main query processing loop
//!
//! Reads frontend messages in order and dispatches them to the simple or
//! extended query handlers. After an extended-protocol error everything up to
//! the next Sync is discarded.

use super::core::GatewayContext;
use super::execution::simple_query;
use super::extended::{handle_bind, handle_close, handle_describe, handle_execute, handle_parse};
use super::messages::{error_response, PgFramed};
use super::session::Session;
use crate::errors::{is_disconnect, ErrorInfo};
use crate::pg_wire::protocol::{BackendMessage, FrontendMessage};
use futures::{SinkExt, StreamExt};
use pgbridge_common::{BridgeError, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, warn};

/// Routine reported in ErrorResponse for each message type
fn routine(msg: &FrontendMessage) -> &'static str {
    match msg {
        FrontendMessage::Query(_) => "exec_simple_query",
        FrontendMessage::Parse { .. } => "exec_parse_message",
        FrontendMessage::Bind { .. } => "exec_bind_message",
        FrontendMessage::Describe { .. } => "exec_describe_message",
        FrontendMessage::Execute { .. } => "exec_execute_message",
        FrontendMessage::Close { .. } => "exec_close_message",
        _ => "PostgresMain",
    }
}

/// Process messages until Terminate, EOF or a fatal error
pub(crate) async fn run_query_loop<S>(
    framed: &mut PgFramed<S>,
    ctx: &GatewayContext,
    session: &mut Session,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    loop {
        let next = framed.next().await;
        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                let err = BridgeError::from(e);
                if !is_disconnect(&err) {
                    framed
                        .send(error_response(ErrorInfo::from_error(&err, "PostgresMain")))
                        .await?;
                }
                return Err(err);
            }
            None => return Ok(()),
        };

        if session.ignore_till_sync
            && !matches!(msg, FrontendMessage::Sync | FrontendMessage::Terminate)
        {
            let tag = msg.tag() as char;
            debug!(pid = session.pid(), tag = %tag, "Discarding message until Sync");
            continue;
        }

        let routine = routine(&msg);
        let simple = matches!(msg, FrontendMessage::Query(_));

        let result = match msg {
            FrontendMessage::Query(text) => simple_query(framed, ctx, session, &text).await,
            FrontendMessage::Parse {
                name,
                query,
                param_types,
            } => handle_parse(framed, session, name, query, param_types).await,
            FrontendMessage::Bind {
                portal,
                statement,
                param_formats,
                params,
                result_formats,
            } => {
                handle_bind(
                    framed,
                    ctx,
                    session,
                    portal,
                    &statement,
                    &param_formats,
                    &params,
                    result_formats,
                )
                .await
            }
            FrontendMessage::Describe { target, name } => {
                handle_describe(framed, ctx, session, target, &name).await
            }
            FrontendMessage::Execute { portal, max_rows } => {
                handle_execute(framed, session, &portal, max_rows).await
            }
            FrontendMessage::Close { target, name } => handle_close(framed, session, target, &name).await,
            FrontendMessage::Sync => {
                let status = session.sync();
                framed.send(BackendMessage::ReadyForQuery(status)).await.map_err(Into::into)
            }
            FrontendMessage::Flush => framed.flush().await.map_err(Into::into),
            FrontendMessage::Terminate => {
                debug!(pid = session.pid(), "Terminate received");
                return Ok(());
            }
            FrontendMessage::Password(_) => Err(BridgeError::protocol(
                "unexpected password message after authentication",
            )),
        };

        let Err(err) = result else { continue };
        if is_disconnect(&err) {
            return Err(err);
        }

        let info = ErrorInfo::from_error(&err, routine);
        if info.is_fatal() {
            error!(pid = session.pid(), sqlstate = info.sqlstate, error = %err, "Fatal session error");
            framed.send(error_response(info)).await?;
            return Err(err);
        }

        warn!(pid = session.pid(), sqlstate = info.sqlstate, error = %err, "Query error");
        framed.feed(error_response(info)).await?;
        session.fail();
        if simple {
            // a simple query ends its own cycle
            let status = session.sync();
            framed.send(BackendMessage::ReadyForQuery(status)).await?;
        }
    }
}
