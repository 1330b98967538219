//! Backend calls and the Simple Query cycle
//!
//! Every backend call arms a fresh cancellation token. A matching
//! CancelRequest makes the session stop waiting and drop the request; the
//! backend is not told (the call is detached).

use super::core::GatewayContext;
use super::messages::{data_row, row_description, PgFramed};
use super::session::Session;
use super::utils::{derive_command_tag, split_statements, transaction_command};
use crate::backend::{Column, ResultSet};
use crate::pg_wire::protocol::BackendMessage;
use futures::{Future, SinkExt};
use pgbridge_common::{BridgeError, Result};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

async fn cancellable<T>(token: CancellationToken, pid: i32, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            warn!(pid, "Backend call cancelled by client");
            Err(BridgeError::Cancelled)
        }
        result = call => result,
    }
}

/// Run `query` on the backend as the session identity
pub(crate) async fn execute_query(ctx: &GatewayContext, session: &mut Session, query: &str) -> Result<ResultSet> {
    let query_id = Uuid::new_v4();
    let started = Instant::now();
    debug!(pid = session.pid(), query_id = %query_id, identity = %session.identity.name, "Executing query");

    let token = session.registration.arm();
    let result = cancellable(token, session.pid(), ctx.backend.execute(query, &session.identity)).await;
    match &result {
        Ok(rs) => info!(
            pid = session.pid(),
            query_id = %query_id,
            columns = rs.columns().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        ),
        Err(e) => warn!(pid = session.pid(), query_id = %query_id, error = %e, "Query failed"),
    }
    result
}

/// Result columns of `query` without running it
pub(crate) async fn schema_query(ctx: &GatewayContext, session: &mut Session, query: &str) -> Result<Vec<Column>> {
    debug!(pid = session.pid(), "Describing query");
    let token = session.registration.arm();
    cancellable(token, session.pid(), ctx.backend.schema(query, &session.identity)).await
}

/// Handle a Query message.
///
/// The first failing statement aborts the rest; the caller reports the error
/// and ends the cycle with ReadyForQuery.
pub(crate) async fn simple_query<S>(
    framed: &mut PgFramed<S>,
    ctx: &GatewayContext,
    session: &mut Session,
    text: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    session.clear_unnamed();

    let statements = split_statements(text);
    if statements.is_empty() {
        framed.feed(BackendMessage::EmptyQueryResponse).await?;
    }

    for statement in statements {
        session.check_not_aborted(statement)?;

        if let Some(command) = transaction_command(statement) {
            let tag = session.apply(command);
            debug!(pid = session.pid(), tag, "Transaction control");
            framed.feed(BackendMessage::CommandComplete(tag.to_string())).await?;
            continue;
        }

        let (columns, rows) = execute_query(ctx, session, statement).await?.into_parts();
        if !columns.is_empty() {
            framed.feed(row_description(&columns, &[])).await?;
        }
        let mut count = 0;
        for row in rows {
            framed.feed(data_row(&columns, row, &[])?).await?;
            count += 1;
        }
        framed
            .feed(BackendMessage::CommandComplete(derive_command_tag(statement, count)))
            .await?;
    }

    framed.send(BackendMessage::ReadyForQuery(session.status())).await?;
    Ok(())
}
