//! Extended Query Protocol handlers
//!
//! Parse / Bind / Describe / Execute / Close. Each handler queues its replies
//! without flushing; output goes out on Sync or Flush.

use super::core::GatewayContext;
use super::execution::{execute_query, schema_query};
use super::messages::{data_row, row_description, PgFramed};
use super::portal::{Portal, PortalKind};
use super::session::{PreparedStatement, Session};
use super::utils::{
    count_placeholders, derive_command_tag, is_empty_query, substitute_parameters, transaction_command,
};
use crate::errors::sqlstate;
use crate::pg_wire::marshal::{decode_param, render_literal};
use crate::pg_wire::protocol::{oid, BackendMessage, FormatCode, Target};
use bytes::Bytes;
use futures::SinkExt;
use pgbridge_common::{BridgeError, Result};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

fn unknown_statement(name: &str) -> BridgeError {
    BridgeError::statement(
        sqlstate::INVALID_SQL_STATEMENT_NAME,
        format!("prepared statement \"{}\" does not exist", name),
    )
}

fn unknown_portal(name: &str) -> BridgeError {
    BridgeError::statement(
        sqlstate::INVALID_CURSOR_NAME,
        format!("portal \"{}\" does not exist", name),
    )
}

pub(crate) async fn handle_parse<S>(
    framed: &mut PgFramed<S>,
    session: &mut Session,
    name: String,
    query: String,
    param_types: Vec<u32>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if !name.is_empty() && session.statements.contains_key(&name) {
        return Err(BridgeError::statement(
            sqlstate::DUPLICATE_PREPARED_STATEMENT,
            format!("prepared statement \"{}\" already exists", name),
        ));
    }
    debug!(pid = session.pid(), statement = %name, params = param_types.len(), "Parse");
    session
        .statements
        .insert(name, Arc::new(PreparedStatement { query, param_types }));
    framed.feed(BackendMessage::ParseComplete).await?;
    Ok(())
}

/// Bind parameters and run the statement; the portal keeps the row cursor
#[allow(clippy::too_many_arguments)]
pub(crate) async fn handle_bind<S>(
    framed: &mut PgFramed<S>,
    ctx: &GatewayContext,
    session: &mut Session,
    portal_name: String,
    statement_name: &str,
    param_formats: &[FormatCode],
    params: &[Option<Bytes>],
    result_formats: Vec<FormatCode>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let statement = session
        .statements
        .get(statement_name)
        .cloned()
        .ok_or_else(|| unknown_statement(statement_name))?;

    if !portal_name.is_empty() && session.portals.contains_key(&portal_name) {
        return Err(BridgeError::statement(
            sqlstate::DUPLICATE_CURSOR,
            format!("portal \"{}\" already exists", portal_name),
        ));
    }

    let expected = statement.param_types.len().max(count_placeholders(&statement.query));
    if params.len() != expected {
        return Err(BridgeError::statement(
            sqlstate::PROTOCOL_VIOLATION,
            format!(
                "bind message supplies {} parameters, but prepared statement \"{}\" requires {}",
                params.len(),
                statement_name,
                expected
            ),
        ));
    }
    if param_formats.len() > 1 && param_formats.len() != params.len() {
        return Err(BridgeError::statement(
            sqlstate::PROTOCOL_VIOLATION,
            format!(
                "bind message has {} parameter formats but {} parameters",
                param_formats.len(),
                params.len()
            ),
        ));
    }

    let literals = params
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let type_oid = statement.param_types.get(i).copied().unwrap_or(0);
            let value = decode_param(type_oid, FormatCode::for_index(param_formats, i), raw.as_deref())?;
            render_literal(&value)
        })
        .collect::<Result<Vec<_>>>()?;
    let query = substitute_parameters(&statement.query, &literals)?;

    let portal = if is_empty_query(&query) {
        Portal::empty(query)
    } else if let Some(command) = transaction_command(&query) {
        session.check_not_aborted(&query)?;
        Portal::transaction(query, command)
    } else {
        session.check_not_aborted(&query)?;
        let result = execute_query(ctx, session, &query).await?;
        Portal::rows(query, result, result_formats)
    };

    debug!(pid = session.pid(), portal = %portal_name, statement = %statement_name, "Bind");
    session.portals.insert(portal_name, portal);
    framed.feed(BackendMessage::BindComplete).await?;
    Ok(())
}

pub(crate) async fn handle_describe<S>(
    framed: &mut PgFramed<S>,
    ctx: &GatewayContext,
    session: &mut Session,
    target: Target,
    name: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match target {
        Target::Statement => {
            let statement = session
                .statements
                .get(name)
                .cloned()
                .ok_or_else(|| unknown_statement(name))?;

            // unspecified parameter types are reported as text
            let mut oids: Vec<u32> = statement
                .param_types
                .iter()
                .map(|&t| if t == 0 { oid::TEXT } else { t })
                .collect();
            oids.resize(oids.len().max(count_placeholders(&statement.query)), oid::TEXT);
            framed.feed(BackendMessage::ParameterDescription(oids)).await?;

            if is_empty_query(&statement.query) || transaction_command(&statement.query).is_some() {
                framed.feed(BackendMessage::NoData).await?;
                return Ok(());
            }
            session.check_not_aborted(&statement.query)?;
            let columns = schema_query(ctx, session, &statement.query).await?;
            let reply = if columns.is_empty() {
                BackendMessage::NoData
            } else {
                row_description(&columns, &[])
            };
            framed.feed(reply).await?;
        }
        Target::Portal => {
            let reply = {
                let portal = session.portals.get(name).ok_or_else(|| unknown_portal(name))?;
                if portal.columns.is_empty() {
                    BackendMessage::NoData
                } else {
                    row_description(&portal.columns, &portal.result_formats)
                }
            };
            framed.feed(reply).await?;
        }
    }
    Ok(())
}

/// Stream up to `max_rows` rows (0 = all) from a portal
pub(crate) async fn handle_execute<S>(
    framed: &mut PgFramed<S>,
    session: &mut Session,
    name: &str,
    max_rows: i32,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let pid = session.pid();
    let portal = session.portals.get_mut(name).ok_or_else(|| unknown_portal(name))?;

    let kind = portal.kind;
    match kind {
        PortalKind::Empty => {
            framed.feed(BackendMessage::EmptyQueryResponse).await?;
        }
        PortalKind::Transaction(command) => {
            let tag = session.apply(command);
            framed.feed(BackendMessage::CommandComplete(tag.to_string())).await?;
        }
        PortalKind::Rows => {
            let limit = usize::try_from(max_rows).ok().filter(|&n| n > 0);
            let mut sent = 0;
            while limit.map_or(true, |l| sent < l) {
                let Some(row) = portal.next_row() else { break };
                framed
                    .feed(data_row(&portal.columns, row, &portal.result_formats)?)
                    .await?;
                sent += 1;
            }

            if portal.has_more() {
                debug!(pid, portal = %name, sent, "Portal suspended");
                framed.feed(BackendMessage::PortalSuspended).await?;
            } else {
                framed
                    .feed(BackendMessage::CommandComplete(derive_command_tag(&portal.query, sent)))
                    .await?;
            }
        }
    }
    Ok(())
}

/// Close a statement or portal; absent names are not an error
pub(crate) async fn handle_close<S>(
    framed: &mut PgFramed<S>,
    session: &mut Session,
    target: Target,
    name: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    match target {
        Target::Statement => {
            session.statements.remove(name);
        }
        Target::Portal => {
            session.portals.remove(name);
        }
    }
    framed.feed(BackendMessage::CloseComplete).await?;
    Ok(())
}
