//! Portal state for Extended Query Protocol cursors
//!
//! A portal owns the row cursor of its backend result, so `Execute` with a
//! row limit resumes where the previous call stopped (JDBC `setFetchSize()`).

use super::utils::TxCommand;
use crate::backend::{Column, ResultSet, Row};
use crate::pg_wire::protocol::FormatCode;
use std::iter::Peekable;

/// What `Execute` does with a portal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PortalKind {
    /// Stream rows from the backend result
    Rows,
    /// Query had no statement; answer EmptyQueryResponse
    Empty,
    /// Transaction control handled by the session
    Transaction(TxCommand),
}

pub(crate) struct Portal {
    /// Substituted query text, used for the command tag
    pub query: String,
    pub columns: Vec<Column>,
    pub result_formats: Vec<FormatCode>,
    pub kind: PortalKind,
    rows: Peekable<Box<dyn Iterator<Item = Row> + Send>>,
}

impl Portal {
    pub fn rows(query: String, result: ResultSet, result_formats: Vec<FormatCode>) -> Self {
        let (columns, rows) = result.into_parts();
        Self {
            query,
            columns,
            result_formats,
            kind: PortalKind::Rows,
            rows: rows.peekable(),
        }
    }

    pub fn empty(query: String) -> Self {
        Self::without_rows(query, PortalKind::Empty)
    }

    pub fn transaction(query: String, command: TxCommand) -> Self {
        Self::without_rows(query, PortalKind::Transaction(command))
    }

    fn without_rows(query: String, kind: PortalKind) -> Self {
        let (columns, rows) = ResultSet::empty().into_parts();
        Self {
            query,
            columns,
            result_formats: Vec::new(),
            kind,
            rows: rows.peekable(),
        }
    }

    pub fn next_row(&mut self) -> Option<Row> {
        self.rows.next()
    }

    /// Whether rows remain after the last Execute
    pub fn has_more(&mut self) -> bool {
        self.rows.peek().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DomainType, Value};

    #[test]
    fn test_cursor_resumes() {
        let result = ResultSet::from_rows(
            vec![Column::new("n", DomainType::Integer)],
            (1..=3).map(|i| vec![Value::Integer(i)]).collect(),
        );
        let mut portal = Portal::rows("SELECT n FROM t".into(), result, Vec::new());

        assert_eq!(portal.next_row(), Some(vec![Value::Integer(1)]));
        assert!(portal.has_more());
        assert_eq!(portal.next_row(), Some(vec![Value::Integer(2)]));
        assert_eq!(portal.next_row(), Some(vec![Value::Integer(3)]));
        assert!(!portal.has_more());
        assert_eq!(portal.next_row(), None);
    }

    #[test]
    fn test_rowless_portals() {
        let mut portal = Portal::transaction("BEGIN".into(), TxCommand::Begin);
        assert_eq!(portal.kind, PortalKind::Transaction(TxCommand::Begin));
        assert!(portal.columns.is_empty());
        assert!(!portal.has_more());
        assert_eq!(Portal::empty(String::new()).kind, PortalKind::Empty);
    }
}
