//! Protocol message builders for the session handler

use crate::backend::{Column, Row, Value};
use crate::errors::ErrorInfo;
use crate::pg_wire::marshal;
use crate::pg_wire::protocol::{BackendMessage, FieldDescription, FormatCode, PgCodec};
use pgbridge_common::Result;
use tokio_util::codec::Framed;
use tracing::debug;

/// Client connection in the query phase
pub(crate) type PgFramed<S> = Framed<S, PgCodec>;

/// ParameterStatus messages sent once authentication succeeds
pub(crate) fn startup_parameters(server_version: &str) -> Vec<BackendMessage> {
    [
        ("server_version", server_version),
        ("server_encoding", "UTF8"),
        ("client_encoding", "UTF8"),
        ("DateStyle", "ISO"),
        ("TimeZone", "UTC"),
        ("integer_datetimes", "on"),
    ]
    .into_iter()
    .map(|(name, value)| BackendMessage::ParameterStatus {
        name: name.to_string(),
        value: value.to_string(),
    })
    .collect()
}

/// RowDescription for backend columns, one format code per column
pub(crate) fn row_description(columns: &[Column], formats: &[FormatCode]) -> BackendMessage {
    let fields = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let ty = marshal::describe(column.domain);
            FieldDescription {
                name: column.name.clone(),
                table_oid: 0,
                column_attr: 0,
                type_oid: ty.oid,
                type_len: ty.len,
                type_modifier: ty.modifier,
                format: FormatCode::for_index(formats, i),
            }
        })
        .collect();
    BackendMessage::RowDescription(fields)
}

/// DataRow for one backend row; missing trailing values are sent as NULL
pub(crate) fn data_row(columns: &[Column], row: Row, formats: &[FormatCode]) -> Result<BackendMessage> {
    let mut values = row.into_iter();
    let encoded = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = values.next().unwrap_or(Value::Null);
            marshal::encode_column(column.domain, value, FormatCode::for_index(formats, i))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(BackendMessage::DataRow(encoded))
}

/// ErrorResponse for a classified error
pub(crate) fn error_response(info: ErrorInfo) -> BackendMessage {
    debug!(
        category = %info.category,
        sqlstate = %info.sqlstate,
        severity = %info.severity,
        message = %info.message,
        "Sending classified error to client"
    );
    BackendMessage::ErrorResponse(info.into_fields())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DomainType;
    use crate::pg_wire::protocol::oid;
    use bytes::Bytes;

    #[test]
    fn test_row_description_types() {
        let columns = vec![
            Column::new("d", DomainType::DateOnly),
            Column::new("n", DomainType::Decimal),
        ];
        let BackendMessage::RowDescription(fields) = row_description(&columns, &[FormatCode::Binary]) else {
            panic!("expected RowDescription");
        };
        assert_eq!(fields[0].type_oid, oid::DATE);
        assert_eq!(fields[0].type_len, 4);
        assert_eq!(fields[1].type_oid, oid::NUMERIC);
        assert_eq!(fields[1].type_len, -1);
        assert!(fields.iter().all(|f| f.type_modifier == -1 && f.format == FormatCode::Binary));
    }

    #[test]
    fn test_data_row_pads_short_rows() {
        let columns = vec![
            Column::new("a", DomainType::Integer),
            Column::new("b", DomainType::String),
        ];
        let msg = data_row(&columns, vec![Value::Integer(7)], &[]).unwrap();
        assert_eq!(msg, BackendMessage::DataRow(vec![Some(Bytes::from_static(b"7")), None]));
    }

    #[test]
    fn test_startup_parameters() {
        let params = startup_parameters("10.5");
        assert_eq!(params.len(), 6);
        assert_eq!(
            params[0],
            BackendMessage::ParameterStatus {
                name: "server_version".into(),
                value: "10.5".into()
            }
        );
    }
}
