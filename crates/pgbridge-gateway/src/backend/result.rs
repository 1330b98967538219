//! Result sets returned by the backend

use super::model::Column;
use std::fmt;

/// A loosely typed value as delivered by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Integer(i),
                // beyond i64: keep the exact digits
                (None, Some(_)) => Value::String(n.to_string()),
                (None, None) => n
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or_else(|| Value::String(n.to_string())),
            },
            serde_json::Value::String(s) => Value::String(s),
            composite => Value::String(composite.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
        }
    }
}

pub type Row = Vec<Value>;

/// Forward-only rows plus their column metadata.
///
/// JSON rows are converted one at a time as the cursor advances, so a portal
/// suspended by `maxRows` never materializes the remainder.
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Box<dyn Iterator<Item = Row> + Send>,
}

impl ResultSet {
    /// Result whose rows are raw JSON value arrays
    pub fn from_json(columns: Vec<Column>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            columns,
            rows: Box::new(
                rows.into_iter()
                    .map(|values| values.into_iter().map(Value::from).collect()),
            ),
        }
    }

    pub fn from_rows(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: Box::new(rows.into_iter()),
        }
    }

    /// Result of a statement that produces no rows
    pub fn empty() -> Self {
        Self::from_rows(Vec::new(), Vec::new())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Split into column metadata and the row cursor
    pub fn into_parts(self) -> (Vec<Column>, Box<dyn Iterator<Item = Row> + Send>) {
        (self.columns, self.rows)
    }
}

impl Iterator for ResultSet {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}
