//! JSON shapes exchanged with the execution backend

use serde::Deserialize;
use std::fmt;

/// Logical column type reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainType {
    DateOnly,
    DateTime,
    Integer,
    Float,
    Decimal,
    Boolean,
    String,
    Unknown,
}

impl DomainType {
    /// Parse the backend's type name; names the gateway does not know map to `Unknown`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "strictdate" | "date" => DomainType::DateOnly,
            "datetime" | "timestamp" => DomainType::DateTime,
            "integer" | "int" | "bigint" | "long" | "smallint" => DomainType::Integer,
            "float" | "double" | "real" | "number" => DomainType::Float,
            "decimal" | "numeric" => DomainType::Decimal,
            "boolean" | "bool" => DomainType::Boolean,
            "string" | "varchar" | "text" | "char" => DomainType::String,
            _ => DomainType::Unknown,
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DomainType::DateOnly => "date",
            DomainType::DateTime => "datetime",
            DomainType::Integer => "integer",
            DomainType::Float => "float",
            DomainType::Decimal => "decimal",
            DomainType::Boolean => "boolean",
            DomainType::String => "string",
            DomainType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Result column metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub domain: DomainType,
}

impl Column {
    pub fn new(name: impl Into<String>, domain: DomainType) -> Self {
        Self {
            name: name.into(),
            domain,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: Option<String>,
}

impl From<ColumnSpec> for Column {
    fn from(spec: ColumnSpec) -> Self {
        let domain = spec
            .type_name
            .as_deref()
            .map(DomainType::parse)
            .unwrap_or(DomainType::Unknown);
        Column::new(spec.name, domain)
    }
}

#[derive(Debug, Default, Deserialize)]
struct BuilderSection {
    #[serde(default)]
    columns: Vec<ColumnSpec>,
}

/// Body of a successful `/schema` call
#[derive(Debug, Deserialize)]
pub(crate) struct SchemaResponse {
    #[serde(default)]
    columns: Option<Vec<ColumnSpec>>,
    #[serde(default)]
    builder: Option<BuilderSection>,
}

impl SchemaResponse {
    /// Top-level `columns`, falling back to `builder.columns`
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
            .or_else(|| self.builder.map(|b| b.columns))
            .unwrap_or_default()
            .into_iter()
            .map(Column::from)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RowSpec {
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultSection {
    #[serde(default)]
    pub rows: Vec<RowSpec>,
}

/// Body of a successful `/execute` call
#[derive(Debug, Deserialize)]
pub(crate) struct ExecuteResponse {
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub result: ResultSection,
}

/// Error body returned with a non-200 status
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    #[serde(default)]
    pub status: Option<serde_json::Value>,
    pub message: String,
    #[serde(default)]
    pub trace: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// Trace as one frame per line; accepts a string or an array of frames
    pub fn trace_text(&self) -> Option<String> {
        match self.trace.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(frames) => Some(
                frames
                    .iter()
                    .map(|f| match f {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            other => Some(other.to_string()),
        }
    }
}
