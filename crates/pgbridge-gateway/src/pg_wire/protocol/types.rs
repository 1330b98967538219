//! PostgreSQL type descriptors and format codes
//!
//! PostgreSQL OIDs: https://github.com/postgres/postgres/blob/master/src/include/catalog/pg_type.dat

use super::messages::ProtocolError;

/// Well-known type OIDs used by the gateway
pub mod oid {
    /// Parameter type left for the server to infer
    pub const UNSPECIFIED: u32 = 0;
    pub const BOOL: u32 = 16;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const NUMERIC: u32 = 1700;
}

/// Column and parameter encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatCode {
    #[default]
    Text,
    Binary,
}

impl FormatCode {
    pub fn as_i16(self) -> i16 {
        match self {
            FormatCode::Text => 0,
            FormatCode::Binary => 1,
        }
    }

    /// Resolve the format for column/parameter `index` from a Bind format list.
    ///
    /// An empty list means text for everything and a single entry applies to
    /// every position.
    pub fn for_index(formats: &[FormatCode], index: usize) -> FormatCode {
        match formats {
            [] => FormatCode::Text,
            [single] => *single,
            many => many.get(index).copied().unwrap_or_default(),
        }
    }
}

impl TryFrom<i16> for FormatCode {
    type Error = ProtocolError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FormatCode::Text),
            1 => Ok(FormatCode::Binary),
            other => Err(ProtocolError::InvalidValue("format code", other as i64)),
        }
    }
}

/// Wire type descriptor reported in RowDescription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PgType {
    pub name: &'static str,
    pub oid: u32,
    /// Fixed size in bytes, -1 for variable-length
    pub len: i16,
    /// Display modifier, -1 when unused
    pub modifier: i32,
}

impl PgType {
    pub const BOOL: PgType = PgType::fixed("bool", oid::BOOL, 1);
    pub const INT2: PgType = PgType::fixed("int2", oid::INT2, 2);
    pub const INT4: PgType = PgType::fixed("int4", oid::INT4, 4);
    pub const INT8: PgType = PgType::fixed("int8", oid::INT8, 8);
    pub const FLOAT4: PgType = PgType::fixed("float4", oid::FLOAT4, 4);
    pub const FLOAT8: PgType = PgType::fixed("float8", oid::FLOAT8, 8);
    pub const NUMERIC: PgType = PgType::fixed("numeric", oid::NUMERIC, -1);
    pub const DATE: PgType = PgType::fixed("date", oid::DATE, 4);
    pub const TIMESTAMP: PgType = PgType::fixed("timestamp", oid::TIMESTAMP, 8);
    pub const TIMESTAMPTZ: PgType = PgType::fixed("timestamptz", oid::TIMESTAMPTZ, 8);
    pub const TEXT: PgType = PgType::fixed("text", oid::TEXT, -1);
    pub const VARCHAR: PgType = PgType::fixed("varchar", oid::VARCHAR, -1);

    const fn fixed(name: &'static str, oid: u32, len: i16) -> Self {
        Self {
            name,
            oid,
            len,
            modifier: -1,
        }
    }

    /// Look up a descriptor by OID; `None` for types the gateway does not know
    pub fn from_oid(oid: u32) -> Option<PgType> {
        let ty = match oid {
            oid::BOOL => Self::BOOL,
            oid::INT2 => Self::INT2,
            oid::INT4 => Self::INT4,
            oid::INT8 => Self::INT8,
            oid::FLOAT4 => Self::FLOAT4,
            oid::FLOAT8 => Self::FLOAT8,
            oid::NUMERIC => Self::NUMERIC,
            oid::DATE => Self::DATE,
            oid::TIMESTAMP => Self::TIMESTAMP,
            oid::TIMESTAMPTZ => Self::TIMESTAMPTZ,
            oid::TEXT => Self::TEXT,
            oid::VARCHAR => Self::VARCHAR,
            _ => return None,
        };
        Some(ty)
    }
}
