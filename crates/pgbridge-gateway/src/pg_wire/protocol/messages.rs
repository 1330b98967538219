//! PostgreSQL wire protocol messages
//!
//! Every message is a tag byte, a big-endian `i32` length that counts itself
//! and the payload (never the tag), then the payload. Lengths are written as a
//! zero placeholder and patched once the payload is in the buffer.
//!
//! `decode` takes exactly one complete frame and rejects any disagreement
//! between the declared length and the bytes actually present or consumed.

use super::constants::*;
use super::types::FormatCode;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use pgbridge_common::BridgeError;
use std::fmt;

/// Wire-level decoding/encoding failure. Always fatal to the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid message length: {0}")]
    InvalidLength(i64),

    #[error("declared length {declared} does not match the {actual} bytes in the frame")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("unexpected end of '{0}' message")]
    Truncated(char),

    #[error("{1} unread bytes at the end of '{0}' message")]
    TrailingBytes(char, usize),

    #[error("unknown message tag '{0}'")]
    UnknownTag(char),

    #[error("missing '{0}' field in error response")]
    MissingField(char),

    #[error("string field contains a zero byte")]
    InteriorNul,

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("unsupported frontend protocol {0}.{1}")]
    UnsupportedProtocol(i32, i32),

    #[error("invalid {0}: {1}")]
    InvalidValue(&'static str, i64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ProtocolError> for BridgeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => BridgeError::Io(e),
            other => BridgeError::protocol(other),
        }
    }
}

type Result<T> = std::result::Result<T, ProtocolError>;

/// Transaction status reported by ReadyForQuery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Idle,
    InTransaction,
    Failed,
}

impl TransactionStatus {
    pub fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
            TransactionStatus::InTransaction => b'T',
            TransactionStatus::Failed => b'E',
        }
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            b'I' => Ok(TransactionStatus::Idle),
            b'T' => Ok(TransactionStatus::InTransaction),
            b'E' => Ok(TransactionStatus::Failed),
            other => Err(ProtocolError::InvalidValue("transaction status", other as i64)),
        }
    }
}

/// ErrorResponse severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Fatal,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Warning => "WARNING",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            "WARNING" => Ok(Severity::Warning),
            _ => Err(ProtocolError::InvalidValue("severity", 0)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of an ErrorResponse, in wire order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFields {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub routine: Option<String>,
    /// Stack summary, at most `MAX_ERROR_STACK_FRAMES` lines
    pub stack: Option<String>,
}

/// One column of a RowDescription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescription {
    pub name: String,
    pub table_oid: u32,
    pub column_attr: i16,
    pub type_oid: u32,
    pub type_len: i16,
    pub type_modifier: i32,
    pub format: FormatCode,
}

/// Whether Describe/Close addresses a prepared statement or a portal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Statement,
    Portal,
}

impl Target {
    fn as_byte(self) -> u8 {
        match self {
            Target::Statement => b'S',
            Target::Portal => b'P',
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            b'S' => Ok(Target::Statement),
            b'P' => Ok(Target::Portal),
            other => Err(ProtocolError::InvalidValue("describe/close target", other as i64)),
        }
    }
}

/// Messages sent by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationGss,
    AuthenticationGssContinue(Bytes),
    ParameterStatus { name: String, value: String },
    BackendKeyData { process_id: i32, secret_key: i32 },
    ReadyForQuery(TransactionStatus),
    CommandComplete(String),
    RowDescription(Vec<FieldDescription>),
    DataRow(Vec<Option<Bytes>>),
    ErrorResponse(ErrorFields),
    ParseComplete,
    BindComplete,
    EmptyQueryResponse,
    NoData,
    ParameterDescription(Vec<u32>),
    PortalSuspended,
    CloseComplete,
}

/// Messages sent by clients after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendMessage {
    Query(String),
    Parse {
        name: String,
        query: String,
        param_types: Vec<u32>,
    },
    Bind {
        portal: String,
        statement: String,
        param_formats: Vec<FormatCode>,
        params: Vec<Option<Bytes>>,
        result_formats: Vec<FormatCode>,
    },
    Describe { target: Target, name: String },
    Execute { portal: String, max_rows: i32 },
    Close { target: Target, name: String },
    Sync,
    Flush,
    Terminate,
    /// PasswordMessage / GSSResponse; the payload is left raw
    Password(Bytes),
}

/// Untagged packets accepted before authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupMessage {
    Startup {
        version: i32,
        params: Vec<(String, String)>,
    },
    SslRequest,
    GssEncRequest,
    CancelRequest { process_id: i32, secret_key: i32 },
}

impl StartupMessage {
    /// Value of a startup parameter such as `user` or `database`
    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            StartupMessage::Startup { params, .. } => params
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

// ===== Writing =====

fn put_cstring(dst: &mut BytesMut, s: &str) -> Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(ProtocolError::InteriorNul);
    }
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
    Ok(())
}

fn put_count(dst: &mut BytesMut, what: &'static str, n: usize) -> Result<()> {
    let n = i16::try_from(n).map_err(|_| ProtocolError::InvalidValue(what, n as i64))?;
    dst.put_i16(n);
    Ok(())
}

fn put_nullable(dst: &mut BytesMut, value: &Option<Bytes>) {
    match value {
        None => dst.put_i32(-1),
        Some(bytes) => {
            dst.put_i32(bytes.len() as i32);
            dst.put_slice(bytes);
        }
    }
}

/// Write `tag`, a placeholder length, the body, then patch the length
fn write_tagged<F>(dst: &mut BytesMut, tag: u8, body: F) -> Result<()>
where
    F: FnOnce(&mut BytesMut) -> Result<()>,
{
    dst.put_u8(tag);
    let len_pos = dst.len();
    dst.put_i32(0);
    body(dst)?;
    let len = (dst.len() - len_pos) as i32;
    dst[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Untagged variant used by startup packets
fn write_untagged<F>(dst: &mut BytesMut, body: F) -> Result<()>
where
    F: FnOnce(&mut BytesMut) -> Result<()>,
{
    let len_pos = dst.len();
    dst.put_i32(0);
    body(dst)?;
    let len = (dst.len() - len_pos) as i32;
    dst[len_pos..len_pos + 4].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

// ===== Reading =====

/// Bounds-checked cursor over a single message payload
struct Payload<'a> {
    tag: char,
    buf: &'a [u8],
}

impl<'a> Payload<'a> {
    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            Err(ProtocolError::Truncated(self.tag))
        } else {
            Ok(())
        }
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    fn i16(&mut self) -> Result<i16> {
        self.need(2)?;
        Ok(self.buf.get_i16())
    }

    fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    fn count(&mut self, what: &'static str) -> Result<usize> {
        let n = self.i16()?;
        usize::try_from(n).map_err(|_| ProtocolError::InvalidValue(what, n as i64))
    }

    fn cstring(&mut self) -> Result<String> {
        let Some(nul) = self.buf.iter().position(|&b| b == 0) else {
            return Err(ProtocolError::Truncated(self.tag));
        };
        let s = std::str::from_utf8(&self.buf[..nul])
            .map_err(|_| ProtocolError::InvalidUtf8)?
            .to_owned();
        self.buf.advance(nul + 1);
        Ok(s)
    }

    fn bytes(&mut self, n: usize) -> Result<Bytes> {
        self.need(n)?;
        let out = Bytes::copy_from_slice(&self.buf[..n]);
        self.buf.advance(n);
        Ok(out)
    }

    fn nullable(&mut self) -> Result<Option<Bytes>> {
        match self.i32()? {
            -1 => Ok(None),
            n if n < 0 => Err(ProtocolError::InvalidValue("value length", n as i64)),
            n => self.bytes(n as usize).map(Some),
        }
    }

    fn formats(&mut self) -> Result<Vec<FormatCode>> {
        let n = self.count("format code count")?;
        (0..n).map(|_| FormatCode::try_from(self.i16()?)).collect()
    }

    fn rest(&mut self) -> Bytes {
        let out = Bytes::copy_from_slice(self.buf);
        self.buf.advance(self.buf.len());
        out
    }

    fn finish(self) -> Result<()> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(self.tag, n)),
        }
    }
}

/// Split a complete tagged frame into its tag and payload
fn split_frame(frame: &[u8]) -> Result<(u8, Payload<'_>)> {
    if frame.len() < 5 {
        return Err(ProtocolError::InvalidLength(frame.len() as i64));
    }
    let tag = frame[0];
    let declared = i32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
    if declared < 4 {
        return Err(ProtocolError::InvalidLength(declared as i64));
    }
    let actual = frame.len() - 1;
    if declared as usize != actual {
        return Err(ProtocolError::LengthMismatch {
            declared: declared as usize,
            actual,
        });
    }
    Ok((
        tag,
        Payload {
            tag: tag as char,
            buf: &frame[5..],
        },
    ))
}

impl BackendMessage {
    pub fn tag(&self) -> u8 {
        match self {
            BackendMessage::AuthenticationOk
            | BackendMessage::AuthenticationCleartextPassword
            | BackendMessage::AuthenticationGss
            | BackendMessage::AuthenticationGssContinue(_) => b'R',
            BackendMessage::ParameterStatus { .. } => b'S',
            BackendMessage::BackendKeyData { .. } => b'K',
            BackendMessage::ReadyForQuery(_) => b'Z',
            BackendMessage::CommandComplete(_) => b'C',
            BackendMessage::RowDescription(_) => b'T',
            BackendMessage::DataRow(_) => b'D',
            BackendMessage::ErrorResponse(_) => b'E',
            BackendMessage::ParseComplete => b'1',
            BackendMessage::BindComplete => b'2',
            BackendMessage::EmptyQueryResponse => b'I',
            BackendMessage::NoData => b'n',
            BackendMessage::ParameterDescription(_) => b't',
            BackendMessage::PortalSuspended => b's',
            BackendMessage::CloseComplete => b'3',
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        write_tagged(dst, self.tag(), |dst| {
            match self {
                BackendMessage::AuthenticationOk => dst.put_i32(AUTH_OK),
                BackendMessage::AuthenticationCleartextPassword => dst.put_i32(AUTH_CLEARTEXT_PASSWORD),
                BackendMessage::AuthenticationGss => dst.put_i32(AUTH_GSS),
                BackendMessage::AuthenticationGssContinue(token) => {
                    dst.put_i32(AUTH_GSS_CONTINUE);
                    dst.put_slice(token);
                }
                BackendMessage::ParameterStatus { name, value } => {
                    put_cstring(dst, name)?;
                    put_cstring(dst, value)?;
                }
                BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                } => {
                    dst.put_i32(*process_id);
                    dst.put_i32(*secret_key);
                }
                BackendMessage::ReadyForQuery(status) => dst.put_u8(status.as_byte()),
                BackendMessage::CommandComplete(tag) => put_cstring(dst, tag)?,
                BackendMessage::RowDescription(fields) => {
                    put_count(dst, "field count", fields.len())?;
                    for field in fields {
                        put_cstring(dst, &field.name)?;
                        dst.put_u32(field.table_oid);
                        dst.put_i16(field.column_attr);
                        dst.put_u32(field.type_oid);
                        dst.put_i16(field.type_len);
                        dst.put_i32(field.type_modifier);
                        dst.put_i16(field.format.as_i16());
                    }
                }
                BackendMessage::DataRow(values) => {
                    put_count(dst, "column count", values.len())?;
                    for value in values {
                        put_nullable(dst, value);
                    }
                }
                BackendMessage::ErrorResponse(fields) => {
                    dst.put_u8(b'S');
                    put_cstring(dst, fields.severity.as_str())?;
                    dst.put_u8(b'M');
                    put_cstring(dst, &fields.message)?;
                    dst.put_u8(b'C');
                    put_cstring(dst, &fields.code)?;
                    if let Some(file) = &fields.file {
                        dst.put_u8(b'F');
                        put_cstring(dst, file)?;
                    }
                    if let Some(line) = fields.line {
                        dst.put_u8(b'L');
                        put_cstring(dst, &line.to_string())?;
                    }
                    if let Some(routine) = &fields.routine {
                        dst.put_u8(b'R');
                        put_cstring(dst, routine)?;
                    }
                    if let Some(stack) = &fields.stack {
                        dst.put_u8(b'W');
                        put_cstring(dst, stack)?;
                    }
                    dst.put_u8(0);
                }
                BackendMessage::ParameterDescription(oids) => {
                    put_count(dst, "parameter count", oids.len())?;
                    for oid in oids {
                        dst.put_u32(*oid);
                    }
                }
                BackendMessage::ParseComplete
                | BackendMessage::BindComplete
                | BackendMessage::EmptyQueryResponse
                | BackendMessage::NoData
                | BackendMessage::PortalSuspended
                | BackendMessage::CloseComplete => {}
            }
            Ok(())
        })
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (tag, mut p) = split_frame(frame)?;
        let msg = match tag {
            b'R' => match p.i32()? {
                AUTH_OK => BackendMessage::AuthenticationOk,
                AUTH_CLEARTEXT_PASSWORD => BackendMessage::AuthenticationCleartextPassword,
                AUTH_GSS => BackendMessage::AuthenticationGss,
                AUTH_GSS_CONTINUE => BackendMessage::AuthenticationGssContinue(p.rest()),
                other => return Err(ProtocolError::InvalidValue("authentication code", other as i64)),
            },
            b'S' => BackendMessage::ParameterStatus {
                name: p.cstring()?,
                value: p.cstring()?,
            },
            b'K' => BackendMessage::BackendKeyData {
                process_id: p.i32()?,
                secret_key: p.i32()?,
            },
            b'Z' => BackendMessage::ReadyForQuery(TransactionStatus::from_byte(p.u8()?)?),
            b'C' => BackendMessage::CommandComplete(p.cstring()?),
            b'T' => {
                let n = p.count("field count")?;
                let mut fields = Vec::with_capacity(n);
                for _ in 0..n {
                    fields.push(FieldDescription {
                        name: p.cstring()?,
                        table_oid: p.u32()?,
                        column_attr: p.i16()?,
                        type_oid: p.u32()?,
                        type_len: p.i16()?,
                        type_modifier: p.i32()?,
                        format: FormatCode::try_from(p.i16()?)?,
                    });
                }
                BackendMessage::RowDescription(fields)
            }
            b'D' => {
                let n = p.count("column count")?;
                let values = (0..n).map(|_| p.nullable()).collect::<Result<Vec<_>>>()?;
                BackendMessage::DataRow(values)
            }
            b'E' => BackendMessage::ErrorResponse(decode_error_fields(&mut p)?),
            b'1' => BackendMessage::ParseComplete,
            b'2' => BackendMessage::BindComplete,
            b'I' => BackendMessage::EmptyQueryResponse,
            b'n' => BackendMessage::NoData,
            b't' => {
                let n = p.count("parameter count")?;
                let oids = (0..n).map(|_| p.u32()).collect::<Result<Vec<_>>>()?;
                BackendMessage::ParameterDescription(oids)
            }
            b's' => BackendMessage::PortalSuspended,
            b'3' => BackendMessage::CloseComplete,
            other => return Err(ProtocolError::UnknownTag(other as char)),
        };
        p.finish()?;
        Ok(msg)
    }
}

fn decode_error_fields(p: &mut Payload<'_>) -> Result<ErrorFields> {
    let (mut severity, mut code, mut message) = (None, None, None);
    let (mut file, mut line, mut routine, mut stack) = (None, None, None, None);
    loop {
        let field = p.u8()?;
        if field == 0 {
            break;
        }
        let value = p.cstring()?;
        match field {
            b'S' => severity = Some(Severity::parse(&value)?),
            b'C' => code = Some(value),
            b'M' => message = Some(value),
            b'F' => file = Some(value),
            b'L' => {
                line = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| ProtocolError::InvalidValue("error line", 0))?,
                )
            }
            b'R' => routine = Some(value),
            b'W' => stack = Some(value),
            // Fields the gateway never sends (V, D, H, P, ...) are skipped
            _ => {}
        }
    }
    Ok(ErrorFields {
        severity: severity.ok_or(ProtocolError::MissingField('S'))?,
        code: code.ok_or(ProtocolError::MissingField('C'))?,
        message: message.ok_or(ProtocolError::MissingField('M'))?,
        file,
        line,
        routine,
        stack,
    })
}

impl FrontendMessage {
    pub fn tag(&self) -> u8 {
        match self {
            FrontendMessage::Query(_) => b'Q',
            FrontendMessage::Parse { .. } => b'P',
            FrontendMessage::Bind { .. } => b'B',
            FrontendMessage::Describe { .. } => b'D',
            FrontendMessage::Execute { .. } => b'E',
            FrontendMessage::Close { .. } => b'C',
            FrontendMessage::Sync => b'S',
            FrontendMessage::Flush => b'H',
            FrontendMessage::Terminate => b'X',
            FrontendMessage::Password(_) => b'p',
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        write_tagged(dst, self.tag(), |dst| {
            match self {
                FrontendMessage::Query(query) => put_cstring(dst, query)?,
                FrontendMessage::Parse {
                    name,
                    query,
                    param_types,
                } => {
                    put_cstring(dst, name)?;
                    put_cstring(dst, query)?;
                    put_count(dst, "parameter count", param_types.len())?;
                    for oid in param_types {
                        dst.put_u32(*oid);
                    }
                }
                FrontendMessage::Bind {
                    portal,
                    statement,
                    param_formats,
                    params,
                    result_formats,
                } => {
                    put_cstring(dst, portal)?;
                    put_cstring(dst, statement)?;
                    put_count(dst, "format code count", param_formats.len())?;
                    for f in param_formats {
                        dst.put_i16(f.as_i16());
                    }
                    put_count(dst, "parameter count", params.len())?;
                    for value in params {
                        put_nullable(dst, value);
                    }
                    put_count(dst, "format code count", result_formats.len())?;
                    for f in result_formats {
                        dst.put_i16(f.as_i16());
                    }
                }
                FrontendMessage::Describe { target, name } | FrontendMessage::Close { target, name } => {
                    dst.put_u8(target.as_byte());
                    put_cstring(dst, name)?;
                }
                FrontendMessage::Execute { portal, max_rows } => {
                    put_cstring(dst, portal)?;
                    dst.put_i32(*max_rows);
                }
                FrontendMessage::Password(payload) => dst.put_slice(payload),
                FrontendMessage::Sync | FrontendMessage::Flush | FrontendMessage::Terminate => {}
            }
            Ok(())
        })
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        let (tag, mut p) = split_frame(frame)?;
        let msg = match tag {
            b'Q' => FrontendMessage::Query(p.cstring()?),
            b'P' => {
                let name = p.cstring()?;
                let query = p.cstring()?;
                let n = p.count("parameter count")?;
                let param_types = (0..n).map(|_| p.u32()).collect::<Result<Vec<_>>>()?;
                FrontendMessage::Parse {
                    name,
                    query,
                    param_types,
                }
            }
            b'B' => {
                let portal = p.cstring()?;
                let statement = p.cstring()?;
                let param_formats = p.formats()?;
                let n = p.count("parameter count")?;
                let params = (0..n).map(|_| p.nullable()).collect::<Result<Vec<_>>>()?;
                let result_formats = p.formats()?;
                FrontendMessage::Bind {
                    portal,
                    statement,
                    param_formats,
                    params,
                    result_formats,
                }
            }
            b'D' => FrontendMessage::Describe {
                target: Target::from_byte(p.u8()?)?,
                name: p.cstring()?,
            },
            b'E' => FrontendMessage::Execute {
                portal: p.cstring()?,
                max_rows: p.i32()?,
            },
            b'C' => FrontendMessage::Close {
                target: Target::from_byte(p.u8()?)?,
                name: p.cstring()?,
            },
            b'S' => FrontendMessage::Sync,
            b'H' => FrontendMessage::Flush,
            b'X' => FrontendMessage::Terminate,
            b'p' => FrontendMessage::Password(p.rest()),
            other => return Err(ProtocolError::UnknownTag(other as char)),
        };
        p.finish()?;
        Ok(msg)
    }
}

impl StartupMessage {
    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        write_untagged(dst, |dst| {
            match self {
                StartupMessage::Startup { version, params } => {
                    dst.put_i32(*version);
                    for (name, value) in params {
                        put_cstring(dst, name)?;
                        put_cstring(dst, value)?;
                    }
                    dst.put_u8(0);
                }
                StartupMessage::SslRequest => dst.put_i32(SSL_REQUEST_CODE),
                StartupMessage::GssEncRequest => dst.put_i32(GSSENC_REQUEST_CODE),
                StartupMessage::CancelRequest {
                    process_id,
                    secret_key,
                } => {
                    dst.put_i32(CANCEL_REQUEST_CODE);
                    dst.put_i32(*process_id);
                    dst.put_i32(*secret_key);
                }
            }
            Ok(())
        })
    }

    /// Decode one complete startup packet (length prefix included)
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < 8 {
            return Err(ProtocolError::InvalidLength(frame.len() as i64));
        }
        let declared = i32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        if declared < 8 {
            return Err(ProtocolError::InvalidLength(declared as i64));
        }
        if declared as usize != frame.len() {
            return Err(ProtocolError::LengthMismatch {
                declared: declared as usize,
                actual: frame.len(),
            });
        }
        let mut p = Payload {
            tag: '\0',
            buf: &frame[4..],
        };
        let msg = match p.i32()? {
            SSL_REQUEST_CODE => StartupMessage::SslRequest,
            GSSENC_REQUEST_CODE => StartupMessage::GssEncRequest,
            CANCEL_REQUEST_CODE => StartupMessage::CancelRequest {
                process_id: p.i32()?,
                secret_key: p.i32()?,
            },
            PROTOCOL_VERSION_3 => {
                let mut params = Vec::new();
                loop {
                    let name = p.cstring()?;
                    if name.is_empty() {
                        break;
                    }
                    let value = p.cstring()?;
                    params.push((name, value));
                }
                StartupMessage::Startup {
                    version: PROTOCOL_VERSION_3,
                    params,
                }
            }
            version => return Err(ProtocolError::UnsupportedProtocol(version >> 16, version & 0xffff)),
        };
        p.finish()?;
        Ok(msg)
    }
}
