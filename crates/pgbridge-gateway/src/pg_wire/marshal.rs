//! Type and value marshaling between backend values and PostgreSQL encodings
//!
//! Result values go backend `Value` → `coerce` → `PgValue` → text or binary
//! column bytes. Bound parameters go the other way: wire bytes →
//! `decode_param` → `PgValue` → `render_literal` for substitution into the
//! query text.
//!
//! Dates and timestamps are carried as epoch milliseconds (UTC).

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use pgbridge_common::{BridgeError, Result};
use std::fmt::Write as _;

use super::protocol::types::{oid, FormatCode, PgType};
use crate::backend::{DomainType, Value};
use crate::errors::sqlstate;

const MS_PER_DAY: i64 = 86_400_000;
/// 2000-01-01 as days since the Unix epoch
const PG_EPOCH_DAYS: i64 = 10_957;
/// 2000-01-01 as microseconds since the Unix epoch
const PG_EPOCH_MICROS: i64 = PG_EPOCH_DAYS * MS_PER_DAY * 1000;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NBASE: i32 = 10_000;

/// A value typed for the wire
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Int8(i64),
    Float8(f64),
    /// Canonical decimal text, e.g. `-12.50`
    Numeric(String),
    Bool(bool),
    /// Epoch milliseconds at UTC midnight
    Date(i64),
    /// Epoch milliseconds
    Timestamp(i64),
    Text(String),
}

/// PostgreSQL type reported for a backend column type
pub fn describe(domain: DomainType) -> PgType {
    match domain {
        DomainType::DateOnly => PgType::DATE,
        DomainType::DateTime => PgType::TIMESTAMP,
        DomainType::Integer => PgType::INT8,
        DomainType::Float => PgType::FLOAT8,
        DomainType::Decimal => PgType::NUMERIC,
        DomainType::Boolean => PgType::BOOL,
        DomainType::String | DomainType::Unknown => PgType::TEXT,
    }
}

fn invalid(domain: DomainType, value: &Value) -> BridgeError {
    let state = match domain {
        DomainType::DateOnly | DomainType::DateTime => sqlstate::INVALID_DATETIME_FORMAT,
        _ => sqlstate::INVALID_TEXT_REPRESENTATION,
    };
    BridgeError::conversion(
        state,
        format!("invalid input syntax for type {}: \"{}\"", describe(domain).name, value),
    )
}

/// Convert a backend value to the wire type its column declares
pub fn coerce(domain: DomainType, value: Value) -> Result<PgValue> {
    if value.is_null() {
        return Ok(PgValue::Null);
    }
    let converted = match (domain, &value) {
        (DomainType::Integer, Value::Integer(i)) => Some(PgValue::Int8(*i)),
        (DomainType::Integer, Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
            Some(PgValue::Int8(*f as i64))
        }
        (DomainType::Integer, Value::String(s)) => s.trim().parse().ok().map(PgValue::Int8),

        (DomainType::Float, Value::Integer(i)) => Some(PgValue::Float8(*i as f64)),
        (DomainType::Float, Value::Float(f)) => Some(PgValue::Float8(*f)),
        (DomainType::Float, Value::String(s)) => parse_float(s).map(PgValue::Float8),

        (DomainType::Decimal, Value::Integer(i)) => Some(PgValue::Numeric(i.to_string())),
        (DomainType::Decimal, Value::Float(f)) if f.is_finite() => Some(PgValue::Numeric(f.to_string())),
        (DomainType::Decimal, Value::String(s)) => canonical_numeric(s).map(PgValue::Numeric),

        (DomainType::Boolean, Value::Boolean(b)) => Some(PgValue::Bool(*b)),
        (DomainType::Boolean, Value::Integer(i)) if *i == 0 || *i == 1 => Some(PgValue::Bool(*i == 1)),
        (DomainType::Boolean, Value::String(s)) => parse_bool(s).map(PgValue::Bool),

        (DomainType::DateOnly, Value::String(s)) => parse_date_ms(s).map(PgValue::Date),
        (DomainType::DateTime, Value::String(s)) => parse_datetime_ms(s).map(PgValue::Timestamp),
        (DomainType::DateTime, Value::Integer(ms)) => Some(PgValue::Timestamp(*ms)),

        (DomainType::String | DomainType::Unknown, v) => Some(PgValue::Text(v.to_string())),
        _ => None,
    };
    converted.ok_or_else(|| invalid(domain, &value))
}

/// Write `value` in `format`, returning the number of bytes written.
///
/// `Null` writes nothing; the caller encodes it as a -1 length.
pub fn write(format: FormatCode, value: &PgValue, buf: &mut BytesMut) -> Result<usize> {
    let start = buf.len();
    match format {
        FormatCode::Text => write_text(value, buf)?,
        FormatCode::Binary => write_binary(value, buf)?,
    }
    Ok(buf.len() - start)
}

/// Coerce and encode one result column for a DataRow
pub fn encode_column(domain: DomainType, value: Value, format: FormatCode) -> Result<Option<Bytes>> {
    let value = coerce(domain, value)?;
    if value == PgValue::Null {
        return Ok(None);
    }
    let mut buf = BytesMut::new();
    write(format, &value, &mut buf)?;
    Ok(Some(buf.freeze()))
}

fn write_text(value: &PgValue, buf: &mut BytesMut) -> Result<()> {
    match value {
        PgValue::Null => {}
        PgValue::Int8(i) => buf.put_slice(i.to_string().as_bytes()),
        PgValue::Float8(f) => buf.put_slice(float_text(*f).as_bytes()),
        PgValue::Numeric(s) | PgValue::Text(s) => buf.put_slice(s.as_bytes()),
        PgValue::Bool(b) => buf.put_u8(if *b { b't' } else { b'f' }),
        PgValue::Date(ms) => buf.put_slice(format_date(*ms)?.as_bytes()),
        PgValue::Timestamp(ms) => buf.put_slice(format_timestamp(*ms)?.as_bytes()),
    }
    Ok(())
}

fn write_binary(value: &PgValue, buf: &mut BytesMut) -> Result<()> {
    match value {
        PgValue::Null => {}
        PgValue::Int8(i) => buf.put_i64(*i),
        PgValue::Float8(f) => buf.put_f64(*f),
        PgValue::Numeric(s) => write_numeric_binary(s, buf)?,
        PgValue::Bool(b) => buf.put_u8(u8::from(*b)),
        PgValue::Date(ms) => {
            let days = ms.div_euclid(MS_PER_DAY) - PG_EPOCH_DAYS;
            let days = i32::try_from(days)
                .map_err(|_| BridgeError::conversion(sqlstate::DATETIME_FIELD_OVERFLOW, "date out of range"))?;
            buf.put_i32(days);
        }
        PgValue::Timestamp(ms) => {
            let micros = ms
                .checked_mul(1000)
                .and_then(|us| us.checked_sub(PG_EPOCH_MICROS))
                .ok_or_else(|| BridgeError::conversion(sqlstate::DATETIME_FIELD_OVERFLOW, "timestamp out of range"))?;
            buf.put_i64(micros);
        }
        PgValue::Text(s) => buf.put_slice(s.as_bytes()),
    }
    Ok(())
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".into()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else {
        f.to_string()
    }
}

fn datetime_from_ms(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| BridgeError::conversion(sqlstate::DATETIME_FIELD_OVERFLOW, format!("timestamp out of range: {}", ms)))
}

fn format_date(ms: i64) -> Result<String> {
    Ok(datetime_from_ms(ms)?.format("%Y-%m-%d").to_string())
}

fn format_timestamp(ms: i64) -> Result<String> {
    Ok(datetime_from_ms(ms)?.format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

// ===== Parsing =====

fn parse_float(s: &str) -> Option<f64> {
    match s.trim() {
        t if t.eq_ignore_ascii_case("nan") => Some(f64::NAN),
        t if t.eq_ignore_ascii_case("infinity") => Some(f64::INFINITY),
        t if t.eq_ignore_ascii_case("-infinity") => Some(f64::NEG_INFINITY),
        t => t.parse().ok(),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// `%Y-%m-%d` as epoch milliseconds at UTC midnight
pub fn parse_date_ms(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// RFC 3339, PostgreSQL-style offset, naive (UTC) or bare-date forms
pub fn parse_datetime_ms(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    parse_date_ms(s)
}

/// Decimal text split into sign and digit runs
struct DecimalParts<'a> {
    negative: bool,
    int: &'a str,
    frac: &'a str,
}

fn split_decimal(s: &str) -> Option<DecimalParts<'_>> {
    let s = s.trim();
    let (negative, body) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (int, frac) = body.split_once('.').unwrap_or((body, ""));
    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if !int.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(DecimalParts {
        negative,
        int: int.trim_start_matches('0'),
        frac,
    })
}

/// Validate decimal text and normalize it (`+01.50` → `1.50`, `NaN` kept)
fn canonical_numeric(s: &str) -> Option<String> {
    if s.trim().eq_ignore_ascii_case("nan") {
        return Some("NaN".into());
    }
    let parts = split_decimal(s)?;
    let is_zero = parts.int.is_empty() && parts.frac.bytes().all(|b| b == b'0');
    let mut out = String::new();
    if parts.negative && !is_zero {
        out.push('-');
    }
    out.push_str(if parts.int.is_empty() { "0" } else { parts.int });
    if !parts.frac.is_empty() {
        out.push('.');
        out.push_str(parts.frac);
    }
    Some(out)
}

fn digit_groups(run: &str, pad_left: bool) -> Vec<i16> {
    let width = run.len().div_ceil(4) * 4;
    let padded = if pad_left {
        format!("{:0>width$}", run, width = width)
    } else {
        format!("{:0<width$}", run, width = width)
    };
    padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0i16, |acc, d| acc * 10 + (d - b'0') as i16))
        .collect()
}

/// PostgreSQL binary numeric: ndigits, weight, sign, dscale, base-10000 digits
fn write_numeric_binary(s: &str, buf: &mut BytesMut) -> Result<()> {
    let bad = || BridgeError::conversion(sqlstate::INVALID_TEXT_REPRESENTATION, format!("invalid numeric value: \"{}\"", s));
    if s.trim().eq_ignore_ascii_case("nan") {
        buf.put_i16(0);
        buf.put_i16(0);
        buf.put_u16(NUMERIC_NAN);
        buf.put_i16(0);
        return Ok(());
    }
    let parts = split_decimal(s).ok_or_else(bad)?;
    let dscale = i16::try_from(parts.frac.len()).map_err(|_| bad())?;

    let int_groups = digit_groups(parts.int, true);
    let mut weight = int_groups.len() as i32 - 1;
    let mut digits = int_groups;
    digits.extend(digit_groups(parts.frac, false));

    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    weight -= leading as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let (weight, sign) = if digits.is_empty() {
        (0, NUMERIC_POS)
    } else if parts.negative {
        (weight, NUMERIC_NEG)
    } else {
        (weight, NUMERIC_POS)
    };
    let weight = i16::try_from(weight).map_err(|_| bad())?;

    buf.put_i16(digits.len() as i16);
    buf.put_i16(weight);
    buf.put_u16(sign);
    buf.put_i16(dscale);
    for d in digits {
        buf.put_i16(d);
    }
    Ok(())
}

fn read_numeric_binary(bytes: &[u8]) -> Option<String> {
    let word = |i: usize| -> Option<i16> {
        let b = bytes.get(i * 2..i * 2 + 2)?;
        Some(i16::from_be_bytes([b[0], b[1]]))
    };
    let ndigits = usize::try_from(word(0)?).ok()?;
    let weight = word(1)? as i32;
    let sign = word(2)? as u16;
    let dscale = usize::try_from(word(3)?).ok()?;
    if bytes.len() != 8 + ndigits * 2 {
        return None;
    }
    if sign == NUMERIC_NAN {
        return Some("NaN".into());
    }
    let digits: Vec<i32> = (0..ndigits)
        .map(|i| word(4 + i).map(i32::from))
        .collect::<Option<_>>()?;
    if digits.iter().any(|d| !(0..NBASE).contains(d)) {
        return None;
    }
    let digit = |i: i32| -> i32 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG && !digits.is_empty() {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            if i == 0 {
                let _ = write!(out, "{}", digit(i));
            } else {
                let _ = write!(out, "{:04}", digit(i));
            }
        }
    }
    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while frac.len() < dscale {
            let _ = write!(frac, "{:04}", digit(i));
            i += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Some(out)
}

// ===== Bound parameters =====

/// Decode one Bind parameter according to its declared type and format.
///
/// Unspecified (0) and unknown type OIDs are treated as text.
pub fn decode_param(type_oid: u32, format: FormatCode, bytes: Option<&[u8]>) -> Result<PgValue> {
    let Some(bytes) = bytes else {
        return Ok(PgValue::Null);
    };
    match format {
        FormatCode::Text => decode_text_param(type_oid, bytes),
        FormatCode::Binary => decode_binary_param(type_oid, bytes),
    }
}

fn decode_text_param(type_oid: u32, bytes: &[u8]) -> Result<PgValue> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        BridgeError::conversion(sqlstate::CHARACTER_NOT_IN_REPERTOIRE, "invalid UTF-8 in parameter value")
    })?;
    let bad = |state: &'static str, ty: &str| {
        BridgeError::conversion(state, format!("invalid input syntax for type {}: \"{}\"", ty, text))
    };
    let value = match type_oid {
        oid::INT2 | oid::INT4 | oid::INT8 => PgValue::Int8(
            text.trim()
                .parse()
                .map_err(|_| bad(sqlstate::INVALID_TEXT_REPRESENTATION, "integer"))?,
        ),
        oid::FLOAT4 | oid::FLOAT8 => {
            PgValue::Float8(parse_float(text).ok_or_else(|| bad(sqlstate::INVALID_TEXT_REPRESENTATION, "double precision"))?)
        }
        oid::NUMERIC => {
            PgValue::Numeric(canonical_numeric(text).ok_or_else(|| bad(sqlstate::INVALID_TEXT_REPRESENTATION, "numeric"))?)
        }
        oid::BOOL => PgValue::Bool(parse_bool(text).ok_or_else(|| bad(sqlstate::INVALID_TEXT_REPRESENTATION, "boolean"))?),
        oid::DATE => PgValue::Date(parse_date_ms(text).ok_or_else(|| bad(sqlstate::INVALID_DATETIME_FORMAT, "date"))?),
        oid::TIMESTAMP | oid::TIMESTAMPTZ => {
            PgValue::Timestamp(parse_datetime_ms(text).ok_or_else(|| bad(sqlstate::INVALID_DATETIME_FORMAT, "timestamp"))?)
        }
        _ => PgValue::Text(text.to_owned()),
    };
    Ok(value)
}

fn fixed<const N: usize>(bytes: &[u8], ty: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        BridgeError::conversion(
            sqlstate::INVALID_BINARY_REPRESENTATION,
            format!("incorrect binary data format for type {}: expected {} bytes, got {}", ty, N, bytes.len()),
        )
    })
}

fn decode_binary_param(type_oid: u32, bytes: &[u8]) -> Result<PgValue> {
    let value = match type_oid {
        oid::INT2 => PgValue::Int8(i16::from_be_bytes(fixed(bytes, "smallint")?) as i64),
        oid::INT4 => PgValue::Int8(i32::from_be_bytes(fixed(bytes, "integer")?) as i64),
        oid::INT8 => PgValue::Int8(i64::from_be_bytes(fixed(bytes, "bigint")?)),
        oid::FLOAT4 => PgValue::Float8(f32::from_be_bytes(fixed(bytes, "real")?) as f64),
        oid::FLOAT8 => PgValue::Float8(f64::from_be_bytes(fixed(bytes, "double precision")?)),
        oid::BOOL => PgValue::Bool(fixed::<1>(bytes, "boolean")?[0] != 0),
        oid::DATE => {
            let days = i32::from_be_bytes(fixed(bytes, "date")?) as i64;
            PgValue::Date((days + PG_EPOCH_DAYS) * MS_PER_DAY)
        }
        oid::TIMESTAMP | oid::TIMESTAMPTZ => {
            let micros = i64::from_be_bytes(fixed(bytes, "timestamp")?);
            PgValue::Timestamp(micros.saturating_add(PG_EPOCH_MICROS).div_euclid(1000))
        }
        oid::NUMERIC => PgValue::Numeric(read_numeric_binary(bytes).ok_or_else(|| {
            BridgeError::conversion(sqlstate::INVALID_BINARY_REPRESENTATION, "invalid binary numeric value")
        })?),
        _ => PgValue::Text(String::from_utf8(bytes.to_vec()).map_err(|_| {
            BridgeError::conversion(sqlstate::CHARACTER_NOT_IN_REPERTOIRE, "invalid UTF-8 in parameter value")
        })?),
    };
    Ok(value)
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Negative numbers go in parentheses so `-$1` never becomes a `--` comment
fn signed(s: String) -> String {
    if s.starts_with('-') {
        format!("({})", s)
    } else {
        s
    }
}

/// SQL literal for substituting a bound parameter into query text
pub fn render_literal(value: &PgValue) -> Result<String> {
    let literal = match value {
        PgValue::Null => "NULL".to_string(),
        PgValue::Int8(i) => signed(i.to_string()),
        PgValue::Float8(f) if f.is_finite() => signed(f.to_string()),
        PgValue::Float8(f) => quote(&float_text(*f)),
        PgValue::Numeric(s) if s == "NaN" => quote(s),
        PgValue::Numeric(s) => signed(s.clone()),
        PgValue::Bool(b) => b.to_string(),
        PgValue::Date(ms) => quote(&format_date(*ms)?),
        PgValue::Timestamp(ms) => quote(&format_timestamp(*ms)?),
        PgValue::Text(s) => quote(s),
    };
    Ok(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &PgValue) -> String {
        let mut buf = BytesMut::new();
        write(FormatCode::Text, value, &mut buf).unwrap();
        String::from_utf8(buf.to_vec()).unwrap()
    }

    fn binary(value: &PgValue) -> Vec<u8> {
        let mut buf = BytesMut::new();
        let n = write(FormatCode::Binary, value, &mut buf).unwrap();
        assert_eq!(n, buf.len());
        buf.to_vec()
    }

    fn numeric_words(s: &str) -> Vec<i16> {
        binary(&PgValue::Numeric(s.into()))
            .chunks(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn test_describe_mapping() {
        assert_eq!(describe(DomainType::DateOnly).oid, 1082);
        assert_eq!(describe(DomainType::DateOnly).len, 4);
        assert_eq!(describe(DomainType::DateTime).oid, 1114);
        assert_eq!(describe(DomainType::Integer).oid, 20);
        assert_eq!(describe(DomainType::Float).oid, 701);
        assert_eq!(describe(DomainType::Decimal).oid, 1700);
        assert_eq!(describe(DomainType::Decimal).len, -1);
        assert_eq!(describe(DomainType::Boolean).oid, 16);
        assert_eq!(describe(DomainType::String).oid, 25);
        assert_eq!(describe(DomainType::Unknown).oid, 25);
        assert_eq!(describe(DomainType::Integer).modifier, -1);
    }

    #[test]
    fn test_date_only_to_epoch_ms() {
        let value = coerce(DomainType::DateOnly, Value::String("2024-01-15".into())).unwrap();
        assert_eq!(value, PgValue::Date(1_705_276_800_000));
        assert_eq!(text(&value), "2024-01-15");
    }

    #[test]
    fn test_datetime_forms() {
        let expected = 1_705_314_600_000; // 2024-01-15T10:30:00Z
        for s in [
            "2024-01-15T10:30:00Z",
            "2024-01-15T10:30:00.000+00:00",
            "2024-01-15T12:30:00+02:00",
            "2024-01-15T10:30:00",
            "2024-01-15 10:30:00",
            "2024-01-15 10:30:00+00",
        ] {
            assert_eq!(parse_datetime_ms(s), Some(expected), "{}", s);
        }
        assert_eq!(parse_datetime_ms("2024-01-15"), Some(1_705_276_800_000));
        assert_eq!(text(&PgValue::Timestamp(expected)), "2024-01-15 10:30:00");
        assert_eq!(text(&PgValue::Timestamp(expected + 250)), "2024-01-15 10:30:00.250");
    }

    #[test]
    fn test_coerce_rejects_garbage() {
        match coerce(DomainType::DateOnly, Value::String("15/01/2024".into())) {
            Err(BridgeError::Execution { sqlstate, .. }) => assert_eq!(sqlstate, Some("22007")),
            other => panic!("unexpected: {:?}", other),
        }
        match coerce(DomainType::Integer, Value::String("abc".into())) {
            Err(BridgeError::Execution { sqlstate, .. }) => assert_eq!(sqlstate, Some("22P02")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(coerce(DomainType::Boolean, Value::Integer(5)).is_err());
    }

    #[test]
    fn test_unsigned_beyond_bigint() {
        let huge = || Value::from(serde_json::json!(u64::MAX));
        match coerce(DomainType::Integer, huge()) {
            Err(BridgeError::Execution { sqlstate, .. }) => assert_eq!(sqlstate, Some("22P02")),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(
            coerce(DomainType::Decimal, huge()).unwrap(),
            PgValue::Numeric("18446744073709551615".into())
        );
    }

    #[test]
    fn test_coerce_passes_null_and_unknown() {
        assert_eq!(coerce(DomainType::Integer, Value::Null).unwrap(), PgValue::Null);
        assert_eq!(
            coerce(DomainType::Unknown, Value::String("{\"a\":1}".into())).unwrap(),
            PgValue::Text("{\"a\":1}".into())
        );
        assert_eq!(coerce(DomainType::String, Value::Integer(3)).unwrap(), PgValue::Text("3".into()));
    }

    #[test]
    fn test_null_column_is_absent() {
        assert_eq!(encode_column(DomainType::Integer, Value::Null, FormatCode::Binary).unwrap(), None);
    }

    #[test]
    fn test_text_writers() {
        assert_eq!(text(&PgValue::Int8(-42)), "-42");
        assert_eq!(text(&PgValue::Float8(1.5)), "1.5");
        assert_eq!(text(&PgValue::Float8(f64::INFINITY)), "Infinity");
        assert_eq!(text(&PgValue::Bool(true)), "t");
        assert_eq!(text(&PgValue::Bool(false)), "f");
        assert_eq!(text(&PgValue::Numeric("12.50".into())), "12.50");
    }

    #[test]
    fn test_binary_writers() {
        assert_eq!(binary(&PgValue::Int8(1)), vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(binary(&PgValue::Bool(true)), vec![1]);
        assert_eq!(binary(&PgValue::Float8(1.0)), 1.0f64.to_be_bytes().to_vec());
        // 2000-01-02 is day 1 of the PostgreSQL epoch
        assert_eq!(binary(&PgValue::Date(parse_date_ms("2000-01-02").unwrap())), vec![0, 0, 0, 1]);
        assert_eq!(binary(&PgValue::Date(parse_date_ms("1999-12-31").unwrap())), (-1i32).to_be_bytes().to_vec());
        let one_second = parse_datetime_ms("2000-01-01 00:00:01").unwrap();
        assert_eq!(binary(&PgValue::Timestamp(one_second)), 1_000_000i64.to_be_bytes().to_vec());
    }

    #[test]
    fn test_numeric_binary_layout() {
        // ndigits, weight, sign, dscale, digits...
        assert_eq!(numeric_words("123.45"), vec![2, 0, 0, 2, 123, 4500]);
        assert_eq!(numeric_words("0.001"), vec![1, -1, 0, 3, 10]);
        assert_eq!(numeric_words("-100000000"), vec![1, 2, 0x4000, 0, 1]);
        assert_eq!(numeric_words("0"), vec![0, 0, 0, 0]);
        assert_eq!(numeric_words("0.00001"), vec![1, -2, 0, 5, 1000]);
        assert_eq!(numeric_words("NaN"), vec![0, 0, 0xC000u16 as i16, 0]);
    }

    #[test]
    fn test_numeric_binary_param_decode() {
        for s in ["123.45", "0.001", "-100000000", "0", "0.00001", "98765.4321", "NaN"] {
            let bytes = binary(&PgValue::Numeric(s.into()));
            assert_eq!(
                decode_param(oid::NUMERIC, FormatCode::Binary, Some(&bytes)).unwrap(),
                PgValue::Numeric(s.into()),
                "{}",
                s
            );
        }
    }

    #[test]
    fn test_decode_text_params() {
        assert_eq!(decode_param(oid::INT4, FormatCode::Text, Some(b"42")).unwrap(), PgValue::Int8(42));
        assert_eq!(decode_param(oid::BOOL, FormatCode::Text, Some(b"t")).unwrap(), PgValue::Bool(true));
        assert_eq!(
            decode_param(oid::DATE, FormatCode::Text, Some(b"2024-01-15")).unwrap(),
            PgValue::Date(1_705_276_800_000)
        );
        assert_eq!(
            decode_param(oid::UNSPECIFIED, FormatCode::Text, Some(b"O'Brien")).unwrap(),
            PgValue::Text("O'Brien".into())
        );
        assert_eq!(decode_param(oid::INT8, FormatCode::Text, None).unwrap(), PgValue::Null);
        assert!(decode_param(oid::INT4, FormatCode::Text, Some(b"x")).is_err());
    }

    #[test]
    fn test_decode_binary_params() {
        assert_eq!(
            decode_param(oid::INT4, FormatCode::Binary, Some(&7i32.to_be_bytes())).unwrap(),
            PgValue::Int8(7)
        );
        assert_eq!(
            decode_param(oid::INT2, FormatCode::Binary, Some(&(-3i16).to_be_bytes())).unwrap(),
            PgValue::Int8(-3)
        );
        assert_eq!(
            decode_param(oid::FLOAT8, FormatCode::Binary, Some(&2.5f64.to_be_bytes())).unwrap(),
            PgValue::Float8(2.5)
        );
        assert_eq!(
            decode_param(oid::DATE, FormatCode::Binary, Some(&8780i32.to_be_bytes())).unwrap(),
            PgValue::Date(1_705_276_800_000)
        );
        assert_eq!(
            decode_param(oid::TIMESTAMP, FormatCode::Binary, Some(&1_000_000i64.to_be_bytes())).unwrap(),
            PgValue::Timestamp(946_684_801_000)
        );
        match decode_param(oid::INT4, FormatCode::Binary, Some(&[0, 1])) {
            Err(BridgeError::Execution { sqlstate, .. }) => assert_eq!(sqlstate, Some("22P03")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_render_literal() {
        assert_eq!(render_literal(&PgValue::Null).unwrap(), "NULL");
        assert_eq!(render_literal(&PgValue::Int8(5)).unwrap(), "5");
        assert_eq!(render_literal(&PgValue::Bool(false)).unwrap(), "false");
        assert_eq!(render_literal(&PgValue::Text("O'Brien".into())).unwrap(), "'O''Brien'");
        assert_eq!(render_literal(&PgValue::Date(1_705_276_800_000)).unwrap(), "'2024-01-15'");
        assert_eq!(render_literal(&PgValue::Numeric("1.50".into())).unwrap(), "1.50");
        assert_eq!(render_literal(&PgValue::Int8(-5)).unwrap(), "(-5)");
        assert_eq!(render_literal(&PgValue::Float8(-2.5)).unwrap(), "(-2.5)");
        assert_eq!(render_literal(&PgValue::Numeric("-0.75".into())).unwrap(), "(-0.75)");
    }
}
