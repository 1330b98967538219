//! SQL text helpers for the session handler
//!
//! The gateway never parses SQL. It only needs to know where statements end,
//! where `$n` placeholders are, and which statements control transactions.
//! All of that is done on a byte mask that marks the characters outside
//! quoted literals, quoted identifiers, dollar-quoted bodies and comments.

use crate::errors::sqlstate;
use pgbridge_common::{BridgeError, Result};

/// Transaction control statements answered by the gateway itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxCommand {
    Begin,
    Commit,
    Rollback,
}

/// Marks each byte of `sql` that is plain SQL text
fn code_mask(sql: &str) -> Vec<bool> {
    let b = sql.as_bytes();
    let mut mask = vec![false; b.len()];
    let mut i = 0;

    while i < b.len() {
        match b[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < b.len() {
                    if b[i] == quote {
                        // doubled quote is an escaped quote
                        if b.get(i + 1) == Some(&quote) {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'-' if b.get(i + 1) == Some(&b'-') => {
                while i < b.len() && b[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if b.get(i + 1) == Some(&b'*') => {
                i += 2;
                let mut depth = 1;
                while i < b.len() && depth > 0 {
                    if b[i] == b'/' && b.get(i + 1) == Some(&b'*') {
                        depth += 1;
                        i += 2;
                    } else if b[i] == b'*' && b.get(i + 1) == Some(&b'/') {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
            }
            b'$' => match dollar_tag(&b[i..]) {
                Some(tag_len) => {
                    let tag = &b[i..i + tag_len];
                    i += tag_len;
                    i = match b[i..].windows(tag_len).position(|w| w == tag) {
                        Some(pos) => i + pos + tag_len,
                        None => b.len(),
                    };
                }
                None => {
                    mask[i] = true;
                    i += 1;
                }
            },
            _ => {
                mask[i] = true;
                i += 1;
            }
        }
    }
    mask
}

/// Length of a `$tag$` opener at the start of `b`, if there is one
fn dollar_tag(b: &[u8]) -> Option<usize> {
    let mut j = 1;
    while j < b.len() && (b[j].is_ascii_alphanumeric() || b[j] == b'_') {
        j += 1;
    }
    let starts_with_digit = b.get(1).is_some_and(u8::is_ascii_digit);
    (j < b.len() && b[j] == b'$' && !starts_with_digit).then_some(j + 1)
}

/// Split a simple-query string into statements on `;` outside quotes and comments.
///
/// Statements that contain nothing but whitespace or comments are dropped, so
/// an empty result means the client sent an empty query.
pub(crate) fn split_statements(sql: &str) -> Vec<&str> {
    let mask = code_mask(sql);
    let b = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;

    for end in (0..=b.len()).filter(|&i| i == b.len() || (mask[i] && b[i] == b';')) {
        let has_code = (start..end).any(|k| mask[k] && !b[k].is_ascii_whitespace());
        if has_code {
            statements.push(sql[start..end].trim());
        }
        start = end + 1;
    }
    statements
}

/// True when `sql` holds no statement at all (`""`, `";"`, only comments)
pub(crate) fn is_empty_query(sql: &str) -> bool {
    split_statements(sql).is_empty()
}

/// `$n` placeholders as (byte start, byte end, n)
fn placeholders(sql: &str) -> Vec<(usize, usize, usize)> {
    let mask = code_mask(sql);
    let b = sql.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < b.len() {
        let after_ident = i > 0 && (b[i - 1].is_ascii_alphanumeric() || b[i - 1] == b'_');
        if mask[i] && b[i] == b'$' && !after_ident {
            let mut j = i + 1;
            while j < b.len() && mask[j] && b[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                if let Ok(n) = sql[i + 1..j].parse::<usize>() {
                    found.push((i, j, n));
                }
                i = j;
                continue;
            }
        }
        i += 1;
    }
    found
}

/// Highest placeholder number referenced by `sql`
pub(crate) fn count_placeholders(sql: &str) -> usize {
    placeholders(sql).iter().map(|&(_, _, n)| n).max().unwrap_or(0)
}

/// Replace `$1`, `$2`, ... with already-rendered SQL literals.
///
/// Placeholders inside literals and comments are left alone, and `$1` never
/// matches the prefix of `$10`.
pub(crate) fn substitute_parameters(sql: &str, literals: &[String]) -> Result<String> {
    let mut out = String::with_capacity(sql.len() + literals.iter().map(String::len).sum::<usize>());
    let mut last = 0;

    for (start, end, n) in placeholders(sql) {
        let literal = n
            .checked_sub(1)
            .and_then(|idx| literals.get(idx))
            .ok_or_else(|| {
                BridgeError::statement(
                    sqlstate::PROTOCOL_VIOLATION,
                    format!(
                        "bind message supplies {} parameters, but query references ${}",
                        literals.len(),
                        n
                    ),
                )
            })?;
        out.push_str(&sql[last..start]);
        out.push_str(literal);
        last = end;
    }
    out.push_str(&sql[last..]);
    Ok(out)
}

/// Leading keywords of `sql`, uppercased. Comments and quoted text are skipped.
fn keywords(sql: &str, n: usize) -> Vec<String> {
    let mask = code_mask(sql);
    let code: String = sql
        .char_indices()
        .map(|(i, c)| if mask[i] { c } else { ' ' })
        .collect();
    code.split(|c: char| c.is_whitespace() || c == ';' || c == '(')
        .filter(|w| !w.is_empty())
        .take(n)
        .map(str::to_ascii_uppercase)
        .collect()
}

/// Recognize transaction control statements
pub(crate) fn transaction_command(sql: &str) -> Option<TxCommand> {
    let words = keywords(sql, 2);
    let first = words.first()?.as_str();
    let second = words.get(1).map(String::as_str);
    match (first, second) {
        ("BEGIN", _) => Some(TxCommand::Begin),
        ("START", Some("TRANSACTION")) => Some(TxCommand::Begin),
        ("COMMIT" | "END", _) => Some(TxCommand::Commit),
        // ROLLBACK TO SAVEPOINT belongs to the backend
        ("ROLLBACK", Some("TO")) => None,
        ("ROLLBACK" | "ABORT", _) => Some(TxCommand::Rollback),
        _ => None,
    }
}

/// CommandComplete tag for a statement that produced `rows` rows
pub(crate) fn derive_command_tag(sql: &str, rows: usize) -> String {
    let keyword = keywords(sql, 1)
        .pop()
        .filter(|w| w.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or_else(|| "SELECT".to_string());
    match keyword.as_str() {
        "BEGIN" => keyword,
        "INSERT" => format!("INSERT 0 {}", rows),
        _ => format!("{} {}", keyword, rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_command_tag() {
        assert_eq!(derive_command_tag("INSERT INTO t VALUES (1), (2), (3)", 3), "INSERT 0 3");
        assert_eq!(derive_command_tag("BEGIN", 0), "BEGIN");
        assert_eq!(derive_command_tag("UPDATE t SET x = 1", 5), "UPDATE 5");
        assert_eq!(derive_command_tag("  select * from t", 2), "SELECT 2");
        assert_eq!(derive_command_tag("(SELECT 1)", 1), "SELECT 1");
        assert_eq!(derive_command_tag("/* hint */ INSERT INTO t VALUES (1)", 1), "INSERT 0 1");
        assert_eq!(derive_command_tag("-- note\nDELETE FROM t", 4), "DELETE 4");
    }

    #[test]
    fn test_split_statements() {
        assert_eq!(split_statements("SELECT 1; SELECT 2;"), vec!["SELECT 1", "SELECT 2"]);
        assert_eq!(
            split_statements("SELECT 'a;b'; SELECT \"x;y\" FROM t"),
            vec!["SELECT 'a;b'", "SELECT \"x;y\" FROM t"]
        );
        assert_eq!(split_statements("SELECT 1 -- trailing; comment"), vec!["SELECT 1 -- trailing; comment"]);
        assert_eq!(split_statements("SELECT $$a;b$$"), vec!["SELECT $$a;b$$"]);
        assert_eq!(split_statements("SELECT 'it''s;'"), vec!["SELECT 'it''s;'"]);
    }

    #[test]
    fn test_empty_queries() {
        assert!(is_empty_query(""));
        assert!(is_empty_query(";"));
        assert!(is_empty_query("  ; ;\n"));
        assert!(is_empty_query("/* nothing */ ;"));
        assert!(!is_empty_query("SELECT 1"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(count_placeholders("SELECT $1, $2 WHERE x = $10"), 10);
        assert_eq!(count_placeholders("SELECT '$1', a$1 FROM t -- $3"), 0);
        assert_eq!(count_placeholders("SELECT 1"), 0);
    }

    #[test]
    fn test_substitute_parameters() {
        let literals = vec!["'x'".to_string(), "42".to_string()];
        assert_eq!(
            substitute_parameters("SELECT $1, $2, '$1'", &literals).unwrap(),
            "SELECT 'x', 42, '$1'"
        );

        let ten: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
        assert_eq!(substitute_parameters("SELECT $1 + $10", &ten).unwrap(), "SELECT 1 + 10");

        let err = substitute_parameters("SELECT $3", &literals).unwrap_err();
        assert!(matches!(err, BridgeError::Statement { sqlstate: "08P01", .. }));
        assert!(substitute_parameters("SELECT $0", &literals).is_err());
    }

    #[test]
    fn test_substitute_negative_after_minus() {
        use crate::pg_wire::marshal::{decode_param, render_literal};
        use crate::pg_wire::protocol::{oid, FormatCode};

        let minus_five = decode_param(oid::INT4, FormatCode::Text, Some(b"-5")).unwrap();
        let literals = vec![render_literal(&minus_five).unwrap()];
        let sql = substitute_parameters("SELECT 10 -$1 AS x", &literals).unwrap();
        assert_eq!(sql, "SELECT 10 -(-5) AS x");
        assert_eq!(count_placeholders(&sql), 0);
        assert_eq!(split_statements(&sql), vec!["SELECT 10 -(-5) AS x"]);

        let half = decode_param(oid::NUMERIC, FormatCode::Text, Some(b"-0.5")).unwrap();
        let literals = vec![render_literal(&half).unwrap()];
        assert_eq!(substitute_parameters("SELECT 1-$1", &literals).unwrap(), "SELECT 1-(-0.5)");
    }

    #[test]
    fn test_transaction_command() {
        assert_eq!(transaction_command("begin"), Some(TxCommand::Begin));
        assert_eq!(transaction_command("BEGIN TRANSACTION;"), Some(TxCommand::Begin));
        assert_eq!(transaction_command("start transaction"), Some(TxCommand::Begin));
        assert_eq!(transaction_command("COMMIT"), Some(TxCommand::Commit));
        assert_eq!(transaction_command("end"), Some(TxCommand::Commit));
        assert_eq!(transaction_command("ROLLBACK"), Some(TxCommand::Rollback));
        assert_eq!(transaction_command("abort;"), Some(TxCommand::Rollback));
        assert_eq!(transaction_command("ROLLBACK TO SAVEPOINT s1"), None);
        assert_eq!(transaction_command("SELECT 1"), None);
        assert_eq!(transaction_command("starting"), None);
        assert_eq!(transaction_command("-- c\nBEGIN"), Some(TxCommand::Begin));
        assert_eq!(transaction_command("/* a /* nested */ b */ COMMIT"), Some(TxCommand::Commit));
        assert_eq!(transaction_command("/* ROLLBACK */ SELECT 1"), None);
    }
}
