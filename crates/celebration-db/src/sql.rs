//! SQL text encoding shared by dump creation, dump replay and the JSON importer.
//!
//! Every literal that ends up inside generated SQL goes through [`sql_literal`]:
//! text is single-quoted with embedded `'` doubled, and `NULL` is always the bare
//! keyword so a re-import keeps NULL and the empty string apart.

use celebration_common::{Error, Result};
use rusqlite::types::{Value, ValueRef};

const MAX_IDENTIFIER_LEN: usize = 128;

/// Render a single SQLite value as a literal that reproduces it when replayed.
pub fn sql_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => real_literal(f),
        ValueRef::Text(bytes) => quote_text(&String::from_utf8_lossy(bytes)),
        ValueRef::Blob(bytes) => blob_literal(bytes),
    }
}

pub fn value_literal(value: &Value) -> String {
    sql_literal(ValueRef::from(value))
}

/// Single-quote `text`, doubling any embedded quote characters.
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Double-quote an identifier so keywords and odd names survive replay.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn real_literal(f: f64) -> String {
    if f.is_nan() {
        "NULL".to_string()
    } else if f.is_infinite() {
        let overflow = if f > 0.0 { "9e999" } else { "-9e999" };
        overflow.to_string()
    } else {
        // Debug keeps the fractional part ("1.0"), so REAL survives untyped columns.
        format!("{f:?}")
    }
}

fn blob_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('\'');
    out
}

/// Reject anything but `[A-Za-z_][A-Za-z0-9_]*` before it is interpolated into DDL.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(Error::InvalidInput(format!(
            "invalid SQL identifier: {name:?}"
        )));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidInput(format!(
            "SQL identifier too long: {} chars",
            name.len()
        )));
    }
    Ok(())
}

/// Build one `INSERT` statement. `values` must already be encoded literals.
pub fn insert_statement<C: AsRef<str>>(table: &str, columns: &[C], values: &[String]) -> String {
    let columns = columns
        .iter()
        .map(|c| quote_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({});",
        quote_identifier(table),
        values.join(", ")
    )
}

/// Split a script into statements on `;` outside quotes and comments.
///
/// Comments are dropped. An unterminated quote or block comment, or trailing
/// text without a closing `;`, is an error: that is what a truncated dump
/// looks like.
pub fn split_statements(script: &str) -> Result<Vec<String>> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if inner == c {
                        // A doubled quote is an escaped quote, not the end.
                        if chars.peek() == Some(&c) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                            continue;
                        }
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(Error::DumpParse(format!(
                        "unterminated quoted text in statement {}",
                        statements.len() + 1
                    )));
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    if inner == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(Error::DumpParse("unterminated block comment".into()));
                }
                current.push(' ');
            }
            ';' => {
                let statement = current.trim();
                if !statement.is_empty() {
                    statements.push(statement.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() {
        return Err(Error::DumpParse(format!(
            "statement {} is missing its terminating ';'",
            statements.len() + 1
        )));
    }

    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_bare_keyword_and_empty_text_is_quoted() {
        assert_eq!(sql_literal(ValueRef::Null), "NULL");
        assert_eq!(sql_literal(ValueRef::Text(b"")), "''");
        assert_eq!(sql_literal(ValueRef::Text(b"NULL")), "'NULL'");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(
            sql_literal(ValueRef::Text("Grandma's \"famous\" pie".as_bytes())),
            "'Grandma''s \"famous\" pie'"
        );
        assert_eq!(quote_text("''"), "''''''");
    }

    #[test]
    fn numbers_and_blobs_render_unquoted() {
        assert_eq!(sql_literal(ValueRef::Integer(-42)), "-42");
        assert_eq!(sql_literal(ValueRef::Real(25.0)), "25.0");
        assert_eq!(sql_literal(ValueRef::Real(0.5)), "0.5");
        assert_eq!(sql_literal(ValueRef::Blob(&[0x00, 0xAB, 0x10])), "X'00AB10'");
        assert_eq!(sql_literal(ValueRef::Real(f64::INFINITY)), "9e999");
    }

    #[test]
    fn identifiers_are_quoted_with_doubled_quotes() {
        assert_eq!(quote_identifier("type"), "\"type\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn identifier_validation() {
        assert!(validate_identifier("storage_type").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1col").is_err());
        assert!(validate_identifier("name; DROP TABLE messages").is_err());
        assert!(validate_identifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn insert_statement_quotes_names() {
        let stmt = insert_statement(
            "messages",
            &["id", "name"],
            &["1".to_string(), quote_text("O'Neil")],
        );
        assert_eq!(
            stmt,
            "INSERT INTO \"messages\" (\"id\", \"name\") VALUES (1, 'O''Neil');"
        );
    }

    #[test]
    fn split_ignores_semicolons_in_strings_and_comments() {
        let script = "-- header; not a statement\n\
                      BEGIN TRANSACTION;\n\
                      INSERT INTO t VALUES ('a;b', 'it''s');\n\
                      /* block; comment */ INSERT INTO t VALUES ('--not comment');\n\
                      COMMIT;\n";
        let statements = split_statements(script).expect("script should split");

        assert_eq!(statements.len(), 4);
        assert_eq!(statements[0], "BEGIN TRANSACTION");
        assert_eq!(statements[1], "INSERT INTO t VALUES ('a;b', 'it''s')");
        assert_eq!(statements[2], "INSERT INTO t VALUES ('--not comment')");
        assert_eq!(statements[3], "COMMIT");
    }

    #[test]
    fn split_rejects_truncated_input() {
        let cut_in_string = "BEGIN;\nINSERT INTO t VALUES ('unfinish";
        assert!(matches!(
            split_statements(cut_in_string),
            Err(Error::DumpParse(_))
        ));

        let cut_before_semicolon = "BEGIN;\nINSERT INTO t VALUES (1)";
        assert!(matches!(
            split_statements(cut_before_semicolon),
            Err(Error::DumpParse(_))
        ));

        assert!(matches!(
            split_statements("SELECT 1; /* open"),
            Err(Error::DumpParse(_))
        ));
    }

    #[test]
    fn split_of_blank_script_is_empty() {
        let statements = split_statements("\n-- only a comment\n\n").expect("blank script");
        assert!(statements.is_empty());
    }
}
