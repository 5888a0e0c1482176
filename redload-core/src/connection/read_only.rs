//! Read-only statement check.
//!
//! The check runs on the statement text alone, before the session is touched.
//! Comments, string literals and quoted identifiers are skipped so that
//! `SELECT 'DROP'` passes while `WITH d AS (DELETE ...) SELECT ...` does not.

use crate::{Result, error::RedloadError};

/// Leading keywords accepted on the read-only path.
pub const READ_ONLY_KEYWORDS: &[&str] = &["SELECT", "WITH", "SHOW", "VALUES", "TABLE", "EXPLAIN"];

/// Keywords that make an otherwise read-only statement mutate state
/// (`SELECT ... INTO` creates a table).
const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "DROP", "ALTER", "CREATE", "GRANT",
    "REVOKE", "COPY", "UNLOAD", "INTO", "VACUUM", "CALL",
];

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Semicolon,
    Other(char),
}

fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '\'' | '"' => {
                // Doubled delimiter is an escaped delimiter
                while let Some(next) = chars.next() {
                    if next == c {
                        if chars.peek() == Some(&c) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                tokens.push(Token::Other(c));
            }
            ';' => tokens.push(Token::Semicolon),
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word.to_ascii_uppercase()));
            }
            other => tokens.push(Token::Other(other)),
        }
    }

    tokens
}

/// Leading keyword of a statement, upper-cased, skipping comments and
/// opening parentheses.
pub fn leading_keyword(sql: &str) -> Option<String> {
    tokenize(sql).into_iter().find_map(|token| match token {
        Token::Word(word) => Some(Some(word)),
        Token::Other('(') => None,
        _ => Some(None),
    })?
}

/// Verifies that `sql` is a single read-only statement.
///
/// ```rust
/// use redload_core::connection::check_read_only;
///
/// assert!(check_read_only("select * from t -- DELETE").is_ok());
/// assert!(check_read_only("UPDATE t SET a = 1").is_err());
/// ```
///
/// # Errors
/// Returns [`RedloadError::NotReadOnly`] naming the offending keyword.
pub fn check_read_only(sql: &str) -> Result<()> {
    let tokens = tokenize(sql);

    let leading = tokens.iter().find_map(|token| match token {
        Token::Word(word) => Some(Some(word.as_str())),
        Token::Other('(') => None,
        _ => Some(None),
    });
    let keyword = match leading {
        Some(Some(word)) => word,
        _ => return Err(RedloadError::not_read_only("<none>")),
    };
    if !READ_ONLY_KEYWORDS.contains(&keyword) {
        return Err(RedloadError::not_read_only(keyword));
    }

    let mut after_separator = false;
    for token in &tokens {
        match token {
            Token::Semicolon => after_separator = true,
            Token::Word(word) if after_separator => {
                return Err(RedloadError::not_read_only(format!("{} after ';'", word)));
            }
            Token::Other(c) if after_separator => {
                return Err(RedloadError::not_read_only(format!("{} after ';'", c)));
            }
            Token::Word(word) if MUTATING_KEYWORDS.contains(&word.as_str()) => {
                return Err(RedloadError::not_read_only(word.as_str()));
            }
            _ => {}
        }
    }

    Ok(())
}
