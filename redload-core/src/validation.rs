//! Identifier and literal validation for statements rendered as text.
//!
//! User, database and table names cannot be bound as parameters in DDL or
//! COPY, so they are checked here before any statement is built.

use crate::{Result, error::RedloadError};
use regex::Regex;
use std::sync::OnceLock;

/// Maximum identifier length in bytes accepted by the warehouse.
pub const MAX_IDENTIFIER_LEN: usize = 127;

fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").ok())
        .as_ref()
}

/// Validates a single unqualified identifier.
///
/// # Errors
/// Returns a configuration error naming `what` when the identifier is empty,
/// too long, or contains characters outside `[A-Za-z0-9_$]`.
pub fn validate_identifier(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RedloadError::configuration(format!(
            "{} name cannot be empty",
            what
        )));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(RedloadError::configuration(format!(
            "{} name too long: maximum {} characters",
            what, MAX_IDENTIFIER_LEN
        )));
    }
    let pattern = identifier_pattern()
        .ok_or_else(|| RedloadError::configuration("identifier pattern failed to compile"))?;
    if !pattern.is_match(name) {
        return Err(RedloadError::configuration(format!(
            "{} name '{}' must start with a letter or underscore and contain only \
             letters, digits, underscores, and dollar signs",
            what, name
        )));
    }
    Ok(())
}

/// Validates a table name, optionally qualified as `schema.table`.
pub fn validate_table_name(name: &str) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return Err(RedloadError::configuration(format!(
            "table name '{}' has too many qualifiers",
            name
        )));
    }
    for part in parts {
        validate_identifier("table", part)?;
    }
    Ok(())
}

/// Escapes a value for use inside a single-quoted SQL string literal.
///
/// The warehouse treats backslash as an escape inside literals, so
/// backslashes are doubled along with single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("user", "not_admin").is_ok());
        assert!(validate_identifier("database", "_tmp$1").is_ok());
        assert!(validate_table_name("dest_tbl").is_ok());
        assert!(validate_table_name("public.dest_tbl").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("user", "").is_err());
        assert!(validate_identifier("user", "1abc").is_err());
        assert!(validate_identifier("user", "bob; DROP TABLE x").is_err());
        assert!(validate_identifier("user", &"a".repeat(128)).is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("public.").is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("abc"), "'abc'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"C:\dir"), r"'C:\\dir'");
    }

    #[test]
    fn test_quote_literal_backslash_cannot_reopen_literal() {
        // A trailing backslash must not escape the closing quote
        assert_eq!(quote_literal("secret\\"), "'secret\\\\'");
        // Backslash before a quote stays a literal backslash plus a doubled quote
        assert_eq!(
            quote_literal(r"s3://b/x\'; DROP TABLE dest; --"),
            r"'s3://b/x\\''; DROP TABLE dest; --'"
        );
    }
}
