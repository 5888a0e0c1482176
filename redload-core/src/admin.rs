//! Idempotent administration over a [`ConnectionHandle`].
//!
//! The warehouse has no `IF NOT EXISTS` for users and no `IF [NOT] EXISTS`
//! for databases. User creation is made idempotent by recognizing the
//! `duplicate_object` state; database names are expected to be unique per
//! caller (see [`unique_database_name`]).

use crate::connection::ConnectionHandle;
use crate::validation::{quote_literal, validate_identifier, validate_table_name};
use crate::{Result, error::RedloadError};
use tracing::{info, warn};

/// Generates `prefix_<uuid v4 with underscores>`, a valid identifier that
/// will not collide with another run.
///
/// ```rust
/// let name = redload_core::admin::unique_database_name("redshiftoptest");
/// assert!(name.starts_with("redshiftoptest_"));
/// assert!(!name.contains('-'));
/// ```
pub fn unique_database_name(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().to_string().replace('-', "_"))
}

/// Administrative statements bound to one open handle.
#[derive(Debug)]
pub struct AdminOps<'h> {
    conn: &'h mut ConnectionHandle,
}

impl<'h> AdminOps<'h> {
    /// Wraps an open handle.
    pub fn new(conn: &'h mut ConnectionHandle) -> Self {
        Self { conn }
    }

    /// Creates `name` with `password`, succeeding if the user already exists.
    ///
    /// # Errors
    /// - Configuration error for an invalid name or a password containing a
    ///   single quote, before anything is sent
    /// - Any database error other than `duplicate_object`
    pub async fn ensure_user(&mut self, name: &str, password: &str) -> Result<()> {
        validate_identifier("user", name)?;
        if password.contains('\'') {
            return Err(RedloadError::configuration(
                "user password must not contain a single quote",
            ));
        }

        let sql = zeroize::Zeroizing::new(format!(
            "CREATE USER {} PASSWORD {}",
            name,
            quote_literal(password)
        ));
        match self.conn.execute_update(&sql).await {
            Ok(_) => {
                info!(user = name, "Created user");
                Ok(())
            }
            Err(RedloadError::Database(e)) if e.is_duplicate_object() => {
                warn!(user = name, "User already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drops `name` if it exists.
    ///
    /// # Errors
    /// Any database error other than `undefined_object`.
    pub async fn drop_user_if_exists(&mut self, name: &str) -> Result<()> {
        validate_identifier("user", name)?;
        match self
            .conn
            .execute_update(&format!("DROP USER IF EXISTS {}", name))
            .await
        {
            Ok(_) => {
                info!(user = name, "Dropped user if present");
                Ok(())
            }
            Err(RedloadError::Database(e)) if e.is_undefined_object() => {
                warn!(user = name, "User did not exist");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Creates database `name`. Fails if it exists.
    pub async fn create_database(&mut self, name: &str) -> Result<()> {
        validate_identifier("database", name)?;
        self.conn
            .execute_update(&format!("CREATE DATABASE {}", name))
            .await?;
        info!(database = name, "Created database");
        Ok(())
    }

    /// Drops database `name`. Fails if it does not exist.
    pub async fn drop_database(&mut self, name: &str) -> Result<()> {
        validate_identifier("database", name)?;
        self.conn
            .execute_update(&format!("DROP DATABASE {}", name))
            .await?;
        info!(database = name, "Dropped database");
        Ok(())
    }

    /// Grants `privileges` (for example `SELECT, INSERT`) on `table` to
    /// `user`.
    ///
    /// # Errors
    /// Configuration error for an unknown privilege or invalid name.
    pub async fn grant(&mut self, privileges: &[&str], table: &str, user: &str) -> Result<()> {
        const PRIVILEGES: &[&str] = &[
            "SELECT", "INSERT", "UPDATE", "DELETE", "REFERENCES", "TRUNCATE", "ALL",
        ];

        validate_table_name(table)?;
        validate_identifier("user", user)?;
        if privileges.is_empty() {
            return Err(RedloadError::configuration("at least one privilege is required"));
        }
        let mut rendered = Vec::with_capacity(privileges.len());
        for privilege in privileges {
            let upper = privilege.trim().to_ascii_uppercase();
            if !PRIVILEGES.contains(&upper.as_str()) {
                return Err(RedloadError::configuration(format!(
                    "unknown privilege '{}'",
                    privilege
                )));
            }
            rendered.push(upper);
        }

        self.conn
            .execute_update(&format!(
                "GRANT {} ON {} TO {}",
                rendered.join(", "),
                table,
                user
            ))
            .await?;
        info!(table, user, "Granted privileges");
        Ok(())
    }

    /// Removes every row from `table`. Callers use this to clear a
    /// destination before a load.
    pub async fn truncate(&mut self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        self.conn
            .execute_update(&format!("TRUNCATE {}", table))
            .await?;
        info!(table, "Truncated table");
        Ok(())
    }
}
