//! Operation-scoped session configuration.
//!
//! This module provides the `ConnectionConfig` struct passed to
//! [`super::ConnectionHandle::open`]. It never holds host, user, password or
//! database; those come from a secret lookup on every open.

use crate::validation::validate_identifier;
use crate::{Result, error::RedloadError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default warehouse port.
pub const DEFAULT_PORT: u16 = 5439;

/// TLS negotiation mode for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    /// Plain TCP only
    Disable,
    /// TLS when the server offers it
    #[default]
    Prefer,
    /// Fail unless TLS is negotiated
    Require,
}

/// Session settings threaded explicitly into every open.
///
/// # Security
/// This struct intentionally does NOT store passwords or credentials.
///
/// # Example
/// ```rust
/// use redload_core::connection::{ConnectionConfig, SslMode};
/// use std::time::Duration;
///
/// let config = ConnectionConfig::new()
///     .with_port(5439)
///     .with_statement_timeout(Duration::from_secs(300))
///     .with_ssl_mode(SslMode::Require);
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Warehouse port
    pub port: u16,
    /// Upper bound on session establishment
    pub connect_timeout: Duration,
    /// Upper bound on any single statement, applied as a session setting
    pub statement_timeout: Option<Duration>,
    /// TLS mode
    pub ssl_mode: SslMode,
    /// Name reported to the server for connection tracking
    pub application_name: Option<String>,
    /// Schema set as the session search path
    pub search_path: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(30),
            statement_timeout: None,
            ssl_mode: SslMode::default(),
            application_name: Some(format!("redload-{}", env!("CARGO_PKG_VERSION"))),
            search_path: None,
        }
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConnectionConfig(port={}, ssl={:?}", self.port, self.ssl_mode)?;
        if let Some(timeout) = self.statement_timeout {
            write!(f, ", statement_timeout={}s", timeout.as_secs())?;
        }
        if let Some(schema) = &self.search_path {
            write!(f, ", search_path={}", schema)?;
        }
        write!(f, ")")
    }
}

impl ConnectionConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-statement timeout.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Sets the TLS mode.
    pub fn with_ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    /// Sets the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the session search path.
    pub fn with_search_path(mut self, schema: impl Into<String>) -> Self {
        self.search_path = Some(schema.into());
        self
    }

    /// Validates configuration values.
    ///
    /// # Errors
    /// Returns a configuration error for a zero port or timeout, or an
    /// invalid search-path schema name.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(RedloadError::configuration("port must be greater than 0"));
        }

        if self.connect_timeout.is_zero() {
            return Err(RedloadError::configuration(
                "connect_timeout must be greater than 0",
            ));
        }

        if self.statement_timeout.is_some_and(|t| t.as_millis() == 0) {
            return Err(RedloadError::configuration(
                "statement_timeout must be at least 1ms",
            ));
        }

        if let Some(schema) = &self.search_path {
            validate_identifier("schema", schema)?;
        }

        Ok(())
    }
}
