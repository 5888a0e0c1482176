//! Warehouse sessions.
//!
//! A [`ConnectionHandle`] owns exactly one driver session, resolved from a
//! [`SecretLookup`] on every open. The driver sits behind the [`Connector`]
//! and [`Session`] traits so the handle's guarantees can be verified without
//! a network.
//!
//! # Module Structure
//! - `config`: operation-scoped session configuration
//! - `read_only`: statement check for the read-only path
//! - `redshift`: sqlx driver over the Postgres wire protocol
//!
//! # Guarantees
//! - One statement in flight per handle (enforced by `&mut self`)
//! - `close` releases the session exactly once and is idempotent
//! - A statement failure leaves the handle usable; a lost connection does not
//! - Statement text is logged by leading keyword only

mod config;
mod read_only;
#[cfg(feature = "redshift")]
mod redshift;


pub use config::{ConnectionConfig, DEFAULT_PORT, SslMode};
pub use read_only::{READ_ONLY_KEYWORDS, check_read_only, leading_keyword};
#[cfg(feature = "redshift")]
pub use redshift::RedshiftConnector;

use crate::secrets::{Credentials, SecretKey, SecretLookup};
use crate::{Result, error::RedloadError};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt;
use tracing::{debug, info, warn};

/// One result row, values in column order.
pub type Row = Vec<serde_json::Value>;

/// Column names plus a lazy, single-pass sequence of rows.
///
/// The stream borrows the session it was produced from; the handle cannot
/// run another statement until the stream is dropped.
pub struct RowStream<'a> {
    columns: Vec<String>,
    rows: BoxStream<'a, Result<Row>>,
}

impl fmt::Debug for RowStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl<'a> RowStream<'a> {
    /// Creates a row stream from column names and a row source.
    pub fn new(columns: Vec<String>, rows: BoxStream<'a, Result<Row>>) -> Self {
        Self { columns, rows }
    }

    /// Column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Next row, or `None` once the result is exhausted.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        self.rows.next().await.transpose()
    }

    /// Drains the remaining rows.
    pub async fn collect_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Receives the result of a read-only query: column names once, then each
/// row in order.
pub trait RowConsumer {
    /// Called once before any row.
    fn columns(&mut self, columns: &[String]) -> Result<()>;

    /// Called for each row. An error stops consumption.
    fn row(&mut self, row: Row) -> Result<()>;
}

/// A consumer that keeps everything it is given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedRows {
    /// Column names
    pub columns: Vec<String>,
    /// Rows in result order
    pub rows: Vec<Row>,
}

impl RowConsumer for CollectedRows {
    fn columns(&mut self, columns: &[String]) -> Result<()> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn row(&mut self, row: Row) -> Result<()> {
        self.rows.push(row);
        Ok(())
    }
}

/// Where to connect and as whom, resolved from secrets for one open.
///
/// `Display` and `Debug` never include the password.
#[derive(Clone)]
pub struct ConnectTarget {
    host: String,
    port: u16,
    database: String,
    credentials: Credentials,
}

impl ConnectTarget {
    /// Resolves host, user, password and database from `secrets`.
    ///
    /// # Errors
    /// Returns a configuration error naming the first absent secret.
    pub fn from_secrets(secrets: &dyn SecretLookup, config: &ConnectionConfig) -> Result<Self> {
        let host = secrets.require(SecretKey::Host)?;
        let user = secrets.require(SecretKey::User)?;
        let database = secrets.require(SecretKey::Database)?;
        let password = secrets.secret(SecretKey::Password);

        Ok(Self {
            host: host.to_string(),
            port: config.port,
            database: database.to_string(),
            credentials: Credentials::new(user.to_string(), password.map(|p| p.to_string())),
        })
    }

    /// Host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Login credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}:{}/{}",
            self.credentials.username(),
            self.host,
            self.port,
            self.database
        )
    }
}

impl fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Opens driver sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a session and applies `config`'s session settings.
    ///
    /// # Errors
    /// Returns a connection error when the session cannot be established.
    async fn connect(
        &self,
        target: &ConnectTarget,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Session>>;
}

/// One live driver session.
#[async_trait]
pub trait Session: Send {
    /// Runs a statement and returns the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Runs a query and returns its columns and a lazy row stream.
    async fn query<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>>;

    /// Releases the session.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A scoped session to one warehouse database.
///
/// Created by [`ConnectionHandle::open`], released by
/// [`ConnectionHandle::close`]. Prefer [`with_connection`], which closes on
/// every exit path. A handle dropped without `close` still releases its
/// session through the driver's own drop.
pub struct ConnectionHandle {
    session: Option<Box<dyn Session>>,
    broken: bool,
    target: String,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("target", &self.target)
            .field("open", &self.session.is_some())
            .field("broken", &self.broken)
            .finish()
    }
}

impl ConnectionHandle {
    /// Opens a session using secrets resolved for this call only.
    ///
    /// # Errors
    /// - Configuration error for an invalid `config` or an absent secret,
    ///   raised before the connector is called
    /// - Connection error when the session cannot be established within
    ///   `config.connect_timeout`
    pub async fn open(
        connector: &dyn Connector,
        secrets: &dyn SecretLookup,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let target = ConnectTarget::from_secrets(secrets, config)?;
        let target_display = target.to_string();

        let connecting = connector.connect(&target, config);
        let session = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| {
                RedloadError::connection(format!(
                    "timed out after {}s connecting to {}",
                    config.connect_timeout.as_secs(),
                    target_display
                ))
            })??;

        info!(warehouse = %target_display, "Opened warehouse session");
        Ok(Self {
            session: Some(session),
            broken: false,
            target: target_display,
        })
    }

    /// Credential-free description of the session target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// True once `close` has run.
    pub fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// True once the driver has reported the connection lost.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn usable_session<'s>(
        session: &'s mut Option<Box<dyn Session>>,
        broken: bool,
        target: &str,
    ) -> Result<&'s mut Box<dyn Session>> {
        if broken {
            return Err(RedloadError::connection(format!(
                "session to {} was lost",
                target
            )));
        }
        session
            .as_mut()
            .ok_or_else(|| RedloadError::connection(format!("session to {} is closed", target)))
    }

    /// Executes a mutating statement and returns the affected row count.
    ///
    /// # Errors
    /// - Database error carrying the SQLSTATE; the handle stays usable
    /// - Connection error when the session is closed or lost
    pub async fn execute_update(&mut self, sql: &str) -> Result<u64> {
        let keyword = leading_keyword(sql).unwrap_or_default();
        let session = Self::usable_session(&mut self.session, self.broken, &self.target)?;

        debug!(statement = %keyword, "Executing statement");
        let result = session.execute(sql).await;
        match &result {
            Ok(rows) => debug!(statement = %keyword, rows, "Statement completed"),
            Err(e) => {
                if e.is_connection_failure() {
                    warn!(warehouse = %self.target, "Warehouse session lost");
                    self.broken = true;
                }
                debug!(statement = %keyword, error = %e, "Statement failed");
            }
        }
        result
    }

    /// Runs a read-only query and returns its lazy row stream.
    ///
    /// The statement is checked before the session is touched.
    ///
    /// # Errors
    /// - [`RedloadError::NotReadOnly`] without any driver call
    /// - Database or connection errors as for [`Self::execute_update`]
    pub async fn query_read_only<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>> {
        check_read_only(sql)?;
        let Self {
            session,
            broken,
            target,
        } = self;
        let live = Self::usable_session(session, *broken, target)?;

        debug!(statement = %leading_keyword(sql).unwrap_or_default(), "Executing query");
        match live.query(sql).await {
            Ok(stream) => {
                let RowStream { columns, rows } = stream;
                let rows = rows
                    .inspect(move |item| {
                        if let Err(e) = item
                            && e.is_connection_failure()
                        {
                            *broken = true;
                        }
                    })
                    .boxed();
                Ok(RowStream::new(columns, rows))
            }
            Err(e) => {
                if e.is_connection_failure() {
                    warn!(warehouse = %target, "Warehouse session lost");
                    *broken = true;
                }
                Err(e)
            }
        }
    }

    /// Runs a read-only query and feeds its result to `consumer`.
    ///
    /// # Errors
    /// As for [`Self::query_read_only`], plus any error the consumer returns.
    pub async fn execute_read_only_query(
        &mut self,
        sql: &str,
        consumer: &mut dyn RowConsumer,
    ) -> Result<()> {
        let mut stream = self.query_read_only(sql).await?;
        consumer.columns(stream.columns())?;
        while let Some(row) = stream.next_row().await? {
            consumer.row(row)?;
        }
        Ok(())
    }

    /// Releases the session. Further calls are no-ops.
    ///
    /// # Errors
    /// Returns the driver's error from the first release; the handle is
    /// closed either way.
    pub async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => {
                let result = session.close().await;
                info!(warehouse = %self.target, "Closed warehouse session");
                result
            }
            None => {
                debug!(warehouse = %self.target, "Session already closed");
                Ok(())
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.session.is_some() {
            debug!(warehouse = %self.target, "Handle dropped without close");
        }
    }
}

/// Opens a handle, runs `operation`, and closes the handle on every exit
/// path. The operation's error takes precedence over a close error.
///
/// # Example
/// ```rust,no_run
/// use redload_core::connection::{ConnectionConfig, Connector, with_connection};
/// use redload_core::secrets::SecretLookup;
///
/// # async fn example(connector: &dyn Connector, secrets: &dyn SecretLookup) -> redload_core::Result<()> {
/// let truncated = with_connection(connector, secrets, &ConnectionConfig::default(), async |conn| {
///     conn.execute_update("TRUNCATE dest").await
/// })
/// .await?;
/// assert!(truncated < u64::MAX);
/// # Ok(())
/// # }
/// ```
pub async fn with_connection<T, F>(
    connector: &dyn Connector,
    secrets: &dyn SecretLookup,
    config: &ConnectionConfig,
    operation: F,
) -> Result<T>
where
    F: AsyncFnOnce(&mut ConnectionHandle) -> Result<T>,
{
    let mut handle = ConnectionHandle::open(connector, secrets, config).await?;
    let result = operation(&mut handle).await;
    let closed = handle.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "Close failed after operation error");
            }
            Err(e)
        }
    }
}
