//! Warehouse driver over the Postgres wire protocol.
//!
//! # Session settings
//! Applied once after every connect:
//! - `statement_timeout` when configured
//! - `search_path` when configured
//!
//! Statements run over the simple query protocol so that multi-clause
//! commands such as `COPY` are passed through untouched. Query results
//! arrive in text format and are converted by column type.

use super::{ConnectTarget, ConnectionConfig, Connector, Row, RowStream, Session, SslMode};
use crate::error::{DatabaseError, RedloadError};
use crate::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row as _, Statement, TypeInfo};
use tracing::debug;

/// Opens one dedicated (unpooled) connection per handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedshiftConnector;

impl RedshiftConnector {
    /// Creates the connector.
    pub fn new() -> Self {
        Self
    }

    fn connect_options(target: &ConnectTarget, config: &ConnectionConfig) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(target.host())
            .port(target.port())
            .username(target.credentials().username())
            .database(target.database())
            .ssl_mode(match config.ssl_mode {
                SslMode::Disable => PgSslMode::Disable,
                SslMode::Prefer => PgSslMode::Prefer,
                SslMode::Require => PgSslMode::Require,
            })
            // Statement and slow-statement logs carry COPY credentials
            .disable_statement_logging();
        if let Some(password) = target.credentials().password() {
            options = options.password(password);
        }
        if let Some(name) = &config.application_name {
            options = options.application_name(name);
        }
        options
    }
}

#[async_trait]
impl Connector for RedshiftConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn Session>> {
        let options = Self::connect_options(target, config);
        let mut conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| {
                RedloadError::connection_failed(format!("failed to connect to {}", target), e)
            })?;

        if let Some(timeout) = config.statement_timeout {
            conn.execute(format!("SET statement_timeout = {}", timeout.as_millis()).as_str())
                .await
                .map_err(map_sqlx_error)?;
        }
        if let Some(schema) = &config.search_path {
            // Validated as an identifier by ConnectionConfig::validate
            conn.execute(format!("SET search_path TO {}", schema).as_str())
                .await
                .map_err(map_sqlx_error)?;
        }

        debug!(warehouse = %target, "Session settings applied");
        Ok(Box::new(RedshiftSession { conn }))
    }
}

struct RedshiftSession {
    conn: PgConnection,
}

#[async_trait]
impl Session for RedshiftSession {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = (&mut self.conn)
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn query<'a>(&'a mut self, sql: &'a str) -> Result<RowStream<'a>> {
        let statement = (&mut self.conn).prepare(sql).await.map_err(map_sqlx_error)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let kinds: Vec<ValueKind> = statement
            .columns()
            .iter()
            .map(|c| ValueKind::from_type_name(c.type_info().name()))
            .collect();

        let rows = sqlx::raw_sql(sql)
            .fetch(&mut self.conn)
            .map(move |item| item.map_err(map_sqlx_error).and_then(|row| decode_row(&row, &kinds)))
            .boxed();
        Ok(RowStream::new(columns, rows))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| RedloadError::connection_failed("failed to close session", e))
    }
}

/// JSON shape a text-format column value is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Integer,
    Float,
    Bool,
    Text,
}

impl ValueKind {
    fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "BIGINT" => Self::Integer,
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" => Self::Float,
            "BOOL" | "BOOLEAN" => Self::Bool,
            _ => Self::Text,
        }
    }

    fn parse(self, text: &str) -> Value {
        match self {
            Self::Integer => text
                .parse::<i64>()
                .map_or_else(|_| Value::String(text.to_string()), Value::from),
            Self::Float => text
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or_else(|| Value::String(text.to_string()), Value::Number),
            Self::Bool => match text {
                "t" | "true" => Value::Bool(true),
                "f" | "false" => Value::Bool(false),
                other => Value::String(other.to_string()),
            },
            Self::Text => Value::String(text.to_string()),
        }
    }
}

fn decode_row(row: &PgRow, kinds: &[ValueKind]) -> Result<Row> {
    (0..row.len())
        .map(|i| {
            let text: Option<String> = row.try_get_unchecked(i).map_err(map_sqlx_error)?;
            let kind = kinds.get(i).copied().unwrap_or(ValueKind::Text);
            Ok(text.map_or(Value::Null, |t| kind.parse(&t)))
        })
        .collect()
}

/// Maps driver errors onto the crate taxonomy.
///
/// Server-reported failures keep their SQLSTATE. Transport failures become
/// connection errors so the handle marks itself lost.
fn map_sqlx_error(err: sqlx::Error) -> RedloadError {
    match err {
        sqlx::Error::Database(db) => DatabaseError::new(
            db.code().map(|code| code.to_string()),
            db.message().to_string(),
        )
        .into(),
        e @ (sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed) => {
            RedloadError::connection_failed("warehouse session failed", e)
        }
        other => DatabaseError::new(None, other.to_string()).into(),
    }
}
