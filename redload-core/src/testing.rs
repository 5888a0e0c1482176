//! In-memory connector for unit tests.
//!
//! Every driver call increments a shared counter, so tests can assert that a
//! code path never reached the network.

use crate::connection::{ConnectTarget, ConnectionConfig, Connector, Row, RowStream, Session};
use crate::error::{DatabaseError, RedloadError};
use crate::secrets::{MapSecrets, SecretKey};
use crate::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type ExecuteFn = dyn Fn(&str) -> Result<u64> + Send + Sync;

/// Shared call counters.
#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    pub connects: AtomicUsize,
    pub executes: AtomicUsize,
    pub queries: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CallCounts {
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Any call that would have touched the network.
    pub(crate) fn network_calls(&self) -> usize {
        self.connects() + self.executes() + self.queries() + self.closes()
    }
}

/// Scripted connector.
#[derive(Clone)]
pub(crate) struct StubConnector {
    pub calls: Arc<CallCounts>,
    pub statements: Arc<Mutex<Vec<String>>>,
    on_execute: Arc<ExecuteFn>,
    columns: Vec<String>,
    rows: Vec<Row>,
    lost_after: Option<usize>,
    fail_connect: bool,
}

impl StubConnector {
    /// Every statement succeeds with zero rows affected.
    pub(crate) fn new() -> Self {
        Self {
            calls: Arc::new(CallCounts::default()),
            statements: Arc::new(Mutex::new(Vec::new())),
            on_execute: Arc::new(|_: &str| -> Result<u64> { Ok(0) }),
            columns: Vec::new(),
            rows: Vec::new(),
            lost_after: None,
            fail_connect: false,
        }
    }

    /// Responds to each executed statement with `f`.
    pub(crate) fn on_execute(
        mut self,
        f: impl Fn(&str) -> Result<u64> + Send + Sync + 'static,
    ) -> Self {
        self.on_execute = Arc::new(f);
        self
    }

    /// Result returned by every query.
    pub(crate) fn with_rows(mut self, columns: &[&str], rows: Vec<Row>) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.rows = rows;
        self
    }

    /// Makes every query stream report a lost connection after `n` rows.
    pub(crate) fn losing_connection_after(mut self, n: usize) -> Self {
        self.lost_after = Some(n);
        self
    }

    /// Makes every connect fail.
    pub(crate) fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.statements.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(
        &self,
        target: &ConnectTarget,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn Session>> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(RedloadError::connection(format!(
                "failed to connect to {}",
                target
            )));
        }
        Ok(Box::new(StubSession {
            connector: self.clone(),
        }))
    }
}

struct StubSession {
    connector: StubConnector,
}

#[async_trait]
impl Session for StubSession {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.connector.calls.executes.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut statements) = self.connector.statements.lock() {
            statements.push(sql.to_string());
        }
        (self.connector.on_execute)(sql)
    }

    async fn query<'a>(&'a mut self, _sql: &'a str) -> Result<RowStream<'a>> {
        self.connector.calls.queries.fetch_add(1, Ordering::SeqCst);
        let stub = &self.connector;
        let mut rows: Vec<Result<Row>> = stub.rows.iter().cloned().map(Ok).collect();
        if let Some(n) = stub.lost_after {
            rows.truncate(n);
            rows.push(Err(RedloadError::connection("connection reset by peer")));
        }
        Ok(RowStream::new(
            stub.columns.clone(),
            futures::stream::iter(rows).boxed(),
        ))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.connector.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Secrets accepted by the stub connector.
pub(crate) fn warehouse_secrets() -> MapSecrets {
    MapSecrets::new()
        .with(SecretKey::Host, "warehouse.test")
        .with(SecretKey::User, "admin")
        .with(SecretKey::Password, "hunter2")
        .with(SecretKey::Database, "dev")
}

/// A server-side statement failure.
pub(crate) fn sql_error(state: &str, message: &str) -> RedloadError {
    DatabaseError::new(Some(state.to_string()), message).into()
}
