//! Bulk-load orchestration.
//!
//! validate → build → open → execute → close. The handle is closed on every
//! path once opened. The load statement itself is never retried: re-running
//! a load is only safe after the caller has cleared the destination.

use super::copy::CopyStatementBuilder;
use super::spec::LoadSpec;
use crate::connection::{ConnectionConfig, Connector, with_connection};
use crate::error::RedloadError;
use crate::secrets::SecretLookup;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Stage at which a load failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    /// Spec or secret validation, before any network call
    Validate,
    /// Session establishment
    Connect,
    /// Statement execution
    Execute,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::Connect => "connect",
            Self::Execute => "execute",
        })
    }
}

/// A failed load and the stage it failed at.
#[derive(Debug, Error)]
#[error("Load into {table} failed at {stage}: {source}")]
pub struct LoadError {
    /// Failing stage
    pub stage: LoadStage,
    /// Destination table
    pub table: String,
    /// Underlying failure
    #[source]
    pub source: RedloadError,
}

impl LoadError {
    fn new(stage: LoadStage, table: &str, source: RedloadError) -> Self {
        Self {
            stage,
            table: table.to_string(),
            source,
        }
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    /// Destination table
    pub table: String,
    /// Rows reported by the warehouse
    pub rows_loaded: u64,
    /// Wall time from open to close
    pub elapsed: Duration,
}

/// Runs loads through a connector with a fixed session configuration.
pub struct BulkLoader<'c> {
    connector: &'c dyn Connector,
    config: ConnectionConfig,
}

impl fmt::Debug for BulkLoader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'c> BulkLoader<'c> {
    /// Creates a loader.
    pub fn new(connector: &'c dyn Connector, config: ConnectionConfig) -> Self {
        Self { connector, config }
    }

    /// Loads `spec` into its destination table.
    ///
    /// Warehouse secrets (host, user, password, database) and, for
    /// secret-based authorization, AWS secrets are all read from `secrets`.
    ///
    /// # Errors
    /// Returns a [`LoadError`] carrying the failing [`LoadStage`].
    pub async fn load(
        &self,
        spec: &LoadSpec,
        secrets: &dyn SecretLookup,
    ) -> Result<LoadResult, LoadError> {
        let table = spec.destination_table.as_str();

        let statement = CopyStatementBuilder::new(spec)
            .build(secrets)
            .map_err(|e| LoadError::new(LoadStage::Validate, table, e))?;
        debug!(statement = %statement.redacted(), "Built load statement");

        let started = Instant::now();
        let mut opened = false;
        let mut loaded = None;
        let outcome = with_connection(self.connector, secrets, &self.config, async |conn| {
            opened = true;
            let rows = conn.execute_update(statement.text()).await?;
            loaded = Some(rows);
            Ok(rows)
        })
        .await;

        let rows_loaded = match (outcome, loaded) {
            (Ok(rows), _) => rows,
            // The statement committed; only the close failed
            (Err(e), Some(rows)) => {
                warn!(table, error = %e, "Failed to close session after load");
                rows
            }
            (Err(e), None) if opened => {
                warn!(table, statement = %statement.redacted(), error = %e, "Load failed");
                return Err(LoadError::new(LoadStage::Execute, table, e));
            }
            (Err(e), None) => {
                // Absent warehouse secrets are detected before connecting
                let stage = if matches!(e, RedloadError::Configuration { .. }) {
                    LoadStage::Validate
                } else {
                    LoadStage::Connect
                };
                return Err(LoadError::new(stage, table, e));
            }
        };

        let elapsed = started.elapsed();
        info!(
            table,
            rows_loaded,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Load completed"
        );
        Ok(LoadResult {
            table: table.to_string(),
            rows_loaded,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::{DataFormat, SourceKind};
    use crate::secrets::{MapSecrets, SecretKey};
    use crate::testing::{StubConnector, sql_error, warehouse_secrets};

    fn secrets() -> MapSecrets {
        warehouse_secrets()
            .with(SecretKey::AccessKeyId, "AKIAEXAMPLE")
            .with(SecretKey::SecretAccessKey, "wJalrXUtnFEMI")
    }

    fn csv_spec() -> LoadSpec {
        LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://fixtures/csv/", "dest")
            .with_format(DataFormat::Csv)
    }

    #[tokio::test]
    async fn test_load_executes_copy_and_closes() {
        let connector = StubConnector::new().on_execute(|_| Ok(3));
        let loader = BulkLoader::new(&connector, ConnectionConfig::default());

        let result = loader.load(&csv_spec(), &secrets()).await.unwrap();

        assert_eq!(result.rows_loaded, 3);
        assert_eq!(result.table, "dest");
        assert_eq!(connector.calls.connects(), 1);
        assert_eq!(connector.calls.closes(), 1);
        let executed = connector.executed();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].starts_with("COPY dest FROM 's3://fixtures/csv/'"));
    }

    #[tokio::test]
    async fn test_invalid_pairings_fail_without_network() {
        let invalid = [
            LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
                .with_format(DataFormat::Csv),
            LoadSpec::new(SourceKind::NoSqlTable, "dynamodb://Orders", "dest")
                .with_format(DataFormat::Avro),
            LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/", "dest"),
            LoadSpec::new(SourceKind::ObjectStorageManifest, "s3://b/m.json", "dest")
                .with_format(DataFormat::JsonWithPathFile),
            LoadSpec::new(SourceKind::ObjectStoragePrefix, "s3://b/", "dest")
                .with_format(DataFormat::FixedWidth),
        ];

        for spec in &invalid {
            let connector = StubConnector::new();
            let loader = BulkLoader::new(&connector, ConnectionConfig::default());

            let err = loader.load(spec, &secrets()).await.unwrap_err();

            assert_eq!(err.stage, LoadStage::Validate, "{:?}", spec);
            assert!(matches!(err.source, RedloadError::Configuration { .. }));
            assert_eq!(connector.calls.network_calls(), 0, "{:?}", spec);
        }
    }

    #[tokio::test]
    async fn test_missing_warehouse_secret_is_validate_stage() {
        let connector = StubConnector::new();
        let loader = BulkLoader::new(&connector, ConnectionConfig::default());
        let secrets = MapSecrets::new()
            .with(SecretKey::AccessKeyId, "AKIAEXAMPLE")
            .with(SecretKey::SecretAccessKey, "wJalrXUtnFEMI");

        let err = loader.load(&csv_spec(), &secrets).await.unwrap_err();
        assert_eq!(err.stage, LoadStage::Validate);
        assert_eq!(connector.calls.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_is_connect_stage() {
        let connector = StubConnector::new().failing_connect();
        let loader = BulkLoader::new(&connector, ConnectionConfig::default());

        let err = loader.load(&csv_spec(), &secrets()).await.unwrap_err();
        assert_eq!(err.stage, LoadStage::Connect);
        assert_eq!(connector.calls.executes(), 0);
    }

    #[tokio::test]
    async fn test_execute_failure_closes_and_is_not_retried() {
        let connector =
            StubConnector::new().on_execute(|_| Err(sql_error("XX000", "S3ServiceException")));
        let loader = BulkLoader::new(&connector, ConnectionConfig::default());

        let err = loader.load(&csv_spec(), &secrets()).await.unwrap_err();

        assert_eq!(err.stage, LoadStage::Execute);
        assert_eq!(connector.calls.executes(), 1);
        assert_eq!(connector.calls.closes(), 1);
        let message = err.to_string();
        assert!(message.contains("dest"));
        assert!(message.contains("execute"));
        assert!(!message.contains("wJalrXUtnFEMI"));
    }
}
