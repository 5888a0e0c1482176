//! Warehouse connection and bulk-load core.
//!
//! This crate opens scoped, credential-driven sessions to a columnar
//! warehouse, runs idempotent administration on them, and renders and
//! executes bulk loads (COPY) from object storage or a NoSQL table.
//!
//! # Security Guarantees
//! - Secrets are resolved per operation and held in zeroizing containers
//! - Credentials never appear in errors, `Debug` output or logs
//! - Bulk-load statements are logged only in redacted form
//! - The read-only query path rejects mutating statements before the network
//!
//! # Architecture
//! - A driver seam ([`connection::Connector`]) under a scoped
//!   [`connection::ConnectionHandle`]
//! - Typed error taxonomy with SQLSTATE-derived predicates
//! - No automatic retry of SQL; object-storage calls retry on transient
//!   failures only

pub mod admin;
pub mod aws;
pub mod connection;
pub mod error;
pub mod load;
pub mod logging;
pub mod secrets;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use admin::{AdminOps, unique_database_name};
pub use aws::{Classification, RemoteError, RetryPolicy, ServiceClientSettings, classify};
pub use connection::{
    CollectedRows, ConnectionConfig, ConnectionHandle, Connector, Row, RowConsumer, RowStream,
    with_connection,
};
#[cfg(feature = "redshift")]
pub use connection::RedshiftConnector;
pub use error::{DatabaseError, RedloadError, Result};
pub use load::{
    BulkLoader, CopyStatement, CopyStatementBuilder, DataFormat, LoadError, LoadResult, LoadSpec,
    LoadStage, SourceKind,
};
pub use secrets::{MapSecrets, ScopedSecrets, SecretKey, SecretLookup};
