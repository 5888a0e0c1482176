//! Bulk loads from object storage or a NoSQL table.
//!
//! # Module Structure
//! - `spec`: declarative load requests and their validation
//! - `documents`: manifest and path-mapping documents
//! - `copy`: COPY statement rendering with a redacted form
//! - `loader`: validate, build, execute and close

mod copy;
mod documents;
mod loader;
mod spec;

pub use copy::{CopyStatement, CopyStatementBuilder};
pub use documents::{JsonPaths, Manifest, ManifestEntry};
pub use loader::{BulkLoader, LoadError, LoadResult, LoadStage};
pub use spec::{
    Compression, CsvOptions, DEFAULT_READ_RATIO, DataFormat, FixedWidthColumn, LoadAuthorization,
    LoadOptions, LoadSpec, NOSQL_SCHEME, SourceKind,
};
