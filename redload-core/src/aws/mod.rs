//! AWS collaborators around the bulk-load core.
//!
//! # Module Structure
//! - `classify`: transient/permanent classification of remote failures
//! - `client`: endpoint, region and proxy selection for service clients
//! - `location`: `s3://bucket/key` URIs
//! - `proxy`: proxy settings from the environment
//! - `retry`: capped exponential backoff for object-storage calls
//! - `staging`: S3 uploads that produce a load's source data

mod classify;
mod client;
mod location;
mod proxy;
mod retry;
#[cfg(feature = "s3")]
mod staging;

pub use classify::{Classification, RemoteError, classify};
pub use client::{DEFAULT_SIGNING_REGION, KNOWN_REGIONS, ServiceClientSettings};
pub use location::S3Location;
pub use proxy::ProxyConfig;
pub use retry::{RetryPolicy, retry_remote};
#[cfg(feature = "s3")]
pub use staging::ObjectStaging;
