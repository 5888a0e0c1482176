//! Object-storage URIs.

use crate::{Result, error::RedloadError};
use std::fmt;

/// A parsed `s3://bucket/key` location. The key may be empty (whole bucket)
/// or a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    /// Bucket name
    pub bucket: String,
    /// Object key or key prefix, without a leading slash
    pub key: String,
}

impl S3Location {
    /// Parses an `s3://` URI.
    ///
    /// ```rust
    /// use redload_core::aws::S3Location;
    ///
    /// let loc = S3Location::parse("s3://fixtures/csv/part-").unwrap();
    /// assert_eq!(loc.bucket, "fixtures");
    /// assert_eq!(loc.key, "csv/part-");
    /// assert_eq!(loc.child("a.csv").to_string(), "s3://fixtures/csv/part-a.csv");
    /// ```
    ///
    /// # Errors
    /// Returns a configuration error for another scheme or an empty bucket.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri.strip_prefix("s3://").ok_or_else(|| {
            RedloadError::configuration(format!(
                "object-storage location must start with s3://, got '{}'",
                uri
            ))
        })?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(RedloadError::configuration(format!(
                "object-storage location '{}' has no bucket",
                uri
            )));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Location of `suffix` appended to this key.
    pub fn child(&self, suffix: &str) -> Self {
        Self {
            bucket: self.bucket.clone(),
            key: format!("{}{}", self.key, suffix),
        }
    }
}

impl fmt::Display for S3Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
