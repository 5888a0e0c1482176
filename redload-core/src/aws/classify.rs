//! Transient/permanent classification of cloud-service failures.

use std::fmt;
use thiserror::Error;

/// Whether retrying a failed remote call can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Back off and retry
    Transient,
    /// Fail fast and surface to the operator
    Permanent,
}

/// Classifies a remote failure from its HTTP status and vendor error code.
///
/// 429 (rate limit) and 408 (timeout) are transient whatever the vendor code
/// says. Any other 4xx is a caller error and permanent. Everything else,
/// including 5xx and status 0 for failures that never produced a response,
/// is transient.
///
/// ```rust
/// use redload_core::aws::{Classification, classify};
///
/// assert_eq!(classify(429, Some("SlowDown")), Classification::Transient);
/// assert_eq!(classify(403, Some("AccessDenied")), Classification::Permanent);
/// assert_eq!(classify(503, None), Classification::Transient);
/// ```
pub fn classify(status_code: u16, _vendor_code: Option<&str>) -> Classification {
    match status_code {
        408 | 429 => Classification::Transient,
        400..=499 => Classification::Permanent,
        _ => Classification::Transient,
    }
}

/// A failed cloud-service call.
///
/// The classification is derived from `status_code` on demand and never
/// stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RemoteError {
    /// HTTP status, or 0 when no response was received
    pub status_code: u16,
    /// Service error code such as `NoSuchBucket` or `SlowDown`
    pub vendor_code: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Remote call failed (status {}", self.status_code)?;
        if let Some(code) = &self.vendor_code {
            write!(f, ", {}", code)?;
        }
        write!(f, "): {}", self.message)
    }
}

impl RemoteError {
    /// Creates a remote error.
    pub fn new(
        status_code: u16,
        vendor_code: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            vendor_code,
            message: message.into(),
        }
    }

    /// Derived classification.
    pub fn classification(&self) -> Classification {
        classify(self.status_code, self.vendor_code.as_deref())
    }

    /// Shorthand for `classification() == Transient`.
    pub fn is_transient(&self) -> bool {
        self.classification() == Classification::Transient
    }

    /// Builds a remote error from an AWS SDK failure.
    ///
    /// - `ServiceError` and `ResponseError` keep the HTTP status and code
    /// - `TimeoutError` and `DispatchFailure` map to status 0 (transient)
    /// - `ConstructionFailure` maps to 400 (permanent): the request could not
    ///   be built, so resending it cannot succeed
    #[cfg(feature = "s3")]
    pub fn from_sdk_error<E>(err: &aws_sdk_s3::error::SdkError<E>) -> Self
    where
        E: aws_sdk_s3::error::ProvideErrorMetadata + std::error::Error + 'static,
    {
        use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};

        let status = err.raw_response().map(|r| r.status().as_u16());
        let code = err.code().map(str::to_string);
        match err {
            SdkError::ConstructionFailure(_) => {
                Self::new(400, code, format!("request construction failed: {}", err))
            }
            SdkError::TimeoutError(_) => Self::new(0, code, "request timed out"),
            SdkError::DispatchFailure(_) => {
                Self::new(0, code, format!("request dispatch failed: {}", err))
            }
            _ => {
                let message = err
                    .message()
                    .map_or_else(|| err.to_string(), str::to_string);
                Self::new(status.unwrap_or(0), code, message)
            }
        }
    }
}
