//! S3 staging of load inputs.
//!
//! Every call goes through [`retry_remote`], so throttling and 5xx responses
//! are retried while access errors surface immediately. Nothing here touches
//! the warehouse.

use super::{RemoteError, RetryPolicy, S3Location, retry_remote};
use crate::Result;
use crate::load::Manifest;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

/// Uploads and removes the objects a load reads from.
#[derive(Debug, Clone)]
pub struct ObjectStaging {
    client: Client,
    retry: RetryPolicy,
}

impl ObjectStaging {
    /// Creates a staging helper over an existing client.
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Uploads `body` to `location`.
    ///
    /// # Errors
    /// Returns the last [`RemoteError`] once retries are exhausted or on a
    /// permanent failure.
    pub async fn put_object(&self, location: &S3Location, body: Vec<u8>) -> Result<()> {
        let size = body.len();
        retry_remote(&self.retry, "put_object", || {
            let request = self
                .client
                .put_object()
                .bucket(&location.bucket)
                .key(&location.key)
                .body(ByteStream::from(body.clone()));
            async move {
                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| RemoteError::from_sdk_error(&e))
            }
        })
        .await?;
        debug!(location = %location, bytes = size, "Staged object");
        Ok(())
    }

    /// Serializes `manifest` and uploads it to `location`.
    pub async fn put_manifest(&self, location: &S3Location, manifest: &Manifest) -> Result<()> {
        let body = manifest.to_json()?;
        self.put_object(location, body.into_bytes()).await
    }

    /// Deletes every object under `prefix` and returns how many were removed.
    pub async fn delete_prefix(&self, prefix: &S3Location) -> Result<usize> {
        let mut deleted = 0usize;
        let mut continuation: Option<String> = None;

        loop {
            let token = continuation.clone();
            let page = retry_remote(&self.retry, "list_objects_v2", || {
                let request = self
                    .client
                    .list_objects_v2()
                    .bucket(&prefix.bucket)
                    .prefix(&prefix.key)
                    .set_continuation_token(token.clone());
                async move {
                    request
                        .send()
                        .await
                        .map_err(|e| RemoteError::from_sdk_error(&e))
                }
            })
            .await?;

            for key in page.contents().iter().filter_map(|o| o.key()) {
                retry_remote(&self.retry, "delete_object", || {
                    let request = self
                        .client
                        .delete_object()
                        .bucket(&prefix.bucket)
                        .key(key);
                    async move {
                        request
                            .send()
                            .await
                            .map(|_| ())
                            .map_err(|e| RemoteError::from_sdk_error(&e))
                    }
                })
                .await?;
                deleted += 1;
            }

            match page.next_continuation_token() {
                Some(next) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(next.to_string());
                }
                _ => break,
            }
        }

        info!(prefix = %prefix, deleted, "Cleared staged objects");
        Ok(deleted)
    }
}
