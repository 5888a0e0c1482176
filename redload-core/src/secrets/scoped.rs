//! Prefix-ordered secret lookup.
//!
//! Secret stores usually namespace values (`aws.redshift.password`,
//! `aws.redshift_load.access-key-id`, `aws.secret-access-key`). A
//! `ScopedSecrets` tries each scope in order and returns the first value
//! present, so a load can share a secret key with other AWS operations while
//! overriding the access key for itself.

use super::SecretLookup;
use zeroize::Zeroizing;

/// Resolves names against an ordered list of dotted scopes.
///
/// An empty scope means the bare name.
///
/// ```rust
/// use redload_core::secrets::{MapSecrets, ScopedSecrets, SecretKey, SecretLookup};
///
/// let store = MapSecrets::new()
///     .with_raw("aws.redshift_load.access-key-id", "AKIALOAD")
///     .with_raw("aws.secret-access-key", "shared");
/// let scoped = ScopedSecrets::new(&store, ["aws.redshift_load", "aws.redshift", "aws"]);
///
/// assert_eq!(scoped.secret(SecretKey::AccessKeyId).unwrap().as_str(), "AKIALOAD");
/// assert_eq!(scoped.secret(SecretKey::SecretAccessKey).unwrap().as_str(), "shared");
/// ```
pub struct ScopedSecrets<'a> {
    inner: &'a dyn SecretLookup,
    scopes: Vec<String>,
}

impl<'a> ScopedSecrets<'a> {
    /// Creates a lookup trying `scopes` in order.
    pub fn new<I, S>(inner: &'a dyn SecretLookup, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

impl SecretLookup for ScopedSecrets<'_> {
    fn get_secret(&self, name: &str) -> Option<Zeroizing<String>> {
        self.scopes.iter().find_map(|scope| {
            if scope.is_empty() {
                self.inner.get_secret(name)
            } else {
                self.inner.get_secret(&format!("{}.{}", scope, name))
            }
        })
    }
}
