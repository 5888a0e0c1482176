//! Secret lookup and credential containers.
//!
//! Secrets are resolved per operation through a [`SecretLookup`] and moved
//! straight into `Zeroizing` containers. Nothing in this module caches a
//! value across calls.
//!
//! # Module Structure
//! - `credentials`: warehouse and AWS credential containers
//! - `scoped`: prefix-ordered lookup over another lookup

mod credentials;
mod scoped;

pub use credentials::{AwsCredentials, Credentials};
pub use scoped::ScopedSecrets;

use crate::{Result, error::RedloadError};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// The fixed vocabulary of secret names consumed by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    /// Warehouse host name
    Host,
    /// Warehouse user
    User,
    /// Warehouse password
    Password,
    /// Warehouse database
    Database,
    /// AWS access key id
    AccessKeyId,
    /// AWS secret access key
    SecretAccessKey,
    /// AWS session token for short-lived credentials
    SessionToken,
}

impl SecretKey {
    /// Name under which the secret is looked up.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::User => "user",
            Self::Password => "password",
            Self::Database => "database",
            Self::AccessKeyId => "access-key-id",
            Self::SecretAccessKey => "secret-access-key",
            Self::SessionToken => "session-token",
        }
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a named secret to a value, or `None` when absent.
///
/// Implemented for closures `Fn(&str) -> Option<String>`, so a caller can
/// hand over any secret store without an adapter type.
pub trait SecretLookup: Send + Sync {
    /// Looks up a secret by raw name.
    fn get_secret(&self, name: &str) -> Option<Zeroizing<String>>;

    /// Looks up one of the well-known secrets.
    fn secret(&self, key: SecretKey) -> Option<Zeroizing<String>> {
        self.get_secret(key.as_str())
    }

    /// Looks up a secret that must be present.
    ///
    /// # Errors
    /// Returns a configuration error naming the key (never a value) when
    /// the secret is absent.
    fn require(&self, key: SecretKey) -> Result<Zeroizing<String>> {
        self.secret(key).ok_or_else(|| {
            RedloadError::configuration(format!("missing required secret '{}'", key))
        })
    }
}

impl<F> SecretLookup for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn get_secret(&self, name: &str) -> Option<Zeroizing<String>> {
        self(name).map(Zeroizing::new)
    }
}

/// In-memory secret lookup.
///
/// # Example
/// ```rust
/// use redload_core::secrets::{MapSecrets, SecretKey, SecretLookup};
///
/// let secrets = MapSecrets::new()
///     .with(SecretKey::Host, "warehouse.local")
///     .with(SecretKey::User, "admin");
/// let host = secrets.secret(SecretKey::Host);
/// assert_eq!(host.as_deref().map(String::as_str), Some("warehouse.local"));
/// assert!(secrets.secret(SecretKey::Password).is_none());
/// ```
#[derive(Clone, Default)]
pub struct MapSecrets {
    values: HashMap<String, Zeroizing<String>>,
}

impl MapSecrets {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method adding a well-known secret.
    pub fn with(self, key: SecretKey, value: impl Into<String>) -> Self {
        self.with_raw(key.as_str(), value)
    }

    /// Builder method adding a secret under an arbitrary name.
    pub fn with_raw(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), Zeroizing::new(value.into()));
        self
    }
}

impl fmt::Debug for MapSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Names only
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("MapSecrets").field("names", &names).finish()
    }
}

impl SecretLookup for MapSecrets {
    fn get_secret(&self, name: &str) -> Option<Zeroizing<String>> {
        self.values.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_secrets_lookup() {
        let secrets = MapSecrets::new()
            .with(SecretKey::Host, "h")
            .with(SecretKey::AccessKeyId, "AKIA");

        assert_eq!(secrets.secret(SecretKey::Host).unwrap().as_str(), "h");
        assert_eq!(secrets.get_secret("access-key-id").unwrap().as_str(), "AKIA");
        assert!(secrets.secret(SecretKey::SessionToken).is_none());
    }

    #[test]
    fn test_require_names_key_not_value() {
        let secrets = MapSecrets::new().with(SecretKey::Password, "hunter2");
        let err = secrets.require(SecretKey::Host).unwrap_err();
        assert!(err.to_string().contains("'host'"));
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_closure_lookup() {
        let lookup = |name: &str| (name == "user").then(|| "admin".to_string());
        assert_eq!(lookup.secret(SecretKey::User).unwrap().as_str(), "admin");
        assert!(lookup.secret(SecretKey::Host).is_none());
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets = MapSecrets::new().with(SecretKey::Password, "hunter2");
        let debug = format!("{:?}", secrets);
        assert!(debug.contains("password"));
        assert!(!debug.contains("hunter2"));
    }
}
