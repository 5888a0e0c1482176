//! Secure credential containers with automatic memory zeroing.
//!
//! # Security
//! - Values are stored in `Zeroizing<T>` containers
//! - Memory is cleared when the credentials go out of scope
//! - `Debug` output never includes passwords or secret keys

use super::{SecretKey, SecretLookup};
use crate::Result;
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

/// Warehouse login credentials.
///
/// ```rust
/// use redload_core::secrets::Credentials;
///
/// let creds = Credentials::new("admin".to_string(), Some("secret".to_string()));
/// assert_eq!(creds.username(), "admin");
/// assert!(creds.has_password());
/// assert!(!format!("{:?}", creds).contains("secret"));
/// ```
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Credentials {
    username: Zeroizing<String>,
    password: Zeroizing<Option<String>>,
}

impl Credentials {
    /// Creates new credentials with automatic memory zeroing.
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username: Zeroizing::new(username),
            password: Zeroizing::new(password),
        }
    }

    /// Gets the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Gets the password, if any. Callers must not log it.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Checks if password is present without exposing it.
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_str())
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

/// AWS access credentials, optionally short-lived (with a session token).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct AwsCredentials {
    access_key_id: Zeroizing<String>,
    secret_access_key: Zeroizing<String>,
    session_token: Zeroizing<Option<String>>,
}

impl AwsCredentials {
    /// Creates credentials from explicit values.
    pub fn new(
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: Zeroizing::new(access_key_id),
            secret_access_key: Zeroizing::new(secret_access_key),
            session_token: Zeroizing::new(session_token),
        }
    }

    /// Resolves access key, secret key and optional session token.
    ///
    /// # Errors
    /// Returns a configuration error when the access key or secret key is
    /// absent.
    pub fn from_secrets(secrets: &dyn SecretLookup) -> Result<Self> {
        let access_key_id = secrets.require(SecretKey::AccessKeyId)?;
        let secret_access_key = secrets.require(SecretKey::SecretAccessKey)?;
        let session_token = secrets.secret(SecretKey::SessionToken);
        Ok(Self::new(
            access_key_id.to_string(),
            secret_access_key.to_string(),
            session_token.map(|t| t.to_string()),
        ))
    }

    /// Access key id.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Secret access key. Callers must not log it.
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// Session token for temporary credentials.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &"****")
            .field("secret_access_key", &"****")
            .field("session_token", &self.session_token.as_ref().map(|_| "****"))
            .finish()
    }
}
