//! Proxy settings resolved from an explicit environment map.

use crate::{Result, error::RedloadError, error::redact_url};
use std::collections::HashMap;
use std::fmt;
use zeroize::Zeroizing;

/// An outbound HTTP(S) proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy host
    pub host: String,
    /// Proxy port
    pub port: u16,
    /// Optional proxy user
    pub user: Option<String>,
    password: Option<Zeroizing<String>>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

impl ProxyConfig {
    /// Proxy password. Callers must not log it.
    pub fn password(&self) -> Option<&str> {
        self.password.as_ref().map(|p| p.as_str())
    }

    /// Parses `scheme://[user[:password]@]host[:port]`.
    ///
    /// # Errors
    /// Returns a configuration error (with the password redacted) when the
    /// value is not a URL with a host.
    pub fn parse(value: &str) -> Result<Self> {
        let with_scheme = if value.contains("://") {
            value.to_string()
        } else {
            format!("http://{}", value)
        };
        let url = url::Url::parse(&with_scheme).map_err(|e| {
            RedloadError::configuration(format!(
                "Invalid proxy URL {}: {}",
                redact_url(&with_scheme),
                e
            ))
        })?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                RedloadError::configuration(format!(
                    "Proxy URL {} has no host",
                    redact_url(&with_scheme)
                ))
            })?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        let user = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        let password = url.password().map(|p| Zeroizing::new(p.to_string()));

        Ok(Self {
            host,
            port,
            user,
            password,
        })
    }

    /// Proxy URI without credentials, `http://host:port`.
    pub fn uri(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Converts to the SDK HTTP client's proxy setting, routing all traffic
    /// and carrying user and password as basic proxy auth.
    #[cfg(feature = "s3")]
    pub(crate) fn to_smithy(&self) -> Result<aws_smithy_http_client::proxy::ProxyConfig> {
        let config = aws_smithy_http_client::proxy::ProxyConfig::all(self.uri().as_str())
            .map_err(|e| {
                RedloadError::configuration(format!("Invalid proxy {}: {}", self.uri(), e))
            })?;
        Ok(match &self.user {
            Some(user) => {
                config.with_basic_auth(user.as_str(), self.password().unwrap_or_default())
            }
            None => config,
        })
    }

    /// Reads the proxy for `scheme` (`http` or `https`) from `env`.
    ///
    /// Checks `HTTPS_PROXY` then `https_proxy` for `https`, and the `HTTP_`
    /// pair otherwise. Empty values count as unset.
    pub fn from_env(scheme: &str, env: &HashMap<String, String>) -> Result<Option<Self>> {
        let (upper, lower) = if scheme.eq_ignore_ascii_case("https") {
            ("HTTPS_PROXY", "https_proxy")
        } else {
            ("HTTP_PROXY", "http_proxy")
        };
        env.get(upper)
            .or_else(|| env.get(lower))
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::parse(v.trim()))
            .transpose()
    }
}
