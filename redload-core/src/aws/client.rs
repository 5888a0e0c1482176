//! Service-client configuration applied before a client's first call.
//!
//! Settings are resolved once into a [`ServiceClientSettings`] value and then
//! turned into an SDK client. Endpoint takes precedence over region; an
//! unknown region fails before any network attempt.

use super::ProxyConfig;
use crate::{Result, error::RedloadError};
use std::collections::HashMap;

/// AWS region names accepted by [`ServiceClientSettings::configure_endpoint`].
pub const KNOWN_REGIONS: &[&str] = &[
    "af-south-1",
    "ap-east-1",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-southeast-5",
    "ap-southeast-7",
    "ca-central-1",
    "ca-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "eu-central-1",
    "eu-central-2",
    "eu-north-1",
    "eu-south-1",
    "eu-south-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "il-central-1",
    "me-central-1",
    "me-south-1",
    "mx-central-1",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-gov-east-1",
    "us-gov-west-1",
    "us-west-1",
    "us-west-2",
];

/// Region used for request signing when only an endpoint is configured.
pub const DEFAULT_SIGNING_REGION: &str = "us-east-1";

/// Resolved settings for one outbound service client.
#[derive(Debug, Clone, Default)]
pub struct ServiceClientSettings {
    /// Explicit endpoint URL; overrides region routing
    pub endpoint: Option<String>,
    /// Validated region name
    pub region: Option<String>,
    /// Outbound proxy
    pub proxy: Option<ProxyConfig>,
}

impl ServiceClientSettings {
    /// Creates empty settings (SDK defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the proxy from `env`.
    ///
    /// The `http` proxy variables are consulted only when the endpoint is an
    /// explicit `http://` URL; everything else goes over HTTPS.
    pub fn configure_proxy(
        &mut self,
        endpoint: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<()> {
        let scheme = if endpoint.is_some_and(|e| e.starts_with("http://")) {
            "http"
        } else {
            "https"
        };
        if let Some(proxy) = ProxyConfig::from_env(scheme, env)? {
            tracing::debug!(host = %proxy.host, port = proxy.port, scheme, "Using proxy");
            self.proxy = Some(proxy);
        }
        Ok(())
    }

    /// Applies endpoint or region. Endpoint takes precedence; region is only
    /// validated and applied when no endpoint is given.
    ///
    /// # Errors
    /// Returns a configuration error for a region not in [`KNOWN_REGIONS`].
    pub fn configure_endpoint(
        &mut self,
        endpoint: Option<&str>,
        region: Option<&str>,
    ) -> Result<()> {
        if let Some(endpoint) = endpoint {
            let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.to_string()
            } else {
                format!("https://{endpoint}")
            };
            self.endpoint = Some(url);
        } else if let Some(region) = region {
            if !KNOWN_REGIONS.contains(&region) {
                return Err(RedloadError::configuration(format!(
                    "Illegal AWS region: {}",
                    region
                )));
            }
            self.region = Some(region.to_string());
        }
        Ok(())
    }

    /// Region the SDK should route or sign with.
    pub fn effective_region(&self) -> Option<&str> {
        if self.endpoint.is_some() {
            Some(DEFAULT_SIGNING_REGION)
        } else {
            self.region.as_deref()
        }
    }

    /// HTTP client routing through the configured proxy, or `None` when no
    /// proxy is set and the SDK default applies.
    ///
    /// # Errors
    /// Returns a configuration error when the proxy cannot be expressed as a
    /// proxy URI.
    #[cfg(feature = "s3")]
    pub fn http_client(&self) -> Result<Option<aws_sdk_s3::config::SharedHttpClient>> {
        use aws_smithy_http_client::tls::{self, rustls_provider::CryptoMode};
        use aws_smithy_http_client::{Builder, Connector};

        let Some(proxy) = &self.proxy else {
            return Ok(None);
        };
        let proxy_config = proxy.to_smithy()?;
        let client = Builder::new().build_with_connector_fn(move |settings, components| {
            let mut builder = Connector::builder()
                .proxy_config(proxy_config.clone())
                .tls_provider(tls::Provider::Rustls(CryptoMode::AwsLc));
            builder.set_connector_settings(settings.cloned());
            if let Some(components) = components {
                builder.set_sleep_impl(components.sleep_impl());
            }
            builder.build()
        });
        Ok(Some(client))
    }

    /// Builds an S3 client configuration with static credentials, routed
    /// through the proxy when one is configured.
    ///
    /// # Errors
    /// As for [`Self::http_client`].
    #[cfg(feature = "s3")]
    pub fn s3_config(
        &self,
        credentials: &crate::secrets::AwsCredentials,
    ) -> Result<aws_sdk_s3::Config> {
        use aws_sdk_s3::config::{BehaviorVersion, Region};

        let creds = aws_credential_types::Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            credentials.session_token().map(str::to_string),
            None,
            "redload-static",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(creds);

        if let Some(region) = self.effective_region() {
            builder = builder.region(Region::new(region.to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        if let Some(http_client) = self.http_client()? {
            builder = builder.http_client(http_client);
        }
        Ok(builder.build())
    }

    /// Builds an S3 client, using static credentials when given and the
    /// default credential chain otherwise.
    ///
    /// # Errors
    /// As for [`Self::http_client`].
    #[cfg(feature = "s3")]
    pub async fn s3_client(
        &self,
        credentials: Option<&crate::secrets::AwsCredentials>,
    ) -> Result<aws_sdk_s3::Client> {
        if let Some(credentials) = credentials {
            return Ok(aws_sdk_s3::Client::from_conf(self.s3_config(credentials)?));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = self.effective_region() {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(http_client) = self.http_client()? {
            loader = loader.http_client(http_client);
        }
        let sdk_config = loader.load().await;
        Ok(aws_sdk_s3::Client::new(&sdk_config))
    }
}
