//! Upload backend configuration.
//!
//! Provides [`UploadConfig`], loaded once from environment variables and then
//! passed explicitly to the object store, the token verifier and the server.
//! Nothing reads the environment while a request is being handled.

use std::fmt;

use http::Uri;
use letterpress_sigv4::Credentials;
use letterpress_sigv4::canonical::encode_path;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{ConfigError, UploadError};
use crate::validation::DEFAULT_MAX_UPLOAD_SIZE;

/// Host suffix of every R2 account endpoint.
const R2_ENDPOINT_SUFFIX: &str = "r2.cloudflarestorage.com";

/// Upload backend configuration.
///
/// Secrets (`access_key_id`, `secret_access_key`, `identity_api_key`) are
/// never serialized and are redacted from `Debug` output.
///
/// # Examples
///
/// ```
/// use letterpress_upload::config::UploadConfig;
///
/// let config = UploadConfig::builder()
///     .account_id("abc123".into())
///     .public_url("https://images.example.com/".into())
///     .build();
/// assert_eq!(config.endpoint(), "https://abc123.r2.cloudflarestorage.com");
/// assert_eq!(
///     config.public_url("images/test.png"),
///     "https://images.example.com/images/test.png"
/// );
/// ```
#[derive(Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct UploadConfig {
    /// Bind address for the upload server.
    #[builder(default = String::from("0.0.0.0:8787"))]
    pub gateway_listen: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// R2 account id; the endpoint host is `<account_id>.r2.cloudflarestorage.com`.
    #[builder(default)]
    pub account_id: String,

    /// R2 access key id.
    #[serde(skip)]
    #[builder(default)]
    pub access_key_id: String,

    /// R2 secret access key.
    #[serde(skip)]
    #[builder(default)]
    pub secret_access_key: String,

    /// Bucket that receives uploads.
    #[builder(default = String::from("newsletter-images"))]
    pub bucket_name: String,

    /// Base of the public URLs handed back to clients.
    #[builder(default)]
    pub public_url: String,

    /// Endpoint override, e.g. `http://localhost:4566` for a local emulator.
    #[builder(default)]
    pub endpoint_override: Option<String>,

    /// Largest accepted upload, in bytes.
    #[builder(default = DEFAULT_MAX_UPLOAD_SIZE)]
    pub max_upload_size: usize,

    /// Base URL of the identity provider that validates bearer tokens.
    #[builder(default)]
    pub identity_url: String,

    /// API key sent to the identity provider alongside the bearer token.
    #[serde(skip)]
    #[builder(default)]
    pub identity_api_key: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("gateway_listen", &self.gateway_listen)
            .field("log_level", &self.log_level)
            .field("account_id", &self.account_id)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket_name", &self.bucket_name)
            .field("public_url", &self.public_url)
            .field("endpoint_override", &self.endpoint_override)
            .field("max_upload_size", &self.max_upload_size)
            .field("identity_url", &self.identity_url)
            .field("identity_api_key", &"<redacted>")
            .finish()
    }
}

impl UploadConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `GATEWAY_LISTEN` | `0.0.0.0:8787` |
    /// | `LOG_LEVEL` | `info` |
    /// | `R2_ACCOUNT_ID` | *(empty)* |
    /// | `R2_ACCESS_KEY_ID` | *(empty)* |
    /// | `R2_SECRET_ACCESS_KEY` | *(empty)* |
    /// | `R2_BUCKET_NAME` | `newsletter-images` |
    /// | `R2_PUBLIC_URL` | *(empty)* |
    /// | `R2_ENDPOINT` | *(unset)* |
    /// | `UPLOAD_MAX_SIZE` | `10485760` |
    /// | `SUPABASE_URL` | *(empty)* |
    /// | `SUPABASE_ANON_KEY` | *(empty)* |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("GATEWAY_LISTEN") {
            config.gateway_listen = v;
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Ok(v) = std::env::var("R2_ACCOUNT_ID") {
            config.account_id = v;
        }
        if let Ok(v) = std::env::var("R2_ACCESS_KEY_ID") {
            config.access_key_id = v;
        }
        if let Ok(v) = std::env::var("R2_SECRET_ACCESS_KEY") {
            config.secret_access_key = v;
        }
        if let Ok(v) = std::env::var("R2_BUCKET_NAME") {
            config.bucket_name = v;
        }
        if let Ok(v) = std::env::var("R2_PUBLIC_URL") {
            config.public_url = v;
        }
        if let Ok(v) = std::env::var("R2_ENDPOINT") {
            if !v.is_empty() {
                config.endpoint_override = Some(v);
            }
        }
        if let Ok(v) = std::env::var("UPLOAD_MAX_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                config.max_upload_size = n;
            }
        }
        if let Ok(v) = std::env::var("SUPABASE_URL") {
            config.identity_url = v;
        }
        if let Ok(v) = std::env::var("SUPABASE_ANON_KEY") {
            config.identity_api_key = v;
        }

        config
    }

    /// Check that everything needed to sign and send requests is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first empty required
    /// setting, or [`ConfigError::Invalid`] for an unusable endpoint override.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.endpoint_override {
            Some(endpoint) => {
                let uri: Uri = endpoint.parse().map_err(|e| ConfigError::Invalid {
                    name: "R2_ENDPOINT",
                    reason: format!("{e}"),
                })?;
                if uri.host().is_none() {
                    return Err(ConfigError::Invalid {
                        name: "R2_ENDPOINT",
                        reason: "endpoint must be an absolute URL".to_owned(),
                    });
                }
            }
            None if self.account_id.is_empty() => return Err(ConfigError::Missing("R2_ACCOUNT_ID")),
            None => {}
        }
        if self.access_key_id.is_empty() {
            return Err(ConfigError::Missing("R2_ACCESS_KEY_ID"));
        }
        if self.secret_access_key.is_empty() {
            return Err(ConfigError::Missing("R2_SECRET_ACCESS_KEY"));
        }
        if self.bucket_name.is_empty() {
            return Err(ConfigError::Missing("R2_BUCKET_NAME"));
        }
        if self.max_upload_size == 0 {
            return Err(ConfigError::Invalid {
                name: "UPLOAD_MAX_SIZE",
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }

    /// Object store endpoint, without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.trim_end_matches('/').to_owned(),
            None => format!("https://{}.{R2_ENDPOINT_SUFFIX}", self.account_id),
        }
    }

    /// Path-style URI of `key` in the configured bucket.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Internal`] if the endpoint does not form a valid URI.
    pub fn object_uri(&self, key: &str) -> Result<Uri, UploadError> {
        let uri = format!("{}/{}/{}", self.endpoint(), self.bucket_name, encode_path(key));
        uri.parse()
            .map_err(|e| UploadError::Internal(format!("invalid object URI {uri}: {e}")))
    }

    /// Public URL clients use to fetch `key`.
    ///
    /// Falls back to the path-style endpoint URL when no public base is set.
    #[must_use]
    pub fn public_url(&self, key: &str) -> String {
        let encoded = encode_path(key);
        if self.public_url.is_empty() {
            return format!("{}/{}/{encoded}", self.endpoint(), self.bucket_name);
        }
        format!("{}/{encoded}", self.public_url.trim_end_matches('/'))
    }

    /// The signing credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.access_key_id, &self.secret_access_key)
    }
}
