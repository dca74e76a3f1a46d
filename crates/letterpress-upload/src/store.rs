//! Object store client.
//!
//! [`ObjectStore`] is the seam between the upload service and the storage
//! backend. [`R2ObjectStore`] implements it by signing each request with
//! SigV4 and sending it with `reqwest`; no SDK is involved.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderValue, Method, Uri};
use letterpress_sigv4::SigV4Signer;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::UploadError;

/// Storage backend for uploaded objects.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Store `body` under `key` with the given content type.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), UploadError>;

    /// Remove the object stored under `key`.
    async fn delete_object(&self, key: &str) -> Result<(), UploadError>;
}

/// A signed request, ready to send.
#[derive(Debug, Clone)]
pub struct SignedObjectRequest {
    /// HTTP method.
    pub method: Method,
    /// Path-style object URI.
    pub uri: Uri,
    /// Complete header set, including `authorization`.
    pub headers: HeaderMap,
}

/// [`ObjectStore`] backed by Cloudflare R2 (or any S3-compatible endpoint).
#[derive(Clone)]
pub struct R2ObjectStore {
    client: reqwest::Client,
    signer: SigV4Signer,
    config: UploadConfig,
}

impl fmt::Debug for R2ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2ObjectStore")
            .field("endpoint", &self.config.endpoint())
            .field("bucket", &self.config.bucket_name)
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl R2ObjectStore {
    /// Create a store with a default HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a store that sends through `client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: UploadConfig) -> Self {
        let signer = SigV4Signer::new(config.credentials());
        Self {
            client,
            signer,
            config,
        }
    }

    /// Sign a `PUT` of `body` to `key` as of `now`.
    ///
    /// `content-type` and `content-length` are part of the signed header set.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Signing`] or [`UploadError::Internal`] if the
    /// request cannot be built.
    pub fn sign_put(
        &self,
        key: &str,
        body: &[u8],
        content_type: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedObjectRequest, UploadError> {
        let uri = self.config.object_uri(key)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .map_err(|_| UploadError::invalid_input("Invalid content type"))?,
        );
        headers.insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));

        let signed = self
            .signer
            .sign_at(&Method::PUT, &uri, headers, Some(body), now)?;
        Ok(SignedObjectRequest {
            method: Method::PUT,
            uri,
            headers: signed.into_headers(),
        })
    }

    /// Sign a `DELETE` of `key` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Signing`] or [`UploadError::Internal`] if the
    /// request cannot be built.
    pub fn sign_delete(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<SignedObjectRequest, UploadError> {
        let uri = self.config.object_uri(key)?;
        let signed = self
            .signer
            .sign_at(&Method::DELETE, &uri, HeaderMap::new(), None, now)?;
        Ok(SignedObjectRequest {
            method: Method::DELETE,
            uri,
            headers: signed.into_headers(),
        })
    }

    /// Send a signed request and turn a non-2xx answer into [`UploadError::Upstream`].
    async fn send(
        &self,
        request: SignedObjectRequest,
        body: Option<Bytes>,
    ) -> Result<(), UploadError> {
        let SignedObjectRequest {
            method,
            uri,
            headers,
        } = request;
        debug!(%method, %uri, "sending signed request to object store");

        let mut builder = self
            .client
            .request(method.clone(), uri.to_string())
            .headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            info!(%method, %uri, %status, "object store request succeeded");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(%method, %uri, %status, body, "object store rejected request");
        Err(UploadError::Upstream { status, body })
    }
}

#[async_trait]
impl ObjectStore for R2ObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), UploadError> {
        let request = self.sign_put(key, &body, content_type, Utc::now())?;
        self.send(request, Some(body)).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), UploadError> {
        let request = self.sign_delete(key, Utc::now())?;
        self.send(request, None).await
    }
}
