//! Upload and delete operations.
//!
//! [`UploadService`] ties the pieces together: it authenticates the caller,
//! validates the input, then hands the bytes to the [`ObjectStore`]. The
//! HTTP layer only translates requests into these calls and errors into
//! responses.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{AuthenticatedUser, BearerToken, TokenVerifier};
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::store::ObjectStore;
use crate::validation::{
    generate_object_key, sanitize_file_name, validate_content_type, validate_object_key,
    validate_size,
};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Public URL of the stored object.
    pub url: String,
    /// Object key inside the bucket.
    pub key: String,
    /// Stored size in bytes.
    pub size: usize,
    /// Content type the object was stored with.
    pub content_type: String,
    /// Client-supplied file name, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Always `true`.
    pub success: bool,
    /// The deleted key.
    pub key: String,
}

/// Authenticated image upload and delete.
#[derive(Debug)]
pub struct UploadService<S, V> {
    store: Arc<S>,
    verifier: Arc<V>,
    config: Arc<UploadConfig>,
}

impl<S, V> Clone for UploadService<S, V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            verifier: Arc::clone(&self.verifier),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ObjectStore, V: TokenVerifier> UploadService<S, V> {
    /// Create a service over `store` and `verifier`.
    #[must_use]
    pub fn new(store: S, verifier: V, config: UploadConfig) -> Self {
        Self {
            store: Arc::new(store),
            verifier: Arc::new(verifier),
            config: Arc::new(config),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    async fn authenticate(
        &self,
        authorization: Option<&str>,
    ) -> Result<AuthenticatedUser, UploadError> {
        let token = BearerToken::from_header(authorization)?;
        self.verifier.verify(&token).await
    }

    /// Store an image and return its public URL.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Unauthorized`] for a bad token,
    /// [`UploadError::InvalidInput`] for a bad type or size, and whatever the
    /// store reports if the write fails.
    pub async fn upload(
        &self,
        authorization: Option<&str>,
        content_type: Option<&str>,
        file_name: Option<&str>,
        body: Bytes,
    ) -> Result<UploadResponse, UploadError> {
        debug!(?content_type, size = body.len(), "handling upload");
        let user = self.authenticate(authorization).await?;
        let image_type = validate_content_type(content_type)?;
        validate_size(body.len(), self.config.max_upload_size)?;

        let key = generate_object_key(image_type, Utc::now());
        let size = body.len();
        self.store
            .put_object(&key, body, image_type.content_type())
            .await?;

        info!(user_id = %user.id, key = %key, size, content_type = %image_type, "image uploaded");
        Ok(UploadResponse {
            url: self.config.public_url(&key),
            key,
            size,
            content_type: image_type.content_type().to_owned(),
            file_name: sanitize_file_name(file_name),
        })
    }

    /// Delete a previously uploaded image.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Unauthorized`] for a bad token,
    /// [`UploadError::InvalidInput`] for a missing or out-of-prefix key, and
    /// whatever the store reports if the delete fails.
    pub async fn delete(
        &self,
        authorization: Option<&str>,
        key: Option<&str>,
    ) -> Result<DeleteResponse, UploadError> {
        debug!(?key, "handling delete");
        let user = self.authenticate(authorization).await?;
        let key = validate_object_key(key)?;
        self.store.delete_object(key).await?;

        info!(user_id = %user.id, key, "image deleted");
        Ok(DeleteResponse {
            success: true,
            key: key.to_owned(),
        })
    }
}
