//! Authenticated image uploads to Cloudflare R2.
//!
//! This crate is the backend behind the newsletter editor's image picker.
//! A request carries a Supabase bearer token and the raw image bytes; the
//! service checks the token, validates the image, signs a `PUT` with
//! [`letterpress_sigv4`] and returns the public URL of the stored object.
//!
//! # Modules
//!
//! - [`config`]: environment-driven [`UploadConfig`]
//! - [`auth`]: bearer tokens and the [`TokenVerifier`] seam
//! - [`validation`]: content type, size and key rules
//! - [`store`]: the [`ObjectStore`] seam and its R2 implementation
//! - [`service`]: [`UploadService`], which ties the above together
//! - [`error`]: [`UploadError`] and its HTTP mapping
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use letterpress_upload::{
//!     AuthenticatedUser, BearerToken, ObjectStore, TokenVerifier, UploadConfig, UploadError,
//!     UploadService,
//! };
//!
//! #[derive(Debug)]
//! struct NullStore;
//!
//! #[async_trait]
//! impl ObjectStore for NullStore {
//!     async fn put_object(&self, _: &str, _: Bytes, _: &str) -> Result<(), UploadError> {
//!         Ok(())
//!     }
//!     async fn delete_object(&self, _: &str) -> Result<(), UploadError> {
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Debug)]
//! struct AnyToken;
//!
//! #[async_trait]
//! impl TokenVerifier for AnyToken {
//!     async fn verify(&self, _: &BearerToken) -> Result<AuthenticatedUser, UploadError> {
//!         Ok(AuthenticatedUser { id: "editor".into(), email: None })
//!     }
//! }
//!
//! let config = UploadConfig::builder()
//!     .public_url("https://images.example.com".into())
//!     .build();
//! let service = UploadService::new(NullStore, AnyToken, config);
//!
//! # tokio_test::block_on(async {
//! let uploaded = service
//!     .upload(Some("Bearer t"), Some("image/png"), None, Bytes::from_static(b"\x89PNG"))
//!     .await
//!     .unwrap();
//! assert!(uploaded.url.starts_with("https://images.example.com/images/"));
//! # });
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod testing;

pub use auth::{AuthenticatedUser, BearerToken, SupabaseTokenVerifier, TokenVerifier};
pub use config::UploadConfig;
pub use error::{ConfigError, ErrorBody, UploadError};
pub use service::{DeleteResponse, UploadResponse, UploadService};
pub use store::{ObjectStore, R2ObjectStore};
