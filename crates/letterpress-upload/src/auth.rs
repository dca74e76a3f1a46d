//! Caller authentication.
//!
//! Uploads and deletes require a bearer token. The token is checked against
//! an identity provider through the [`TokenVerifier`] trait before any input
//! is validated or signed.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::UploadConfig;
use crate::error::UploadError;

/// A bearer token taken from an `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Extract the token from an `Authorization` header value.
    ///
    /// The scheme is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Unauthorized`] if the header is missing, uses
    /// another scheme, or carries an empty token.
    ///
    /// # Examples
    ///
    /// ```
    /// use letterpress_upload::auth::BearerToken;
    ///
    /// let token = BearerToken::from_header(Some("Bearer abc.def")).unwrap();
    /// assert_eq!(token.as_str(), "abc.def");
    /// assert!(BearerToken::from_header(Some("Basic dXNlcg==")).is_err());
    /// ```
    pub fn from_header(value: Option<&str>) -> Result<Self, UploadError> {
        let value =
            value.ok_or_else(|| UploadError::unauthorized("Missing authorization header"))?;
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| UploadError::unauthorized("Malformed authorization header"))?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(UploadError::unauthorized("Unsupported authorization scheme"));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(UploadError::unauthorized("Empty bearer token"));
        }
        Ok(Self(token.to_owned()))
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

/// The identity behind a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// Identity provider user id.
    pub id: String,
    /// Email address, when the provider reports one.
    #[serde(default)]
    pub email: Option<String>,
}

/// Checks bearer tokens against an identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    /// Resolve `token` to a user.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Unauthorized`] for an unknown or expired token.
    async fn verify(&self, token: &BearerToken) -> Result<AuthenticatedUser, UploadError>;
}

/// [`TokenVerifier`] backed by the Supabase auth API (`GET /auth/v1/user`).
#[derive(Clone)]
pub struct SupabaseTokenVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for SupabaseTokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseTokenVerifier")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SupabaseTokenVerifier {
    /// Create a verifier for the identity provider named in `config`.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &UploadConfig) -> Self {
        Self {
            client,
            base_url: config.identity_url.trim_end_matches('/').to_owned(),
            api_key: config.identity_api_key.clone(),
        }
    }

    /// URL of the user lookup endpoint.
    #[must_use]
    pub fn user_endpoint(&self) -> String {
        format!("{}/auth/v1/user", self.base_url)
    }
}

#[async_trait]
impl TokenVerifier for SupabaseTokenVerifier {
    async fn verify(&self, token: &BearerToken) -> Result<AuthenticatedUser, UploadError> {
        let response = self
            .client
            .get(self.user_endpoint())
            .bearer_auth(token.as_str())
            .header("apikey", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "identity provider rejected bearer token");
            return Err(UploadError::unauthorized("Invalid or expired token"));
        }

        let user: AuthenticatedUser = response.json().await.map_err(|e| {
            UploadError::Internal(format!("unexpected identity provider response: {e}"))
        })?;
        debug!(user_id = %user.id, "verified bearer token");
        Ok(user)
    }
}
