//! Error types for the upload backend.
//!
//! [`UploadError`] follows the taxonomy the HTTP layer reports to clients:
//! unauthorized callers, invalid input, a rejection from the object store,
//! and everything else as an internal error. Each variant knows its HTTP
//! status and JSON body.

use http::StatusCode;
use letterpress_sigv4::SigningError;
use serde::{Deserialize, Serialize};

/// Errors raised while handling an upload or delete.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad file type, size, or key.
    #[error("{0}")]
    InvalidInput(String),

    /// The object store rejected the signed request.
    #[error("Object store returned {status}")]
    Upstream {
        /// Status code returned by the store.
        status: StatusCode,
        /// The store's error body, passed through to the caller.
        body: String,
    },

    /// The request could not be signed.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The HTTP client failed before a response arrived.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Any other unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// Shorthand for [`UploadError::InvalidInput`].
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Shorthand for [`UploadError::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// The HTTP status reported for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Signing(_) | Self::Transport(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The JSON body reported for this error.
    ///
    /// Internal failures carry only a generic message; their detail stays in
    /// the server log.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::Upstream { body, .. } => ErrorBody {
                error: "Failed to store object".to_owned(),
                details: Some(body.clone()),
            },
            Self::Signing(_) | Self::Transport(_) | Self::Internal(_) => ErrorBody {
                error: "Internal server error".to_owned(),
                details: None,
            },
            Self::Unauthorized(_) | Self::InvalidInput(_) => ErrorBody {
                error: self.to_string(),
                details: None,
            },
        }
    }
}

/// JSON error shape returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable summary.
    pub error: String,
    /// Extra detail, such as the object store's response body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Problems with the loaded configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required setting is empty.
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting has an unusable value.
    #[error("invalid value for {name}: {reason}")]
    Invalid {
        /// Environment variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
