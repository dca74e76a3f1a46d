//! Error types for SigV4 request signing.
//!
//! Signing is total for well-formed input. The variants below cover the
//! inputs that cannot be turned into a valid set of HTTP headers; they are
//! returned unchanged to the caller, which maps them to its own error space.

/// Errors that can occur while signing a request.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// The request URI has no host component, so the `host` header cannot be derived.
    #[error("request URI has no host: {0}")]
    MissingHost(String),

    /// A caller-supplied header value is not visible ASCII and cannot be canonicalized.
    #[error("header {0} has a value that is not valid visible ASCII")]
    InvalidHeaderEncoding(String),

    /// A computed header value (date, hash, host, authorization) is not a valid header value.
    #[error(transparent)]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// The presigned URL validity is zero or longer than seven days.
    #[error("presigned URL expiry must be between 1 and 604800 seconds, got {0}")]
    InvalidExpiry(u64),

    /// The presigned URL could not be assembled into a valid URI.
    #[error(transparent)]
    InvalidUri(#[from] http::uri::InvalidUri),
}
