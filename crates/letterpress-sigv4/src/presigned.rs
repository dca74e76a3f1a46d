//! Presigned URL generation for AWS Signature Version 4.
//!
//! A presigned URL carries the signature in its query string instead of the
//! `authorization` header, so it can be handed to a browser or any plain HTTP
//! client. The query gains:
//!
//! - `X-Amz-Algorithm` - `AWS4-HMAC-SHA256`
//! - `X-Amz-Credential` - `AKID/date/region/service/aws4_request`
//! - `X-Amz-Date` - ISO 8601 basic timestamp
//! - `X-Amz-Expires` - validity in seconds
//! - `X-Amz-SignedHeaders` - always `host`
//! - `X-Amz-Signature` - the hex signature
//!
//! The payload is not signed (`UNSIGNED-PAYLOAD`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{Method, Uri};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::canonical::{build_canonical_request, build_canonical_query_string, uri_encode};
use crate::error::SigningError;
use crate::sigv4::{
    ALGORITHM, CredentialScope, LONG_DATE_FORMAT, SigV4Signer, build_string_to_sign,
    compute_signature, derive_signing_key, host_header_value,
};

/// Payload hash used for every presigned request.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Longest validity SigV4 accepts for a presigned URL (seven days).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

impl SigV4Signer {
    /// Presign `uri` for `method` at the current instant.
    ///
    /// # Errors
    ///
    /// See [`SigV4Signer::presign_at`].
    pub fn presign(
        &self,
        method: &Method,
        uri: &Uri,
        expires_in: Duration,
    ) -> Result<Uri, SigningError> {
        self.presign_at(method, uri, expires_in, Utc::now())
    }

    /// Presign `uri` for `method` as of `now`, valid for `expires_in`.
    ///
    /// Existing query parameters are kept and signed.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::InvalidExpiry`] when `expires_in` is zero or
    /// longer than [`MAX_PRESIGN_EXPIRY`], [`SigningError::MissingHost`] when
    /// `uri` has no host, and [`SigningError::InvalidUri`] if the signed URI
    /// cannot be assembled.
    pub fn presign_at(
        &self,
        method: &Method,
        uri: &Uri,
        expires_in: Duration,
        now: DateTime<Utc>,
    ) -> Result<Uri, SigningError> {
        let expires = expires_in.as_secs();
        if expires == 0 || expires_in > MAX_PRESIGN_EXPIRY {
            return Err(SigningError::InvalidExpiry(expires));
        }

        let host = host_header_value(uri)?;
        let amz_date = now.format(LONG_DATE_FORMAT).to_string();
        let scope = CredentialScope::new(now, self.region(), self.service());
        let credential = format!("{}/{scope}", self.credentials().access_key_id());

        let auth_params = format!(
            "X-Amz-Algorithm={ALGORITHM}\
             &X-Amz-Credential={}\
             &X-Amz-Date={amz_date}\
             &X-Amz-Expires={expires}\
             &X-Amz-SignedHeaders=host",
            uri_encode(&credential),
        );
        let query = match uri.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{auth_params}"),
            _ => auth_params,
        };
        let canonical_query = build_canonical_query_string(&query);

        let canonical_request = build_canonical_request(
            method.as_str(),
            uri.path(),
            &canonical_query,
            &format!("host:{host}\n"),
            "host",
            UNSIGNED_PAYLOAD,
        );

        debug!(
            access_key_id = %self.credentials().access_key_id(),
            expires,
            canonical_request,
            "built presigned canonical request"
        );

        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = build_string_to_sign(&amz_date, &scope.to_string(), &canonical_hash);
        let signing_key = derive_signing_key(
            self.credentials().secret_access_key(),
            &scope.date,
            scope.region,
            scope.service,
        );
        let signature = compute_signature(&signing_key, &string_to_sign);

        let scheme = uri.scheme_str().unwrap_or("https");
        let presigned = format!(
            "{scheme}://{host}{path}?{canonical_query}&X-Amz-Signature={signature}",
            path = uri.path(),
        );
        Ok(presigned.parse()?)
    }
}
