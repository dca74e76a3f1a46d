//! Canonical request construction for AWS Signature Version 4.
//!
//! The canonical request is the newline-separated form that gets hashed and
//! signed:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalURI\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n      (every header line ends in \n, so a blank line follows)
//! SignedHeaders\n
//! HashedPayload
//! ```
//!
//! Header names are lowercase by construction because they come from an
//! [`http::HeaderMap`], so there is exactly one lookup per signed header.

use std::collections::BTreeMap;

use http::HeaderMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::SigningError;

/// Characters left unescaped by SigV4 URI encoding: `A-Z a-z 0-9 - _ . ~`.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The canonical header block together with the matching signed header list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHeaders {
    /// `name:value\n` lines, sorted by name.
    pub canonical: String,
    /// Sorted, semicolon-joined lowercase header names.
    pub signed: String,
}

/// Build the full canonical request string from its components.
///
/// `canonical_headers` must already end in `\n` (see [`canonicalize_headers`]),
/// which yields the blank line between the header block and the signed header
/// list.
///
/// # Examples
///
/// ```
/// use letterpress_sigv4::canonical::build_canonical_request;
///
/// let canonical = build_canonical_request(
///     "DELETE",
///     "/bucket/key.png",
///     "",
///     "host:example.com\n",
///     "host",
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
/// );
/// assert!(canonical.starts_with("DELETE\n/bucket/key.png\n\nhost:example.com\n\nhost\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let canonical_uri = build_canonical_uri(path);
    let canonical_query = build_canonical_query_string(query);

    format!(
        "{method}\n{canonical_uri}\n{canonical_query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    )
}

/// Build the canonical URI.
///
/// The path is expected to be percent-encoded already (as it is in any
/// [`http::Uri`]), so it is used verbatim. An empty path becomes `/`.
///
/// # Examples
///
/// ```
/// use letterpress_sigv4::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/images/a%20b.png"), "/images/a%20b.png");
/// assert_eq!(build_canonical_uri(""), "/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }
    path.to_owned()
}

/// Build the canonical query string by sorting parameters.
///
/// Parameters are sorted by name, then by value for repeated names. Values
/// keep whatever encoding the caller used; a parameter without `=` gets an
/// empty value.
///
/// # Examples
///
/// ```
/// use letterpress_sigv4::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("uploads"), "uploads=");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| param.split_once('=').unwrap_or((param, "")))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonicalize every header in `headers`.
///
/// All headers present are signed. Values are trimmed and runs of whitespace
/// collapsed to a single space; repeated headers are joined with `,` in
/// insertion order.
///
/// # Errors
///
/// Returns [`SigningError::InvalidHeaderEncoding`] if a value is not visible ASCII.
pub fn canonicalize_headers(headers: &HeaderMap) -> Result<CanonicalHeaders, SigningError> {
    let mut sorted: BTreeMap<&str, String> = BTreeMap::new();

    for name in headers.keys() {
        let mut joined = String::new();
        for value in headers.get_all(name) {
            let value = value
                .to_str()
                .map_err(|_| SigningError::InvalidHeaderEncoding(name.as_str().to_owned()))?;
            if !joined.is_empty() {
                joined.push(',');
            }
            joined.push_str(&collapse_whitespace(value.trim()));
        }
        sorted.insert(name.as_str(), joined);
    }

    let canonical = sorted
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect::<String>();
    let names: Vec<&str> = sorted.keys().copied().collect();

    Ok(CanonicalHeaders {
        canonical,
        signed: build_signed_headers_string(&names),
    })
}

/// Build the signed headers string as a semicolon-separated list of lowercase header names.
///
/// # Examples
///
/// ```
/// use letterpress_sigv4::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "Host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(names: &[&str]) -> String {
    let mut sorted: Vec<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Percent-encode an object key for use as a URI path.
///
/// Each `/`-separated segment is encoded with the SigV4 unreserved set, so
/// the result can be used both in the request URI and verbatim as the
/// canonical URI.
///
/// # Examples
///
/// ```
/// use letterpress_sigv4::canonical::encode_path;
///
/// assert_eq!(encode_path("images/my photo.png"), "images/my%20photo.png");
/// ```
#[must_use]
pub fn encode_path(key: &str) -> String {
    key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// URI-encode a single value using the SigV4 unreserved set.
pub(crate) fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, URI_ENCODE_SET).to_string()
}

fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}
