//! The upload HTTP service implementing hyper's `Service` trait.
//!
//! [`UploadHttpService`] translates HTTP requests into [`UploadService`]
//! calls and [`UploadError`]s into JSON responses. It handles:
//!
//! 1. Health checks (`GET /health`)
//! 2. CORS preflight requests (`OPTIONS`)
//! 3. Uploads (`POST /upload`, raw image bytes as the body)
//! 4. Deletes (`DELETE /upload?key=<key>`)
//! 5. Common response headers (CORS, `Content-Type`, `x-request-id`)

use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::header::{self, AsHeaderName, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::Service;
use letterpress_upload::{
    BearerToken, ErrorBody, ObjectStore, TokenVerifier, UploadError, UploadService,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Path serving uploads and deletes.
pub const UPLOAD_PATH: &str = "/upload";

/// Path serving health checks.
pub const HEALTH_PATH: &str = "/health";

/// Optional header carrying the client's original file name.
const FILE_NAME_HEADER: &str = "x-file-name";

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type, X-File-Name";

/// Response body type produced by this service.
pub type ResponseBody = Full<Bytes>;

/// hyper service wrapping an [`UploadService`].
#[derive(Debug)]
pub struct UploadHttpService<S, V> {
    inner: UploadService<S, V>,
}

impl<S, V> Clone for UploadHttpService<S, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ObjectStore, V: TokenVerifier> UploadHttpService<S, V> {
    /// Create a new HTTP service over `inner`.
    #[must_use]
    pub fn new(inner: UploadService<S, V>) -> Self {
        Self { inner }
    }
}

impl<S: ObjectStore, V: TokenVerifier> Service<Request<Incoming>> for UploadHttpService<S, V> {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.inner.clone();

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = process_request(req, &service, &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Route a request to the matching handler.
pub async fn process_request<B, S, V>(
    req: Request<B>,
    service: &UploadService<S, V>,
    request_id: &str,
) -> Response<ResponseBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
    S: ObjectStore,
    V: TokenVerifier,
{
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing request");

    if method == Method::OPTIONS {
        return cors_preflight_response();
    }
    if method == Method::GET && uri.path() == HEALTH_PATH {
        return health_check_response();
    }
    if uri.path() != UPLOAD_PATH {
        return error_body_response(StatusCode::NOT_FOUND, "Not found");
    }

    let result = match method {
        Method::POST => handle_upload(req, service).await,
        Method::DELETE => handle_delete(req, service).await,
        _ => return error_body_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"),
    };

    match result {
        Ok(response) => {
            info!(%method, %uri, status = %response.status(), request_id, "request completed");
            response
        }
        Err(err) => error_response(&err, request_id),
    }
}

async fn handle_upload<B, S, V>(
    req: Request<B>,
    service: &UploadService<S, V>,
) -> Result<Response<ResponseBody>, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
    S: ObjectStore,
    V: TokenVerifier,
{
    let (parts, body) = req.into_parts();
    // Anonymous callers never get a body buffered on their behalf.
    BearerToken::from_header(header_str(&parts.headers, header::AUTHORIZATION))?;
    let body = collect_body(body, service.config().max_upload_size).await?;

    let uploaded = service
        .upload(
            header_str(&parts.headers, header::AUTHORIZATION),
            header_str(&parts.headers, header::CONTENT_TYPE),
            header_str(&parts.headers, FILE_NAME_HEADER),
            body,
        )
        .await?;
    Ok(json_response(StatusCode::OK, &uploaded))
}

async fn handle_delete<B, S, V>(
    req: Request<B>,
    service: &UploadService<S, V>,
) -> Result<Response<ResponseBody>, UploadError>
where
    S: ObjectStore,
    V: TokenVerifier,
{
    let (parts, _body) = req.into_parts();
    let key = parts.uri.query().and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "key")
            .map(|(_, value)| value.into_owned())
    });

    let deleted = service
        .delete(
            header_str(&parts.headers, header::AUTHORIZATION),
            key.as_deref(),
        )
        .await?;
    Ok(json_response(StatusCode::OK, &deleted))
}

/// Collect a request body, failing once it grows past `limit` bytes.
async fn collect_body<B>(body: B, limit: usize) -> Result<Bytes, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(UploadError::invalid_input(format!(
                "File too large. Maximum size is {} MB",
                limit / (1024 * 1024)
            )))
        }
        Err(e) => Err(UploadError::invalid_input(format!(
            "Failed to read request body: {e}"
        ))),
    }
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .expect("JSON response should be valid"),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            error_body_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn error_body_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    let body = serde_json::json!({ "error": message }).to_string();
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static error response should be valid")
}

/// Convert an [`UploadError`] into its JSON response.
fn error_response(err: &UploadError, request_id: &str) -> Response<ResponseBody> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, %status, request_id, "request failed");
    } else {
        warn!(error = %err, %status, request_id, "request rejected");
    }
    let body: ErrorBody = err.to_body();
    json_response(status, &body)
}

fn health_check_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(br#"{"status":"running"}"#)))
        .expect("static health response should be valid")
}

fn cors_preflight_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ACCESS_CONTROL_MAX_AGE, "86400")
        .body(Full::new(Bytes::new()))
        .expect("static CORS response should be valid")
}

/// Add CORS, content type and request id headers to every response.
fn add_common_headers(
    mut response: Response<ResponseBody>,
    request_id: &str,
) -> Response<ResponseBody> {
    let headers = response.headers_mut();

    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers
        .entry(header::CONTENT_TYPE)
        .or_insert(HeaderValue::from_static("application/json"));

    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert("x-request-id", hv);
    }

    response
}
