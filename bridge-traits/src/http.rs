//! HTTP Client Abstraction
//!
//! Provides the async request/response surface the ingest engine uses to talk
//! to the repository. Requests are plain values so tests can inspect them.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity sent with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// In-memory payload
    Bytes(Bytes),
    /// Local file the client streams from disk
    File(PathBuf),
}

impl RequestBody {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RequestBody::Bytes(bytes) => Some(bytes.as_ref()),
            RequestBody::File(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            RequestBody::Bytes(_) => None,
            RequestBody::File(path) => Some(path.as_path()),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<PathBuf> for RequestBody {
    fn from(path: PathBuf) -> Self {
        RequestBody::File(path)
    }
}

impl From<&Path> for RequestBody {
    fn from(path: &Path) -> Self {
        RequestBody::File(path.to_path_buf())
    }
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<RequestBody>,
    /// When false, the body of a 2xx answer is not read at all
    pub read_success_body: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            read_success_body: true,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Existence check: a GET whose successful answer is judged by status
    /// alone. Error bodies are still read for diagnostics.
    pub fn probe(url: impl Into<String>) -> Self {
        Self {
            read_success_body: false,
            ..Self::get(url)
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn content_type(self, mime_type: impl Into<String>) -> Self {
        self.header("Content-Type", mime_type)
    }

    /// Attach a binary entity, announcing it as a named attachment.
    pub fn attachment(
        self,
        file_name: &str,
        mime_type: impl Into<String>,
        body: impl Into<RequestBody>,
    ) -> Self {
        self.header(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", file_name),
        )
        .content_type(mime_type)
        .body(body)
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Location` header, if the server sent one.
    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    /// Body decoded as UTF-8.
    pub fn text(&self) -> Result<String> {
        std::str::from_utf8(&self.body)
            .map(str::to_owned)
            .map_err(|e| BridgeError::OperationFailed(format!("response body is not UTF-8: {}", e)))
    }

    /// Response body for diagnostics, replacing invalid UTF-8.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport the engine sends repository requests through.
///
/// Implementations must:
/// - Return every HTTP status as `Ok(HttpResponse)`; only transport failures
///   (DNS, connect, TLS) become errors
/// - Send a request without a body when `HttpRequest::body` is `None`
/// - Stream `RequestBody::File` from disk instead of loading it whole
/// - Leave the body of a 2xx answer unread when `read_success_body` is false
/// - Perform a single attempt with no deadline of its own; callers decide
///   what a failure means
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest};
///
/// async fn exists(client: &dyn HttpClient, url: &str) -> Result<bool> {
///     let response = client.execute(HttpRequest::get(url)).await?;
///     Ok(response.status == 200)
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send `request` once and return whatever the repository answered.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
