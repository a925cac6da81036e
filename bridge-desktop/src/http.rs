//! `HttpClient` backed by `reqwest`.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestBody};
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Only connection setup is bounded. A master image upload may take as long
/// as the repository keeps the transaction alive.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error bodies are cut at this size; they only feed diagnostics.
pub const DIAGNOSTIC_BODY_LIMIT: usize = 64 * 1024;

/// Repository client over a pooled `reqwest::Client`.
///
/// Every request is sent exactly once. Non-2xx statuses come back as
/// responses; only transport failures become errors.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect: Duration) -> Result<Self> {
        Client::builder()
            .connect_timeout(connect)
            .user_agent(concat!("repository-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map(Self::with_client)
            .map_err(|e| BridgeError::OperationFailed(format!("cannot build HTTP client: {}", e)))
    }

    /// Wrap a client configured by the host (proxies, custom TLS roots).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn prepare(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<RequestBody>,
    ) -> Result<reqwest::RequestBuilder> {
        let builder = headers
            .into_iter()
            .fold(self.client.request(reqwest_method(method), url), |builder, (name, value)| {
                builder.header(name, value)
            });

        // Containers are created by a PUT without any entity.
        Ok(match body {
            None => builder,
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            Some(RequestBody::File(path)) => {
                let (length, body) = file_body(&path).await?;
                builder
                    .header(reqwest::header::CONTENT_LENGTH, length)
                    .body(body)
            }
        })
    }
}

/// Stream a local file as the request entity.
async fn file_body(path: &Path) -> Result<(u64, reqwest::Body)> {
    let open_failed =
        |e: std::io::Error| BridgeError::OperationFailed(format!("cannot open {}: {}", path.display(), e));

    let file = tokio::fs::File::open(path).await.map_err(open_failed)?;
    let length = file.metadata().await.map_err(open_failed)?.len();
    Ok((length, reqwest::Body::wrap_stream(ReaderStream::new(file))))
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

fn transport_error(method: HttpMethod, url: &str, error: reqwest::Error) -> BridgeError {
    let cause = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "could not connect"
    } else if error.is_body() {
        "failed while streaming the body"
    } else {
        "failed"
    };
    BridgeError::OperationFailed(format!("{} {} {}: {}", method, url, cause, error))
}

fn response_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    let mut flattened = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            flattened.insert(name.as_str().to_string(), value.to_string());
        }
    }
    flattened
}

/// Read what the caller needs of the body: everything of a wanted 2xx
/// answer, nothing of an unwanted one, and a bounded prefix of anything else.
async fn read_body(mut response: reqwest::Response, read_success_body: bool) -> reqwest::Result<Bytes> {
    if response.status().is_success() {
        return if read_success_body {
            response.bytes().await
        } else {
            Ok(Bytes::new())
        };
    }

    let mut collected = BytesMut::new();
    while let Some(chunk) = response.chunk().await? {
        let room = DIAGNOSTIC_BODY_LIMIT - collected.len();
        collected.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if collected.len() == DIAGNOSTIC_BODY_LIMIT {
            break;
        }
    }
    Ok(collected.freeze())
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            read_success_body,
        } = request;
        debug!(%method, %url, "sending repository request");

        let builder = self.prepare(method, &url, headers, body).await?;
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, %url, error = %e, "repository request failed");
                return Err(transport_error(method, &url, e));
            }
        };

        let status = response.status().as_u16();
        let headers = response_headers(response.headers());
        let body = read_body(response, read_success_body)
            .await
            .map_err(|e| transport_error(method, &url, e))?;

        debug!(%method, %url, status, bytes = body.len(), "repository answered");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
