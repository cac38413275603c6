//! Blocking HTTP transport.
//!
//! Every remote call of a sync pass goes through [`Transport`], so the
//! engine stays synchronous and tests can swap in an in-memory server.
//! [`ReqwestTransport`] bridges to reqwest's async client by blocking on a
//! current-thread Tokio runtime it owns.

use crate::error::{Result, SyncError};
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder};
use std::io::Write;
use std::time::Duration;
use tokio::runtime::Runtime;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Bearer token for the `Authorization` header.
    pub bearer: Option<String>,
    /// JSON body.
    pub json: Option<serde_json::Value>,
}

impl HttpRequest {
    /// A GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer: None,
            json: None,
        }
    }

    /// A POST request with a JSON body.
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer: None,
            json: Some(body),
        }
    }

    /// Attach a bearer token.
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A fully read response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body, or a [`SyncError::Status`] for non-success statuses.
    pub fn into_success(self, url: &str) -> Result<Vec<u8>> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(SyncError::status(url, self.status, &self.body))
        }
    }
}

/// Sends requests and hands back their responses.
pub trait Transport {
    /// Send `request` and wait for the whole response. Only failures to
    /// obtain a response are errors; any status code is returned as a
    /// response.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;

    /// Send `request` and write the body of a 2xx response into `sink`,
    /// returning the number of bytes written.
    ///
    /// Non-success statuses are [`SyncError::Status`] errors and write
    /// nothing. The default buffers the body through [`Transport::send`].
    fn send_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64> {
        let body = self.send(request)?.into_success(&request.url)?;
        sink.write_all(&body)?;
        Ok(body.len() as u64)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }

    fn send_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64> {
        (**self).send_to(request, sink)
    }
}

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = concat!("kavita-sync/", env!("CARGO_PKG_VERSION"));

/// reqwest-backed transport.
///
/// The timeout bounds connecting and each wait for more data, not a whole
/// transfer, so large books on slow links finish as long as bytes flow.
/// [`Transport::send_to`] streams bodies chunk by chunk.
pub struct ReqwestTransport {
    client: Client,
    runtime: Runtime,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("client", &self.client)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl ReqwestTransport {
    /// Build a transport with the given connect and read timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {}", e)))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self { client, runtime })
    }

    fn build(&self, request: &HttpRequest) -> RequestBuilder {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }
        builder
    }

    async fn send_async(&self, request: &HttpRequest) -> reqwest::Result<HttpResponse> {
        let response = self.build(request).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }

    async fn stream_async(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64> {
        let transport_error = |e: reqwest::Error| SyncError::Transport {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let response = self.build(request).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(transport_error)?;
            return Err(SyncError::status(&request.url, status, &body));
        }

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport_error)?;
            sink.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        sink.flush()?;

        Ok(written)
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        tracing::debug!(url = %request.url, method = ?request.method, "HTTP request");
        self.runtime
            .block_on(self.send_async(request))
            .map_err(|e| SyncError::Transport {
                url: request.url.clone(),
                message: e.to_string(),
            })
    }

    fn send_to(&self, request: &HttpRequest, sink: &mut dyn Write) -> Result<u64> {
        tracing::debug!(url = %request.url, method = ?request.method, "HTTP streaming request");
        self.runtime.block_on(self.stream_async(request, sink))
    }
}
