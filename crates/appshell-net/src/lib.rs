//! # AppShell Net
//!
//! Network fetch interface for the AppShell offline cache engine.
//!
//! ## Features
//!
//! - **Fetcher**: injected async interface the cache engine fetches through
//! - **HttpFetcher**: reqwest-backed implementation
//! - **Cache mode**: reload requests that bypass conditional HTTP caching
//!
//! The engine performs no retries and sets no timeouts of its own; a hung
//! fetch is bounded only by the host environment's network layer.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, CACHE_CONTROL, PRAGMA};
use http::{HeaderValue, Method, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

// ==================== Errors ====================

/// Errors raised while fetching a resource.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ==================== Request / Response ====================

/// How a request interacts with intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Normal caching semantics.
    #[default]
    Default,
    /// Force a full reload, bypassing conditionally-cached responses.
    Reload,
}

/// An outbound resource request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Target URL.
    pub url: Url,

    /// HTTP method.
    pub method: Method,

    /// Cache interaction mode.
    pub cache_mode: CacheMode,
}

impl Request {
    /// Create a GET request with default cache mode.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            cache_mode: CacheMode::Default,
        }
    }

    /// Create a request with an explicit method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            cache_mode: CacheMode::Default,
        }
    }

    /// Set the cache mode.
    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }
}

/// A fetched response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL.
    pub url: Url,

    /// HTTP status code.
    pub status: StatusCode,

    /// Response headers.
    pub headers: HeaderMap,

    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// Check if the response is a success (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

// ==================== Fetcher ====================

/// Abstract network interface.
///
/// The cache engine routes every network round-trip through this trait so
/// tests can substitute scripted responses and failures.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a request and return the response.
    ///
    /// A resolved response with a non-2xx status is `Ok`; only transport
    /// failures are errors.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

// ==================== HttpFetcher ====================

/// [`Fetcher`] implementation over a reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /// Create a fetcher over an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        if request.cache_mode == CacheMode::Reload {
            builder = builder
                .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
                .header(PRAGMA, HeaderValue::from_static("no-cache"));
        }

        debug!(method = %request.method, url = %request.url, mode = ?request.cache_mode, "fetch");

        let response = builder.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
