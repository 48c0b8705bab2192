//! HTTP transport seam.
//!
//! [`Transport`] is the one capability the client needs from an HTTP stack:
//! perform a request and hand back a status plus a body that has not been
//! read yet. Dropping the future returned by [`Transport::perform`] must abort
//! the request; that is how the executor cancels it.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};

use crate::error::BoxError;

/// Content type of every request body the client sends.
pub const APPLICATION_JSON: &str = "application/json";

/// A fully-built request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub content_type: Option<&'static str>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Body-less `GET`.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            content_type: None,
            body: None,
        }
    }

    /// JSON-bodied request with any method.
    pub fn json(method: Method, url: Url, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            url,
            content_type: Some(APPLICATION_JSON),
            body: Some(body.into()),
        }
    }
}

/// Lazily-read response body.
pub type BodyFuture = BoxFuture<'static, Result<Bytes, BoxError>>;

/// Status line plus a body that is read on demand, so a failure to read it
/// stays distinguishable from a failure to get a response at all.
pub struct HttpResponse {
    status: StatusCode,
    body: BodyFuture,
}

impl HttpResponse {
    /// Response whose body is produced by `body`.
    pub fn new<F>(status: StatusCode, body: F) -> Self
    where
        F: Future<Output = Result<Bytes, BoxError>> + Send + 'static,
    {
        Self {
            status,
            body: body.boxed(),
        }
    }

    /// Response with an already-buffered body.
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, future::ready(Ok(body.into())))
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Give up the status and return the pending body.
    pub fn into_body(self) -> BodyFuture {
        self.body
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Something that can carry one HTTP request to the coordinator.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug + 'static {
    /// Perform `request`, resolving once the status line is in.
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, BoxError>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Transport with a default `reqwest` client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport reusing an existing, pre-configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        let mut builder = self.client.request(request.method, request.url);
        if let Some(content_type) = request.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        Ok(HttpResponse::new(status, async move {
            resp.bytes().await.map_err(BoxError::from)
        }))
    }
}
