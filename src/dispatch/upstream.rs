//! Outbound transport.
//!
//! # Responsibilities
//! - Describe one request to a downstream service, independent of the endpoint
//! - Send it to a concrete endpoint under a deadline and buffer the response
//!
//! # Design Decisions
//! - Bodies are buffered (`Bytes`) so a request can be replayed on retry
//! - The deadline covers the whole exchange, including reading the body
//! - Status codes are not judged here; the dispatcher decides what a failure is

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::load_balancer::Endpoint;
use crate::resilience::with_deadline;

/// Largest upstream response body the gateway will buffer.
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// A request to a logical service, replayable against any of its endpoints.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// POST `value` as a JSON body.
    pub fn json<T: Serialize>(path: impl Into<String>, value: &T) -> Result<Self, serde_json::Error> {
        let mut request = Self::new(Method::POST, path);
        request.body = Bytes::from(serde_json::to_vec(value)?);
        request.headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(request)
    }
}

/// A fully buffered downstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A single outbound attempt that did not produce a usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("upstream responded with status {status}")]
    Status { status: u16 },

    #[error("could not build upstream request: {0}")]
    InvalidRequest(String),
}

/// Sends requests to concrete endpoints.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// [`Upstream`] over a pooled hyper client.
#[derive(Clone)]
pub struct HyperUpstream {
    client: Client<HttpConnector, Body>,
}

impl HyperUpstream {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HyperUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Upstream for HyperUpstream {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: &UpstreamRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(endpoint.url_for(&request.path_and_query));
        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers.clone());
        }
        let outbound = builder
            .body(Body::from(request.body.clone()))
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;

        let exchange = async {
            let response: hyper::Response<hyper::body::Incoming> = self
                .client
                .request(outbound)
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;

            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BYTES)
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;

            Ok::<_, UpstreamError>(UpstreamResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        with_deadline(timeout, exchange)
            .await
            .map_err(|_| UpstreamError::Timeout(timeout))?
    }
}
