//! Transport capability: how requests reach the wire.
//!
//! The [`Client`](crate::Client) only needs something that can turn
//! `(verb, url, query, body, headers)` into a [`Response`]. [`HttpTransport`]
//! is the real implementation over [`reqwest`]; tests substitute a mock.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A fully-buffered HTTP response.
///
/// Header lookup through [`HeaderMap`] is case-insensitive, which the
/// rate-limit handling relies on for `ratelimit-reset`.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Capability for issuing a single HTTP request.
///
/// Satisfied by [`HttpTransport`] in production and by a mock in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one request and buffers the response.
    ///
    /// Fails only on transport-level problems (connection, timeout, read);
    /// any HTTP status, including errors, comes back as a [`Response`].
    async fn send(
        &self,
        verb: Method,
        url: String,
        query: Vec<(String, String)>,
        body: Option<Value>,
        headers: HeaderMap,
    ) -> Result<Response>;
}

/// Real transport backed by a [`reqwest::Client`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport wrapping the given reqwest Client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self, query, body, headers))]
    async fn send(
        &self,
        verb: Method,
        url: String,
        query: Vec<(String, String)>,
        body: Option<Value>,
        headers: HeaderMap,
    ) -> Result<Response> {
        debug!("{} {}...", verb, url);

        let mut request = self.client.request(verb, &url).headers(headers);
        if !query.is_empty() {
            request = request.query(&query);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .context("Failed to read response body")?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
