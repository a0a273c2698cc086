//! Main point of contact with the Duffel API.
//!
//! [`Client`] owns a [`Transport`] and an API token, and exposes
//! [`request`](Client::request) for single resources and
//! [`iterate`](Client::iterate) for cursor-paginated list endpoints. Rate
//! limiting (HTTP 429) is handled transparently by waiting until the
//! server-announced reset time and retrying.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, TryStreamExt};
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::Error;
use crate::transport::{HttpTransport, Transport};

/// Base URI of the Duffel API.
pub const BASE_URI: &str = "https://api.duffel.com";

/// API version sent as the `Duffel-Version` header on every request.
pub const API_VERSION: &str = "beta";

/// Largest page size a single list request may ask for.
pub const MAX_PAGE_LIMIT: u64 = 200;

const VERSION_HEADER: &str = "Duffel-Version";
const RATELIMIT_RESET: &str = "ratelimit-reset";

/// Response envelope types (internal).
mod envelope {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Data<T> {
        pub data: T,
    }

    #[derive(Deserialize, Debug)]
    pub struct Page<T> {
        pub data: Vec<T>,
        pub meta: PageMeta,
    }

    #[derive(Deserialize, Debug)]
    pub struct PageMeta {
        pub after: Option<String>,
    }
}

/// Client for the Duffel API.
///
/// Immutable once constructed; cloning is cheap and clones share the
/// underlying transport.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    token: String,
    base_url: String,
}

impl Client {
    /// Creates a client against the production API with a default transport.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_transport(Arc::new(HttpTransport::default()), token)
    }

    /// Creates a client against the production API with a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>, token: impl Into<String>) -> Self {
        Self::with_base_url(transport, token, BASE_URI)
    }

    /// Creates a client against a custom base URL, e.g. a local test server.
    pub fn with_base_url(
        transport: Arc<dyn Transport>,
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            token: token.into(),
            base_url: base_url.into(),
        }
    }

    /// Headers sent on every request unless overridden by the caller.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.token))
                .context("API token is not a valid header value")?,
        );
        headers.insert(VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    /// Executes a single logical request, waiting out rate limits.
    ///
    /// Returns the decoded JSON body with the envelope still wrapped, or
    /// `None` when the body is absent or not JSON. Statuses of 400 and above
    /// fail with a classified [`Error`].
    #[tracing::instrument(skip(self, query, body, headers))]
    async fn execute(
        &self,
        verb: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Option<Value>> {
        let url = format!("{}{}", self.base_url, path);

        let mut merged = self.default_headers()?;
        if let Some(extra) = headers {
            // extend() replaces existing entries, so caller values win.
            merged.extend(extra);
        }

        let response = loop {
            let response = self
                .transport
                .send(
                    verb.clone(),
                    url.clone(),
                    query.to_vec(),
                    body.clone(),
                    merged.clone(),
                )
                .await?;

            if response.status != StatusCode::TOO_MANY_REQUESTS {
                break response;
            }

            match rate_limit_delay(&response.headers)? {
                Some(delay) => {
                    warn!(
                        "Rate limited on {} {}, waiting {:.1}s until reset...",
                        verb,
                        url,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    debug!("Rate limit reset time already passed, retrying immediately");
                }
            }
        };

        // A non-JSON body is tolerated; only the status decides failure.
        let decoded = response.json::<Value>().ok();

        if response.status.is_client_error() || response.status.is_server_error() {
            return Err(Error::classify(response, decoded).into());
        }

        Ok(decoded)
    }

    /// Fetches a single resource.
    ///
    /// A supplied `body` is enveloped as `{"data": body}` before sending; on
    /// success only the `data` field of the response envelope is returned,
    /// deserialized into `T`.
    #[tracing::instrument(skip(self, query, body, headers))]
    pub async fn request<T: DeserializeOwned>(
        &self,
        verb: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        let query = to_owned_query(query);
        let body = body.map(|body| json!({ "data": body }));

        let data = self
            .execute(verb, path, &query, body, headers)
            .await?
            .context("Response body was empty or not JSON")?;

        let envelope: envelope::Data<T> =
            serde_json::from_value(data).context("Response envelope is missing the data field")?;

        Ok(envelope.data)
    }

    /// Iterates a cursor-paginated list endpoint as a lazy stream.
    ///
    /// Fetches one page at a time, requesting at most
    /// [`MAX_PAGE_LIMIT`] elements per page (capped further by whatever
    /// remains of `limit`), and follows the `meta.after` cursor until the
    /// server reports no more pages or the limit is used up. A page already
    /// fetched is always yielded whole, even when it overshoots `limit`.
    /// Dropping the stream mid-sequence simply discards its state.
    pub fn iterate<T>(
        &self,
        verb: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
        headers: Option<HeaderMap>,
        limit: Option<u64>,
    ) -> impl Stream<Item = Result<T>> + use<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        struct PageState {
            client: Client,
            verb: Method,
            path: String,
            query: Vec<(String, String)>,
            body: Option<Value>,
            headers: Option<HeaderMap>,
            after: Option<String>,
            remaining: Option<u64>,
            exhausted: bool,
        }

        let state = PageState {
            client: self.clone(),
            verb,
            path: path.to_string(),
            query: to_owned_query(query),
            body: body.map(|body| json!({ "data": body })),
            headers,
            after: None,
            remaining: limit,
            exhausted: false,
        };

        stream::try_unfold(state, |mut state| async move {
            if state.exhausted {
                return anyhow::Ok(None);
            }

            let mut query = state.query.clone();
            let page_limit = state
                .remaining
                .map_or(MAX_PAGE_LIMIT, |remaining| remaining.min(MAX_PAGE_LIMIT));
            query.push(("limit".to_string(), page_limit.to_string()));
            if let Some(after) = &state.after {
                query.push(("after".to_string(), after.clone()));
            }

            let data = state
                .client
                .execute(
                    state.verb.clone(),
                    &state.path,
                    &query,
                    state.body.clone(),
                    state.headers.clone(),
                )
                .await?
                .context("Response body was empty or not JSON")?;

            let page: envelope::Page<T> = serde_json::from_value(data)
                .context("Response envelope is missing the data or meta field")?;

            match page.meta.after {
                None => state.exhausted = true,
                Some(next) => {
                    if let Some(remaining) = &mut state.remaining {
                        *remaining = remaining.saturating_sub(page.data.len() as u64);
                        if *remaining == 0 {
                            state.exhausted = true;
                        }
                    }
                    state.after = Some(next);
                }
            }

            Ok(Some((page.data, state)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
        .try_flatten()
    }
}

fn to_owned_query(query: &[(&str, &str)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Computes how long to wait before retrying a rate-limited request.
///
/// Parses the `ratelimit-reset` header as an RFC 1123 date in UTC and
/// returns the time left until it, or `None` when the reset time has
/// already passed (retry immediately).
fn rate_limit_delay(headers: &HeaderMap) -> Result<Option<Duration>> {
    let reset = headers
        .get(RATELIMIT_RESET)
        .context("Rate-limited response is missing the ratelimit-reset header")?
        .to_str()
        .context("ratelimit-reset header is not valid text")?;

    let reset = DateTime::parse_from_rfc2822(reset)
        .with_context(|| format!("Failed to parse ratelimit-reset header: {reset}"))?;

    let delay = reset.with_timezone(&Utc) - Utc::now();
    Ok(delay.to_std().ok())
}
