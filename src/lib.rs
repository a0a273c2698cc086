//! Client library for the [Duffel] travel booking API.
//!
//! Wraps request construction, authorization headers, rate-limit backoff,
//! envelope unwrapping, cursor pagination, and error classification. The
//! underlying HTTP transport is a swappable capability ([`Transport`]), so
//! tests can run against a mock or a local server.
//!
//! # Example
//!
//! ```no_run
//! use duffel::Client;
//! use duffel::reqwest::Method;
//! use futures_util::TryStreamExt;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = Client::new("duffel_test_token");
//!
//! // Single resource: the response envelope is unwrapped for you.
//! let offer: serde_json::Value = client
//!     .request(Method::GET, "/air/offers/off_123", &[], None, None)
//!     .await?;
//!
//! // Paginated list: pages are fetched lazily as the stream is polled.
//! let orders: Vec<serde_json::Value> = client
//!     .iterate(Method::GET, "/air/orders", &[], None, None, Some(500))
//!     .try_collect()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! [Duffel]: https://duffel.com

pub mod client;
pub mod error;
pub mod transport;

pub use client::{API_VERSION, BASE_URI, Client, MAX_PAGE_LIMIT};
pub use error::Error;
pub use transport::{HttpTransport, Response, Transport};

pub use reqwest;
