//! Error taxonomy for failed API responses.

use reqwest::StatusCode;
use serde_json::Value;

use crate::transport::Response;

/// A request that reached the server but came back with a failing status.
///
/// Both kinds keep the raw [`Response`] so callers can inspect
/// transport-level details (status, headers) even for application errors.
/// Carried inside [`anyhow::Error`]; recover it with
/// [`downcast_ref`](anyhow::Error::downcast_ref).
#[derive(Debug, Clone)]
pub enum Error {
    /// Any failing status not classified more specifically (5xx, or a 4xx
    /// whose body breaks the error-envelope contract). Carries the whole
    /// decoded body, or `None` when the body was absent or not JSON.
    Http {
        /// The failing response.
        response: Response,
        /// Decoded response body, if there was one.
        body: Option<Value>,
    },
    /// Application-level error (status 400-499) with the `errors` array
    /// extracted from the response envelope.
    Api {
        /// The failing response.
        response: Response,
        /// Contents of the `errors` field.
        errors: Value,
    },
}

impl Error {
    /// Classifies a failing response from its status and decoded body.
    ///
    /// Statuses in 400-499 whose body carries the `errors` envelope become
    /// [`Error::Api`]; everything else is [`Error::Http`]. A 4xx body
    /// without `errors` violates the API contract and degrades to
    /// [`Error::Http`] with the full body.
    pub(crate) fn classify(response: Response, body: Option<Value>) -> Self {
        if response.status.is_client_error() {
            if let Some(errors) = body.as_ref().and_then(|b| b.get("errors")) {
                let errors = errors.clone();
                return Error::Api { response, errors };
            }
        }
        Error::Http { response, body }
    }

    /// The failing response.
    pub fn response(&self) -> &Response {
        match self {
            Error::Http { response, .. } | Error::Api { response, .. } => response,
        }
    }

    /// Status code of the failing response.
    pub fn status(&self) -> StatusCode {
        self.response().status
    }

    /// The extracted `errors` array, for application-level failures.
    pub fn errors(&self) -> Option<&Value> {
        match self {
            Error::Api { errors, .. } => Some(errors),
            Error::Http { .. } => None,
        }
    }

    /// The decoded response body, for failures without an error envelope.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Error::Http { body, .. } => body.as_ref(),
            Error::Api { .. } => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http { response, body } => match body {
                Some(body) => write!(f, "HTTP {} error: {}", response.status.as_u16(), body),
                None => write!(f, "HTTP {} error", response.status.as_u16()),
            },
            Error::Api { errors, .. } => {
                let info = serde_json::to_string_pretty(errors)
                    .unwrap_or_else(|_| errors.to_string());
                write!(f, "{}", info)
            }
        }
    }
}

impl std::error::Error for Error {}
