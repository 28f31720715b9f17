#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Single-page HTTP fetcher for third-party JSON APIs.
//!
//! Provides the [`PageFetcher`] trait and [`HttpPageFetcher`], a
//! [`reqwest`]-backed implementation. Every call is a single attempt: there
//! is no retry or backoff here, a failed page is reported to the caller as a
//! [`FetchError`] and the caller decides what to do with it.

use std::collections::BTreeMap;

/// Maximum length of the response body kept on a [`FetchError::Status`].
const BODY_PREVIEW_LEN: usize = 500;

/// Errors that can occur while fetching a page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The server answered with something other than `200 OK`.
    #[error("status code {status} from {endpoint}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
        /// Endpoint that was requested.
        endpoint: String,
    },

    /// The request never produced a response (DNS, connect, timeout, reset).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        /// Endpoint that was requested.
        endpoint: String,
        /// Underlying client error.
        source: reqwest::Error,
    },

    /// The response body was not valid JSON.
    #[error("response from {endpoint} is not valid JSON: {source}")]
    Decode {
        /// Endpoint that was requested.
        endpoint: String,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// A configured header could not be encoded.
    #[error("invalid header '{name}': {message}")]
    InvalidHeader {
        /// Header name as configured.
        name: String,
        /// What was wrong with it.
        message: String,
    },
}

/// Fetches one page of records from a source API.
///
/// Implementations issue exactly one request per call and return the parsed
/// JSON body, which may be a bare array or an envelope object.
pub trait PageFetcher: Send + Sync {
    /// Fetches `endpoint` with the given headers.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on a non-200 status, a transport failure, or a
    /// body that is not JSON.
    fn fetch_page(
        &self,
        endpoint: &str,
        headers: &BTreeMap<String, String>,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, FetchError>> + Send;
}

/// [`PageFetcher`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    /// Creates a fetcher with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher around an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Converts configured headers into a [`reqwest::header::HeaderMap`].
///
/// # Errors
///
/// Returns [`FetchError::InvalidHeader`] if a name or value is not a valid
/// HTTP header.
pub fn build_header_map(
    headers: &BTreeMap<String, String>,
) -> Result<reqwest::header::HeaderMap, FetchError> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            FetchError::InvalidHeader {
                name: key.clone(),
                message: e.to_string(),
            }
        })?;
        let val = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            FetchError::InvalidHeader {
                name: key.clone(),
                message: e.to_string(),
            }
        })?;
        header_map.insert(name, val);
    }
    Ok(header_map)
}

/// Truncates a response body for inclusion in an error.
fn body_preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_owned();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Builds the error for a non-200 response. An unreadable body is passed
/// in as empty so the status is still reported.
fn status_error(status: reqwest::StatusCode, body: &str, endpoint: &str) -> FetchError {
    FetchError::Status {
        status: status.as_u16(),
        body: body_preview(body),
        endpoint: endpoint.to_owned(),
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        endpoint: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, FetchError> {
        let header_map = build_header_map(headers)?;

        log::debug!("GET {endpoint}");

        let transport = |source| FetchError::Transport {
            endpoint: endpoint.to_owned(),
            source,
        };

        let response = self
            .client
            .get(endpoint)
            .headers(header_map)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text, endpoint));
        }

        let text = response.text().await.map_err(transport)?;
        serde_json::from_str(&text).map_err(|source| FetchError::Decode {
            endpoint: endpoint.to_owned(),
            source,
        })
    }
}
