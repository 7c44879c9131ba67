//! The delivery transport seam and its HTTP implementation.
//!
//! `BookingSink` is the trait the orchestrator and retry loop are written
//! against; tests substitute scripted implementations the same way the rest
//! of the crate fakes its collaborators. `HttpSink` is the production
//! implementation: one POST per attempt, bounded timeout, and outcome
//! classification that decides retryability.
//!
//! Classification rules:
//! - request timeout → `Timeout` (retryable)
//! - other transport failures → `Network` (retryable)
//! - HTTP 5xx → `ServerError` (retryable)
//! - HTTP 4xx → `ClientError` (terminal)
//! - HTTP 2xx with a body that fails to parse as JSON is still accepted as
//!   an opaque message - unless it looks like a markup error page, which is
//!   escalated to `UnexpectedFormat` (terminal) instead of being mistaken
//!   for success.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use super::payload::SinkPayload;

/// Header carrying the zero-based attempt counter on each POST. The payload
/// body stays identical across retries; only this header varies.
pub const ATTEMPT_HEADER: &str = "x-relay-attempt";

/// The kind of delivery failure, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    /// The request exceeded the configured timeout.
    Timeout,

    /// The request failed below HTTP (connect, DNS, reset).
    Network,

    /// The sink answered 5xx.
    ServerError,

    /// The sink answered 4xx; retrying the same payload cannot succeed.
    ClientError,

    /// The sink answered 2xx with a markup error page where structured data
    /// was expected.
    UnexpectedFormat,
}

impl DeliveryErrorKind {
    /// True if a fresh attempt with the same payload may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryErrorKind::Timeout | DeliveryErrorKind::Network | DeliveryErrorKind::ServerError
        )
    }
}

/// A failed delivery attempt.
#[derive(Debug, Clone, Error)]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,

    /// The HTTP status, when the failure happened above the transport.
    pub status: Option<u16>,

    pub message: String,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "delivery failed (HTTP {}): {}", status, self.message),
            None => write!(f, "delivery failed: {}", self.message),
        }
    }
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        DeliveryError {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            DeliveryError::new(DeliveryErrorKind::Timeout, None, err.to_string())
        } else {
            DeliveryError::new(DeliveryErrorKind::Network, None, err.to_string())
        }
    }
}

/// Result type for delivery attempts.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Transport seam for delivering one normalized payload.
///
/// `attempt` is zero-based and purely observational; implementations must
/// not vary the payload by it.
pub trait BookingSink {
    fn deliver(
        &self,
        payload: &SinkPayload,
        attempt: u32,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Production sink: POSTs the payload as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpSink {
    /// Creates a sink for the given URL with a per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpSink {
            client,
            url: url.into(),
            timeout,
        })
    }
}

impl BookingSink for HttpSink {
    async fn deliver(&self, payload: &SinkPayload, attempt: u32) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .header(ATTEMPT_HEADER, attempt.to_string())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DeliveryError::from_transport(&e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| DeliveryError::from_transport(&e))?;

        classify_response(status, &body)
    }
}

/// Classifies a sink response into accepted or a categorized failure.
///
/// Pure so every branch is unit-testable without a server.
pub fn classify_response(status: u16, body: &[u8]) -> Result<()> {
    match status {
        200..=299 => {
            if serde_json::from_slice::<Value>(body).is_ok() {
                return Ok(());
            }
            // Unparseable body: accept it as an opaque message unless it
            // looks like a markup error page served with a 2xx.
            if looks_like_markup(body) {
                return Err(DeliveryError::new(
                    DeliveryErrorKind::UnexpectedFormat,
                    Some(status),
                    "sink returned a markup page instead of structured data",
                ));
            }
            Ok(())
        }
        400..=499 => Err(DeliveryError::new(
            DeliveryErrorKind::ClientError,
            Some(status),
            truncate_body(body),
        )),
        _ => Err(DeliveryError::new(
            DeliveryErrorKind::ServerError,
            Some(status),
            truncate_body(body),
        )),
    }
}

fn looks_like_markup(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}

/// Renders a response body for diagnostics, bounded so a large error page
/// doesn't flood the log.
fn truncate_body(body: &[u8]) -> String {
    const MAX: usize = 256;
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
