//! Error taxonomy for the fetch engine.
//!
//! Each layer gets its own `thiserror`-derived enum. Decode failures are
//! deliberately *not* represented here: they are recovered locally into an
//! empty `indicators` vector plus a logged diagnostic and never escape the
//! worker as a `Result::Err` (see [`crate::summary_card::decode_card`]).

use std::path::PathBuf;

use bytes::Bytes;

/// Errors constructing or overriding [`crate::config::FetchOptions`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was present but could not be parsed as the expected type.
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnvValue {
        /// Name of the environment variable.
        var: &'static str,
        /// The raw, unparsable value that was read.
        value: String,
    },
}

/// Errors rejecting candidate URLs during intake (§4.G).
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The URL was empty.
    #[error("empty URL")]
    Empty,
    /// The URL's scheme was not `http`, `https`, or `ftp`.
    #[error("unsupported scheme in {0:?}")]
    UnsupportedScheme(String),
}

/// Transport-level failures observed while performing one HTTP attempt.
///
/// `is_retryable` implements the §4.D "retryable set" classification used by
/// the worker's retry loop: timeout, DNS/connect failure, recv error, send
/// error, and empty response are retried; everything else (including HTTP
/// status and protocol errors) is not.
///
/// There is no separate `Dns` variant: `reqwest`'s own classification
/// (`Error::is_connect`) does not distinguish DNS resolution failures from
/// TCP/TLS connect failures — both happen inside the same connect phase and
/// surface through the same error kind — so DNS failures are classified as
/// [`TransportError::Connect`], which is retryable either way.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request timed out.
    #[error("request timed out")]
    Timeout,
    /// The TCP/TLS connection could not be established, including DNS
    /// resolution failures (see the type-level doc comment).
    #[error("connect failed: {0}")]
    Connect(String),
    /// An error occurred while receiving the response body.
    #[error("recv error: {0}")]
    Recv(String),
    /// An error occurred while sending the request.
    #[error("send error: {0}")]
    Send(String),
    /// The response body was empty.
    #[error("empty response")]
    EmptyResponse,
    /// The response's HTTP status was outside the 2xx range.
    #[error("http status {0}")]
    HttpStatus(reqwest::StatusCode),
    /// The response body did not start with `{` or `[`. The body bytes are
    /// retained (not decoded) so the card can keep a non-empty `raw_body`
    /// per §8 boundary scenario 7.
    #[error("invalid JSON: body does not start with '{{' or '['")]
    InvalidJson(Bytes),
    /// Any other `reqwest` error not classified above.
    #[error("transport error: {0}")]
    Other(#[from] reqwest::Error),
}

impl TransportError {
    /// Classifies this error per the §4.D / §7 retryable set.
    ///
    /// HTTP status errors and protocol errors (empty body, invalid JSON) are
    /// permanent by design: the spec retries only transient transport
    /// faults, never status errors or malformed-but-successfully-received
    /// bodies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::Connect(_)
                | TransportError::Recv(_)
                | TransportError::Send(_)
                | TransportError::EmptyResponse
        )
    }

    pub(crate) fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Recv(err.to_string())
        } else if err.is_request() {
            TransportError::Send(err.to_string())
        } else {
            TransportError::Other(err)
        }
    }
}

/// Errors surfaced while probing for a readable CA bundle (§6).
#[derive(Debug, thiserror::Error)]
pub enum CaBundleError {
    /// None of the candidate paths were readable; the library default applies.
    #[error("no readable CA bundle found among {0:?}; falling back to built-in roots")]
    NoneFound(Vec<PathBuf>),
}

/// Top-level error for coordinator setup (not for individual fetch failures,
/// which never propagate past the worker that saw them — see §7).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No URLs were loaded before calling `run()`.
    #[error("no URLs loaded")]
    NoUrls,
    /// The HTTP client template could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
