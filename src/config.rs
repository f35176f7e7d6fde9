//! Configuration types for fetch engine tuning.
//!
//! This module defines the tunables that control pool size, request
//! timeout, rate limiting, retry behavior, and CA bundle discovery. The
//! primary type is [`FetchOptions`], which bundles everything needed to
//! construct a [`crate::coordinator::FetchCoordinator`].

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for automatic retry behavior when a fetch attempt fails.
///
/// Implements exponential backoff per §4.D: delay doubles on each attempt
/// starting from `base_delay`, with no jitter (the spec's retry timing is
/// asserted on directly in tests, so jitter is left off by default).
#[derive(Clone, Debug, bon::Builder)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first (MAX_RETRIES in §4.D).
    #[builder(default = 3)]
    pub max_retries: usize,
    /// Delay before the first retry; doubles on each subsequent attempt.
    #[builder(default = Duration::from_millis(250))]
    pub base_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl From<RetryOptions> for backon::ExponentialBuilder {
    fn from(options: RetryOptions) -> Self {
        backon::ExponentialBuilder::new()
            .with_factor(2.0)
            .with_min_delay(options.base_delay)
            .with_max_delay(Duration::from_secs(60))
            .with_max_times(options.max_retries.saturating_sub(1))
    }
}

/// The §6 CA bundle search order, first readable path wins.
pub fn default_ca_bundle_search_path() -> Vec<PathBuf> {
    [
        "/etc/ssl/cert.pem",
        "/etc/ssl/certs/ca-certificates.crt",
        "/etc/pki/tls/certs/ca-bundle.crt",
        "/usr/local/etc/openssl/cert.pem",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

/// Aggregates every tunable knob for one fetch run.
///
/// Mirrors the options-struct pattern: a plain data bag constructed via
/// [`bon::Builder`], with a `from_env` escape hatch for deployment-time
/// overrides.
#[derive(Clone, Debug, bon::Builder)]
pub struct FetchOptions {
    /// Number of concurrent workers. Default 50.
    #[builder(default = 50)]
    pub pool_size: usize,
    /// Per-request timeout. Default 10s.
    #[builder(default = Duration::from_millis(10_000))]
    pub timeout: Duration,
    /// Token bucket rate, tokens (requests) per second. Values `>= 1000.0`
    /// hit the limiter's fast path (§4.B) and are effectively unlimited.
    #[builder(default = 1000.0)]
    pub max_requests_per_sec: f64,
    /// Retry policy applied to each worker's fetch attempts.
    #[builder(default)]
    pub retry: RetryOptions,
    /// Candidate CA bundle paths, probed in order; first readable wins.
    #[builder(default = default_ca_bundle_search_path())]
    pub ca_bundle_search_path: Vec<PathBuf>,
    /// User-Agent header sent with every request (§6).
    #[builder(default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
    /// Extra request headers beyond the fixed §6 set, applied to every
    /// worker's client template.
    #[builder(default)]
    pub extra_headers: Vec<(String, String)>,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions::builder().build()
    }
}

impl FetchOptions {
    /// Builds options from environment variable overrides, falling back to
    /// [`FetchOptions::default`] for anything unset.
    ///
    /// Reads:
    /// - `FETCH_POOL_SIZE` (optional, `usize`)
    /// - `FETCH_TIMEOUT_MS` (optional, `u64` milliseconds)
    /// - `FETCH_MAX_RPS` (optional, `f64`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvValue`] if a variable is set but does
    /// not parse, rather than silently falling back or panicking.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut options = FetchOptions::default();

        if let Ok(raw) = std::env::var("FETCH_POOL_SIZE") {
            options.pool_size = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    var: "FETCH_POOL_SIZE",
                    value: raw,
                })?;
        }

        if let Ok(raw) = std::env::var("FETCH_TIMEOUT_MS") {
            let millis: u64 = raw
                .parse()
                .map_err(|_| ConfigError::InvalidEnvValue {
                    var: "FETCH_TIMEOUT_MS",
                    value: raw,
                })?;
            options.timeout = Duration::from_millis(millis);
        }

        if let Ok(raw) = std::env::var("FETCH_MAX_RPS") {
            options.max_requests_per_sec =
                raw.parse().map_err(|_| ConfigError::InvalidEnvValue {
                    var: "FETCH_MAX_RPS",
                    value: raw,
                })?;
        }

        Ok(options)
    }
}
