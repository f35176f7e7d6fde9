//! OpenTelemetry instrumentation for the fetch engine (§4.J).
//!
//! Only compiled when the `opentelemetry-metrics` feature is enabled. Tags
//! measurements by URL host rather than operation name, since every
//! operation here is the same one (fetch one indicator page).

use opentelemetry::metrics::{Counter, Histogram};

/// Histogram of fetch latency and a counter of retries, both tagged by host.
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Histogram of per-fetch latency in milliseconds, tagged by host.
    pub fetch_latency: Histogram<f64>,
    /// Counter of retry attempts, tagged by host.
    pub retry_count: Counter<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Initializes metrics instruments using the global OpenTelemetry meter
    /// under the `ca_dashboard_fetch` namespace.
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("ca_dashboard_fetch");

        let fetch_latency = meter
            .f64_histogram("ca_dashboard_fetch_latency_ms")
            .with_description("Latency of one indicator page fetch, in milliseconds")
            .build();

        let retry_count = meter
            .u64_counter("ca_dashboard_fetch_retry_count")
            .with_description("Total number of retries made across all workers")
            .build();

        Metrics {
            fetch_latency,
            retry_count,
        }
    }

    /// Records one completed fetch's latency, tagged by the request's host.
    pub fn record_fetch(&self, host: &str, latency_ms: f64) {
        self.fetch_latency.record(
            latency_ms,
            &[opentelemetry::KeyValue::new("host", host.to_string())],
        );
    }

    /// Increments the retry counter for the given host.
    pub fn increment_retry(&self, host: &str) {
        self.retry_count
            .add(1, &[opentelemetry::KeyValue::new("host", host.to_string())]);
    }
}

static HOST_METRICS: std::sync::OnceLock<Metrics> = std::sync::OnceLock::new();

/// The process-wide metrics instance, lazily initialized against whatever
/// global OpenTelemetry meter provider is installed at first use.
pub fn host_metrics() -> &'static Metrics {
    HOST_METRICS.get_or_init(Metrics::new)
}
