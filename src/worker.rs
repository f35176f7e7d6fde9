//! The HTTP worker: persistent client, retry loop, and slot write (§4.D).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use backon::{ExponentialBuilder, Retryable};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::error::TransportError;
use crate::limiter::TokenBucket;
use crate::queue::WorkQueue;
use crate::summary_card::{decode_card, SummaryCard};

#[cfg(feature = "opentelemetry-metrics")]
fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Performs one HTTP attempt: send, check status, stream the body, and
/// validate that it looks like JSON before handing it back for decoding.
/// Does not retry by itself — that's `fetch_into`'s job.
async fn perform_once(client: &reqwest::Client, url: &str) -> Result<Bytes, TransportError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(TransportError::classify)?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::HttpStatus(status));
    }

    let mut buf = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(TransportError::classify)?;
        buf.extend_from_slice(&chunk);
    }

    if buf.is_empty() {
        return Err(TransportError::EmptyResponse);
    }

    match buf.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => Ok(Bytes::from(buf)),
        _ => Err(TransportError::InvalidJson(Bytes::from(buf))),
    }
}

/// Fetches one URL with the §4.D retry policy and decodes the result into a
/// [`SummaryCard`]. Total: always returns a card, the way [`decode_card`] is
/// total — a failed fetch produces a card with empty `indicators` rather
/// than an error that escapes the worker.
pub async fn fetch_into(
    client: &reqwest::Client,
    url: &str,
    retry_policy: &ExponentialBuilder,
) -> SummaryCard {
    let attempt = || async { perform_once(client, url).await };

    #[cfg(feature = "opentelemetry-metrics")]
    let start = std::time::Instant::now();

    let outcome = attempt
        .retry(retry_policy)
        .when(TransportError::is_retryable)
        .notify(|err: &TransportError, delay| {
            tracing::warn!(url, error = %err, ?delay, "retrying after transient transport error");
            #[cfg(feature = "opentelemetry-metrics")]
            crate::metrics::host_metrics().increment_retry(&host_of(url));
        })
        .await;

    #[cfg(feature = "opentelemetry-metrics")]
    crate::metrics::host_metrics().record_fetch(&host_of(url), start.elapsed().as_secs_f64() * 1000.0);

    match outcome {
        Ok(body) => decode_card(body),
        Err(TransportError::InvalidJson(body)) => {
            tracing::warn!(url, "response body does not look like JSON");
            SummaryCard {
                raw_body: body,
                ..SummaryCard::default()
            }
        }
        Err(err) => {
            tracing::error!(url, error = %err, "fetch failed");
            SummaryCard::empty()
        }
    }
}

/// Shared counters the coordinator watches while workers run.
pub struct ProgressCounters {
    pub next_slot: AtomicUsize,
    pub completed: AtomicUsize,
    pub total: usize,
}

impl ProgressCounters {
    pub fn new(base: usize, total: usize) -> Self {
        ProgressCounters {
            next_slot: AtomicUsize::new(base),
            completed: AtomicUsize::new(0),
            total,
        }
    }

    fn log_progress_if_due(&self, completed: usize) {
        let step = (self.total / 400).max(1);
        if completed % step == 0 || completed == self.total {
            tracing::info!(completed, total = self.total, "fetch progress");
        }
    }
}

/// One worker's main loop: drain the queue, rate-limit, claim a lock-free
/// slot, fetch, write, repeat until the queue closes (§4.D).
///
/// Each slot in `output` is a [`OnceLock`]: claimed exactly once via
/// `progress.next_slot.fetch_add`, written exactly once via `OnceLock::set`.
/// No worker ever contends with another for the same slot, so there is
/// nothing to lock — `set` either succeeds immediately or (only under a
/// slot-counter bug) fails loudly rather than silently overwriting a peer's
/// result.
pub async fn run_worker(
    client: reqwest::Client,
    queue: Arc<WorkQueue>,
    limiter: Arc<TokenBucket>,
    retry_policy: ExponentialBuilder,
    progress: Arc<ProgressCounters>,
    output: Arc<Vec<OnceLock<SummaryCard>>>,
) {
    while let Some(url) = queue.pop_or_close().await {
        limiter.acquire().await;

        let slot = progress.next_slot.fetch_add(1, Ordering::SeqCst);
        let card = fetch_into(&client, &url, &retry_policy).await;

        match output.get(slot) {
            Some(cell) => {
                if cell.set(card).is_err() {
                    tracing::error!(slot, "slot already written; dropping duplicate result");
                }
            }
            None => tracing::error!(slot, len = output.len(), "slot index out of bounds"),
        }

        let completed = progress.completed.fetch_add(1, Ordering::SeqCst) + 1;
        progress.log_progress_if_due(completed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryOptions;
    use httpmock::MockServer;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .build()
            .expect("client builds")
    }

    #[tokio::test]
    #[test_log::test]
    async fn successful_fetch_decodes_card() {
        let server = MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/ok");
                then.status(200)
                    .body(r#"[{"indicatorId":1,"primary":{"cdsCode":"X"}}]"#);
            })
            .await;

        let policy: ExponentialBuilder = RetryOptions::default().into();
        let card = fetch_into(&client(), &server.url("/ok"), &policy).await;
        assert_eq!(card.indicators.len(), 1);
    }

    #[tokio::test]
    #[test_log::test]
    async fn invalid_json_body_is_retained_but_not_decoded() {
        let server = MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/bad");
                then.status(200).body("<html>nope</html>");
            })
            .await;

        let policy: ExponentialBuilder = RetryOptions::default().into();
        let card = fetch_into(&client(), &server.url("/bad"), &policy).await;
        assert!(card.indicators.is_empty());
        assert!(!card.raw_body.is_empty());
    }

    #[tokio::test]
    #[test_log::test]
    async fn empty_response_is_retried_until_a_real_body_arrives() {
        // Empty response is in the §4.D retryable set, unlike an HTTP
        // status error, so two empty bodies followed by a real one should
        // retry twice and then decode successfully.
        let server = MockServer::start_async().await;
        let call_count = std::sync::Arc::new(StdAtomicUsize::new(0));
        let counter = call_count.clone();
        let _mock = server
            .mock_async(move |when, then| {
                when.method("GET").path("/flaky");
                let counter = counter.clone();
                then.respond_with(move |_| {
                    let attempt = counter.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        httpmock::HttpMockResponse::builder().status(200).body("").build()
                    } else {
                        httpmock::HttpMockResponse::builder()
                            .status(200)
                            .body(r#"[]"#)
                            .build()
                    }
                });
            })
            .await;

        let policy: ExponentialBuilder = RetryOptions {
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(1),
        }
        .into();

        let card = fetch_into(&client(), &server.url("/flaky"), &policy).await;
        assert!(card.indicators.is_empty());
        assert_eq!(card.raw_body.as_ref(), b"[]");
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    #[test_log::test]
    async fn http_status_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let call_count = std::sync::Arc::new(StdAtomicUsize::new(0));
        let counter = call_count.clone();
        let _mock = server
            .mock_async(move |when, then| {
                when.method("GET").path("/broken");
                let counter = counter.clone();
                then.respond_with(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    httpmock::HttpMockResponse::builder().status(500).body("err").build()
                });
            })
            .await;

        let policy: ExponentialBuilder = RetryOptions {
            max_retries: 3,
            base_delay: std::time::Duration::from_millis(1),
        }
        .into();

        let card = fetch_into(&client(), &server.url("/broken"), &policy).await;
        assert!(card.indicators.is_empty());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    /// §8 boundary scenario 10: colors every slot write with the id of the
    /// worker that performed it, using the exact claim-then-`OnceLock::set`
    /// mechanism `run_worker` uses, and asserts no two workers ever claim or
    /// write the same slot.
    #[tokio::test(flavor = "multi_thread")]
    async fn disjoint_slot_claims_are_never_duplicated_across_workers() {
        const WORKER_COUNT: usize = 16;
        const TOTAL: usize = 500;

        let progress = Arc::new(ProgressCounters::new(0, TOTAL));
        let output: Arc<Vec<OnceLock<usize>>> =
            Arc::new((0..TOTAL).map(|_| OnceLock::new()).collect());
        let collisions = Arc::new(StdAtomicUsize::new(0));

        let mut handles = Vec::with_capacity(WORKER_COUNT);
        for worker_id in 0..WORKER_COUNT {
            let progress = progress.clone();
            let output = output.clone();
            let collisions = collisions.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let slot = progress.next_slot.fetch_add(1, Ordering::SeqCst);
                    if slot >= TOTAL {
                        break;
                    }
                    if output[slot].set(worker_id).is_err() {
                        collisions.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(collisions.load(Ordering::SeqCst), 0, "a slot was claimed by more than one worker");
        assert!(output.iter().all(|cell| cell.get().is_some()), "every slot must be written exactly once");
    }
}
