//! The fetch coordinator: pool lifecycle, DNS pre-resolve, and the shared
//! HTTP client template every worker builds its own handle from (§4.E).

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::FetchOptions;
use crate::enrich::{self, Meta};
use crate::error::{CaBundleError, FetchError};
use crate::intake;
use crate::limiter::TokenBucket;
use crate::queue::WorkQueue;
use crate::summary_card::SummaryCard;
use crate::worker::{run_worker, ProgressCounters};

/// The fixed request headers from §6, plus any caller-supplied extras.
/// The fixed set is required: the upstream server throttles requests
/// without a browser-shaped identity.
fn request_headers(user_agent: &str, extra: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("user-agent"),
        HeaderValue::from_str(user_agent).expect("user agent is valid header value"),
    );
    headers.insert(
        HeaderName::from_static("referer"),
        HeaderValue::from_static("https://www.caschooldashboard.org/"),
    );
    headers.insert(
        HeaderName::from_static("accept"),
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        HeaderName::from_static("accept-language"),
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(
        HeaderName::from_static("connection"),
        HeaderValue::from_static("keep-alive"),
    );

    for (name, value) in extra {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::warn!(name = %name, "skipping invalid extra header");
            continue;
        };
        headers.insert(name, value);
    }

    headers
}

/// Probes the candidate CA-bundle paths in order, returning the first
/// readable one (§6), or [`CaBundleError::NoneFound`] if none is.
pub fn probe_ca_bundle(candidates: &[PathBuf]) -> Result<PathBuf, CaBundleError> {
    candidates
        .iter()
        .find(|path| std::fs::File::open(path).is_ok())
        .cloned()
        .ok_or_else(|| CaBundleError::NoneFound(candidates.to_vec()))
}

fn load_ca_bundle(path: &Path) -> Option<Vec<reqwest::Certificate>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read CA bundle");
            return None;
        }
    };

    match reqwest::Certificate::from_pem_bundle(&bytes) {
        Ok(certs) => Some(certs),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse CA bundle");
            None
        }
    }
}

/// Resolves `host` once via asynchronous name resolution. Returns `None`
/// (never an error that aborts startup) on failure — workers fall back to
/// per-worker DNS, per §4.E step 4.
async fn resolve_host_once(host: &str) -> Option<IpAddr> {
    match tokio::net::lookup_host((host, 443)).await {
        Ok(mut addrs) => {
            let ip = addrs.next().map(|addr| addr.ip());
            if ip.is_none() {
                tracing::warn!(host, "DNS resolution returned no addresses");
            }
            ip
        }
        Err(err) => {
            tracing::warn!(host, error = %err, "DNS pre-resolve failed, falling back to per-worker DNS");
            None
        }
    }
}

/// The immutable configuration every worker's client is built from. Built
/// once by the coordinator (§4.E steps 1-4) and shared (cheaply cloned) with
/// every worker; never mutated after `FetchCoordinator::run` begins
/// spawning workers.
#[derive(Clone)]
struct ClientTemplate {
    headers: HeaderMap,
    timeout: Duration,
    resolve_override: Option<(String, SocketAddr)>,
    ca_certificates: Vec<reqwest::Certificate>,
    disable_built_in_roots: bool,
}

impl ClientTemplate {
    fn build(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .default_headers(self.headers.clone())
            .timeout(self.timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some((host, addr)) = &self.resolve_override {
            builder = builder.resolve(host, *addr);
        }

        for cert in &self.ca_certificates {
            builder = builder.add_root_certificate(cert.clone());
        }

        if self.disable_built_in_roots {
            builder = builder.tls_built_in_root_certs(false);
        }

        builder.build()
    }
}

/// Owns one fetch run's pool lifecycle: URL intake, client template
/// construction, worker spawn/join, and the resulting output array.
pub struct FetchCoordinator {
    options: FetchOptions,
    urls: Vec<String>,
}

impl FetchCoordinator {
    pub fn new(options: FetchOptions) -> Self {
        FetchCoordinator {
            options,
            urls: Vec::new(),
        }
    }

    /// Accepts candidate URLs (§4.G), returning `true` iff at least one
    /// survived validation.
    pub fn load_urls(&mut self, urls: Vec<String>) -> bool {
        intake::load_urls(urls, &mut self.urls)
    }

    /// Runs one fetch: builds the shared client template, pre-sizes the
    /// output array, fills and closes the queue, spawns `min(pool_size,
    /// |urls|)` workers, and waits for them all to finish (§4.E).
    ///
    /// Returns `Err(FetchError::NoUrls)` if nothing was loaded; individual
    /// fetch failures never make this return an error (§7 propagation
    /// policy) — they are reflected as cards with empty `indicators`.
    pub async fn run(&self) -> Result<Vec<SummaryCard>, FetchError> {
        self.run_to_slots().await
    }

    /// Like [`FetchCoordinator::run`], followed by the optional §4.F
    /// enrichment pass against the supplied metadata table.
    pub async fn run_with_enrichment(&self, meta: Arc<Meta>) -> Result<Vec<SummaryCard>, FetchError> {
        let cards = self.run_to_slots().await?;
        Ok(enrich::enrich(cards, meta).await)
    }

    /// Runs the pool to completion and reclaims the output array as plain
    /// owned [`SummaryCard`]s (§4.E, §9 "shared mutable output").
    ///
    /// Each slot is a [`OnceLock`] claimed by exactly one worker via the
    /// shared `AtomicUsize` counter and written exactly once via
    /// `OnceLock::set` — disjoint by construction, so there is no lock on
    /// the write path. Once every worker has joined, the coordinator is the
    /// sole owner of `output` and reclaims it by value.
    async fn run_to_slots(&self) -> Result<Vec<SummaryCard>, FetchError> {
        if self.urls.is_empty() {
            return Err(FetchError::NoUrls);
        }

        let ca_certificates = match probe_ca_bundle(&self.options.ca_bundle_search_path) {
            Ok(path) => load_ca_bundle(&path).unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "using built-in roots");
                Vec::new()
            }
        };

        let resolve_override = self.resolve_shared_host().await;

        let template = ClientTemplate {
            headers: request_headers(&self.options.user_agent, &self.options.extra_headers),
            timeout: self.options.timeout,
            resolve_override,
            disable_built_in_roots: !ca_certificates.is_empty(),
            ca_certificates,
        };

        let total = self.urls.len();
        let output: Arc<Vec<OnceLock<SummaryCard>>> =
            Arc::new((0..total).map(|_| OnceLock::new()).collect());

        let queue = Arc::new(WorkQueue::new());
        for url in &self.urls {
            queue.push(url.clone()).await;
        }
        queue.close().await;

        let limiter = Arc::new(TokenBucket::new(self.options.max_requests_per_sec));
        let progress = Arc::new(ProgressCounters::new(0, total));
        let retry_policy: backon::ExponentialBuilder = self.options.retry.clone().into();

        let worker_count = self.options.pool_size.min(total).max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let client = template.build()?;
            let queue = queue.clone();
            let limiter = limiter.clone();
            let retry_policy = retry_policy.clone();
            let progress = progress.clone();
            let output = output.clone();
            handles.push(tokio::spawn(run_worker(
                client,
                queue,
                limiter,
                retry_policy,
                progress,
                output,
            )));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }

        Ok(reclaim(output))
    }

    /// Resolves the upstream API host once (§4.E step 4). Any single URL's
    /// host is representative since all fetches target the same API.
    async fn resolve_shared_host(&self) -> Option<(String, SocketAddr)> {
        let host = self
            .urls
            .first()
            .and_then(|url| url::Url::parse(url).ok())
            .and_then(|parsed| parsed.host_str().map(str::to_string))?;

        let ip = resolve_host_once(&host).await?;
        Some((host, SocketAddr::new(ip, 443)))
    }
}

/// Converts the shared, write-once slot array back into plain owned cards.
///
/// By the time this runs every worker task has been joined, so the
/// coordinator's `output` handle is (barring a leaked clone) the only
/// surviving `Arc`; `try_unwrap` reclaims the `Vec<OnceLock<SummaryCard>>`
/// without copying, and `OnceLock::into_inner` unwraps each slot (a slot a
/// worker never reached, e.g. because its task panicked before writing,
/// falls back to an empty card rather than panicking here).
fn reclaim(output: Arc<Vec<OnceLock<SummaryCard>>>) -> Vec<SummaryCard> {
    match Arc::try_unwrap(output) {
        Ok(cells) => cells
            .into_iter()
            .map(|cell| cell.into_inner().unwrap_or_default())
            .collect(),
        Err(shared) => {
            tracing::error!("output array still shared after all workers joined; cloning instead of reclaiming in place");
            shared.iter().map(|cell| cell.get().cloned().unwrap_or_default()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_returns_first_readable_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        let present = dir.path().join("present.pem");
        std::fs::write(&present, b"").unwrap();

        let found = probe_ca_bundle(&[missing, present.clone()]).unwrap();
        assert_eq!(found, present);
    }

    #[test]
    fn probe_returns_none_found_error_when_nothing_readable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        let err = probe_ca_bundle(&[missing.clone()]).unwrap_err();
        assert!(matches!(err, CaBundleError::NoneFound(paths) if paths == vec![missing]));
    }

    #[tokio::test]
    async fn run_without_loaded_urls_returns_no_urls_error() {
        let coordinator = FetchCoordinator::new(FetchOptions::default());
        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, FetchError::NoUrls));
    }

    #[tokio::test]
    async fn run_fills_one_card_per_url_with_disjoint_slots() {
        let server = httpmock::MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method("GET");
                then.status(200).body(r#"[{"indicatorId":1,"primary":{"cdsCode":"X"}}]"#);
            })
            .await;

        let mut coordinator = FetchCoordinator::new(
            FetchOptions::builder().pool_size(4).build(),
        );
        let urls: Vec<String> = (0..10).map(|i| server.url(format!("/school/{i}"))).collect();
        assert!(coordinator.load_urls(urls.clone()));

        let cards = coordinator.run().await.unwrap();
        assert_eq!(cards.len(), urls.len());
        for card in &cards {
            assert_eq!(card.indicators.len(), 1);
        }
    }

    #[tokio::test]
    async fn run_with_enrichment_stamps_matching_cards() {
        let server = httpmock::MockServer::start_async().await;
        let _mock = server
            .mock_async(|when, then| {
                when.method("GET");
                then.status(200)
                    .body(r#"[{"indicatorId":1,"primary":{"cdsCode":"001","schoolYearId":2023}}]"#);
            })
            .await;

        let mut coordinator = FetchCoordinator::new(FetchOptions::default());
        assert!(coordinator.load_urls(vec![server.url("/school/1")]));

        let mut meta = Meta::new();
        meta.insert(("001".to_string(), 2023), ("Lincoln High".to_string(), 2023));

        let cards = coordinator.run_with_enrichment(Arc::new(meta)).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].school_name, "Lincoln High");
        assert_eq!(cards[0].year, 2023);
    }
}
