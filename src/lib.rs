//! Concurrent bulk-fetch client for the CA School Dashboard reporting API.
//!
//! Given a list of per-(school, year) indicator-page URLs, this crate
//! fetches all of them with a bounded pool of workers, rate-limited against
//! a shared token bucket, with exponential-backoff retry on transient
//! transport failures. Each fetch decodes into a [`SummaryCard`] holding the
//! indicator records for that page; an optional enrichment pass stamps
//! external school-name/year metadata onto the results afterward.
//!
//! # Quick start
//!
//! ```no_run
//! use ca_dashboard_fetch::{FetchCoordinator, FetchOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut coordinator = FetchCoordinator::new(FetchOptions::default());
//! coordinator.load_urls(vec![
//!     "https://api.caschooldashboard.org/indicators?cdsCode=001&year=2023".to_string(),
//! ]);
//!
//! let cards = coordinator.run().await?;
//! for card in cards {
//!     println!("{} indicators", card.indicators.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Module layout
//!
//! - [`indicator`] / [`summary_card`]: the record model and its total decoder.
//! - [`limiter`]: the shared token-bucket rate limiter.
//! - [`queue`]: the work queue workers pull URLs from.
//! - [`worker`]: one worker's fetch-retry-decode-write loop.
//! - [`coordinator`]: pool lifecycle, DNS pre-resolve, client template.
//! - [`enrich`]: the optional metadata-stamping post-pass.
//! - [`intake`]: URL validation.
//! - [`collaborators`]: trait seams for roster/matching/URL-building collaborators.
//! - [`config`]: tunables (`FetchOptions`, `RetryOptions`).
//! - [`error`]: the per-layer error taxonomy.
//!
//! # Feature flags
//!
//! - `rustls` (default) - pure-Rust TLS
//! - `native-tls` - system TLS
//! - `opentelemetry-metrics` - fetch latency histogram and retry counter, tagged by host

pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod enrich;
pub mod error;
pub mod indicator;
pub mod intake;
pub mod limiter;
#[cfg(feature = "opentelemetry-metrics")]
pub mod metrics;
pub mod queue;
pub mod summary_card;
pub mod worker;

pub use config::{FetchOptions, RetryOptions};
pub use coordinator::FetchCoordinator;
pub use error::{CaBundleError, ConfigError, FetchError, IntakeError, TransportError};
pub use indicator::{Indicator, IndicatorCategory};
pub use summary_card::SummaryCard;
