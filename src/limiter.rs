//! Global token-bucket rate limiter shared across all workers (§4.B).

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Sentinel rate above which `acquire()` is a no-op: an explicit
/// "effectively unlimited" fast path (§4.B).
const UNLIMITED_THRESHOLD: f64 = 1000.0;

struct State {
    tokens: f64,
    last_refill: Instant,
}

/// Capacity-`rate`, refill-rate-`rate` admission controller. Bucket capacity
/// equals `rate` (one second of burst), per §4.B.
pub struct TokenBucket {
    rate: f64,
    state: Mutex<State>,
}

impl TokenBucket {
    pub fn new(rate: f64) -> Self {
        TokenBucket {
            rate,
            state: Mutex::new(State {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks until at least one token is available, then deducts one.
    pub async fn acquire(&self) {
        if self.rate >= UNLIMITED_THRESHOLD {
            return;
        }

        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.rate);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }

                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };

            tokio::time::sleep(wait).await;
        }
    }
}
