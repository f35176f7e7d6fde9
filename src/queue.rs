//! The shared work queue handing URLs out to workers (§4.C).

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};

struct State {
    items: VecDeque<String>,
    closed: bool,
}

/// A FIFO of URL strings with a single "producer closed" flag.
///
/// Filled entirely, then closed, then workers start — this simplifies
/// shutdown: workers exit exactly when they observe an empty closed queue.
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Pushes one URL. Only called before workers start (no contention
    /// under the normal path).
    pub async fn push(&self, url: String) {
        let mut state = self.state.lock().await;
        state.items.push_back(url);
        self.notify.notify_one();
    }

    /// Marks the queue closed: once empty, all blocked consumers wake with
    /// `None` instead of waiting forever.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        self.notify.notify_waiters();
    }

    /// Blocks until either an item is available or the queue is closed and
    /// empty.
    pub async fn pop_or_close(&self) -> Option<String> {
        loop {
            // Register for notification *before* checking state, so a
            // push/close racing in between is not missed (tokio::Notify's
            // documented pattern for avoiding lost wakeups).
            let notified = self.notify.notified();

            {
                let mut state = self.state.lock().await;
                if let Some(url) = state.items.pop_front() {
                    return Some(url);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
