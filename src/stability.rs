// SPDX-License-Identifier: MIT
//! Content-stability wait — an idle-debounce primitive.
//!
//! A streaming assistant reply mutates its subtree continuously until the
//! backend finishes. Analyzing mid-stream produces partial text, so the
//! response monitor waits until the subtree has been quiet for a fixed idle
//! window. [`StabilityGate`] models that wait: every observed change calls
//! [`StabilityGate::touch`], and [`StabilityGate::wait`] resolves once no
//! touch has arrived for the window. No polling — the waiter sleeps exactly
//! until the earliest possible deadline and re-checks.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Debounce handle for one watched subtree.
///
/// Cheaply cloneable — all clones share the same last-activity timestamp.
#[derive(Clone)]
pub struct StabilityGate {
    last_touch: Arc<Mutex<Instant>>,
}

impl StabilityGate {
    pub fn new() -> Self {
        Self {
            last_touch: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record activity: resets the idle timer.
    pub fn touch(&self) {
        *self.last_touch.lock().expect("stability lock poisoned") = Instant::now();
    }

    /// Resolve once no [`touch`](Self::touch) has occurred for `idle`.
    pub async fn wait(&self, idle: Duration) {
        loop {
            let elapsed = {
                let last = self.last_touch.lock().expect("stability lock poisoned");
                last.elapsed()
            };
            if elapsed >= idle {
                return;
            }
            tokio::time::sleep(idle - elapsed).await;
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `cap` regardless of
    /// ongoing activity, so a reply that never settles cannot wedge a cycle.
    pub async fn wait_capped(&self, idle: Duration, cap: Duration) {
        if tokio::time::timeout(cap, self.wait(idle)).await.is_err() {
            tracing::debug!(cap_ms = cap.as_millis() as u64, "stability wait capped");
        }
    }
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self::new()
    }
}
