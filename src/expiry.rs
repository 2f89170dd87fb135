// SPDX-License-Identifier: MIT
//! Time-boxed one-shot bypass tokens.
//!
//! The submission gate marks its own programmatic resend so that exactly one
//! echoed gesture is swallowed instead of re-gated. Instead of ad hoc timer
//! resets, the mark is an [`ExpiringToken`]: armed with a deadline, queried
//! as active only before that deadline, and consumed at most once. The clock
//! is injected so tests can drive expiry without real waiting.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of monotonic time. Production code uses [`SystemClock`]; tests
/// substitute a manually advanced clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A bypass flag that deactivates itself at a deadline.
///
/// Cheaply cloneable — all clones share the same deadline via `Arc`.
#[derive(Clone)]
pub struct ExpiringToken {
    deadline: Arc<Mutex<Option<Instant>>>,
    clock: Arc<dyn Clock>,
}

impl ExpiringToken {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            deadline: Arc::new(Mutex::new(None)),
            clock,
        }
    }

    /// Arm the token for `window` from now. Re-arming extends the deadline.
    pub fn arm(&self, window: Duration) {
        let mut deadline = self.deadline.lock().expect("expiry lock poisoned");
        *deadline = Some(self.clock.now() + window);
    }

    /// Whether the token is currently active (armed and not yet expired).
    ///
    /// Does not consume the token.
    pub fn is_active(&self) -> bool {
        let deadline = self.deadline.lock().expect("expiry lock poisoned");
        matches!(*deadline, Some(d) if self.clock.now() < d)
    }

    /// Consume the token: returns `true` if it was active, and clears it so
    /// the next query sees it inactive. The one-shot semantics of the
    /// override bypass.
    pub fn consume(&self) -> bool {
        let mut deadline = self.deadline.lock().expect("expiry lock poisoned");
        let active = matches!(*deadline, Some(d) if self.clock.now() < d);
        *deadline = None;
        active
    }

    /// Disarm without consuming.
    pub fn clear(&self) {
        let mut deadline = self.deadline.lock().expect("expiry lock poisoned");
        *deadline = None;
    }
}

impl std::fmt::Debug for ExpiringToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringToken")
            .field("active", &self.is_active())
            .finish()
    }
}
