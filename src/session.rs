// SPDX-License-Identifier: MIT
//! Per-page session state shared by the gates and the response monitor.
//!
//! One instance exists per page context and is passed by handle to every
//! component that needs it; there are no ambient globals, and the
//! presentation layer never reads it. The flags encode the outbound→inbound
//! handoff protocol:
//!
//! - `response_pending` is set by the submission gate before it replays a
//!   send, and cleared exactly once by the response monitor when the
//!   matching reply has been analyzed.
//! - `suppress_user_alerts` spans the same window, keeping stale panels for
//!   historical user messages from appearing mid-cycle.
//! - the override token time-boxes the one-shot gating bypass.
//! - `analyzed` / `in_flight` are per-node marks; `begin_in_flight` is the
//!   mutual-exclusion guard that prevents concurrent analysis of one node.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::expiry::{Clock, ExpiringToken};
use crate::host::NodeId;

#[derive(Debug, Default)]
struct SessionInner {
    response_pending: bool,
    suppress_user_alerts: bool,
    analyzed: HashSet<NodeId>,
    in_flight: HashSet<NodeId>,
}

/// Shared session state. Cheaply cloneable — all clones share the same
/// interior via `Arc`.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<Mutex<SessionInner>>,
    override_token: ExpiringToken,
}

impl SessionState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner::default())),
            override_token: ExpiringToken::new(clock),
        }
    }

    // ─── Override bypass ──────────────────────────────────────────────────

    /// Arm the one-shot gating bypass for `window`.
    pub fn arm_override(&self, window: Duration) {
        self.override_token.arm(window);
    }

    /// Whether the bypass is currently active (does not consume it).
    pub fn override_active(&self) -> bool {
        self.override_token.is_active()
    }

    /// Consume the bypass: true if it was active, and it is now spent.
    pub fn consume_override(&self) -> bool {
        self.override_token.consume()
    }

    // ─── Response-pending window ──────────────────────────────────────────

    pub fn set_response_pending(&self, pending: bool) {
        self.lock().response_pending = pending;
    }

    pub fn response_pending(&self) -> bool {
        self.lock().response_pending
    }

    pub fn set_suppress_user_alerts(&self, suppress: bool) {
        self.lock().suppress_user_alerts = suppress;
    }

    pub fn suppress_user_alerts(&self) -> bool {
        self.lock().suppress_user_alerts
    }

    // ─── Per-node marks ───────────────────────────────────────────────────

    /// Mark a node analyzed. Returns true if this was the first mark.
    pub fn mark_analyzed(&self, node: NodeId) -> bool {
        self.lock().analyzed.insert(node)
    }

    pub fn has_analyzed(&self, node: NodeId) -> bool {
        self.lock().analyzed.contains(&node)
    }

    /// Enter a node into the in-flight set. Returns false when it is
    /// already present — the dedupe guarantee concurrent analyzers rely on.
    pub fn begin_in_flight(&self, node: NodeId) -> bool {
        self.lock().in_flight.insert(node)
    }

    pub fn is_in_flight(&self, node: NodeId) -> bool {
        self.lock().in_flight.contains(&node)
    }

    pub fn end_in_flight(&self, node: NodeId) {
        self.lock().in_flight.remove(&node);
    }

    /// Drop every mark for a node that left the document. The registry must
    /// not retain identities past removal.
    pub fn evict(&self, node: NodeId) {
        let mut inner = self.lock();
        inner.analyzed.remove(&node);
        inner.in_flight.remove(&node);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().expect("session lock poisoned")
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionState")
            .field("response_pending", &inner.response_pending)
            .field("suppress_user_alerts", &inner.suppress_user_alerts)
            .field("analyzed", &inner.analyzed.len())
            .field("in_flight", &inner.in_flight.len())
            .field("override_active", &self.override_token.is_active())
            .finish()
    }
}
