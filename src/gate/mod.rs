// SPDX-License-Identifier: MIT
//! Submission gate — intercepts the user's send action and applies policy.
//!
//! # State machine (per submission attempt)
//!
//! ```text
//! Idle ──(commit gesture)──► Intercepted ──(non-empty text)──► Evaluating
//!                                 │                                │
//!                          (empty: replay)                 Decided: allow │ warn │ block
//! ```
//!
//! - **allow**: arm the response-pending window, replay the gesture.
//! - **warn**: show a dismiss-only panel, replay after a short fixed delay —
//!   the send is annotated, never held.
//! - **block**: retain the intent, show a blocking panel, wait for an
//!   explicit resolution (send anyway / send sanitized / dismiss).
//!
//! Evaluation failures resolve to allow (fail-open) with a visible failure
//! notice. The send control is borrowed (disabled) for the duration of
//! Evaluating and restored on every exit path. At most one evaluation is in
//! flight per composer; extra gestures arriving meanwhile are coalesced.

pub mod files;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::detector::{Detection, DetectorError, ProgressFn, StreamProgress};
use crate::host::NodeId;
use crate::policy::{self, Verdict};
use crate::present::{BusyOutcome, DecisionContext, HighlightLayer, PanelOrigin, PanelResolution};
use crate::GuardContext;

/// The last blocked submission, retained until the user resolves it.
#[derive(Debug, Clone)]
pub struct PendingIntent {
    pub composer: NodeId,
    pub control: Option<NodeId>,
    pub text: String,
    pub sanitized: Option<String>,
}

#[derive(Default)]
struct GateInner {
    /// Composers with an evaluation in flight — the per-composer mutual
    /// exclusion for commit gestures.
    evaluating: HashSet<NodeId>,
    pending: Option<PendingIntent>,
}

/// Outbound submission gate. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct SubmissionGate {
    ctx: GuardContext,
    inner: Arc<Mutex<GateInner>>,
}

impl SubmissionGate {
    pub fn new(ctx: GuardContext) -> Self {
        Self {
            ctx,
            inner: Arc::new(Mutex::new(GateInner::default())),
        }
    }

    /// Whether a blocked intent is awaiting resolution.
    pub fn has_pending(&self) -> bool {
        self.inner.lock().expect("gate lock poisoned").pending.is_some()
    }

    /// Handle a suppressed commit gesture on the composer.
    pub async fn handle_commit(&self, composer: NodeId, control: Option<NodeId>) {
        // A gesture arriving under the override token is the echo of our
        // own `trigger_send` on a host that re-observes programmatic sends.
        // The send already happened; swallow the echo. The token is
        // one-shot, so the next genuine gesture is gated again.
        if self.ctx.session.consume_override() {
            debug!(%composer, "override active — echoed gesture swallowed");
            return;
        }

        let text = self.ctx.adapter.composer_text(composer);
        if text.trim().is_empty() {
            // Nothing to analyze; replay unmodified. Armed so an echo of
            // the replay is swallowed instead of looping back in.
            self.ctx.session.arm_override(self.ctx.config.replay_grace());
            self.ctx.adapter.trigger_send(composer, control);
            return;
        }

        {
            let mut inner = self.inner.lock().expect("gate lock poisoned");
            if !inner.evaluating.insert(composer) {
                debug!(%composer, "evaluation already in flight — gesture coalesced");
                return;
            }
        }

        let control_ref = control.or_else(|| self.ctx.adapter.find_send_control());
        self.ctx.presenter.show_busy("Analyzing message...").await;
        if let Some(c) = control_ref {
            self.ctx.adapter.set_send_enabled(c, false);
        }

        let started = Instant::now();
        let result = self.evaluate(&text).await;

        // Restore the borrowed control before acting on the verdict — on
        // every path, including failure.
        if let Some(c) = control_ref {
            self.ctx.adapter.set_send_enabled(c, true);
        }
        self.inner
            .lock()
            .expect("gate lock poisoned")
            .evaluating
            .remove(&composer);

        match result {
            Err(e) => {
                warn!(err = %e, "detection failed — allowing send (fail-open)");
                self.ctx.presenter.hide_busy(BusyOutcome::Failed).await;
                self.release(composer, control, self.ctx.config.replay_grace())
                    .await;
            }
            Ok(detection) => {
                self.ctx
                    .presenter
                    .apply_highlights(composer, &detection.detected_fields, HighlightLayer::User)
                    .await;

                let verdict = policy::decide(&detection, false);
                let findings = detection.detected_fields.len();
                let outcome = if findings > 0 {
                    BusyOutcome::Findings(findings)
                } else {
                    BusyOutcome::Clean
                };
                self.ctx.presenter.hide_busy(outcome).await;
                info!(%composer, %verdict, findings, "submission evaluated");

                match verdict {
                    Verdict::Block => {
                        self.hold(composer, control, text, detection, started.elapsed())
                            .await;
                    }
                    Verdict::Warn => {
                        self.annotate(composer, &text, &detection, started.elapsed())
                            .await;
                        tokio::time::sleep(self.ctx.config.warn_release_delay()).await;
                        self.release(composer, control, self.ctx.config.replay_grace())
                            .await;
                    }
                    Verdict::Allow => {
                        self.release(composer, control, self.ctx.config.replay_grace())
                            .await;
                    }
                }
            }
        }
    }

    /// Resolve the decision panel. Returns false when no intent is pending
    /// here (the resolution may belong to the file gate).
    pub async fn resolve(&self, resolution: PanelResolution) -> bool {
        let pending = self.inner.lock().expect("gate lock poisoned").pending.take();
        let Some(intent) = pending else {
            return false;
        };

        match resolution {
            PanelResolution::Dismiss => {
                debug!("blocked submission dismissed");
                self.ctx.presenter.hide().await;
            }
            PanelResolution::AcceptAnyway => {
                info!("user accepted blocked submission");
                self.ctx.presenter.hide().await;
                self.release(intent.composer, intent.control, self.ctx.config.override_grace())
                    .await;
            }
            PanelResolution::SendSanitized => match intent.sanitized {
                Some(sanitized) => {
                    info!("user chose sanitized resend");
                    self.ctx
                        .adapter
                        .set_composer_text(intent.composer, &sanitized);
                    self.ctx.presenter.hide().await;
                    self.release(intent.composer, intent.control, self.ctx.config.override_grace())
                        .await;
                }
                None => {
                    // No sanitized payload available; degrade to dismiss.
                    debug!("sanitized resend requested without sanitized text — dismissing");
                    self.ctx.presenter.hide().await;
                }
            },
        }
        true
    }

    async fn evaluate(&self, text: &str) -> Result<Detection, DetectorError> {
        if !self.ctx.config.streaming {
            return self.ctx.detector.analyze_text(text).await;
        }

        // Progress events funnel through a single forwarding task so busy
        // updates reach the presenter in arrival order, and all of them land
        // before the busy indicator is closed.
        let (tx, mut rx) = mpsc::unbounded_channel::<StreamProgress>();
        let presenter = self.ctx.presenter.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                let message = match p.detected_count {
                    Some(n) => format!("{} {} — {} found so far", p.stage, p.status, n),
                    None => format!("{} {}", p.stage, p.status),
                };
                presenter.update_busy(&message).await;
            }
        });

        let on_progress: ProgressFn = Box::new(move |p: StreamProgress| {
            let _ = tx.send(p);
        });
        let result = self
            .ctx
            .detector
            .analyze_text_streaming(text, on_progress)
            .await;
        // The callback (and its channel sender) is dropped once the call
        // returns, so the forwarder drains the queue and exits.
        let _ = forwarder.await;
        result
    }

    /// Block path: keep the intent and require an explicit resolution.
    async fn hold(
        &self,
        composer: NodeId,
        control: Option<NodeId>,
        text: String,
        detection: Detection,
        duration: Duration,
    ) {
        let groups = policy::group_fields(&detection, &text, &self.ctx.severity);
        {
            let mut inner = self.inner.lock().expect("gate lock poisoned");
            inner.pending = Some(PendingIntent {
                composer,
                control,
                text: text.clone(),
                sanitized: detection.anonymized_text.clone(),
            });
        }
        self.ctx
            .presenter
            .show_decision(
                &detection,
                DecisionContext {
                    origin: PanelOrigin::UserMessage,
                    excerpt: text,
                    duration: Some(duration),
                    verdict: Verdict::Block,
                    groups,
                },
            )
            .await;
    }

    /// Warn path: non-blocking, dismiss-only panel.
    async fn annotate(
        &self,
        _composer: NodeId,
        text: &str,
        detection: &Detection,
        duration: Duration,
    ) {
        let groups = policy::group_fields(detection, text, &self.ctx.severity);
        self.ctx
            .presenter
            .show_decision(
                detection,
                DecisionContext {
                    origin: PanelOrigin::UserMessage,
                    excerpt: text.to_string(),
                    duration: Some(duration),
                    verdict: Verdict::Warn,
                    groups,
                },
            )
            .await;
    }

    /// Release the send: arm the handoff flags, clear inline markers, and
    /// replay the original gesture under a time-boxed override.
    async fn release(&self, composer: NodeId, control: Option<NodeId>, grace: Duration) {
        self.inner.lock().expect("gate lock poisoned").pending = None;
        self.ctx.session.set_response_pending(true);
        self.ctx.session.set_suppress_user_alerts(true);
        self.ctx
            .presenter
            .clear_highlights(HighlightLayer::User)
            .await;
        self.ctx.session.arm_override(grace);
        self.ctx.adapter.trigger_send(composer, control);
        debug!(%composer, grace_ms = grace.as_millis() as u64, "send released");
    }
}
