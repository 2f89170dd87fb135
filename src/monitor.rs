// SPDX-License-Identifier: MIT
//! Response monitor — correlates assistant replies with released sends and
//! scans historical user messages.
//!
//! The monitor consumes node lifecycle events from the host. Assistant
//! replies are only analyzed inside the response-pending window opened by
//! the submission gate, and only once the reply has stopped streaming (a
//! quiet period with a hard cap). Exactly one analysis closes the window.
//!
//! User-authored nodes already in the transcript are scanned informationally
//! on first sight, unless the suppression flag is up — the gate already
//! handled the in-flight message, so a second panel for it would be noise.
//!
//! Monitoring never gates anything: verdicts here produce panels and inline
//! highlights only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::host::{MessageAuthor, NodeId};
use crate::policy;
use crate::present::{DecisionContext, HighlightLayer, PanelOrigin};
use crate::stability::StabilityGate;
use crate::GuardContext;

/// Inbound-side monitor. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct ResponseMonitor {
    ctx: GuardContext,
    /// One quiet-period tracker per streaming reply node.
    stability: Arc<Mutex<HashMap<NodeId, StabilityGate>>>,
}

impl ResponseMonitor {
    pub fn new(ctx: GuardContext) -> Self {
        Self {
            ctx,
            stability: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Inspect a node that appeared in the transcript.
    pub async fn observe_node(&self, node: NodeId) {
        self.ensure_attached();
        if !self.ctx.adapter.is_message_node(node) {
            return;
        }
        match self.ctx.adapter.message_author(node) {
            MessageAuthor::Assistant => self.analyze_assistant(node).await,
            MessageAuthor::User => self.analyze_user(node).await,
            MessageAuthor::Unknown => {}
        }
    }

    /// A node's subtree changed: feed the quiet-period tracker and, if the
    /// node has not been analyzed yet, give it another look. Replies that
    /// were skipped while too short are retried here once they grow.
    pub async fn content_changed(&self, node: NodeId) {
        if let Some(gate) = self.stability.lock().expect("stability lock poisoned").get(&node) {
            gate.touch();
            return;
        }
        self.observe_node(node).await;
    }

    /// Forget a node that left the document. Identity must not outlive the
    /// node, so the same slot re-added later starts clean.
    pub fn evict(&self, node: NodeId) {
        self.ctx.session.evict(node);
        self.stability
            .lock()
            .expect("stability lock poisoned")
            .remove(&node);
    }

    /// Re-attach the gesture hook after a host re-render drops it.
    fn ensure_attached(&self) {
        if self.ctx.adapter.find_composer().is_some() && !self.ctx.adapter.gate_attached() {
            info!(site = self.ctx.adapter.name(), "gate hook missing — re-attaching");
            self.ctx.adapter.attach_gate();
        }
    }

    async fn analyze_assistant(&self, node: NodeId) {
        if self.ctx.session.has_analyzed(node) || self.ctx.session.is_in_flight(node) {
            return;
        }
        // Only correlate replies we caused; everything else predates us or
        // belongs to another tab's session.
        if !self.ctx.session.response_pending() {
            return;
        }
        if !self.ctx.session.begin_in_flight(node) {
            return;
        }

        // Wait for the streamed reply to settle: a quiet period with no
        // content mutations, bounded by a hard cap.
        let gate = {
            let mut map = self.stability.lock().expect("stability lock poisoned");
            map.entry(node).or_insert_with(StabilityGate::new).clone()
        };
        gate.wait_capped(
            self.ctx.config.stability_idle(),
            self.ctx.config.stability_cap(),
        )
        .await;
        self.stability
            .lock()
            .expect("stability lock poisoned")
            .remove(&node);

        let Some(content) = self.ctx.adapter.reply_content(node) else {
            // No extractable body yet; leave the node unmarked so a later
            // mutation retries.
            debug!(%node, "reply has no content node — deferring");
            self.ctx.session.end_in_flight(node);
            return;
        };
        let text = self.ctx.adapter.extract_text(content).trim().to_string();
        if text.len() < self.ctx.config.min_reply_chars {
            debug!(%node, len = text.len(), "reply too short — deferring");
            self.ctx.session.end_in_flight(node);
            return;
        }

        let started = Instant::now();
        match self.ctx.detector.analyze_text(&text).await {
            Ok(detection) => {
                let flagged = detection.has_findings() || detection.risk_level.is_flagged();
                info!(
                    %node,
                    risk = ?detection.risk_level,
                    findings = detection.detected_fields.len(),
                    "assistant reply analyzed"
                );
                if flagged {
                    let groups = policy::group_fields(&detection, &text, &self.ctx.severity);
                    self.ctx
                        .presenter
                        .show_decision(
                            &detection,
                            DecisionContext {
                                origin: PanelOrigin::AssistantReply,
                                excerpt: text.clone(),
                                duration: Some(started.elapsed()),
                                verdict: policy::decide(&detection, false),
                                groups,
                            },
                        )
                        .await;
                    self.ctx
                        .presenter
                        .apply_highlights(
                            content,
                            &detection.detected_fields,
                            HighlightLayer::Assistant,
                        )
                        .await;
                }
            }
            Err(e) => {
                warn!(%node, err = %e, "reply analysis failed");
            }
        }

        // Close out the cycle in a fixed order, on success and failure
        // alike: the reply is spent either way, and a stuck pending window
        // would mute user-side alerts forever.
        self.ctx.session.mark_analyzed(node);
        self.ctx.session.end_in_flight(node);
        self.ctx.session.set_response_pending(false);
        self.ctx.session.set_suppress_user_alerts(false);
    }

    async fn analyze_user(&self, node: NodeId) {
        if self.ctx.session.suppress_user_alerts() {
            // The gate already decided on the in-flight message.
            return;
        }
        if self.ctx.session.has_analyzed(node) || self.ctx.session.is_in_flight(node) {
            return;
        }
        if !self.ctx.session.begin_in_flight(node) {
            return;
        }

        let text = self.ctx.adapter.extract_text(node).trim().to_string();
        if text.is_empty() {
            self.ctx.session.end_in_flight(node);
            return;
        }

        let started = Instant::now();
        match self.ctx.detector.analyze_text(&text).await {
            Ok(detection) => {
                // Marked only on success so a transient failure can retry.
                self.ctx.session.mark_analyzed(node);
                if detection.has_findings() || detection.risk_level.is_flagged() {
                    info!(
                        %node,
                        risk = ?detection.risk_level,
                        findings = detection.detected_fields.len(),
                        "historical user message flagged"
                    );
                    let groups = policy::group_fields(&detection, &text, &self.ctx.severity);
                    self.ctx
                        .presenter
                        .show_decision(
                            &detection,
                            DecisionContext {
                                origin: PanelOrigin::UserMessage,
                                excerpt: text,
                                duration: Some(started.elapsed()),
                                verdict: policy::decide(&detection, false),
                                groups,
                            },
                        )
                        .await;
                    self.ctx
                        .presenter
                        .apply_highlights(node, &detection.detected_fields, HighlightLayer::User)
                        .await;
                }
            }
            Err(e) => {
                warn!(%node, err = %e, "user message scan failed");
            }
        }
        self.ctx.session.end_in_flight(node);
    }
}
