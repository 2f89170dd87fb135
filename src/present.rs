// SPDX-License-Identifier: MIT
//! Presentation capability — the consumed panel/busy-indicator surface.
//!
//! The guard owns every decision; the presenter only renders what it is
//! handed and forwards the user's resolution back as
//! [`HostEvent::PanelResolved`](crate::host::HostEvent::PanelResolved). It
//! never reads session state.

use async_trait::async_trait;
use std::time::Duration;

use crate::detector::{DetectedField, Detection};
use crate::host::NodeId;
use crate::policy::{FieldGroup, Verdict};

/// Where the analyzed content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOrigin {
    UserMessage,
    AssistantReply,
    FileUpload { label: String },
}

impl std::fmt::Display for PanelOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PanelOrigin::UserMessage => write!(f, "user"),
            PanelOrigin::AssistantReply => write!(f, "assistant"),
            PanelOrigin::FileUpload { label } => write!(f, "file:{label}"),
        }
    }
}

/// Which inline-marker layer a highlight belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightLayer {
    User,
    Assistant,
}

/// Everything the panel needs to render one decision.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub origin: PanelOrigin,
    /// The analyzed text (or a display name for file uploads).
    pub excerpt: String,
    /// Wall time the evaluation took, when measured.
    pub duration: Option<Duration>,
    pub verdict: Verdict,
    /// Findings bucketed and ordered for display (high tier first).
    pub groups: Vec<FieldGroup>,
}

/// How a busy indicator ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyOutcome {
    /// Analysis finished with nothing flagged.
    Clean,
    /// Analysis finished with this many findings.
    Findings(usize),
    /// Analysis could not complete — shown as a transient failure notice.
    Failed,
}

/// User response to a decision panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelResolution {
    /// Send the original content despite the block.
    AcceptAnyway,
    /// Substitute the backend's sanitized text, then send.
    SendSanitized,
    /// Drop the pending action entirely.
    Dismiss,
}

/// Rendering surface implemented by the embedder.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Show the decision panel. Blocking verdicts require an explicit
    /// resolution; warn/report panels are dismiss-only.
    async fn show_decision(&self, detection: &Detection, ctx: DecisionContext);

    /// Hide the decision panel.
    async fn hide(&self);

    /// Show the busy indicator with a message.
    async fn show_busy(&self, message: &str);

    /// Update the busy indicator (streaming progress).
    async fn update_busy(&self, message: &str);

    /// Hide the busy indicator, noting how the work ended.
    async fn hide_busy(&self, outcome: BusyOutcome);

    /// Mark detected values inline on `target`.
    async fn apply_highlights(&self, target: NodeId, fields: &[DetectedField], layer: HighlightLayer);

    /// Remove inline markers on one layer.
    async fn clear_highlights(&self, layer: HighlightLayer);
}
