// SPDX-License-Identifier: MIT
//! Host-page abstraction — the Site Adapter capability.
//!
//! The guard never holds DOM references. The embedding host assigns each
//! tracked element a stable opaque [`NodeId`], raises [`HostEvent`]s for
//! gestures and mutations, and answers structural queries through a
//! [`SiteAdapter`]. Adding support for a new chat site means registering one
//! more adapter — the gating logic never changes.
//!
//! Contract notes:
//! - The host suppresses a commit gesture *before* raising
//!   [`HostEvent::CommitGesture`]; the gate decides whether to replay it via
//!   [`SiteAdapter::trigger_send`].
//! - `trigger_send` and [`SiteAdapter::accept_files`] are programmatic
//!   primitives. A host that cannot avoid re-observing them may raise the
//!   echo as a fresh event; the gates mark their own replays (one-shot
//!   override token, per-input bypass) and swallow the echo.
//! - The host must raise [`HostEvent::NodeRemoved`] when a tracked element
//!   leaves the document so per-node state can be evicted.
//! - Pre-existing messages should be announced with an initial
//!   [`HostEvent::NodesAdded`] batch at startup.

pub mod registry;

use crate::present::PanelResolution;

pub use registry::AdapterRegistry;

/// Stable synthetic identity for a host element. Assigned once by the host,
/// never reused while the element is in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Who authored a message node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAuthor {
    User,
    Assistant,
    Unknown,
}

/// A file the user selected for upload, captured by the host.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Lower-cased extension, or empty when the name has none.
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
            _ => String::new(),
        }
    }
}

/// Events the host feeds into the guard engine.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A suppressed commit gesture: primary-key commit without modifier, or
    /// activation of the send control.
    CommitGesture {
        composer: NodeId,
        control: Option<NodeId>,
    },
    /// Elements appeared in the document (initial scan or live mutation).
    NodesAdded(Vec<NodeId>),
    /// A tracked element's subtree changed (streaming reply progress).
    NodeContentChanged(NodeId),
    /// A tracked element left the document.
    NodeRemoved(NodeId),
    /// A suppressed native file selection on a file input.
    FilesSelected {
        input: NodeId,
        files: Vec<FileUpload>,
    },
    /// The user resolved a decision panel.
    PanelResolved(PanelResolution),
}

/// Structural knowledge about the active chat site.
///
/// Implementations are site-specific; the guard components consume exactly
/// this surface. All queries are synchronous — they reflect the host's
/// current view, not network state.
pub trait SiteAdapter: Send + Sync {
    /// Short identifier, e.g. `"chatgpt"`.
    fn name(&self) -> &str;

    /// The editable element where the user drafts a message, if present.
    fn find_composer(&self) -> Option<NodeId>;

    /// Current plain text of the composer.
    fn composer_text(&self, composer: NodeId) -> String;

    /// Replace the composer's text (used for sanitized resends).
    fn set_composer_text(&self, composer: NodeId, text: &str);

    /// The element whose activation submits the composer, if present.
    fn find_send_control(&self) -> Option<NodeId>;

    /// Whether `node` is the send control.
    fn is_send_control(&self, node: NodeId) -> bool;

    /// Enable or disable the send control. The gate guarantees a matching
    /// re-enable on every exit path.
    fn set_send_enabled(&self, control: NodeId, enabled: bool);

    /// Replay the send: activate the control, or synthesize the commit
    /// gesture on the composer when no control is available.
    fn trigger_send(&self, composer: NodeId, control: Option<NodeId>);

    /// Whether `node` is a message container.
    fn is_message_node(&self, node: NodeId) -> bool;

    /// Authorship of a message node.
    fn message_author(&self, node: NodeId) -> MessageAuthor;

    /// The content element inside an assistant message host.
    fn reply_content(&self, host: NodeId) -> Option<NodeId>;

    /// Plain text of a node's subtree.
    fn extract_text(&self, node: NodeId) -> String;

    /// Re-inject an accepted file list into a file input and replay the
    /// native selection event.
    fn accept_files(&self, input: NodeId, files: &[FileUpload]);

    /// Whether the host currently has gesture listeners wired to the
    /// composer/control.
    fn gate_attached(&self) -> bool;

    /// (Re)wire gesture listeners. Idempotent; called by the monitor when it
    /// sees a composer without an attached gate (self-healing after page
    /// navigation or re-render).
    fn attach_gate(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let f = FileUpload::new("Report.PDF", vec![]);
        assert_eq!(f.extension(), "pdf");
    }

    #[test]
    fn extension_handles_dotless_and_hidden_names() {
        assert_eq!(FileUpload::new("README", vec![]).extension(), "");
        assert_eq!(FileUpload::new(".env", vec![]).extension(), "");
        assert_eq!(FileUpload::new("archive.tar.gz", vec![]).extension(), "gz");
    }

    #[test]
    fn node_id_displays_compactly() {
        assert_eq!(NodeId(7).to_string(), "node#7");
    }
}
