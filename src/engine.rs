// SPDX-License-Identifier: MIT
//! Guard engine — the event loop tying the components together.
//!
//! The host pushes [`HostEvent`]s into an unbounded channel; the engine
//! dispatches each to the right component on its own task, so a slow
//! detection round-trip never stalls gesture handling or node bookkeeping.
//! Panel resolutions are offered to the submission gate first, then the file
//! gate; a resolution neither claims just closes the informational panel.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::gate::files::FileGate;
use crate::gate::SubmissionGate;
use crate::host::HostEvent;
use crate::monitor::ResponseMonitor;
use crate::GuardContext;

/// Owns the event loop. Construct with [`GuardEngine::new`], hand the
/// returned sender to the host, then drive [`GuardEngine::run`].
pub struct GuardEngine {
    ctx: GuardContext,
    gate: SubmissionGate,
    file_gate: FileGate,
    monitor: ResponseMonitor,
    rx: mpsc::UnboundedReceiver<HostEvent>,
}

impl GuardEngine {
    pub fn new(ctx: GuardContext) -> (Self, mpsc::UnboundedSender<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Self {
            gate: SubmissionGate::new(ctx.clone()),
            file_gate: FileGate::new(ctx.clone()),
            monitor: ResponseMonitor::new(ctx.clone()),
            ctx,
            rx,
        };
        (engine, tx)
    }

    /// Drive the loop until every sender is dropped.
    pub async fn run(mut self) {
        info!(site = self.ctx.adapter.name(), "guard engine started");
        while let Some(event) = self.rx.recv().await {
            self.dispatch(event);
        }
        debug!("host event channel closed — engine stopping");
    }

    fn dispatch(&self, event: HostEvent) {
        match event {
            HostEvent::CommitGesture { composer, control } => {
                let gate = self.gate.clone();
                tokio::spawn(async move {
                    gate.handle_commit(composer, control).await;
                });
            }
            HostEvent::NodesAdded(nodes) => {
                for node in nodes {
                    let monitor = self.monitor.clone();
                    tokio::spawn(async move {
                        monitor.observe_node(node).await;
                    });
                }
            }
            HostEvent::NodeContentChanged(node) => {
                let monitor = self.monitor.clone();
                tokio::spawn(async move {
                    monitor.content_changed(node).await;
                });
            }
            HostEvent::NodeRemoved(node) => {
                self.monitor.evict(node);
            }
            HostEvent::FilesSelected { input, files } => {
                let gate = self.file_gate.clone();
                tokio::spawn(async move {
                    gate.handle_selection(input, files).await;
                });
            }
            HostEvent::PanelResolved(resolution) => {
                let gate = self.gate.clone();
                let file_gate = self.file_gate.clone();
                let presenter = self.ctx.presenter.clone();
                tokio::spawn(async move {
                    if gate.resolve(resolution).await {
                        return;
                    }
                    if file_gate.resolve(resolution).await {
                        return;
                    }
                    // Informational panel (warn or reply report): any
                    // resolution just closes it.
                    debug!(?resolution, "panel resolved with nothing pending");
                    presenter.hide().await;
                });
            }
        }
    }
}
