// SPDX-License-Identifier: MIT
//! File upload gate.
//!
//! Mirrors the submission gate for attachment selections: a selection is
//! intercepted, each supported file is analyzed in order, and the batch is
//! either re-injected into the host input or held behind a blocking panel.
//! Selections containing only unsupported file types pass through untouched.
//!
//! Re-injection marks the input with a one-shot bypass so the gate does not
//! re-intercept its own injection. Analysis failures fail open, same as the
//! text path.

use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::detector::Detection;
use crate::host::{FileUpload, NodeId};
use crate::policy::{self, Verdict};
use crate::present::{BusyOutcome, DecisionContext, PanelOrigin, PanelResolution};
use crate::GuardContext;

/// Extension to human-readable kind, for panel labels. Selections whose
/// extensions all fall outside this table are not analyzed.
static SUPPORTED_KINDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for ext in ["pdf"] {
        m.insert(ext, "document");
    }
    for ext in ["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif"] {
        m.insert(ext, "image");
    }
    for ext in ["txt", "md", "csv"] {
        m.insert(ext, "text");
    }
    for ext in [
        "js", "py", "java", "cpp", "c", "html", "css", "json", "xml", "yaml", "yml", "sh", "sql",
    ] {
        m.insert(ext, "code");
    }
    m
});

/// Kind label for a file, when its extension is supported for analysis.
pub fn supported_kind(upload: &FileUpload) -> Option<&'static str> {
    SUPPORTED_KINDS.get(upload.extension().as_str()).copied()
}

/// A blocked selection, retained until the user resolves the panel.
#[derive(Debug, Clone)]
struct PendingUpload {
    input: NodeId,
    files: Vec<FileUpload>,
    /// Name of the file that produced the block, for logging.
    blocked_name: String,
}

#[derive(Default)]
struct FileGateInner {
    in_flight: HashSet<NodeId>,
    /// Inputs whose next selection is our own re-injection.
    bypass: HashSet<NodeId>,
    pending: Option<PendingUpload>,
}

/// Attachment gate. Cheaply cloneable; clones share state.
#[derive(Clone)]
pub struct FileGate {
    ctx: GuardContext,
    inner: Arc<Mutex<FileGateInner>>,
}

impl FileGate {
    pub fn new(ctx: GuardContext) -> Self {
        Self {
            ctx,
            inner: Arc::new(Mutex::new(FileGateInner::default())),
        }
    }

    /// Whether a blocked selection is awaiting resolution.
    pub fn has_pending(&self) -> bool {
        self.inner.lock().expect("file gate lock poisoned").pending.is_some()
    }

    /// Handle an intercepted file selection on `input`.
    pub async fn handle_selection(&self, input: NodeId, files: Vec<FileUpload>) {
        if files.is_empty() {
            return;
        }

        {
            let mut inner = self.inner.lock().expect("file gate lock poisoned");
            // A marked input is echoing our own injection back at us. Drop
            // the event; the host's native handling already proceeds. The
            // mark is consumed by exactly one selection.
            if inner.bypass.remove(&input) {
                debug!(%input, "ignoring echo of re-injected selection");
                return;
            }
            if files.iter().all(|f| supported_kind(f).is_none()) {
                debug!(%input, "no supported file types in selection — passing through");
                inner.bypass.insert(input);
                drop(inner);
                self.ctx.adapter.accept_files(input, &files);
                return;
            }
            if !inner.in_flight.insert(input) {
                debug!(%input, "selection already being analyzed — dropped");
                return;
            }
        }

        self.ctx
            .presenter
            .show_busy(&format!("Analyzing {} file(s)...", files.len()))
            .await;

        let started = Instant::now();
        let outcome = self.analyze_batch(&files).await;
        self.inner
            .lock()
            .expect("file gate lock poisoned")
            .in_flight
            .remove(&input);

        match outcome {
            BatchOutcome::Blocked { name, detection } => {
                let findings = detection.detected_fields.len();
                self.ctx
                    .presenter
                    .hide_busy(BusyOutcome::Findings(findings.max(1)))
                    .await;
                info!(%input, file = %name, findings, "file upload blocked");
                {
                    let mut inner = self.inner.lock().expect("file gate lock poisoned");
                    inner.pending = Some(PendingUpload {
                        input,
                        files,
                        blocked_name: name.clone(),
                    });
                }
                let groups = policy::group_fields(&detection, "", &self.ctx.severity);
                self.ctx
                    .presenter
                    .show_decision(
                        &detection,
                        DecisionContext {
                            origin: PanelOrigin::FileUpload { label: name },
                            excerpt: String::new(),
                            duration: Some(started.elapsed()),
                            verdict: Verdict::Block,
                            groups,
                        },
                    )
                    .await;
            }
            BatchOutcome::Annotated { name, detection } => {
                let findings = detection.detected_fields.len();
                self.ctx
                    .presenter
                    .hide_busy(BusyOutcome::Findings(findings.max(1)))
                    .await;
                info!(%input, file = %name, findings, "file upload annotated");
                // Non-blocking: the upload proceeds, the panel only informs.
                self.reinject(input, &files);
                let groups = policy::group_fields(&detection, "", &self.ctx.severity);
                self.ctx
                    .presenter
                    .show_decision(
                        &detection,
                        DecisionContext {
                            origin: PanelOrigin::FileUpload { label: name },
                            excerpt: String::new(),
                            duration: Some(started.elapsed()),
                            verdict: Verdict::Warn,
                            groups,
                        },
                    )
                    .await;
            }
            BatchOutcome::Clean => {
                self.ctx.presenter.hide_busy(BusyOutcome::Clean).await;
                self.reinject(input, &files);
            }
            BatchOutcome::Failed => {
                // Fail open: never hold the user's files on our own error.
                self.ctx.presenter.hide_busy(BusyOutcome::Failed).await;
                self.reinject(input, &files);
            }
        }
    }

    /// Resolve the decision panel. Returns false when no selection is
    /// pending here.
    pub async fn resolve(&self, resolution: PanelResolution) -> bool {
        let pending = self
            .inner
            .lock()
            .expect("file gate lock poisoned")
            .pending
            .take();
        let Some(upload) = pending else {
            return false;
        };

        match resolution {
            PanelResolution::AcceptAnyway => {
                info!(file = %upload.blocked_name, "user accepted blocked upload");
                self.ctx.presenter.hide().await;
                self.reinject(upload.input, &upload.files);
            }
            // There is no sanitized form of a file; treat as dismiss.
            PanelResolution::SendSanitized | PanelResolution::Dismiss => {
                debug!(file = %upload.blocked_name, "blocked upload dismissed");
                self.ctx.presenter.hide().await;
            }
        }
        true
    }

    /// Analyze supported files in selection order, stopping at the first
    /// block. Unsupported files in a mixed batch ride along unanalyzed.
    async fn analyze_batch(&self, files: &[FileUpload]) -> BatchOutcome {
        let mut worst: Option<(String, Detection)> = None;

        for file in files {
            let Some(kind) = supported_kind(file) else {
                continue;
            };
            self.ctx
                .presenter
                .update_busy(&format!("Analyzing {} \"{}\"...", kind, file.name))
                .await;

            match self.ctx.detector.analyze_file(file).await {
                Ok(detection) => match policy::decide(&detection, false) {
                    Verdict::Block => {
                        return BatchOutcome::Blocked {
                            name: file.name.clone(),
                            detection,
                        };
                    }
                    Verdict::Warn => {
                        if worst.is_none() {
                            worst = Some((file.name.clone(), detection));
                        }
                    }
                    Verdict::Allow => {}
                },
                Err(e) => {
                    warn!(file = %file.name, err = %e, "file analysis failed — allowing upload");
                    return BatchOutcome::Failed;
                }
            }
        }

        match worst {
            Some((name, detection)) => BatchOutcome::Annotated { name, detection },
            None => BatchOutcome::Clean,
        }
    }

    fn reinject(&self, input: NodeId, files: &[FileUpload]) {
        self.inner
            .lock()
            .expect("file gate lock poisoned")
            .bypass
            .insert(input);
        self.ctx.adapter.accept_files(input, files);
        debug!(%input, count = files.len(), "selection re-injected");
    }
}

enum BatchOutcome {
    Clean,
    Annotated { name: String, detection: Detection },
    Blocked { name: String, detection: Detection },
    Failed,
}
