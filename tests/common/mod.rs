//! Shared test doubles: a scripted page adapter, a recording presenter,
//! a stub detector, and a manually advanced clock.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chatguard::detector::{
    Decision, DetectedField, Detection, Detector, DetectorError, ProgressFn, RiskLevel,
    StreamProgress,
};
use chatguard::expiry::Clock;
use chatguard::host::{FileUpload, HostEvent, MessageAuthor, NodeId, SiteAdapter};
use tokio::sync::mpsc;
use chatguard::policy::Verdict;
use chatguard::present::{
    BusyOutcome, DecisionContext, HighlightLayer, Presenter,
};
use chatguard::{GuardConfig, GuardContext, SessionState};

pub const COMPOSER: NodeId = NodeId(1);
pub const SEND_CONTROL: NodeId = NodeId(2);

// ─── Clock ────────────────────────────────────────────────────────────────────

/// Clock whose `now` only moves when a test advances it.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

// ─── Scripted page adapter ────────────────────────────────────────────────────

/// Everything the guard asked the page to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    TriggerSend {
        composer: NodeId,
        /// Snapshot of the session override at the moment of the call.
        override_active: bool,
    },
    SetComposerText(NodeId, String),
    SetSendEnabled(NodeId, bool),
    AcceptFiles {
        input: NodeId,
        names: Vec<String>,
    },
    AttachGate,
}

#[derive(Default)]
struct PageState {
    composer_text: String,
    has_composer: bool,
    attached: bool,
    authors: HashMap<NodeId, MessageAuthor>,
    reply_content: HashMap<NodeId, NodeId>,
    node_text: HashMap<NodeId, String>,
}

/// In-memory stand-in for a chat page.
pub struct ScriptedPage {
    state: Mutex<PageState>,
    calls: Mutex<Vec<PageCall>>,
    session: Mutex<Option<SessionState>>,
}

impl ScriptedPage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PageState {
                has_composer: true,
                attached: true,
                ..PageState::default()
            }),
            calls: Mutex::new(Vec::new()),
            session: Mutex::new(None),
        })
    }

    /// Give the page a session handle so `trigger_send` can snapshot the
    /// override state, the way a real host observes its own replay.
    pub fn bind_session(&self, session: SessionState) {
        *self.session.lock().unwrap() = Some(session);
    }

    pub fn set_text(&self, text: &str) {
        self.state.lock().unwrap().composer_text = text.to_string();
    }

    pub fn text(&self) -> String {
        self.state.lock().unwrap().composer_text.clone()
    }

    pub fn detach(&self) {
        self.state.lock().unwrap().attached = false;
    }

    pub fn add_user_message(&self, node: NodeId, text: &str) {
        let mut s = self.state.lock().unwrap();
        s.authors.insert(node, MessageAuthor::User);
        s.node_text.insert(node, text.to_string());
    }

    pub fn add_assistant_reply(&self, host: NodeId, content: NodeId, text: &str) {
        let mut s = self.state.lock().unwrap();
        s.authors.insert(host, MessageAuthor::Assistant);
        s.reply_content.insert(host, content);
        s.node_text.insert(content, text.to_string());
    }

    /// An assistant host that has not produced a content element yet.
    pub fn add_empty_assistant_reply(&self, host: NodeId) {
        self.state
            .lock()
            .unwrap()
            .authors
            .insert(host, MessageAuthor::Assistant);
    }

    pub fn set_reply_content(&self, host: NodeId, content: NodeId, text: &str) {
        let mut s = self.state.lock().unwrap();
        s.reply_content.insert(host, content);
        s.node_text.insert(content, text.to_string());
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PageCall::TriggerSend { .. }))
            .count()
    }

    pub fn last_send(&self) -> Option<PageCall> {
        self.calls()
            .into_iter()
            .rev()
            .find(|c| matches!(c, PageCall::TriggerSend { .. }))
    }

    pub fn accepted_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PageCall::AcceptFiles { names, .. } => Some(names),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PageCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SiteAdapter for ScriptedPage {
    fn name(&self) -> &str {
        "scripted"
    }

    fn find_composer(&self) -> Option<NodeId> {
        self.state
            .lock()
            .unwrap()
            .has_composer
            .then_some(COMPOSER)
    }

    fn composer_text(&self, _composer: NodeId) -> String {
        self.state.lock().unwrap().composer_text.clone()
    }

    fn set_composer_text(&self, composer: NodeId, text: &str) {
        self.state.lock().unwrap().composer_text = text.to_string();
        self.record(PageCall::SetComposerText(composer, text.to_string()));
    }

    fn find_send_control(&self) -> Option<NodeId> {
        Some(SEND_CONTROL)
    }

    fn is_send_control(&self, node: NodeId) -> bool {
        node == SEND_CONTROL
    }

    fn set_send_enabled(&self, control: NodeId, enabled: bool) {
        self.record(PageCall::SetSendEnabled(control, enabled));
    }

    fn trigger_send(&self, composer: NodeId, _control: Option<NodeId>) {
        let override_active = self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.override_active())
            .unwrap_or(false);
        self.record(PageCall::TriggerSend {
            composer,
            override_active,
        });
    }

    fn is_message_node(&self, node: NodeId) -> bool {
        self.state.lock().unwrap().authors.contains_key(&node)
    }

    fn message_author(&self, node: NodeId) -> MessageAuthor {
        self.state
            .lock()
            .unwrap()
            .authors
            .get(&node)
            .copied()
            .unwrap_or(MessageAuthor::Unknown)
    }

    fn reply_content(&self, host: NodeId) -> Option<NodeId> {
        self.state.lock().unwrap().reply_content.get(&host).copied()
    }

    fn extract_text(&self, node: NodeId) -> String {
        let s = self.state.lock().unwrap();
        if node == COMPOSER {
            return s.composer_text.clone();
        }
        s.node_text.get(&node).cloned().unwrap_or_default()
    }

    fn accept_files(&self, input: NodeId, files: &[FileUpload]) {
        self.record(PageCall::AcceptFiles {
            input,
            names: files.iter().map(|f| f.name.clone()).collect(),
        });
    }

    fn gate_attached(&self) -> bool {
        self.state.lock().unwrap().attached
    }

    fn attach_gate(&self) {
        self.state.lock().unwrap().attached = true;
        self.record(PageCall::AttachGate);
    }
}

// ─── Echoing page adapter ─────────────────────────────────────────────────────

/// Wraps a [`ScriptedPage`] as a host that re-observes its own programmatic
/// sends: every `trigger_send` is raised back to the engine as a fresh
/// commit gesture, the way a page-level key listener sees a replayed event.
pub struct EchoingPage {
    inner: Arc<ScriptedPage>,
    events: Mutex<Option<mpsc::UnboundedSender<HostEvent>>>,
}

impl EchoingPage {
    pub fn new(inner: Arc<ScriptedPage>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            events: Mutex::new(None),
        })
    }

    /// Start echoing into the engine's event channel.
    pub fn connect(&self, events: mpsc::UnboundedSender<HostEvent>) {
        *self.events.lock().unwrap() = Some(events);
    }
}

impl SiteAdapter for EchoingPage {
    fn name(&self) -> &str {
        "echoing"
    }

    fn find_composer(&self) -> Option<NodeId> {
        self.inner.find_composer()
    }

    fn composer_text(&self, composer: NodeId) -> String {
        self.inner.composer_text(composer)
    }

    fn set_composer_text(&self, composer: NodeId, text: &str) {
        self.inner.set_composer_text(composer, text);
    }

    fn find_send_control(&self) -> Option<NodeId> {
        self.inner.find_send_control()
    }

    fn is_send_control(&self, node: NodeId) -> bool {
        self.inner.is_send_control(node)
    }

    fn set_send_enabled(&self, control: NodeId, enabled: bool) {
        self.inner.set_send_enabled(control, enabled);
    }

    fn trigger_send(&self, composer: NodeId, control: Option<NodeId>) {
        self.inner.trigger_send(composer, control);
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(HostEvent::CommitGesture { composer, control });
        }
    }

    fn is_message_node(&self, node: NodeId) -> bool {
        self.inner.is_message_node(node)
    }

    fn message_author(&self, node: NodeId) -> MessageAuthor {
        self.inner.message_author(node)
    }

    fn reply_content(&self, host: NodeId) -> Option<NodeId> {
        self.inner.reply_content(host)
    }

    fn extract_text(&self, node: NodeId) -> String {
        self.inner.extract_text(node)
    }

    fn accept_files(&self, input: NodeId, files: &[FileUpload]) {
        self.inner.accept_files(input, files);
    }

    fn gate_attached(&self) -> bool {
        self.inner.gate_attached()
    }

    fn attach_gate(&self) {
        self.inner.attach_gate();
    }
}

// ─── Recording presenter ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    Decision {
        origin: String,
        verdict: Verdict,
        fields: Vec<String>,
    },
    Hide,
    ShowBusy(String),
    UpdateBusy(String),
    HideBusy(BusyOutcome),
    Highlights {
        target: NodeId,
        layer: HighlightLayer,
        count: usize,
    },
    ClearHighlights(HighlightLayer),
}

#[derive(Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PanelEvent>>,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<PanelEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn decisions(&self) -> Vec<PanelEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, PanelEvent::Decision { .. }))
            .collect()
    }

    pub fn busy_shown(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, PanelEvent::ShowBusy(_)))
    }

    fn record(&self, event: PanelEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn show_decision(&self, _detection: &Detection, ctx: DecisionContext) {
        self.record(PanelEvent::Decision {
            origin: ctx.origin.to_string(),
            verdict: ctx.verdict,
            fields: ctx.groups.into_iter().map(|g| g.field).collect(),
        });
    }

    async fn hide(&self) {
        self.record(PanelEvent::Hide);
    }

    async fn show_busy(&self, message: &str) {
        self.record(PanelEvent::ShowBusy(message.to_string()));
    }

    async fn update_busy(&self, message: &str) {
        self.record(PanelEvent::UpdateBusy(message.to_string()));
    }

    async fn hide_busy(&self, outcome: BusyOutcome) {
        self.record(PanelEvent::HideBusy(outcome));
    }

    async fn apply_highlights(
        &self,
        target: NodeId,
        fields: &[DetectedField],
        layer: HighlightLayer,
    ) {
        self.record(PanelEvent::Highlights {
            target,
            layer,
            count: fields.len(),
        });
    }

    async fn clear_highlights(&self, layer: HighlightLayer) {
        self.record(PanelEvent::ClearHighlights(layer));
    }
}

// ─── Stub detector ────────────────────────────────────────────────────────────

/// Scripted outcome for inputs matching a needle.
pub enum Scripted {
    Reply(Detection),
    Fail,
}

/// Detector that answers from a substring-keyed script. Unmatched input is
/// clean. File analysis keys on the file name.
#[derive(Default)]
pub struct StubDetector {
    rules: Mutex<Vec<(String, Scripted)>>,
    progress: Mutex<Vec<StreamProgress>>,
    latency: Option<Duration>,
}

impl StubDetector {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Script a progress event replayed, in order, on the streaming path
    /// before the final verdict.
    pub fn script_progress(&self, stage: &str, status: &str, detected_count: Option<u64>) {
        self.progress.lock().unwrap().push(StreamProgress {
            stage: stage.to_string(),
            status: status.to_string(),
            detected_count,
        });
    }

    /// Script the outcome for any input containing `needle`. Later scripts
    /// for the same needle win.
    pub fn script(&self, needle: &str, outcome: Scripted) {
        self.rules
            .lock()
            .unwrap()
            .insert(0, (needle.to_string(), outcome));
    }

    fn reply_for(&self, key: &str) -> Result<Detection, DetectorError> {
        let rules = self.rules.lock().unwrap();
        for (needle, outcome) in rules.iter() {
            if key.contains(needle.as_str()) {
                return match outcome {
                    Scripted::Reply(d) => Ok(d.clone()),
                    Scripted::Fail => Err(DetectorError::Protocol { status: 500 }),
                };
            }
        }
        Ok(Detection::default())
    }
}

#[async_trait]
impl Detector for StubDetector {
    async fn analyze_text(&self, text: &str) -> Result<Detection, DetectorError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.reply_for(text)
    }

    async fn analyze_file(&self, upload: &FileUpload) -> Result<Detection, DetectorError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.reply_for(&upload.name)
    }

    async fn analyze_text_streaming(
        &self,
        text: &str,
        on_progress: ProgressFn,
    ) -> Result<Detection, DetectorError> {
        let scripted: Vec<StreamProgress> = self.progress.lock().unwrap().clone();
        for progress in scripted {
            on_progress(progress);
        }
        self.analyze_text(text).await
    }
}

// ─── Detection builders ───────────────────────────────────────────────────────

pub fn finding(field: &str, value: &str) -> DetectedField {
    DetectedField {
        field: field.to_string(),
        value: value.to_string(),
        source: None,
        risk: None,
    }
}

pub fn block_detection(field: &str, value: &str, anonymized: Option<&str>) -> Detection {
    Detection {
        risk_level: RiskLevel::High,
        decision: Some(Decision::Block),
        detected_fields: vec![finding(field, value)],
        anonymized_text: anonymized.map(str::to_string),
        ..Detection::default()
    }
}

pub fn warn_detection(field: &str, value: &str) -> Detection {
    Detection {
        risk_level: RiskLevel::Medium,
        decision: Some(Decision::Warn),
        detected_fields: vec![finding(field, value)],
        ..Detection::default()
    }
}

pub fn low_risk_detection(field: &str, value: &str) -> Detection {
    Detection {
        risk_level: RiskLevel::Low,
        detected_fields: vec![finding(field, value)],
        ..Detection::default()
    }
}

// ─── Fixture ──────────────────────────────────────────────────────────────────

pub struct Fixture {
    pub ctx: GuardContext,
    pub page: Arc<ScriptedPage>,
    pub presenter: Arc<RecordingPresenter>,
    pub detector: Arc<StubDetector>,
    pub clock: Arc<ManualClock>,
}

/// Timings trimmed so tests never wait on production-scale windows.
pub fn test_config() -> GuardConfig {
    GuardConfig {
        warn_release_delay_ms: 5,
        stability_idle_ms: 5,
        stability_cap_ms: 500,
        ..GuardConfig::default()
    }
}

pub fn fixture(detector: StubDetector) -> Fixture {
    fixture_with_config(detector, test_config())
}

/// Fixture whose adapter raises every `trigger_send` back as a commit
/// gesture. Connect the returned page to the engine's event channel.
pub fn echoing_fixture(detector: StubDetector) -> (Fixture, Arc<EchoingPage>) {
    let page = ScriptedPage::new();
    let echo = EchoingPage::new(page.clone());
    let presenter = Arc::new(RecordingPresenter::default());
    let detector = Arc::new(detector);
    let clock = Arc::new(ManualClock::new());
    let ctx = GuardContext::with_clock(
        test_config(),
        detector.clone(),
        echo.clone(),
        presenter.clone(),
        clock.clone(),
    );
    page.bind_session(ctx.session.clone());
    (
        Fixture {
            ctx,
            page,
            presenter,
            detector,
            clock,
        },
        echo,
    )
}

pub fn fixture_with_config(detector: StubDetector, config: GuardConfig) -> Fixture {
    let page = ScriptedPage::new();
    let presenter = Arc::new(RecordingPresenter::default());
    let detector = Arc::new(detector);
    let clock = Arc::new(ManualClock::new());
    let ctx = GuardContext::with_clock(
        config,
        detector.clone(),
        page.clone(),
        presenter.clone(),
        clock.clone(),
    );
    page.bind_session(ctx.session.clone());
    Fixture {
        ctx,
        page,
        presenter,
        detector,
        clock,
    }
}
