// SPDX-License-Identifier: MIT
//! chatguard — a submission-gating and response-correlation engine for web
//! chat interfaces.
//!
//! The guard sits between a user and a chat site: outbound messages and
//! file uploads are intercepted, classified by a remote detection service,
//! and released, annotated, or held for an explicit decision; assistant
//! replies are analyzed once they finish streaming. The guard holds no DOM
//! references and renders nothing itself — the embedding host supplies a
//! [`host::SiteAdapter`] for structural queries and a [`present::Presenter`]
//! for panels, and feeds [`host::HostEvent`]s into the [`engine::GuardEngine`].
//!
//! ```text
//!   host events ──► GuardEngine ──┬─► SubmissionGate ──► Detector (HTTP)
//!                                 ├─► FileGate        ──► Detector
//!                                 └─► ResponseMonitor ──► Detector
//!                        shared: SessionState · RiskPolicy · Presenter
//! ```
//!
//! Detection failures always fail open: the guard is a safety net, not an
//! availability risk.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatguard::{GuardContext, GuardEngine};
//! # use chatguard::{host::SiteAdapter, present::Presenter};
//! # fn adapter() -> Arc<dyn SiteAdapter> { unimplemented!() }
//! # fn presenter() -> Arc<dyn Presenter> { unimplemented!() }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let ctx = GuardContext::bootstrap(None, adapter(), presenter())?;
//! let (engine, events) = GuardEngine::new(ctx);
//! // hand `events` to the host, then:
//! engine.run().await;
//! # Ok(())
//! # }
//! ```
//!
//! For a custom [`detector::Detector`] (or clock), assemble the context by
//! hand with [`GuardContext::new`] and [`detector::HttpDetector::new`].

pub mod config;
pub mod detector;
pub mod engine;
pub mod expiry;
pub mod gate;
pub mod host;
pub mod monitor;
pub mod observability;
pub mod policy;
pub mod present;
pub mod session;
pub mod stability;

use anyhow::Context as _;
use std::sync::Arc;

pub use config::GuardConfig;
pub use engine::GuardEngine;
pub use session::SessionState;

use crate::detector::Detector;
use crate::expiry::{Clock, SystemClock};
use crate::host::SiteAdapter;
use crate::policy::SeverityTable;
use crate::present::Presenter;

/// Shared handles every guard component receives. Cheaply cloneable.
#[derive(Clone)]
pub struct GuardContext {
    pub config: Arc<GuardConfig>,
    pub session: SessionState,
    pub detector: Arc<dyn Detector>,
    pub adapter: Arc<dyn SiteAdapter>,
    pub presenter: Arc<dyn Presenter>,
    pub clock: Arc<dyn Clock>,
    pub severity: Arc<SeverityTable>,
}

impl GuardContext {
    /// One-call bootstrap: load configuration (optionally from a TOML file),
    /// build the HTTP detection client, and assemble the context.
    pub fn bootstrap(
        config_path: Option<&std::path::Path>,
        adapter: Arc<dyn SiteAdapter>,
        presenter: Arc<dyn Presenter>,
    ) -> anyhow::Result<Self> {
        let config = GuardConfig::load(config_path);
        let detector = detector::HttpDetector::new(
            config.api_base_url.clone(),
            config.detect_mode.clone(),
            config.request_timeout(),
        )
        .context("failed to build detection client")?;
        Ok(Self::new(config, Arc::new(detector), adapter, presenter))
    }

    /// Assemble a context from resolved configuration and the host's
    /// capability implementations.
    pub fn new(
        config: GuardConfig,
        detector: Arc<dyn Detector>,
        adapter: Arc<dyn SiteAdapter>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self::with_clock(config, detector, adapter, presenter, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit clock, for tests that
    /// control time.
    pub fn with_clock(
        config: GuardConfig,
        detector: Arc<dyn Detector>,
        adapter: Arc<dyn SiteAdapter>,
        presenter: Arc<dyn Presenter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let severity = match &config.severity_table_path {
            Some(path) => SeverityTable::load_from_json(path),
            None => SeverityTable::default_rules(),
        };
        Self {
            session: SessionState::new(clock.clone()),
            severity: Arc::new(severity),
            config: Arc::new(config),
            detector,
            adapter,
            presenter,
            clock,
        }
    }
}
