// SPDX-License-Identifier: MIT
//! Guard configuration.
//!
//! Priority (highest to lowest):
//!   1. Environment variables (`CHATGUARD_*`)
//!   2. TOML file (`chatguard.toml`)
//!   3. Built-in defaults

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_DETECT_MODE: &str = "zero-shot";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REPLAY_GRACE_MS: u64 = 150;
const DEFAULT_OVERRIDE_GRACE_MS: u64 = 1_500;
const DEFAULT_WARN_RELEASE_DELAY_MS: u64 = 400;
const DEFAULT_STABILITY_IDLE_MS: u64 = 1_200;
const DEFAULT_STABILITY_CAP_MS: u64 = 20_000;
const DEFAULT_MIN_REPLY_CHARS: usize = 10;

/// `chatguard.toml` — all fields are optional overrides.
#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    /// Detection service base URL (default: http://127.0.0.1:8000).
    api_base_url: Option<String>,
    /// Detection mode forwarded to the backend; empty string defers to the
    /// backend's configured mode (default: "zero-shot").
    detect_mode: Option<String>,
    /// Use the streaming endpoint with live progress (default: false).
    streaming: Option<bool>,
    /// HTTP request timeout in seconds (default: 10).
    request_timeout_secs: Option<u64>,
    /// Override window for a programmatic send replay, ms (default: 150).
    replay_grace_ms: Option<u64>,
    /// Override window after an explicit "send anyway", ms (default: 1500).
    override_grace_ms: Option<u64>,
    /// Delay before a warn verdict releases the send, ms (default: 400).
    warn_release_delay_ms: Option<u64>,
    /// Quiet window before a streaming reply counts as settled, ms (default: 1200).
    stability_idle_ms: Option<u64>,
    /// Hard cap on one stability wait, ms (default: 20000).
    stability_cap_ms: Option<u64>,
    /// Replies shorter than this are skipped, chars (default: 10).
    min_reply_chars: Option<usize>,
    /// Path to a JSON severity-table override.
    severity_table_path: Option<PathBuf>,
}

/// Parse an env var, silently ignoring unset or unparseable values.
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse chatguard.toml — using defaults");
            None
        }
    }
}

/// Resolved guard configuration.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub api_base_url: String,
    /// `None` defers mode selection to the backend.
    pub detect_mode: Option<String>,
    pub streaming: bool,
    pub request_timeout_secs: u64,
    pub replay_grace_ms: u64,
    pub override_grace_ms: u64,
    pub warn_release_delay_ms: u64,
    pub stability_idle_ms: u64,
    pub stability_cap_ms: u64,
    pub min_reply_chars: usize,
    pub severity_table_path: Option<PathBuf>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            detect_mode: Some(DEFAULT_DETECT_MODE.to_string()),
            streaming: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            replay_grace_ms: DEFAULT_REPLAY_GRACE_MS,
            override_grace_ms: DEFAULT_OVERRIDE_GRACE_MS,
            warn_release_delay_ms: DEFAULT_WARN_RELEASE_DELAY_MS,
            stability_idle_ms: DEFAULT_STABILITY_IDLE_MS,
            stability_cap_ms: DEFAULT_STABILITY_CAP_MS,
            min_reply_chars: DEFAULT_MIN_REPLY_CHARS,
            severity_table_path: None,
        }
    }
}

impl GuardConfig {
    /// Build config from env + optional TOML file.
    pub fn load(config_path: Option<&Path>) -> Self {
        let toml = config_path.and_then(load_toml).unwrap_or_default();
        let defaults = Self::default();

        let api_base_url = std::env::var("CHATGUARD_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.api_base_url)
            .unwrap_or(defaults.api_base_url);

        // Mode precedence is the same, but an explicitly empty value means
        // "let the backend choose".
        let detect_mode = std::env::var("CHATGUARD_MODE")
            .ok()
            .or(toml.detect_mode)
            .map(|m| if m.is_empty() { None } else { Some(m) })
            .unwrap_or(defaults.detect_mode);

        let streaming = std::env::var("CHATGUARD_STREAMING")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(toml.streaming)
            .unwrap_or(defaults.streaming);

        Self {
            api_base_url,
            detect_mode,
            streaming,
            request_timeout_secs: env_parse("CHATGUARD_REQUEST_TIMEOUT_SECS")
                .or(toml.request_timeout_secs)
                .unwrap_or(defaults.request_timeout_secs),
            replay_grace_ms: env_parse("CHATGUARD_REPLAY_GRACE_MS")
                .or(toml.replay_grace_ms)
                .unwrap_or(defaults.replay_grace_ms),
            override_grace_ms: env_parse("CHATGUARD_OVERRIDE_GRACE_MS")
                .or(toml.override_grace_ms)
                .unwrap_or(defaults.override_grace_ms),
            warn_release_delay_ms: env_parse("CHATGUARD_WARN_RELEASE_DELAY_MS")
                .or(toml.warn_release_delay_ms)
                .unwrap_or(defaults.warn_release_delay_ms),
            stability_idle_ms: env_parse("CHATGUARD_STABILITY_IDLE_MS")
                .or(toml.stability_idle_ms)
                .unwrap_or(defaults.stability_idle_ms),
            stability_cap_ms: env_parse("CHATGUARD_STABILITY_CAP_MS")
                .or(toml.stability_cap_ms)
                .unwrap_or(defaults.stability_cap_ms),
            min_reply_chars: env_parse("CHATGUARD_MIN_REPLY_CHARS")
                .or(toml.min_reply_chars)
                .unwrap_or(defaults.min_reply_chars),
            severity_table_path: std::env::var("CHATGUARD_SEVERITY_TABLE")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .or(toml.severity_table_path),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn replay_grace(&self) -> Duration {
        Duration::from_millis(self.replay_grace_ms)
    }

    pub fn override_grace(&self) -> Duration {
        Duration::from_millis(self.override_grace_ms)
    }

    pub fn warn_release_delay(&self) -> Duration {
        Duration::from_millis(self.warn_release_delay_ms)
    }

    pub fn stability_idle(&self) -> Duration {
        Duration::from_millis(self.stability_idle_ms)
    }

    pub fn stability_cap(&self) -> Duration {
        Duration::from_millis(self.stability_cap_ms)
    }
}
