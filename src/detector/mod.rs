// SPDX-License-Identifier: MIT
//! Detection service client — wire types and the `Detector` seam.
//!
//! The guard never classifies content itself; it asks a remote detection
//! service and treats the reply as the verdict. Every caller is responsible
//! for fail-open handling: a [`DetectorError`] means "no verdict", never
//! "block". The client touches no gating state.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::host::FileUpload;

pub use http::HttpDetector;

// ─── Wire types ───────────────────────────────────────────────────────────────

/// Overall risk level reported by the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    /// Anything the service reports outside the known set. Treated as
    /// no-signal by policy.
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    /// True for any level other than `none`/unknown — the threshold at which
    /// a reply panel is worth showing.
    pub fn is_flagged(self) -> bool {
        matches!(self, RiskLevel::Low | RiskLevel::Medium | RiskLevel::High)
    }
}

/// Explicit policy decision supplied by the service. Authoritative when
/// present; absent, the risk level alone drives the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Warn,
    Block,
}

/// One detected sensitive value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedField {
    /// Field name, e.g. `SSN`, `EMAIL`, `CREDITCARDNUMBER`.
    pub field: String,
    /// The matched text.
    #[serde(default)]
    pub value: String,
    /// Which detector stage produced the finding, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Per-field risk hint (`high`/`medium`/`low`), if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
}

/// Final verdict payload from `/detect` and `/detect_file`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Detection {
    #[serde(default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub detected_fields: Vec<DetectedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Display text suggesting how to fix the submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// Sanitized replacement text with sensitive values masked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anonymized_text: Option<String>,
    /// In-band error reported inside an otherwise well-formed payload.
    /// Distinct from a transport or protocol failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Detection {
    pub fn has_findings(&self) -> bool {
        !self.detected_fields.is_empty()
    }
}

/// Progress notification from the streaming endpoint: one pipeline stage
/// started or finished, with an optional running finding count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamProgress {
    pub stage: String,
    pub status: String,
    pub detected_count: Option<u64>,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Failures at the detection client seam.
///
/// Callers on the outbound path resolve any of these to allow (fail-open)
/// with a visible notice; the inbound path logs and swallows them.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// Service unreachable or the connection broke mid-request.
    #[error("detection service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-2xx status.
    #[error("detection service returned HTTP {status}")]
    Protocol { status: u16 },

    /// The payload could not be decoded.
    #[error("malformed detection payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The streaming endpoint emitted an in-band error event.
    #[error("detection stream aborted: {0}")]
    Stream(String),

    /// The stream ended without a final result event.
    #[error("detection stream ended without a result")]
    StreamTruncated,

    /// Empty input — the contract requires non-empty text.
    #[error("cannot analyze empty text")]
    EmptyInput,
}

/// Callback invoked for each streaming progress event.
pub type ProgressFn = Box<dyn Fn(StreamProgress) + Send + Sync>;

// ─── The Detector seam ────────────────────────────────────────────────────────

/// Common interface for detection backends.
///
/// [`HttpDetector`] is the production implementation; tests substitute
/// scripted stubs.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Classify a text submission.
    async fn analyze_text(&self, text: &str) -> Result<Detection, DetectorError>;

    /// Classify an uploaded file.
    async fn analyze_file(&self, upload: &FileUpload) -> Result<Detection, DetectorError>;

    /// Classify text with streaming progress. The default implementation
    /// ignores progress and delegates to [`analyze_text`](Self::analyze_text);
    /// backends with a streaming endpoint override it.
    async fn analyze_text_streaming(
        &self,
        text: &str,
        _on_progress: ProgressFn,
    ) -> Result<Detection, DetectorError> {
        self.analyze_text(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_deserializes_full_payload() {
        let json = r#"{
            "risk_level": "high",
            "decision": "block",
            "detected_fields": [
                {"field": "SSN", "value": "123-45-6789", "risk": "high"}
            ],
            "remediation": "Redact before resubmitting.",
            "anonymized_text": "my SSN is <<SSN_1>>"
        }"#;
        let d: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(d.risk_level, RiskLevel::High);
        assert_eq!(d.decision, Some(Decision::Block));
        assert_eq!(d.detected_fields.len(), 1);
        assert_eq!(d.detected_fields[0].field, "SSN");
        assert_eq!(d.anonymized_text.as_deref(), Some("my SSN is <<SSN_1>>"));
    }

    #[test]
    fn detection_defaults_for_sparse_payload() {
        let d: Detection = serde_json::from_str("{}").unwrap();
        assert_eq!(d.risk_level, RiskLevel::None);
        assert!(d.detected_fields.is_empty());
        assert!(d.decision.is_none());
        assert!(!d.has_findings());
    }

    #[test]
    fn unknown_risk_level_is_tolerated() {
        let d: Detection = serde_json::from_str(r#"{"risk_level": "unknown"}"#).unwrap();
        assert_eq!(d.risk_level, RiskLevel::Unknown);
        assert!(!d.risk_level.is_flagged());
    }

    #[test]
    fn flagged_levels() {
        assert!(!RiskLevel::None.is_flagged());
        assert!(RiskLevel::Low.is_flagged());
        assert!(RiskLevel::Medium.is_flagged());
        assert!(RiskLevel::High.is_flagged());
    }
}
