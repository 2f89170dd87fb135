// SPDX-License-Identifier: MIT
//! HTTP implementation of the [`Detector`] seam.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /detect` — JSON `{ text, mode? }`, JSON verdict back.
//! - `POST /detect_file` — multipart form with a single `file` part.
//! - `POST /detect/stream` — form-encoded text; newline-delimited JSON
//!   events (`node` progress, then a final `result`, or an `error`).

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::host::FileUpload;

use super::{Detection, Detector, DetectorError, ProgressFn, StreamProgress};

/// reqwest-backed detection client.
pub struct HttpDetector {
    client: reqwest::Client,
    base_url: String,
    /// Detection mode forwarded to the backend (`zero-shot`, `few-shot`, …).
    /// `None` defers to the backend's configured mode.
    mode: Option<String>,
}

impl HttpDetector {
    /// Build a client against `base_url` with the given request timeout.
    pub fn new(
        base_url: impl Into<String>,
        mode: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DetectorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mode,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// One newline-delimited event on the streaming endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamEvent {
    Node {
        node: String,
        status: String,
        #[serde(default)]
        detected_count: Option<u64>,
    },
    Result {
        result: Detection,
    },
    Error {
        #[serde(default)]
        error: Option<String>,
    },
}

#[async_trait]
impl Detector for HttpDetector {
    async fn analyze_text(&self, text: &str) -> Result<Detection, DetectorError> {
        if text.is_empty() {
            return Err(DetectorError::EmptyInput);
        }

        let mut payload = serde_json::json!({ "text": text });
        if let Some(mode) = &self.mode {
            payload["mode"] = serde_json::Value::String(mode.clone());
        }

        let resp = self
            .client
            .post(self.endpoint("/detect"))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DetectorError::Protocol {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let detection: Detection = serde_json::from_str(&body)?;
        debug!(
            risk = ?detection.risk_level,
            fields = detection.detected_fields.len(),
            "text analysis complete"
        );
        Ok(detection)
    }

    async fn analyze_file(&self, upload: &FileUpload) -> Result<Detection, DetectorError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(self.endpoint("/detect_file"))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DetectorError::Protocol {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        let detection: Detection = serde_json::from_str(&body)?;
        debug!(
            file = %upload.name,
            risk = ?detection.risk_level,
            fields = detection.detected_fields.len(),
            "file analysis complete"
        );
        Ok(detection)
    }

    async fn analyze_text_streaming(
        &self,
        text: &str,
        on_progress: ProgressFn,
    ) -> Result<Detection, DetectorError> {
        if text.is_empty() {
            return Err(DetectorError::EmptyInput);
        }

        let mut form = vec![("text", text.to_string())];
        if let Some(mode) = &self.mode {
            form.push(("mode", mode.clone()));
        }

        let resp = self
            .client
            .post(self.endpoint("/detect/stream"))
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DetectorError::Protocol {
                status: status.as_u16(),
            });
        }

        let mut stream = resp.bytes_stream();
        let mut assembler = StreamAssembler::new();
        while let Some(chunk) = stream.next().await {
            assembler.push(&chunk?, &on_progress)?;
        }
        assembler.finish(&on_progress)
    }
}

/// Incremental decoder for the newline-delimited event stream. Lines may be
/// split across transport chunks; a trailing unterminated line still counts.
struct StreamAssembler {
    buffer: Vec<u8>,
    result: Option<Detection>,
}

impl StreamAssembler {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            result: None,
        }
    }

    /// Consume one transport chunk, dispatching every completed line.
    fn push(&mut self, chunk: &[u8], on_progress: &ProgressFn) -> Result<(), DetectorError> {
        self.buffer.extend_from_slice(chunk);
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.dispatch(&String::from_utf8_lossy(&line), on_progress)?;
        }
        Ok(())
    }

    /// Flush any unterminated tail and return the final verdict.
    fn finish(mut self, on_progress: &ProgressFn) -> Result<Detection, DetectorError> {
        let tail = std::mem::take(&mut self.buffer);
        self.dispatch(&String::from_utf8_lossy(&tail), on_progress)?;
        self.result.ok_or(DetectorError::StreamTruncated)
    }

    fn dispatch(&mut self, line: &str, on_progress: &ProgressFn) -> Result<(), DetectorError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<StreamEvent>(line)? {
            StreamEvent::Node {
                node,
                status,
                detected_count,
            } => on_progress(StreamProgress {
                stage: node,
                status,
                detected_count,
            }),
            StreamEvent::Result { result } => self.result = Some(result),
            StreamEvent::Error { error } => {
                return Err(DetectorError::Stream(
                    error.unwrap_or_else(|| "unspecified stream error".to_string()),
                ));
            }
        }
        Ok(())
    }
}
