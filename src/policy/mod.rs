// SPDX-License-Identifier: MIT
//! Risk policy — verdict mapping and finding display order.
//!
//! Pure functions over a [`Detection`] and the current override state:
//!
//! - [`decide`] maps a verdict payload to allow/warn/block. An explicit
//!   service `decision` is authoritative; without one, only a `high` risk
//!   level blocks. A warn flow requires an explicit `warn` decision —
//!   medium/low risk alone never warns.
//! - [`classify`] buckets one field into a severity tier.
//! - [`group_fields`] + [`order_groups`] produce the stable display order
//!   the panel renders: severity tier first, then first occurrence in the
//!   message, then field name.

pub mod severity;

use std::collections::HashMap;

use crate::detector::{Decision, DetectedField, Detection, RiskLevel};

pub use severity::SeverityTable;

/// Policy outcome for a gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Warn,
    Block,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Warn => write!(f, "warn"),
            Verdict::Block => write!(f, "block"),
        }
    }
}

/// Display severity tier. Ordering is significant: `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Map a detection verdict to a policy outcome.
///
/// An active override exempts the current action unconditionally.
pub fn decide(detection: &Detection, override_active: bool) -> Verdict {
    if override_active {
        return Verdict::Allow;
    }
    if let Some(decision) = detection.decision {
        return match decision {
            Decision::Allow => Verdict::Allow,
            Decision::Warn => Verdict::Warn,
            Decision::Block => Verdict::Block,
        };
    }
    if detection.risk_level == RiskLevel::High {
        Verdict::Block
    } else {
        Verdict::Allow
    }
}

/// Severity for one detected field: an explicit per-field risk hint wins,
/// otherwise the severity table decides by field name.
pub fn classify(field: &DetectedField, table: &SeverityTable) -> Severity {
    if let Some(hint) = field.risk.as_deref() {
        match hint.to_ascii_lowercase().as_str() {
            "high" => return Severity::High,
            "medium" => return Severity::Medium,
            "low" => return Severity::Low,
            _ => {}
        }
    }
    table.lookup(&field.field)
}

/// Findings for one field name, aggregated for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    pub field: String,
    pub severity: Severity,
    /// Byte offset of the group's earliest occurrence in the analyzed text.
    /// `usize::MAX` when no member value was found in the text.
    pub min_offset: usize,
    pub values: Vec<String>,
}

/// Bucket detected fields by name, recording each group's severity and its
/// first occurrence offset within `text`, then order for display.
pub fn group_fields(
    detection: &Detection,
    text: &str,
    table: &SeverityTable,
) -> Vec<FieldGroup> {
    let mut by_name: HashMap<String, FieldGroup> = HashMap::new();

    for field in &detection.detected_fields {
        let sev = classify(field, table);
        let offset = if field.value.is_empty() {
            usize::MAX
        } else {
            text.find(&field.value).unwrap_or(usize::MAX)
        };

        let entry = by_name
            .entry(field.field.clone())
            .or_insert_with(|| FieldGroup {
                field: field.field.clone(),
                severity: sev,
                min_offset: offset,
                values: Vec::new(),
            });
        entry.severity = entry.severity.min(sev);
        entry.min_offset = entry.min_offset.min(offset);
        if !field.value.is_empty() && !entry.values.contains(&field.value) {
            entry.values.push(field.value.clone());
        }
    }

    let mut groups: Vec<FieldGroup> = by_name.into_values().collect();
    order_groups(&mut groups);
    groups
}

/// Total, deterministic display order: severity tier ascending (high
/// first), then first-occurrence offset ascending, then field name.
/// Idempotent under re-sorting.
pub fn order_groups(groups: &mut [FieldGroup]) {
    groups.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then(a.min_offset.cmp(&b.min_offset))
            .then_with(|| a.field.cmp(&b.field))
    });
}
