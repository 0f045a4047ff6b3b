//! The final structured answer produced for one investigation.

use serde::{Deserialize, Serialize};

use crate::evidence::FindingId;
use crate::hypothesis::{Hypothesis, HypothesisStatus, RootCauseCategory};

/// Kind of verdict a run can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    /// A root cause was determined (possibly at low confidence).
    RootCause,
    /// The incident cannot be investigated without a human.
    NeedsHuman,
    /// The incident routed to an intent this service does not implement.
    Unsupported,
    /// The investigation failed internally.
    Error,
}

/// Per-hypothesis summary carried on the verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisSummary {
    pub id: String,
    pub description: String,
    pub category: RootCauseCategory,
    pub confidence: f64,
    pub status: HypothesisStatus,
    pub evidence_count: usize,
}

impl From<&Hypothesis> for HypothesisSummary {
    fn from(h: &Hypothesis) -> Self {
        Self {
            id: h.id.as_str().to_string(),
            description: h.description.clone(),
            category: h.category,
            confidence: h.confidence,
            status: h.status,
            evidence_count: h.evidence_count(),
        }
    }
}

/// Final verdict for one investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: VerdictKind,
    pub root_cause_text: String,
    pub root_cause_category: RootCauseCategory,
    pub confidence: f64,
    pub explanation: String,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub remaining_uncertainties: Vec<String>,
    #[serde(default)]
    pub evidence_ref_ids: Vec<FindingId>,
    #[serde(default)]
    pub hypotheses_summary: Vec<HypothesisSummary>,
    pub duration_ms: u64,
    pub needs_human: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_question: Option<String>,
}

impl Verdict {
    /// Verdict for an incident that cannot proceed without a human.
    pub fn needs_human(reason: impl Into<String>, duration_ms: u64) -> Self {
        let reason = reason.into();
        Self {
            kind: VerdictKind::NeedsHuman,
            root_cause_text: String::new(),
            root_cause_category: RootCauseCategory::Unknown,
            confidence: 0.0,
            explanation: reason.clone(),
            recommended_actions: Vec::new(),
            remaining_uncertainties: Vec::new(),
            evidence_ref_ids: Vec::new(),
            hypotheses_summary: Vec::new(),
            duration_ms,
            needs_human: true,
            human_question: Some(reason),
        }
    }

    /// Verdict for an intent the service does not implement.
    pub fn unsupported(intent: impl Into<String>, duration_ms: u64) -> Self {
        let intent = intent.into();
        Self {
            kind: VerdictKind::Unsupported,
            root_cause_text: String::new(),
            root_cause_category: RootCauseCategory::Unknown,
            confidence: 0.0,
            explanation: format!("Intent '{intent}' is not supported by this service"),
            recommended_actions: Vec::new(),
            remaining_uncertainties: Vec::new(),
            evidence_ref_ids: Vec::new(),
            hypotheses_summary: Vec::new(),
            duration_ms,
            needs_human: true,
            human_question: Some(format!("Route '{intent}' incident to the owning team")),
        }
    }

    /// Verdict for an internal failure.
    pub fn error(message: impl Into<String>, duration_ms: u64) -> Self {
        let message = message.into();
        Self {
            kind: VerdictKind::Error,
            root_cause_text: String::new(),
            root_cause_category: RootCauseCategory::Unknown,
            confidence: 0.0,
            explanation: message.clone(),
            recommended_actions: Vec::new(),
            remaining_uncertainties: Vec::new(),
            evidence_ref_ids: Vec::new(),
            hypotheses_summary: Vec::new(),
            duration_ms,
            needs_human: true,
            human_question: Some(message),
        }
    }
}
