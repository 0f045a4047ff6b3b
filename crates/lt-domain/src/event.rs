//! Progress events streamed to the operator during an investigation.
//!
//! The union is closed and tagged; within one investigation the serializer
//! guarantees FIFO delivery and exactly one terminal event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hypothesis::{HypothesisStatus, RootCauseCategory};
use crate::incident::IdentifierBag;
use crate::routing::{Intent, TransportDomain};
use crate::verdict::Verdict;
use crate::evidence::ProbeOutcome;

/// Investigation phase, used for heartbeat progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Routing,
    Seeding,
    Forming,
    Probing,
    Synthesizing,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routing => "routing",
            Self::Seeding => "seeding",
            Self::Forming => "forming",
            Self::Probing => "probing",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
        }
    }

    /// Deterministic progress bands per phase: routing 0-10, seeding 10-30,
    /// forming 30-40, probing 40-90, synthesizing 90-99, done 100. Within
    /// the probing band the percentage moves with completed/total sources.
    pub fn progress_percent(&self, sources_completed: usize, sources_total: usize) -> u8 {
        match self {
            Self::Routing => 5,
            Self::Seeding => 20,
            Self::Forming => 35,
            Self::Probing => {
                if sources_total == 0 {
                    40
                } else {
                    let span = 50.0 * (sources_completed.min(sources_total) as f64)
                        / (sources_total as f64);
                    40 + span as u8
                }
            }
            Self::Synthesizing => 95,
            Self::Done => 100,
        }
    }
}

/// Reason a sub-investigator stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    Confirmed,
    Eliminated,
    MaxIterations,
    OracleConcluded,
    Failed,
}

impl TerminalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Eliminated => "eliminated",
            Self::MaxIterations => "max_iterations",
            Self::OracleConcluded => "oracle_concluded",
            Self::Failed => "failed",
        }
    }
}

/// One unit of push-delivered progress information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        investigation_id: String,
        mode: String,
        ts: DateTime<Utc>,
    },
    Routed {
        intent: Intent,
        domain: TransportDomain,
        skill_id: String,
        confidence: f64,
        matched_patterns: Vec<String>,
    },
    Identifiers {
        bag: IdentifierBag,
    },
    Hypothesis {
        id: String,
        description: String,
        category: RootCauseCategory,
        confidence: f64,
    },
    SubAgentSpawn {
        agent_id: String,
        hypothesis_id: String,
    },
    SubAgentAction {
        agent_id: String,
        iteration: u32,
        action_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        capability: Option<String>,
        reason: String,
    },
    Evidence {
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
        finding_id: String,
        source: String,
        capability: String,
        outcome: ProbeOutcome,
        summary: String,
    },
    HypothesisUpdate {
        id: String,
        confidence: f64,
        status: HypothesisStatus,
        delta: f64,
    },
    ChildSpawn {
        parent_agent_id: String,
        child_description: String,
    },
    SubAgentDone {
        agent_id: String,
        terminal_reason: TerminalReason,
        iterations: u32,
        evidence_count: usize,
    },
    Verdict {
        root_cause: String,
        category: RootCauseCategory,
        confidence: f64,
        actions: Vec<String>,
        needs_human: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        human_question: Option<String>,
    },
    Heartbeat {
        ts: DateTime<Utc>,
        progress_percent: u8,
        phase: Phase,
        sources_completed: usize,
        sources_total: usize,
    },
    Error {
        message: String,
        at_phase: String,
    },
    Complete {
        ts: DateTime<Utc>,
        duration_ms: u64,
    },
}

impl ProgressEvent {
    /// Wire-level event name, used for SSE framing (`event: <type>`).
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Routed { .. } => "routed",
            Self::Identifiers { .. } => "identifiers",
            Self::Hypothesis { .. } => "hypothesis",
            Self::SubAgentSpawn { .. } => "sub_agent_spawn",
            Self::SubAgentAction { .. } => "sub_agent_action",
            Self::Evidence { .. } => "evidence",
            Self::HypothesisUpdate { .. } => "hypothesis_update",
            Self::ChildSpawn { .. } => "child_spawn",
            Self::SubAgentDone { .. } => "sub_agent_done",
            Self::Verdict { .. } => "verdict",
            Self::Heartbeat { .. } => "heartbeat",
            Self::Error { .. } => "error",
            Self::Complete { .. } => "complete",
        }
    }

    /// Terminal events end the stream; nothing may follow one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Build the verdict event from a verdict.
    pub fn from_verdict(verdict: &Verdict) -> Self {
        Self::Verdict {
            root_cause: verdict.root_cause_text.clone(),
            category: verdict.root_cause_category,
            confidence: verdict.confidence,
            actions: verdict.recommended_actions.clone(),
            needs_human: verdict.needs_human,
            human_question: verdict.human_question.clone(),
        }
    }
}
