//! LoadTrace Port Traits
//!
//! This crate defines the port interfaces (traits) that adapters must
//! implement:
//! - `DataSource`: one external probe backend serving named capabilities
//! - `ReasoningOracle`: the narrow façade over the reasoning model
//!
//! Both traits are object-safe so the registry and orchestrator can hold
//! heterogeneous implementations behind `Arc<dyn ...>`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lt_domain::{Finding, Hypothesis, IdentifierBag, ParamBag, SuggestedProbe};

/// A `(source, capability)` pair as listed to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityRef {
    pub source: String,
    pub capability: String,
}

impl CapabilityRef {
    pub fn new(source: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            capability: capability.into(),
        }
    }
}

impl std::fmt::Display for CapabilityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.source, self.capability)
    }
}

/// What a probe backend returned, before the registry turns it into a
/// finding.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbePayload {
    /// The backend answered with data.
    Found(serde_json::Value),
    /// The backend answered authoritatively that the entity does not exist.
    NotFound,
}

/// Probe failures. These never abort an investigation; the registry
/// converts them into findings with the matching outcome.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Probe timed out after {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error("Probe cancelled")]
    Cancelled,

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },
}

/// One external data-source backend.
///
/// A source may serve several capabilities (the warehouse serves both load
/// validation and company permalinks). Implementations are strictly
/// read-only and must isolate connection identity per concurrent caller.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable source name as listed in the registry.
    fn name(&self) -> &str;

    /// Capabilities this backend serves.
    fn capabilities(&self) -> Vec<String>;

    /// Execute one probe. Parameters are already validated and filled by
    /// the registry.
    async fn invoke(&self, capability: &str, params: &ParamBag) -> Result<ProbePayload, ProbeError>;
}

/// Verdict of a rescore call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescoreVerdict {
    Support,
    Contradict,
    Irrelevant,
}

/// Result of asking the oracle how a new finding affects a hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rescore {
    pub verdict: RescoreVerdict,
    pub new_confidence: f64,
    pub rationale: String,
}

/// Next action for a sub-investigator, as decided by the oracle.
///
/// The oracle only ever names a probe; it never supplies parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OracleAction {
    Probe {
        source: String,
        capability: String,
        reason: String,
    },
    SpawnChild {
        description: String,
        reason: String,
    },
    Conclude {
        reason: String,
    },
}

/// A hypothesis as proposed by the oracle, before validation against the
/// closed category set and the registry vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedHypothesis {
    pub description: String,
    /// Raw category string; the orchestrator maps it into the closed set.
    pub category: String,
    pub confidence: f64,
    #[serde(default)]
    pub suggested_probes: Vec<SuggestedProbe>,
}

/// Synthesis output before the orchestrator maps it onto the verdict shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisDraft {
    pub root_cause: String,
    /// Raw category string; mapped into the closed set by the orchestrator.
    pub category: String,
    pub confidence: f64,
    pub explanation: String,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub remaining_uncertainties: Vec<String>,
}

/// Oracle failures. All of them are local: callers fall back to
/// deterministic behavior instead of aborting the investigation.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle output failed validation: {reason}")]
    Malformed { reason: String },

    #[error("Oracle call timed out")]
    Timeout,

    #[error("Oracle call cancelled")]
    Cancelled,

    #[error("Oracle transport error: {message}")]
    Transport { message: String },
}

/// The reasoning oracle façade. Callers never reach the underlying model
/// directly; these five operations are the entire surface.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    /// Best-effort identifier extraction from free text. Unknown fields are
    /// omitted, never fabricated.
    async fn extract_identifiers(
        &self,
        description: &str,
    ) -> Result<Vec<(String, String)>, OracleError>;

    /// Propose 3-5 hypotheses from the identifiers and seed evidence.
    async fn propose_hypotheses(
        &self,
        identifiers: &IdentifierBag,
        seed_evidence: &[Finding],
    ) -> Result<Vec<ProposedHypothesis>, OracleError>;

    /// Re-score a hypothesis against one new finding.
    async fn rescore(
        &self,
        hypothesis: &Hypothesis,
        finding: &Finding,
    ) -> Result<Rescore, OracleError>;

    /// Decide the next sub-investigator action.
    async fn decide_next(
        &self,
        hypothesis: &Hypothesis,
        evidence_so_far: &[Finding],
        available_sources: &[CapabilityRef],
    ) -> Result<OracleAction, OracleError>;

    /// Synthesize the final root cause from all hypotheses and evidence.
    async fn synthesize(
        &self,
        hypotheses: &[Hypothesis],
        all_evidence: &[Finding],
    ) -> Result<SynthesisDraft, OracleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_ref_display() {
        let cap = CapabilityRef::new("platform", "platform-load-lookup-by-id");
        assert_eq!(cap.to_string(), "platform.platform-load-lookup-by-id");
    }

    #[test]
    fn test_oracle_action_tagged_serialization() {
        let action = OracleAction::Probe {
            source: "network".to_string(),
            capability: "network-relationship".to_string(),
            reason: "check the shipper-carrier link".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "probe");
        assert_eq!(json["source"], "network");

        let back: OracleAction = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_rescore_verdict_snake_case() {
        assert_eq!(
            serde_json::to_string(&RescoreVerdict::Contradict).unwrap(),
            "\"contradict\""
        );
    }
}
