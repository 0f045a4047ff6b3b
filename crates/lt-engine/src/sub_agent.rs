//! Sub-investigator: a bounded reasoning loop testing one hypothesis.
//!
//! Each iteration asks the oracle for the next action, executes it, feeds
//! any new finding back through a rescore, and recomputes the hypothesis
//! status. The loop stops when the hypothesis settles, the iteration budget
//! runs out, the oracle concludes, or the agent's wall clock expires.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use lt_domain::{
    Finding, Hypothesis, HypothesisStatus, IdKey, IdentifierBag, ParamBag, ParamValue,
    ProgressEvent, RootCauseCategory, TerminalReason,
};
use lt_ports::{OracleAction, RescoreVerdict};

use crate::context::InvestigationContext;
use crate::registry::Prepared;

/// Result of one sub-investigator run.
#[derive(Debug, Clone)]
pub struct SubAgentOutcome {
    pub agent_id: String,
    pub hypothesis: Hypothesis,
    /// Child hypothesis descriptions for the orchestrator to promote.
    pub children: Vec<String>,
    pub iterations: u32,
    pub evidence_count: usize,
    pub terminal_reason: TerminalReason,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Independent agent that tests a single hypothesis.
pub struct SubInvestigator {
    agent_id: String,
    hypothesis: Hypothesis,
    identifiers: Arc<IdentifierBag>,
    ctx: InvestigationContext,
    evidence: Vec<Finding>,
    children: Vec<String>,
    iteration: u32,
}

impl SubInvestigator {
    pub fn new(
        agent_id: impl Into<String>,
        hypothesis: Hypothesis,
        identifiers: Arc<IdentifierBag>,
        ctx: InvestigationContext,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            hypothesis,
            identifiers,
            ctx,
            evidence: Vec::new(),
            children: Vec::new(),
            iteration: 0,
        }
    }

    /// Run the reasoning loop to completion.
    #[instrument(skip(self), fields(agent_id = %self.agent_id, hypothesis_id = %self.hypothesis.id))]
    pub async fn run(mut self) -> SubAgentOutcome {
        let started_at = Utc::now();
        let started = Instant::now();
        let config = Arc::clone(&self.ctx.config);

        info!(
            description = %self.hypothesis.description,
            confidence = self.hypothesis.confidence,
            "starting sub-investigation"
        );

        let mut terminal_reason = None;

        while self.iteration < config.max_iterations_per_agent {
            if self.ctx.cancel.is_cancelled() {
                terminal_reason = Some(TerminalReason::Failed);
                break;
            }
            if started.elapsed() >= config.agent_deadline {
                warn!("sub-investigator wall clock expired");
                terminal_reason = Some(TerminalReason::Failed);
                break;
            }
            if self.hypothesis.is_settled() {
                break;
            }

            self.iteration += 1;

            let action = tokio::select! {
                _ = self.ctx.cancel.cancelled() => {
                    terminal_reason = Some(TerminalReason::Failed);
                    break;
                }
                action = self.decide() => action,
            };
            self.emit_action(&action);

            match action {
                OracleAction::Conclude { reason } => {
                    debug!(reason = %reason, "oracle concluded");
                    terminal_reason = Some(TerminalReason::OracleConcluded);
                    break;
                }
                OracleAction::SpawnChild {
                    description,
                    reason,
                } => {
                    debug!(reason = %reason, "recording child hypothesis");
                    self.ctx.sink.emit(ProgressEvent::ChildSpawn {
                        parent_agent_id: self.agent_id.clone(),
                        child_description: description.clone(),
                    });
                    self.children.push(description);
                }
                OracleAction::Probe {
                    source, capability, ..
                } => {
                    self.probe_and_rescore(&source, &capability).await;
                }
            }
        }

        let terminal_reason = terminal_reason.unwrap_or(match self.hypothesis.status {
            HypothesisStatus::Confirmed => TerminalReason::Confirmed,
            HypothesisStatus::Eliminated => TerminalReason::Eliminated,
            HypothesisStatus::Open => TerminalReason::MaxIterations,
        });

        info!(
            status = self.hypothesis.status.as_str(),
            confidence = self.hypothesis.confidence,
            iterations = self.iteration,
            evidence = self.evidence.len(),
            terminal_reason = terminal_reason.as_str(),
            "sub-investigation complete"
        );

        self.ctx.sink.emit(ProgressEvent::SubAgentDone {
            agent_id: self.agent_id.clone(),
            terminal_reason,
            iterations: self.iteration,
            evidence_count: self.evidence.len(),
        });

        SubAgentOutcome {
            agent_id: self.agent_id,
            hypothesis: self.hypothesis,
            children: self.children,
            iterations: self.iteration,
            evidence_count: self.evidence.len(),
            terminal_reason,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Ask the oracle for the next action, validating its vocabulary. A
    /// malformed or timed-out response, or a probe naming an unregistered
    /// source, collapses to `conclude`.
    async fn decide(&self) -> OracleAction {
        let available = self.ctx.registry.capability_refs();
        let decided = tokio::time::timeout(
            self.ctx.config.oracle_deadline,
            self.ctx
                .oracle
                .decide_next(&self.hypothesis, &self.evidence, &available),
        )
        .await;

        let action = match decided {
            Ok(Ok(action)) => action,
            Ok(Err(e)) => {
                warn!(error = %e, "oracle decide_next failed");
                OracleAction::Conclude {
                    reason: "no valid decision".to_string(),
                }
            }
            Err(_) => {
                warn!("oracle decide_next timed out");
                OracleAction::Conclude {
                    reason: "no valid decision".to_string(),
                }
            }
        };

        match action {
            OracleAction::Probe {
                source, capability, ..
            } if !self.ctx.registry.contains(&source, &capability) => {
                warn!(
                    source = %source,
                    capability = %capability,
                    "oracle named an unregistered source, concluding"
                );
                OracleAction::Conclude {
                    reason: format!("no valid source ({source}.{capability})"),
                }
            }
            other => other,
        }
    }

    fn emit_action(&self, action: &OracleAction) {
        let (action_type, source, capability, reason) = match action {
            OracleAction::Probe {
                source,
                capability,
                reason,
            } => (
                "probe",
                Some(source.clone()),
                Some(capability.clone()),
                reason.clone(),
            ),
            OracleAction::SpawnChild { reason, .. } => ("spawn_child", None, None, reason.clone()),
            OracleAction::Conclude { reason } => ("conclude", None, None, reason.clone()),
        };
        self.ctx.sink.emit(ProgressEvent::SubAgentAction {
            agent_id: self.agent_id.clone(),
            iteration: self.iteration,
            action_type: action_type.to_string(),
            source,
            capability,
            reason,
        });
    }

    /// Execute one probe and fold the resulting finding into the
    /// hypothesis. Probe failures are evidence; only the rescore call may
    /// be skipped.
    async fn probe_and_rescore(&mut self, source: &str, capability: &str) {
        let derived = self.derived_params(capability);
        let prepared = match self
            .ctx
            .registry
            .prepare(source, capability, &self.identifiers, &derived)
        {
            Ok(prepared) => prepared,
            Err(e) => {
                // `decide` already validated the pair; this is unreachable
                // in practice but must not crash the loop.
                warn!(error = %e, "probe preparation failed");
                return;
            }
        };

        let finding = match prepared {
            Prepared::Skipped { reason, params } => {
                let finding = Finding::skipped(source, capability, params, reason);
                let (stored, _) = self.ctx.evidence.insert(finding);
                self.emit_evidence(&stored);
                self.evidence.push((*stored).clone());
                return;
            }
            Prepared::Ready(probe) => {
                // Identity-keyed memoization: an identical invocation this
                // investigation returns the cached finding.
                match self.ctx.evidence.get(&probe.id) {
                    Some(cached) => cached,
                    None => {
                        let finding = self.ctx.registry.execute(&probe, &self.ctx.cancel).await;
                        let (stored, _) = self.ctx.evidence.insert(finding);
                        stored
                    }
                }
            }
        };

        self.emit_evidence(&finding);
        self.evidence.push((*finding).clone());

        let rescored = tokio::select! {
            _ = self.ctx.cancel.cancelled() => return,
            rescored = tokio::time::timeout(
                self.ctx.config.oracle_deadline,
                self.ctx.oracle.rescore(&self.hypothesis, &finding),
            ) => rescored,
        };

        match rescored {
            Ok(Ok(rescore)) => {
                let supports = rescore.verdict == RescoreVerdict::Support;
                let delta = self.hypothesis.apply_rescore(
                    rescore.new_confidence,
                    finding.id.clone(),
                    supports,
                    &self.ctx.config.thresholds,
                    self.ctx.config.sparse_evidence_dampener,
                );
                debug!(
                    verdict = ?rescore.verdict,
                    confidence = self.hypothesis.confidence,
                    delta,
                    "rescored hypothesis"
                );
                if delta.abs() > self.ctx.config.update_epsilon {
                    self.ctx.sink.emit(ProgressEvent::HypothesisUpdate {
                        id: self.hypothesis.id.as_str().to_string(),
                        confidence: self.hypothesis.confidence,
                        status: self.hypothesis.status,
                        delta,
                    });
                }
            }
            Ok(Err(e)) => warn!(error = %e, "oracle rescore failed, confidence unchanged"),
            Err(_) => warn!("oracle rescore timed out, confidence unchanged"),
        }
    }

    fn emit_evidence(&self, finding: &Finding) {
        self.ctx.sink.emit(ProgressEvent::Evidence {
            agent_id: Some(self.agent_id.clone()),
            finding_id: finding.id.as_str().to_string(),
            source: finding.source_name.clone(),
            capability: finding.capability_name.clone(),
            outcome: finding.outcome,
            summary: finding.summary.clone(),
        });
    }

    /// Parameters that cannot come from the identifier bag are derived here
    /// (the oracle only names probes; it never supplies values).
    fn derived_params(&self, capability: &str) -> ParamBag {
        let mut derived = ParamBag::new();
        match capability {
            "structured-log-search" => {
                derived.insert(
                    "service".to_string(),
                    ParamValue::Str(service_for_category(self.hypothesis.category).to_string()),
                );
            }
            "kv-doc-search" => {
                derived.insert(
                    "keywords".to_string(),
                    ParamValue::StrList(self.doc_search_keywords()),
                );
            }
            _ => {}
        }
        derived
    }

    /// Keywords for document search: tokens from the latest non-ok finding
    /// (or the latest finding), plus carrier/shipper names from the bag.
    fn doc_search_keywords(&self) -> Vec<String> {
        let latest = self
            .evidence
            .iter()
            .rev()
            .find(|f| f.outcome != lt_domain::ProbeOutcome::Ok)
            .or_else(|| self.evidence.last());

        let mut keywords: Vec<String> = latest
            .map(|f| {
                f.summary
                    .split_whitespace()
                    .filter(|w| w.len() > 3 && w.chars().all(|c| c.is_ascii_alphanumeric()))
                    .take(4)
                    .map(|w| w.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        for key in [IdKey::CarrierName, IdKey::ShipperName] {
            if let Some(name) = self.identifiers.get(key) {
                keywords.push(name.to_string());
            }
        }

        if keywords.is_empty() {
            keywords.push("tracking".to_string());
            keywords.push(self.hypothesis.category.as_str().to_string());
        }
        keywords
    }
}

/// Which service's logs to search for a given hypothesis category.
fn service_for_category(category: RootCauseCategory) -> &'static str {
    use RootCauseCategory::*;
    match category {
        CarrierFileProcessingError | CarrierFileMalformed | FileIngestionError
        | AssetAssignmentFailure | DataMappingError => "carrier-files-worker",
        LocationProcessingError | LocationValidationRejected | GeocodingFailure => {
            "location-worker"
        }
        _ => "tracking-worker",
    }
}
