//! Orchestrator: top-level coordinator for one investigation.
//!
//! Flow: route the incident, extract identifiers, gather seed evidence,
//! form hypotheses, run sub-investigators under bounded parallelism, expand
//! child hypotheses depth by depth, then synthesize the verdict. Oracle
//! failures fall back to deterministic behavior at every step; only
//! cancellation and internal invariant violations are terminal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use ulid::Ulid;

use lt_domain::{
    extract_identifiers, route, Finding, Hypothesis, HypothesisStatus, HypothesisSummary, IdKey,
    IdentifierBag, IncidentRequest, Intent, ParamBag, Phase, ProbeOutcome, ProgressEvent,
    RootCauseCategory, SuggestedProbe, Verdict, VerdictKind,
};
use lt_ports::{ProposedHypothesis, SynthesisDraft};

use crate::context::InvestigationContext;
use crate::registry::Prepared;
use crate::stream::spawn_heartbeat;
use crate::sub_agent::{SubAgentOutcome, SubInvestigator};

/// Terminal orchestration failures. Everything else becomes a verdict.
#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("investigation cancelled")]
    Cancelled,

    #[error("internal invariant violation: {message}")]
    Internal { message: String },
}

/// Top-level coordinator. One instance per investigation run.
pub struct Orchestrator {
    ctx: InvestigationContext,
}

impl Orchestrator {
    pub fn new(ctx: InvestigationContext) -> Self {
        Self { ctx }
    }

    /// Run the investigation to completion, emitting progress events along
    /// the way. Always returns a verdict; the stream always ends with
    /// exactly one terminal event.
    #[instrument(skip(self, incident))]
    pub async fn run(&self, incident: IncidentRequest) -> Verdict {
        let started = Instant::now();
        let investigation_id = format!("inv_{}", Ulid::new());

        self.ctx.sink.emit(ProgressEvent::Started {
            investigation_id: investigation_id.clone(),
            mode: "hypothesis".to_string(),
            ts: Utc::now(),
        });

        let heartbeat_stop = self.ctx.cancel.child_token();
        let heartbeat = spawn_heartbeat(
            self.ctx.sink.clone(),
            Arc::clone(&self.ctx.tracker),
            self.ctx.config.heartbeat_interval,
            heartbeat_stop.clone(),
        );

        let result = self.run_inner(&incident, started).await;
        heartbeat_stop.cancel();
        let _ = heartbeat.await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(verdict) => {
                self.ctx.tracker.set_phase(Phase::Done);
                self.ctx.sink.emit(ProgressEvent::from_verdict(&verdict));
                self.ctx.sink.emit(ProgressEvent::Complete {
                    ts: Utc::now(),
                    duration_ms,
                });
                info!(
                    investigation_id = %investigation_id,
                    category = verdict.root_cause_category.as_str(),
                    confidence = verdict.confidence,
                    duration_ms,
                    "investigation complete"
                );
                verdict
            }
            Err(RunError::Cancelled) => {
                // Best effort: the consumer is usually gone already.
                self.ctx.sink.emit(ProgressEvent::Error {
                    message: "investigation cancelled".to_string(),
                    at_phase: "cancelled".to_string(),
                });
                Verdict::error("investigation cancelled", duration_ms)
            }
            Err(RunError::Internal { message }) => {
                self.ctx.sink.emit(ProgressEvent::Error {
                    message: message.clone(),
                    at_phase: self.ctx.tracker.phase().as_str().to_string(),
                });
                Verdict::error(message, duration_ms)
            }
        }
    }

    async fn run_inner(
        &self,
        incident: &IncidentRequest,
        started: Instant,
    ) -> Result<Verdict, RunError> {
        let config = Arc::clone(&self.ctx.config);

        // Step 1: route.
        self.ctx.tracker.set_phase(Phase::Routing);
        if !incident.has_usable_input() {
            return Ok(Verdict::needs_human(
                "insufficient identifiers: provide a description, load number, or tracking id",
                started.elapsed().as_millis() as u64,
            ));
        }

        let decision = route(incident);
        self.ctx.sink.emit(ProgressEvent::Routed {
            intent: decision.intent,
            domain: decision.domain,
            skill_id: decision.skill_id.clone(),
            confidence: decision.confidence,
            matched_patterns: decision.matched_patterns.clone(),
        });

        if decision.intent == Intent::Unknown {
            return Ok(Verdict::error(
                "could not classify incident intent",
                started.elapsed().as_millis() as u64,
            ));
        }
        if decision.intent != Intent::TrackingIssue {
            return Ok(Verdict::unsupported(
                decision.intent.as_str(),
                started.elapsed().as_millis() as u64,
            ));
        }

        // Step 2: extract identifiers. Explicit fields win over the regex
        // pre-pass, which wins over the oracle.
        let mut bag = IdentifierBag::from_incident(incident);
        bag.merge_first_wins(&extract_identifiers(&incident.description));
        self.oracle_extract(&incident.description, &mut bag).await;

        if !bag.has_lookup_identifier() {
            self.ctx
                .sink
                .emit(ProgressEvent::Identifiers { bag: bag.clone() });
            return Ok(Verdict::needs_human(
                "insufficient identifiers",
                started.elapsed().as_millis() as u64,
            ));
        }

        if self.ctx.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        // Step 3: seed evidence, enriching the bag from the platform's view
        // of the load. The bag is frozen once sub-investigators spawn.
        self.ctx.tracker.set_phase(Phase::Seeding);
        self.seed_lookup(&mut bag).await;
        self.ctx
            .sink
            .emit(ProgressEvent::Identifiers { bag: bag.clone() });

        if self.ctx.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        // Step 4: form hypotheses.
        self.ctx.tracker.set_phase(Phase::Forming);
        let hypotheses = self.form_hypotheses(&bag).await;
        for h in &hypotheses {
            self.ctx.sink.emit(ProgressEvent::Hypothesis {
                id: h.id.as_str().to_string(),
                description: h.description.clone(),
                category: h.category,
                confidence: h.confidence,
            });
        }

        // Steps 5-6: sub-investigators with depth-gated child expansion.
        self.ctx.tracker.set_phase(Phase::Probing);
        let bag = Arc::new(bag);
        let deadline_at = started + config.investigation_deadline;
        let semaphore = Arc::new(Semaphore::new(config.max_parallel));
        let mut name_counts: HashMap<String, u32> = HashMap::new();

        let mut pending: Vec<(String, Hypothesis)> = hypotheses
            .into_iter()
            .map(|h| (agent_name(&mut name_counts, h.category), h))
            .collect();

        let mut outcomes: Vec<SubAgentOutcome> = Vec::new();
        let mut unfinished: Vec<Hypothesis> = Vec::new();
        let mut deadline_hit = false;

        for _depth in 0..=config.max_child_depth {
            if pending.is_empty() {
                break;
            }
            if self.ctx.cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }

            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                deadline_hit = true;
                unfinished.extend(pending.drain(..).map(|(_, h)| h));
                break;
            }

            let batch: Vec<(String, Hypothesis)> = pending.drain(..).collect();
            let (round, timed_out) = self
                .run_round(batch, Arc::clone(&bag), Arc::clone(&semaphore), remaining)
                .await;
            deadline_hit |= timed_out;

            // Promote children for the next depth level.
            for outcome in &round {
                for (i, description) in outcome.children.iter().enumerate() {
                    let child = Hypothesis::child_of(
                        &outcome.hypothesis,
                        description.clone(),
                        &config.thresholds,
                    );
                    let child_agent = format!("{} > child {}", outcome.agent_id, i + 1);
                    pending.push((child_agent, child));
                }
            }
            outcomes.extend(round);

            if deadline_hit {
                unfinished.extend(pending.drain(..).map(|(_, h)| h));
                break;
            }
        }
        // Children beyond the depth limit are dropped; their descriptions
        // remain visible in the stream as child_spawn events.
        pending.clear();

        if self.ctx.cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        // Step 7: synthesize.
        self.ctx.tracker.set_phase(Phase::Synthesizing);
        let mut final_hypotheses: Vec<Hypothesis> =
            outcomes.iter().map(|o| o.hypothesis.clone()).collect();
        final_hypotheses.extend(unfinished);
        final_hypotheses.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let all_evidence: Vec<Finding> = self
            .ctx
            .evidence
            .snapshot()
            .iter()
            .map(|f| (**f).clone())
            .collect();

        let duration_ms = started.elapsed().as_millis() as u64;
        let draft = tokio::select! {
            _ = self.ctx.cancel.cancelled() => return Err(RunError::Cancelled),
            draft = tokio::time::timeout(
                config.oracle_deadline,
                self.ctx.oracle.synthesize(&final_hypotheses, &all_evidence),
            ) => draft,
        };

        let verdict = match draft {
            Ok(Ok(draft)) => {
                self.verdict_from_draft(draft, &final_hypotheses, duration_ms, deadline_hit)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "oracle synthesis failed, using fallback");
                self.fallback_verdict(&final_hypotheses, duration_ms, deadline_hit)
            }
            Err(_) => {
                warn!("oracle synthesis timed out, using fallback");
                self.fallback_verdict(&final_hypotheses, duration_ms, deadline_hit)
            }
        };

        // Referential integrity: every evidence id on the verdict must
        // exist in the store.
        for id in &verdict.evidence_ref_ids {
            if !self.ctx.evidence.contains(id) {
                return Err(RunError::Internal {
                    message: format!("verdict references unknown finding {id}"),
                });
            }
        }

        Ok(verdict)
    }

    /// Merge oracle-extracted identifiers into the bag (losing to anything
    /// already present). Oracle failures leave the bag untouched.
    async fn oracle_extract(&self, description: &str, bag: &mut IdentifierBag) {
        if description.trim().is_empty() {
            return;
        }
        let extracted = tokio::time::timeout(
            self.ctx.config.oracle_deadline,
            self.ctx.oracle.extract_identifiers(description),
        )
        .await;
        match extracted {
            Ok(Ok(pairs)) => {
                for (key, value) in pairs {
                    if let Some(key) = IdKey::parse(&key) {
                        bag.insert_first_wins(key, value);
                    }
                }
            }
            Ok(Err(e)) => warn!(error = %e, "oracle identifier extraction failed"),
            Err(_) => warn!("oracle identifier extraction timed out"),
        }
    }

    /// Seed the evidence store with the platform's view of the load and
    /// enrich the identifier bag from the response.
    async fn seed_lookup(&self, bag: &mut IdentifierBag) {
        let capability = if bag.contains(IdKey::TrackingId) {
            "platform-load-lookup-by-id"
        } else {
            "platform-load-lookup-by-number"
        };
        if !self.ctx.registry.contains("platform", capability) {
            warn!(capability, "platform source not registered, skipping seed lookup");
            return;
        }

        let prepared = match self
            .ctx
            .registry
            .prepare("platform", capability, bag, &ParamBag::new())
        {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "seed lookup preparation failed");
                return;
            }
        };

        let finding = match prepared {
            Prepared::Skipped { reason, params } => {
                let (stored, _) = self
                    .ctx
                    .evidence
                    .insert(Finding::skipped("platform", capability, params, reason));
                stored
            }
            Prepared::Ready(probe) => match self.ctx.evidence.get(&probe.id) {
                Some(cached) => cached,
                None => {
                    let finding = self.ctx.registry.execute(&probe, &self.ctx.cancel).await;
                    self.ctx.evidence.insert(finding).0
                }
            },
        };

        self.ctx.sink.emit(ProgressEvent::Evidence {
            agent_id: None,
            finding_id: finding.id.as_str().to_string(),
            source: finding.source_name.clone(),
            capability: finding.capability_name.clone(),
            outcome: finding.outcome,
            summary: finding.summary.clone(),
        });

        if finding.outcome == ProbeOutcome::Ok {
            enrich_bag(bag, &finding.payload);
        }
    }

    /// Ask the oracle for hypotheses, validating categories against the
    /// closed set and suggested probes against the registry. Falls back to
    /// the fixed default set when the oracle fails or returns nothing.
    async fn form_hypotheses(&self, bag: &IdentifierBag) -> Vec<Hypothesis> {
        let seed: Vec<Finding> = self
            .ctx
            .evidence
            .snapshot()
            .iter()
            .map(|f| (**f).clone())
            .collect();

        let proposed = tokio::time::timeout(
            self.ctx.config.oracle_deadline,
            self.ctx.oracle.propose_hypotheses(bag, &seed),
        )
        .await;

        let mut hypotheses = match proposed {
            Ok(Ok(proposals)) if !proposals.is_empty() => self.promote_proposals(proposals),
            Ok(Ok(_)) => {
                warn!("oracle proposed no hypotheses, using defaults");
                self.default_hypotheses()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "hypothesis formation failed, using defaults");
                self.default_hypotheses()
            }
            Err(_) => {
                warn!("hypothesis formation timed out, using defaults");
                self.default_hypotheses()
            }
        };

        hypotheses.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hypotheses
    }

    fn promote_proposals(&self, proposals: Vec<ProposedHypothesis>) -> Vec<Hypothesis> {
        proposals
            .into_iter()
            .take(5)
            .map(|p| {
                let category = RootCauseCategory::parse_or_unknown(&p.category);
                let probes: Vec<SuggestedProbe> = p
                    .suggested_probes
                    .into_iter()
                    .filter(|probe| {
                        let known = self.ctx.registry.contains(&probe.source, &probe.capability);
                        if !known {
                            warn!(
                                source = %probe.source,
                                capability = %probe.capability,
                                "dropping suggested probe for unregistered source"
                            );
                        }
                        known
                    })
                    .collect();
                Hypothesis::new(
                    p.description,
                    category,
                    p.confidence,
                    &self.ctx.config.thresholds,
                )
                .with_suggested_probes(probes)
            })
            .collect()
    }

    /// Deterministic fallback hypothesis set used when the oracle cannot
    /// propose anything usable.
    fn default_hypotheses(&self) -> Vec<Hypothesis> {
        let thresholds = &self.ctx.config.thresholds;
        vec![
            Hypothesis::new(
                "Network relationship between shipper and carrier is missing",
                RootCauseCategory::NetworkRelationshipMissing,
                0.4,
                thresholds,
            )
            .with_suggested_probes(vec![SuggestedProbe {
                source: "network".to_string(),
                capability: "network-relationship".to_string(),
                reason: "check whether the shipper-carrier link exists".to_string(),
            }]),
            Hypothesis::new(
                "Carrier portal scraping is failing or returning bad data",
                RootCauseCategory::CarrierPortalScrapeError,
                0.3,
                thresholds,
            )
            .with_suggested_probes(vec![SuggestedProbe {
                source: "portal".to_string(),
                capability: "carrier-portal-scrape-history".to_string(),
                reason: "check scrape history for errors".to_string(),
            }]),
            Hypothesis::new(
                "Tracking subscription is inactive or misconfigured",
                RootCauseCategory::SubscriptionInactive,
                0.2,
                thresholds,
            )
            .with_suggested_probes(vec![SuggestedProbe {
                source: "portal".to_string(),
                capability: "carrier-portal-scrape-history".to_string(),
                reason: "check subscription activity".to_string(),
            }]),
            Hypothesis::new(
                "No tracking method is enabled for this carrier",
                RootCauseCategory::TrackingMethodNotEnabled,
                0.2,
                thresholds,
            )
            .with_suggested_probes(vec![SuggestedProbe {
                source: "network".to_string(),
                capability: "network-relationship".to_string(),
                reason: "check configured tracking methods".to_string(),
            }]),
            Hypothesis::new(
                "The load does not exist in the platform",
                RootCauseCategory::LoadNotFound,
                0.1,
                thresholds,
            )
            .with_suggested_probes(vec![SuggestedProbe {
                source: "platform".to_string(),
                capability: "platform-load-lookup-by-number".to_string(),
                reason: "verify the load number resolves".to_string(),
            }]),
        ]
    }

    /// Run one depth level of sub-investigators under the semaphore. On
    /// round deadline the agents are cancelled (they finish their loops
    /// promptly and still emit their done events). Returns the collected
    /// outcomes and whether the deadline was hit.
    async fn run_round(
        &self,
        batch: Vec<(String, Hypothesis)>,
        bag: Arc<IdentifierBag>,
        semaphore: Arc<Semaphore>,
        remaining: std::time::Duration,
    ) -> (Vec<SubAgentOutcome>, bool) {
        let round_cancel = self.ctx.cancel.child_token();
        let collected: Arc<Mutex<Vec<SubAgentOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let mut join_set = JoinSet::new();

        for (agent_id, hypothesis) in batch {
            self.ctx.sink.emit(ProgressEvent::SubAgentSpawn {
                agent_id: agent_id.clone(),
                hypothesis_id: hypothesis.id.as_str().to_string(),
            });

            let mut agent_ctx = self.ctx.clone();
            agent_ctx.cancel = round_cancel.clone();
            let bag = Arc::clone(&bag);
            let semaphore = Arc::clone(&semaphore);
            let collected = Arc::clone(&collected);
            let tracker = Arc::clone(&self.ctx.tracker);

            join_set.spawn(async move {
                // Closed semaphore means shutdown; skip the run.
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let outcome = SubInvestigator::new(agent_id, hypothesis, bag, agent_ctx)
                    .run()
                    .await;
                tracker.complete_source();
                collected
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(outcome);
            });
        }

        let all_joined = tokio::time::timeout(remaining, async {
            while join_set.join_next().await.is_some() {}
        })
        .await;

        let timed_out = all_joined.is_err();
        if timed_out {
            warn!("investigation deadline reached, cancelling remaining sub-investigators");
            round_cancel.cancel();
            // Agents observe cancellation at their next suspension point;
            // wait for their done events so the stream stays well-formed.
            while join_set.join_next().await.is_some() {}
        }

        let outcomes = {
            let mut guard = collected.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        (outcomes, timed_out)
    }

    fn verdict_from_draft(
        &self,
        draft: SynthesisDraft,
        hypotheses: &[Hypothesis],
        duration_ms: u64,
        deadline_hit: bool,
    ) -> Verdict {
        let category = RootCauseCategory::parse_or_unknown(&draft.category);
        let confidence = draft.confidence.clamp(0.0, 1.0);
        let needs_human = deadline_hit || confidence < self.ctx.config.thresholds.med;
        let uncertainties = draft.remaining_uncertainties;

        let mut explanation = draft.explanation;
        if deadline_hit {
            explanation.push_str(
                "\n\nThe investigation deadline was reached; this synthesis uses partial evidence.",
            );
        }

        Verdict {
            kind: VerdictKind::RootCause,
            root_cause_text: draft.root_cause,
            root_cause_category: category,
            confidence,
            explanation,
            recommended_actions: draft.recommended_actions,
            remaining_uncertainties: uncertainties.clone(),
            evidence_ref_ids: referenced_evidence(hypotheses),
            hypotheses_summary: hypotheses.iter().map(HypothesisSummary::from).collect(),
            duration_ms,
            needs_human,
            human_question: needs_human.then(|| human_question(hypotheses, &uncertainties)),
        }
    }

    /// Synthesis fallback: report the highest-confidence hypothesis, open
    /// ones first.
    fn fallback_verdict(
        &self,
        hypotheses: &[Hypothesis],
        duration_ms: u64,
        deadline_hit: bool,
    ) -> Verdict {
        let best = hypotheses
            .iter()
            .filter(|h| h.status != HypothesisStatus::Eliminated)
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .or_else(|| hypotheses.first());

        let Some(best) = best else {
            return Verdict::needs_human("no hypotheses could be formed", duration_ms);
        };

        let needs_human = deadline_hit || best.confidence < self.ctx.config.thresholds.med;
        Verdict {
            kind: VerdictKind::RootCause,
            root_cause_text: best.description.clone(),
            root_cause_category: best.category,
            confidence: best.confidence,
            explanation: format!(
                "Synthesis fallback: the reasoning oracle was unavailable, so this verdict \
                 reports the highest-confidence hypothesis ({}).",
                best.category.as_str()
            ),
            recommended_actions: Vec::new(),
            remaining_uncertainties: vec!["synthesis ran in fallback mode".to_string()],
            evidence_ref_ids: referenced_evidence(hypotheses),
            hypotheses_summary: hypotheses.iter().map(HypothesisSummary::from).collect(),
            duration_ms,
            needs_human,
            human_question: needs_human.then(|| human_question(hypotheses, &[])),
        }
    }
}

/// Stable human-readable agent name for a hypothesis category, numbered on
/// collision.
fn agent_name(name_counts: &mut HashMap<String, u32>, category: RootCauseCategory) -> String {
    let base = category.agent_base_name();
    let count = name_counts.entry(base.to_string()).or_insert(0);
    *count += 1;
    if *count > 1 {
        format!("{base} #{count}")
    } else {
        base.to_string()
    }
}

/// All finding ids referenced by any hypothesis, deduplicated.
fn referenced_evidence(hypotheses: &[Hypothesis]) -> Vec<lt_domain::FindingId> {
    let mut seen = std::collections::BTreeSet::new();
    for h in hypotheses {
        for id in h.evidence_for_ids.iter().chain(&h.evidence_against_ids) {
            seen.insert(id.clone());
        }
    }
    seen.into_iter().collect()
}

/// Question for the human when confidence is low: the top open hypotheses
/// plus any remaining uncertainties.
fn human_question(hypotheses: &[Hypothesis], uncertainties: &[String]) -> String {
    let top: Vec<String> = hypotheses
        .iter()
        .filter(|h| h.status == HypothesisStatus::Open)
        .take(3)
        .map(|h| format!("{} ({:.0}%)", h.description, h.confidence * 100.0))
        .collect();

    let mut question = String::from("Confidence is low. Please review the open hypotheses: ");
    if top.is_empty() {
        question.push_str("none remain open.");
    } else {
        question.push_str(&top.join("; "));
    }
    if !uncertainties.is_empty() {
        question.push_str(" Uncertainties: ");
        question.push_str(&uncertainties.join(", "));
    }
    question
}

/// Pull newly discovered identifiers out of a seed-lookup payload.
fn enrich_bag(bag: &mut IdentifierBag, payload: &serde_json::Value) {
    const FIELDS: [(&str, IdKey); 8] = [
        ("tracking_id", IdKey::TrackingId),
        ("load_number", IdKey::LoadNumber),
        ("mode", IdKey::Mode),
        ("shipper_id", IdKey::ShipperId),
        ("carrier_id", IdKey::CarrierId),
        ("container_number", IdKey::ContainerNumber),
        ("booking_number", IdKey::BookingNumber),
        ("subscription_id", IdKey::SubscriptionId),
    ];

    let Some(obj) = payload.as_object() else {
        return;
    };
    for (field, key) in FIELDS {
        if let Some(value) = obj.get(field) {
            let rendered = match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            };
            if let Some(rendered) = rendered {
                bag.insert_first_wins(key, rendered);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_name_collision_numbering() {
        let mut counts = HashMap::new();
        let first = agent_name(&mut counts, RootCauseCategory::NetworkRelationshipMissing);
        let second = agent_name(&mut counts, RootCauseCategory::NetworkRelationshipInactive);
        let other = agent_name(&mut counts, RootCauseCategory::SubscriptionInactive);
        assert_eq!(first, "Network Checker");
        assert_eq!(second, "Network Checker #2");
        assert_eq!(other, "Subscription Checker");
    }

    #[test]
    fn test_enrich_bag_first_wins() {
        let mut bag = IdentifierBag::new();
        bag.insert_first_wins(IdKey::TrackingId, "607485162");
        enrich_bag(
            &mut bag,
            &serde_json::json!({
                "tracking_id": 999,
                "carrier_id": "hardy-brothers",
                "subscription_id": "sub-42",
                "mode": "TL"
            }),
        );
        // Existing value kept, new ones added, numbers rendered as strings.
        assert_eq!(bag.get(IdKey::TrackingId), Some("607485162"));
        assert_eq!(bag.get(IdKey::CarrierId), Some("hardy-brothers"));
        assert_eq!(bag.get(IdKey::SubscriptionId), Some("sub-42"));
        assert_eq!(bag.get(IdKey::Mode), Some("TL"));
    }

    #[test]
    fn test_human_question_lists_open_hypotheses() {
        let thresholds = lt_domain::ConfidenceThresholds::default();
        let open = Hypothesis::new(
            "portal scraping degraded",
            RootCauseCategory::CarrierPortalScrapeError,
            0.5,
            &thresholds,
        );
        let eliminated = Hypothesis::new(
            "load missing",
            RootCauseCategory::LoadNotFound,
            0.05,
            &thresholds,
        );
        let question = human_question(&[open, eliminated], &["scrape cadence unclear".to_string()]);
        assert!(question.contains("portal scraping degraded"));
        assert!(!question.contains("load missing"));
        assert!(question.contains("scrape cadence unclear"));
    }

    #[test]
    fn test_referenced_evidence_dedupes() {
        let thresholds = lt_domain::ConfidenceThresholds::default();
        let mut a = Hypothesis::new("a", RootCauseCategory::Unknown, 0.5, &thresholds);
        let mut b = Hypothesis::new("b", RootCauseCategory::Unknown, 0.5, &thresholds);
        let shared = lt_domain::FindingId::from_string("fnd_shared".to_string());
        a.evidence_for_ids.push(shared.clone());
        b.evidence_against_ids.push(shared);
        b.evidence_for_ids
            .push(lt_domain::FindingId::from_string("fnd_other".to_string()));
        assert_eq!(referenced_evidence(&[a, b]).len(), 2);
    }
}
