//! End-to-end investigation scenarios against canned sources and a
//! scripted oracle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use lt_adapters::sources::canned::{CannedResponse, CannedSource};
use lt_domain::{
    Finding, Hypothesis, HypothesisStatus, IdentifierBag, IncidentRequest, InvestigationConfig,
    ModeHint, ProbeOutcome, ProgressEvent, RootCauseCategory, SuggestedProbe, TerminalReason,
    Verdict, VerdictKind,
};
use lt_engine::{InvestigationContext, Orchestrator, SourceRegistry};
use lt_ports::{
    CapabilityRef, OracleAction, OracleError, ProposedHypothesis, ReasoningOracle, Rescore,
    RescoreVerdict, SynthesisDraft,
};

// ============================================================================
// Scripted oracle
// ============================================================================

/// Deterministic oracle scripted per scenario.
#[derive(Default)]
struct ScriptedOracle {
    extract: Vec<(String, String)>,
    proposals: Vec<ProposedHypothesis>,
    /// Rescore outcome per capability name.
    rescores: HashMap<String, (RescoreVerdict, f64)>,
    synthesis: Option<SynthesisDraft>,
    /// When set, `decide_next` always returns this action.
    decide_override: Option<OracleAction>,
}

impl ScriptedOracle {
    fn proposal(
        description: &str,
        category: &str,
        confidence: f64,
        probes: &[(&str, &str)],
    ) -> ProposedHypothesis {
        ProposedHypothesis {
            description: description.to_string(),
            category: category.to_string(),
            confidence,
            suggested_probes: probes
                .iter()
                .map(|(source, capability)| SuggestedProbe {
                    source: source.to_string(),
                    capability: capability.to_string(),
                    reason: format!("probe {capability}"),
                })
                .collect(),
        }
    }

    fn draft(category: &str, confidence: f64, root_cause: &str, actions: &[&str]) -> SynthesisDraft {
        SynthesisDraft {
            root_cause: root_cause.to_string(),
            category: category.to_string(),
            confidence,
            explanation: format!("synthesized: {root_cause}"),
            recommended_actions: actions.iter().map(|a| a.to_string()).collect(),
            remaining_uncertainties: Vec::new(),
        }
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn extract_identifiers(
        &self,
        _description: &str,
    ) -> Result<Vec<(String, String)>, OracleError> {
        Ok(self.extract.clone())
    }

    async fn propose_hypotheses(
        &self,
        _identifiers: &IdentifierBag,
        _seed_evidence: &[Finding],
    ) -> Result<Vec<ProposedHypothesis>, OracleError> {
        Ok(self.proposals.clone())
    }

    async fn rescore(
        &self,
        hypothesis: &Hypothesis,
        finding: &Finding,
    ) -> Result<Rescore, OracleError> {
        let (verdict, confidence) = self
            .rescores
            .get(finding.capability_name.as_str())
            .copied()
            .unwrap_or((RescoreVerdict::Irrelevant, hypothesis.confidence));
        Ok(Rescore {
            verdict,
            new_confidence: confidence,
            rationale: format!("scripted rescore for {}", finding.capability_name),
        })
    }

    async fn decide_next(
        &self,
        hypothesis: &Hypothesis,
        evidence_so_far: &[Finding],
        available_sources: &[CapabilityRef],
    ) -> Result<OracleAction, OracleError> {
        if let Some(action) = &self.decide_override {
            return Ok(action.clone());
        }

        let next = hypothesis.suggested_probes.iter().find(|p| {
            available_sources
                .iter()
                .any(|c| c.source == p.source && c.capability == p.capability)
                && !evidence_so_far
                    .iter()
                    .any(|f| f.capability_name == p.capability)
        });

        Ok(match next {
            Some(probe) => OracleAction::Probe {
                source: probe.source.clone(),
                capability: probe.capability.clone(),
                reason: probe.reason.clone(),
            },
            None => OracleAction::Conclude {
                reason: "suggested probes exhausted".to_string(),
            },
        })
    }

    async fn synthesize(
        &self,
        _hypotheses: &[Hypothesis],
        _all_evidence: &[Finding],
    ) -> Result<SynthesisDraft, OracleError> {
        self.synthesis
            .clone()
            .ok_or_else(|| OracleError::Malformed {
                reason: "no scripted synthesis".to_string(),
            })
    }
}

// ============================================================================
// Harness
// ============================================================================

fn test_config() -> InvestigationConfig {
    InvestigationConfig {
        // Long heartbeat so scenario assertions see only lifecycle events.
        heartbeat_interval: Duration::from_secs(600),
        ..InvestigationConfig::default()
    }
}

struct Run {
    verdict: Verdict,
    events: Vec<ProgressEvent>,
}

async fn run_investigation(
    registry: SourceRegistry,
    oracle: impl ReasoningOracle + 'static,
    incident: IncidentRequest,
) -> Run {
    let (ctx, stream) = InvestigationContext::new(
        Arc::new(test_config()),
        Arc::new(registry),
        Arc::new(oracle),
    );
    let collector: JoinHandle<Vec<ProgressEvent>> = tokio::spawn(stream.collect());
    let verdict = Orchestrator::new(ctx).run(incident).await;
    let events = collector.await.expect("collector task");
    Run { verdict, events }
}

fn platform_payload() -> serde_json::Value {
    serde_json::json!({
        "tracking_id": 607485162,
        "load_number": "U110123982",
        "status": "Awaiting Tracking Info",
        "mode": "TL",
        "shipper_id": "walmart",
        "carrier_id": "hardy-brothers",
        "subscription_id": "sub-204"
    })
}

/// Validate the event sequence against the stream grammar: `started` first,
/// at most one `routed`/`identifiers`, per-agent events bracketed by spawn
/// and done, `verdict` after all agents, exactly one terminal event at the
/// end. Orchestrator-level evidence (no agent id) may appear before the
/// agent section.
fn assert_valid_sequence(events: &[ProgressEvent]) {
    let events: Vec<&ProgressEvent> = events
        .iter()
        .filter(|e| !matches!(e, ProgressEvent::Heartbeat { .. }))
        .collect();

    assert!(!events.is_empty(), "stream must not be empty");
    assert_eq!(events[0].event_name(), "started", "first event must be started");

    let terminal_count = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminal_count, 1, "exactly one terminal event");
    assert!(
        events.last().unwrap().is_terminal(),
        "terminal event must be last"
    );

    assert!(
        events.iter().filter(|e| e.event_name() == "routed").count() <= 1,
        "at most one routed event"
    );
    assert!(
        events
            .iter()
            .filter(|e| e.event_name() == "identifiers")
            .count()
            <= 1,
        "at most one identifiers event"
    );

    let mut spawn_index: HashMap<String, usize> = HashMap::new();
    let mut done_index: HashMap<String, usize> = HashMap::new();
    for (i, event) in events.iter().enumerate() {
        match event {
            ProgressEvent::SubAgentSpawn { agent_id, .. } => {
                spawn_index.insert(agent_id.clone(), i);
            }
            ProgressEvent::SubAgentDone { agent_id, .. } => {
                done_index.insert(agent_id.clone(), i);
            }
            _ => {}
        }
    }

    for (i, event) in events.iter().enumerate() {
        let agent_id = match event {
            ProgressEvent::SubAgentAction { agent_id, .. } => Some(agent_id),
            ProgressEvent::Evidence {
                agent_id: Some(agent_id),
                ..
            } => Some(agent_id),
            ProgressEvent::ChildSpawn {
                parent_agent_id, ..
            } => Some(parent_agent_id),
            _ => None,
        };
        if let Some(agent_id) = agent_id {
            let spawn = spawn_index
                .get(agent_id)
                .unwrap_or_else(|| panic!("agent {agent_id} acted without spawn"));
            let done = done_index
                .get(agent_id)
                .unwrap_or_else(|| panic!("agent {agent_id} never finished"));
            assert!(*spawn < i, "spawn must precede actions of {agent_id}");
            assert!(i < *done, "actions of {agent_id} must precede its done");
        }
    }

    if let Some(verdict_at) = events.iter().position(|e| e.event_name() == "verdict") {
        for done in done_index.values() {
            assert!(*done < verdict_at, "verdict must follow all sub_agent_done");
        }
    }
}

fn terminal_reasons(events: &[ProgressEvent]) -> HashMap<String, TerminalReason> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::SubAgentDone {
                agent_id,
                terminal_reason,
                ..
            } => Some((agent_id.clone(), *terminal_reason)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn network_relationship_missing_scenario() {
    let platform = Arc::new(
        CannedSource::new("platform")
            .with_payload("platform-load-lookup-by-number", platform_payload())
            .with_payload("platform-load-lookup-by-id", platform_payload()),
    );
    let network = Arc::new(CannedSource::new("network").with_payload(
        "network-relationship",
        serde_json::json!({
            "active": true,
            "eld_enabled": false,
            "tracking_methods": ["mobile_app"]
        }),
    ));

    let mut registry = SourceRegistry::new();
    registry.register(platform);
    registry.register(Arc::clone(&network) as Arc<dyn lt_ports::DataSource>);

    let oracle = ScriptedOracle {
        proposals: vec![ScriptedOracle::proposal(
            "No usable tracking method is enabled for this carrier",
            "tracking_method_not_enabled",
            0.5,
            &[("network", "network-relationship")],
        )],
        rescores: HashMap::from([(
            "network-relationship".to_string(),
            (RescoreVerdict::Support, 1.0),
        )]),
        synthesis: Some(ScriptedOracle::draft(
            "tracking_method_not_enabled",
            0.86,
            "The carrier has no ELD tracking method enabled for this load",
            &["Enable ELD tracking or add a tracking method for the carrier"],
        )),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "Load U110123982 not tracking for Walmart".to_string(),
        mode_hint: Some(ModeHint::Ground),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(run.verdict.kind, VerdictKind::RootCause);
    assert_eq!(
        run.verdict.root_cause_category,
        RootCauseCategory::TrackingMethodNotEnabled
    );
    assert!(run.verdict.confidence >= 0.80);
    assert!(run
        .verdict
        .recommended_actions
        .iter()
        .any(|a| a.contains("ELD") || a.contains("tracking method")));
    assert!(network.invocation_count() >= 1);
    assert_valid_sequence(&run.events);
}

#[tokio::test]
async fn load_not_found_scenario() {
    let platform = Arc::new(CannedSource::new("platform").with_response(
        "platform-load-lookup-by-number",
        CannedResponse::NotFound,
    ));

    let mut registry = SourceRegistry::new();
    registry.register(Arc::clone(&platform) as Arc<dyn lt_ports::DataSource>);

    let oracle = ScriptedOracle {
        proposals: vec![ScriptedOracle::proposal(
            "The load was never created in the platform",
            "load_not_found",
            0.6,
            &[("platform", "platform-load-lookup-by-number")],
        )],
        rescores: HashMap::from([(
            "platform-load-lookup-by-number".to_string(),
            (RescoreVerdict::Support, 1.0),
        )]),
        synthesis: Some(ScriptedOracle::draft(
            "load_not_found",
            0.9,
            "Load TESTOP1999 does not exist in the platform",
            &["Verify the load number with the customer"],
        )),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "Cannot find load TESTOP1999, no tracking updates".to_string(),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(
        run.verdict.root_cause_category,
        RootCauseCategory::LoadNotFound
    );
    assert!(run.verdict.confidence >= 0.85);
    assert!(run
        .verdict
        .recommended_actions
        .iter()
        .any(|a| a.to_lowercase().contains("verify")));
    // Identity-keyed memoization: the seed lookup and the sub-investigator
    // hit the same probe; the backend sees exactly one call.
    assert_eq!(platform.invocation_count(), 1);
    assert_valid_sequence(&run.events);
}

#[tokio::test]
async fn webhook_delivery_degraded_scenario() {
    let platform = Arc::new(
        CannedSource::new("platform").with_payload("platform-load-lookup-by-id", platform_payload()),
    );
    let webhook = Arc::new(CannedSource::new("webhook").with_payload(
        "webhook-delivery-history",
        serde_json::json!({ "attempts": 120, "failures": 78 }),
    ));

    let mut registry = SourceRegistry::new();
    registry.register(platform);
    registry.register(webhook);

    let oracle = ScriptedOracle {
        proposals: vec![ScriptedOracle::proposal(
            "Webhook callbacks to the customer endpoint are failing",
            "system_processing_error",
            0.5,
            &[("webhook", "webhook-delivery-history")],
        )],
        rescores: HashMap::from([(
            "webhook-delivery-history".to_string(),
            (RescoreVerdict::Support, 0.9),
        )]),
        synthesis: Some(ScriptedOracle::draft(
            "system_processing_error",
            0.8,
            "78 of 120 webhook delivery attempts failed with 5xx responses",
            &["Check the customer's callback endpoint health"],
        )),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "callbacks failing for this load".to_string(),
        tracking_id: Some("607485162".to_string()),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(
        run.verdict.root_cause_category,
        RootCauseCategory::SystemProcessingError
    );
    assert!(run.verdict.root_cause_text.contains("delivery"));

    // The hypothesis rose above 0.70 (0.9 dampened by 0.8 on sparse
    // evidence = 0.72) and the update was streamed.
    let update = run
        .events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::HypothesisUpdate { confidence, .. } => Some(*confidence),
            _ => None,
        })
        .expect("hypothesis_update event");
    assert!(update > 0.70);
    assert_valid_sequence(&run.events);
}

#[tokio::test]
async fn ocean_portal_scrape_errors_scenario() {
    let platform = Arc::new(CannedSource::new("platform").with_payload(
        "platform-load-lookup-by-id",
        serde_json::json!({
            "tracking_id": 617624324,
            "status": "In Transit",
            "mode": "OCEAN",
            "shipper_id": "acme-imports",
            "carrier_id": "blue-ocean-lines",
            "subscription_id": "sub-991"
        }),
    ));
    let portal = Arc::new(CannedSource::new("portal").with_payload(
        "carrier-portal-scrape-history",
        serde_json::json!({ "events": 200, "errors": 40, "last_success_days_ago": 5 }),
    ));

    let mut registry = SourceRegistry::new();
    registry.register(platform);
    registry.register(Arc::clone(&portal) as Arc<dyn lt_ports::DataSource>);

    let oracle = ScriptedOracle {
        proposals: vec![ScriptedOracle::proposal(
            "Portal scraping for this subscription is failing",
            "carrier_portal_scrape_error",
            0.5,
            &[("portal", "carrier-portal-scrape-history")],
        )],
        rescores: HashMap::from([(
            "carrier-portal-scrape-history".to_string(),
            (RescoreVerdict::Support, 0.95),
        )]),
        synthesis: Some(ScriptedOracle::draft(
            "carrier_portal_scrape_error",
            0.82,
            "Carrier portal scrapes are erroring; last success was five days ago",
            &["Re-run the portal scrape and verify portal credentials"],
        )),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "Ocean container not tracking".to_string(),
        tracking_id: Some("617624324".to_string()),
        mode_hint: Some(ModeHint::Ocean),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(
        run.verdict.root_cause_category,
        RootCauseCategory::CarrierPortalScrapeError
    );
    assert!(run.verdict.confidence >= 0.75);
    // The subscription id was discovered during seeding and used to fill
    // the portal probe.
    let invocations = portal.invocations();
    assert!(!invocations.is_empty());
    let (_, params) = &invocations[0];
    assert_eq!(
        params.get("subscription_id").and_then(|v| v.as_str()),
        Some("sub-991")
    );
    assert_valid_sequence(&run.events);
}

#[tokio::test]
async fn oracle_names_unregistered_source() {
    let platform = Arc::new(
        CannedSource::new("platform").with_payload("platform-load-lookup-by-id", platform_payload()),
    );

    let mut registry = SourceRegistry::new();
    registry.register(platform);

    // The oracle insists on probing a source that does not exist.
    let oracle = ScriptedOracle {
        proposals: vec![
            ScriptedOracle::proposal(
                "Carrier portal shows wrong data",
                "carrier_data_incorrect",
                0.5,
                &[],
            ),
            ScriptedOracle::proposal(
                "Subscription inactive",
                "subscription_inactive",
                0.4,
                &[],
            ),
        ],
        decide_override: Some(OracleAction::Probe {
            source: "Carrier Portal".to_string(),
            capability: "scrape".to_string(),
            reason: "look at the portal".to_string(),
        }),
        synthesis: Some(ScriptedOracle::draft(
            "unknown",
            0.3,
            "Insufficient evidence collected",
            &[],
        )),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "load not tracking".to_string(),
        tracking_id: Some("607485162".to_string()),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    // Every sub-investigator terminated on its first iteration, the
    // investigation still produced a verdict and completed.
    let reasons = terminal_reasons(&run.events);
    assert_eq!(reasons.len(), 2);
    assert!(reasons
        .values()
        .all(|r| *r == TerminalReason::OracleConcluded));
    for event in &run.events {
        if let ProgressEvent::SubAgentDone { iterations, .. } = event {
            assert_eq!(*iterations, 1);
        }
    }
    assert!(run.events.iter().any(|e| e.event_name() == "verdict"));
    assert_eq!(run.events.last().unwrap().event_name(), "complete");
    assert_valid_sequence(&run.events);
}

#[tokio::test(start_paused = true)]
async fn consumer_disconnect_cancels_investigation() {
    // Probes hang far beyond their deadlines.
    let platform = Arc::new(CannedSource::new("platform").with_response(
        "platform-load-lookup-by-id",
        CannedResponse::Hang(Duration::from_secs(3600)),
    ));

    let mut registry = SourceRegistry::new();
    registry.register(platform);

    let oracle = ScriptedOracle {
        synthesis: Some(ScriptedOracle::draft("unknown", 0.2, "n/a", &[])),
        ..Default::default()
    };

    let (ctx, mut stream) = InvestigationContext::new(
        Arc::new(test_config()),
        Arc::new(registry),
        Arc::new(oracle),
    );
    let cancel = ctx.cancel.clone();
    let handle = tokio::spawn(async move { Orchestrator::new(ctx).run(IncidentRequest {
        description: "load not tracking".to_string(),
        tracking_id: Some("607485162".to_string()),
        ..Default::default()
    }).await });

    // Read the first event, then disconnect.
    let first = stream.recv().await.expect("started event");
    assert_eq!(first.event_name(), "started");
    drop(stream);

    assert!(cancel.is_cancelled());
    let verdict = handle.await.expect("orchestrator task");
    assert_eq!(verdict.kind, VerdictKind::Error);
}

// ============================================================================
// Boundary behaviors
// ============================================================================

#[tokio::test]
async fn zero_identifiers_needs_human_without_probes() {
    let platform = Arc::new(
        CannedSource::new("platform").with_payload("platform-load-lookup-by-id", platform_payload()),
    );

    let mut registry = SourceRegistry::new();
    registry.register(Arc::clone(&platform) as Arc<dyn lt_ports::DataSource>);

    let oracle = ScriptedOracle::default();

    let incident = IncidentRequest {
        description: "no updates on my shipment, positions not showing".to_string(),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(run.verdict.kind, VerdictKind::NeedsHuman);
    assert!(run.verdict.needs_human);
    assert_eq!(platform.invocation_count(), 0, "no probes may be issued");
    assert_valid_sequence(&run.events);
}

#[tokio::test(start_paused = true)]
async fn all_probes_timeout_yields_needs_human() {
    let hang = Duration::from_secs(3600);
    let platform = Arc::new(CannedSource::new("platform").with_response(
        "platform-load-lookup-by-number",
        CannedResponse::Hang(hang),
    ));
    let network = Arc::new(CannedSource::new("network")
        .with_response("network-relationship", CannedResponse::Hang(hang)));
    let portal = Arc::new(CannedSource::new("portal").with_response(
        "carrier-portal-scrape-history",
        CannedResponse::Hang(hang),
    ));

    let mut registry = SourceRegistry::new();
    registry.register(platform);
    registry.register(network);
    registry.register(portal);

    // No proposals: the engine falls back to its default hypothesis set.
    let oracle = ScriptedOracle {
        synthesis: Some(ScriptedOracle::draft(
            "unknown",
            0.2,
            "All probes timed out; no evidence available",
            &[],
        )),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "Load U110123982 not tracking".to_string(),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(run.verdict.root_cause_category, RootCauseCategory::Unknown);
    assert!(run.verdict.needs_human);

    let timeouts = run
        .events
        .iter()
        .filter(|e| matches!(
            e,
            ProgressEvent::Evidence {
                outcome: ProbeOutcome::Timeout,
                ..
            }
        ))
        .count();
    assert!(timeouts >= 1, "timed-out probes must still appear as evidence");
    assert_valid_sequence(&run.events);
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn rerun_produces_same_category() {
    async fn one_run() -> Verdict {
        let platform = Arc::new(CannedSource::new("platform").with_response(
            "platform-load-lookup-by-number",
            CannedResponse::NotFound,
        ));
        let mut registry = SourceRegistry::new();
        registry.register(platform);

        let oracle = ScriptedOracle {
            proposals: vec![ScriptedOracle::proposal(
                "The load was never created in the platform",
                "load_not_found",
                0.6,
                &[("platform", "platform-load-lookup-by-number")],
            )],
            rescores: HashMap::from([(
                "platform-load-lookup-by-number".to_string(),
                (RescoreVerdict::Support, 1.0),
            )]),
            synthesis: Some(ScriptedOracle::draft(
                "load_not_found",
                0.9,
                "Load TESTOP1999 does not exist",
                &["Verify the load number with the customer"],
            )),
            ..Default::default()
        };

        let incident = IncidentRequest {
            description: "Cannot find load TESTOP1999".to_string(),
            ..Default::default()
        };
        run_investigation(registry, oracle, incident).await.verdict
    }

    let first = one_run().await;
    let second = one_run().await;
    assert_eq!(first.root_cause_category, second.root_cause_category);
    assert!((first.confidence - second.confidence).abs() < 0.05);
}

// ============================================================================
// Fallbacks
// ============================================================================

#[tokio::test]
async fn synthesis_fallback_reports_best_hypothesis() {
    let platform = Arc::new(
        CannedSource::new("platform").with_payload("platform-load-lookup-by-id", platform_payload()),
    );
    let network = Arc::new(CannedSource::new("network").with_response(
        "network-relationship",
        CannedResponse::NotFound,
    ));

    let mut registry = SourceRegistry::new();
    registry.register(platform);
    registry.register(network);

    // Synthesis is not scripted, so it fails and the engine falls back to
    // the highest-confidence hypothesis.
    let oracle = ScriptedOracle {
        proposals: vec![ScriptedOracle::proposal(
            "Network relationship between walmart and hardy-brothers is missing",
            "network_relationship_missing",
            0.5,
            &[("network", "network-relationship")],
        )],
        rescores: HashMap::from([(
            "network-relationship".to_string(),
            (RescoreVerdict::Support, 0.95),
        )]),
        synthesis: None,
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "load not tracking".to_string(),
        tracking_id: Some("607485162".to_string()),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;

    assert_eq!(run.verdict.kind, VerdictKind::RootCause);
    assert_eq!(
        run.verdict.root_cause_category,
        RootCauseCategory::NetworkRelationshipMissing
    );
    assert!(run.verdict.explanation.contains("fallback"));
    assert_valid_sequence(&run.events);
}

#[tokio::test]
async fn hypothesis_status_recomputable_from_confidence() {
    // For every hypothesis summary on the verdict, status must equal the
    // recomputation from its confidence.
    let platform = Arc::new(CannedSource::new("platform").with_response(
        "platform-load-lookup-by-number",
        CannedResponse::NotFound,
    ));
    let mut registry = SourceRegistry::new();
    registry.register(platform);

    let oracle = ScriptedOracle {
        proposals: vec![ScriptedOracle::proposal(
            "Load missing",
            "load_not_found",
            0.6,
            &[("platform", "platform-load-lookup-by-number")],
        )],
        rescores: HashMap::from([(
            "platform-load-lookup-by-number".to_string(),
            (RescoreVerdict::Support, 1.0),
        )]),
        synthesis: Some(ScriptedOracle::draft("load_not_found", 0.9, "missing", &[])),
        ..Default::default()
    };

    let incident = IncidentRequest {
        description: "Cannot find load TESTOP1999".to_string(),
        ..Default::default()
    };

    let run = run_investigation(registry, oracle, incident).await;
    let thresholds = test_config().thresholds;
    for summary in &run.verdict.hypotheses_summary {
        assert_eq!(
            summary.status,
            HypothesisStatus::from_confidence(summary.confidence, &thresholds),
            "status of '{}' must be recomputable",
            summary.description
        );
    }
}
