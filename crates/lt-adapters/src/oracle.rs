//! Reasoning-oracle clients.
//!
//! `HttpOracle` talks to an OpenAI-compatible chat-completions endpoint and
//! validates every response structurally before it reaches the engine.
//! `StaticOracle` is a deterministic, network-free stand-in used in tests
//! and when no oracle endpoint is configured; it scores findings with
//! keyword heuristics and walks each hypothesis's suggested probes in
//! order.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use lt_domain::{
    Finding, Hypothesis, IdentifierBag, ProbeOutcome, RootCauseCategory, SuggestedProbe,
};
use lt_ports::{
    CapabilityRef, OracleAction, OracleError, ProposedHypothesis, ReasoningOracle, Rescore,
    RescoreVerdict, SynthesisDraft,
};

// ============================================================================
// HTTP oracle
// ============================================================================

/// Configuration for the chat-completions oracle endpoint.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl OracleConfig {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("ORACLE_BASE_URL").ok()?;
        Some(Self {
            base_url,
            api_key: std::env::var("ORACLE_API_KEY").ok(),
            model: std::env::var("ORACLE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        })
    }
}

/// Oracle backed by an OpenAI-compatible chat-completions API.
pub struct HttpOracle {
    config: OracleConfig,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// One reasoning call returning parsed JSON.
    async fn reason_json(&self, prompt: &str) -> Result<serde_json::Value, OracleError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "temperature": 0.2,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a logistics root-cause-analysis assistant. \
                                Always answer with valid JSON and nothing else."
                },
                { "role": "user", "content": prompt }
            ],
        });

        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| OracleError::Transport {
            message: e.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(OracleError::Transport {
                message: format!("oracle endpoint returned {}", response.status()),
            });
        }

        let envelope: serde_json::Value =
            response.json().await.map_err(|e| OracleError::Transport {
                message: format!("invalid response body: {e}"),
            })?;

        let content = envelope["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| OracleError::Malformed {
                reason: "missing message content".to_string(),
            })?;

        let stripped = strip_code_fences(content);
        serde_json::from_str(stripped).map_err(|e| OracleError::Malformed {
            reason: format!("content is not valid JSON: {e}"),
        })
    }
}

/// Models wrap JSON in markdown fences more often than not.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn format_identifiers(bag: &IdentifierBag) -> String {
    let lines: Vec<String> = bag.iter().map(|(k, v)| format!("- {k}: {v}")).collect();
    if lines.is_empty() {
        "none".to_string()
    } else {
        lines.join("\n")
    }
}

fn format_evidence(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "No evidence collected yet.".to_string();
    }
    findings
        .iter()
        .map(|f| {
            format!(
                "- {} [source={}.{}, outcome={}]",
                f.summary,
                f.source_name,
                f.capability_name,
                f.outcome.as_str()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_capabilities(available: &[CapabilityRef]) -> String {
    available
        .iter()
        .map(|c| format!("- source: {}, capability: {}", c.source, c.capability))
        .collect::<Vec<_>>()
        .join("\n")
}

fn category_vocabulary() -> String {
    RootCauseCategory::ALL
        .iter()
        .map(|c| format!("- {}", c.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Deserialize)]
struct RawProbe {
    source: String,
    capability: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct RawHypothesis {
    description: String,
    category: String,
    confidence: f64,
    #[serde(default)]
    suggested_probes: Vec<RawProbe>,
}

#[derive(Deserialize)]
struct RawRescore {
    verdict: String,
    new_confidence: f64,
    #[serde(default)]
    rationale: String,
}

#[derive(Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    capability: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct RawSynthesis {
    root_cause: String,
    category: String,
    confidence: f64,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    recommended_actions: Vec<String>,
    #[serde(default)]
    remaining_uncertainties: Vec<String>,
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn extract_identifiers(
        &self,
        description: &str,
    ) -> Result<Vec<(String, String)>, OracleError> {
        let prompt = format!(
            "Extract shipment identifiers from this incident description. \
             Known keys: tracking_id, load_number, ticket_id, shipper_name, carrier_name, \
             container_number, booking_number, subscription_id, mode.\n\n\
             DESCRIPTION:\n{description}\n\n\
             Return a JSON object mapping each key you actually found to its value. \
             Omit keys you are not sure about; never invent values."
        );
        let value = self.reason_json(&prompt).await?;
        let object = value.as_object().ok_or_else(|| OracleError::Malformed {
            reason: "expected a JSON object".to_string(),
        })?;

        Ok(object
            .iter()
            .filter_map(|(k, v)| {
                let rendered = match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                };
                rendered.map(|r| (k.clone(), r))
            })
            .collect())
    }

    async fn propose_hypotheses(
        &self,
        identifiers: &IdentifierBag,
        seed_evidence: &[Finding],
    ) -> Result<Vec<ProposedHypothesis>, OracleError> {
        let prompt = format!(
            "Given this shipment tracking issue, form 3-5 hypotheses about the root cause.\n\n\
             AVAILABLE IDENTIFIERS:\n{ids}\n\n\
             INITIAL EVIDENCE:\n{evidence}\n\n\
             KNOWN ROOT CAUSE CATEGORIES (use these exact strings):\n{categories}\n\n\
             Return a JSON array of objects with fields: description, category, \
             confidence (0.0-1.0), suggested_probes (array of {{source, capability, reason}}).",
            ids = format_identifiers(identifiers),
            evidence = format_evidence(seed_evidence),
            categories = category_vocabulary(),
        );

        let value = self.reason_json(&prompt).await?;
        let raw: Vec<RawHypothesis> =
            serde_json::from_value(value).map_err(|e| OracleError::Malformed {
                reason: format!("hypothesis list failed validation: {e}"),
            })?;

        Ok(raw
            .into_iter()
            .map(|h| ProposedHypothesis {
                description: h.description,
                category: h.category,
                confidence: h.confidence.clamp(0.0, 1.0),
                suggested_probes: h
                    .suggested_probes
                    .into_iter()
                    .map(|p| SuggestedProbe {
                        source: p.source,
                        capability: p.capability,
                        reason: p.reason,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn rescore(
        &self,
        hypothesis: &Hypothesis,
        finding: &Finding,
    ) -> Result<Rescore, OracleError> {
        let prompt = format!(
            "Evaluate how this new evidence affects the hypothesis.\n\n\
             HYPOTHESIS:\n- Description: {desc}\n- Category: {category}\n\
             - Current confidence: {confidence:.2}\n\n\
             NEW EVIDENCE:\n- Finding: {summary}\n- Source: {source}.{capability}\n\
             - Outcome: {outcome}\n- Payload: {payload}\n\n\
             Does this evidence SUPPORT the hypothesis, CONTRADICT it, or is it IRRELEVANT?\n\
             Return JSON: {{\"verdict\": \"support|contradict|irrelevant\", \
             \"new_confidence\": <0.0-1.0>, \"rationale\": \"<why>\"}}",
            desc = hypothesis.description,
            category = hypothesis.category.as_str(),
            confidence = hypothesis.confidence,
            summary = finding.summary,
            source = finding.source_name,
            capability = finding.capability_name,
            outcome = finding.outcome.as_str(),
            payload = truncate(&finding.payload.to_string(), 500),
        );

        let value = self.reason_json(&prompt).await?;
        let raw: RawRescore =
            serde_json::from_value(value).map_err(|e| OracleError::Malformed {
                reason: format!("rescore failed validation: {e}"),
            })?;

        let verdict = match raw.verdict.to_ascii_lowercase().as_str() {
            "support" => RescoreVerdict::Support,
            "contradict" => RescoreVerdict::Contradict,
            "irrelevant" => RescoreVerdict::Irrelevant,
            other => {
                return Err(OracleError::Malformed {
                    reason: format!("unknown rescore verdict '{other}'"),
                })
            }
        };

        Ok(Rescore {
            verdict,
            new_confidence: raw.new_confidence.clamp(0.0, 1.0),
            rationale: raw.rationale,
        })
    }

    async fn decide_next(
        &self,
        hypothesis: &Hypothesis,
        evidence_so_far: &[Finding],
        available_sources: &[CapabilityRef],
    ) -> Result<OracleAction, OracleError> {
        let suggested = if hypothesis.suggested_probes.is_empty() {
            "No specific probes suggested.".to_string()
        } else {
            hypothesis
                .suggested_probes
                .iter()
                .map(|p| format!("- {}.{}: {}", p.source, p.capability, p.reason))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "Decide the next action for testing this hypothesis.\n\n\
             HYPOTHESIS:\n- Description: {desc}\n- Category: {category}\n\
             - Current confidence: {confidence:.2}\n- Status: {status}\n\n\
             EVIDENCE COLLECTED SO FAR:\n{evidence}\n\n\
             SUGGESTED PROBES (not yet done):\n{suggested}\n\n\
             AVAILABLE DATA SOURCES - YOU MUST USE THESE EXACT STRINGS:\n{available}\n\n\
             RULES:\n\
             1. 'source' and 'capability' must come verbatim from the list above.\n\
             2. Do NOT include parameter values; the system fills them.\n\
             3. If no listed source is relevant, conclude.\n\n\
             Return JSON: {{\"type\": \"probe|spawn_child|conclude\", \
             \"source\": \"...\", \"capability\": \"...\", \
             \"description\": \"<child hypothesis if spawning>\", \"reason\": \"<why>\"}}",
            desc = hypothesis.description,
            category = hypothesis.category.as_str(),
            confidence = hypothesis.confidence,
            status = hypothesis.status.as_str(),
            evidence = format_evidence(evidence_so_far),
            suggested = suggested,
            available = format_capabilities(available_sources),
        );

        let value = self.reason_json(&prompt).await?;
        let raw: RawAction = serde_json::from_value(value).map_err(|e| OracleError::Malformed {
            reason: format!("action failed validation: {e}"),
        })?;

        match raw.action_type.as_str() {
            "probe" | "query_data_source" | "revisit" => {
                if raw.source.is_empty() || raw.capability.is_empty() {
                    return Err(OracleError::Malformed {
                        reason: "probe action missing source or capability".to_string(),
                    });
                }
                Ok(OracleAction::Probe {
                    source: raw.source,
                    capability: raw.capability,
                    reason: raw.reason,
                })
            }
            "spawn_child" => {
                if raw.description.trim().is_empty() {
                    return Err(OracleError::Malformed {
                        reason: "spawn_child action missing description".to_string(),
                    });
                }
                Ok(OracleAction::SpawnChild {
                    description: raw.description,
                    reason: raw.reason,
                })
            }
            "conclude" => Ok(OracleAction::Conclude {
                reason: if raw.reason.is_empty() {
                    "sufficient evidence gathered".to_string()
                } else {
                    raw.reason
                },
            }),
            other => Err(OracleError::Malformed {
                reason: format!("unknown action type '{other}'"),
            }),
        }
    }

    async fn synthesize(
        &self,
        hypotheses: &[Hypothesis],
        all_evidence: &[Finding],
    ) -> Result<SynthesisDraft, OracleError> {
        let hypothesis_lines: Vec<String> = hypotheses
            .iter()
            .map(|h| {
                format!(
                    "- {} [category={}, confidence={:.2}, status={}]",
                    h.description,
                    h.category.as_str(),
                    h.confidence,
                    h.status.as_str()
                )
            })
            .collect();

        let prompt = format!(
            "Synthesize the final root cause for this shipment-tracking incident.\n\n\
             HYPOTHESES TESTED:\n{hypotheses}\n\n\
             ALL EVIDENCE:\n{evidence}\n\n\
             KNOWN ROOT CAUSE CATEGORIES (use these exact strings):\n{categories}\n\n\
             Return JSON: {{\"root_cause\": \"<one sentence>\", \"category\": \"<category>\", \
             \"confidence\": <0.0-1.0>, \"explanation\": \"<why>\", \
             \"recommended_actions\": [\"...\"], \"remaining_uncertainties\": [\"...\"]}}",
            hypotheses = hypothesis_lines.join("\n"),
            evidence = format_evidence(all_evidence),
            categories = category_vocabulary(),
        );

        let value = self.reason_json(&prompt).await?;
        let raw: RawSynthesis =
            serde_json::from_value(value).map_err(|e| OracleError::Malformed {
                reason: format!("synthesis failed validation: {e}"),
            })?;

        debug!(category = %raw.category, confidence = raw.confidence, "oracle synthesis");
        Ok(SynthesisDraft {
            root_cause: raw.root_cause,
            category: raw.category,
            confidence: raw.confidence.clamp(0.0, 1.0),
            explanation: raw.explanation,
            recommended_actions: raw.recommended_actions,
            remaining_uncertainties: raw.remaining_uncertainties,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============================================================================
// Deterministic offline oracle
// ============================================================================

/// Network-free oracle used for tests and unconfigured deployments.
///
/// It never invents identifiers or hypotheses (the engine's deterministic
/// defaults cover formation), walks each hypothesis's suggested probes in
/// order, and scores findings with keyword heuristics.
#[derive(Debug, Default, Clone)]
pub struct StaticOracle;

impl StaticOracle {
    pub fn new() -> Self {
        Self
    }
}

/// Remediation playbook per category.
pub fn recommended_actions_for(category: RootCauseCategory) -> Vec<String> {
    use RootCauseCategory::*;
    let actions: &[&str] = match category {
        NetworkRelationshipMissing => {
            &["Create the shipper-carrier network relationship and enable tracking permission"]
        }
        NetworkRelationshipInactive => &["Reactivate the shipper-carrier relationship"],
        CarrierConfigMissing | TrackingMethodNotEnabled => {
            &["Enable ELD tracking or add a tracking method for the carrier"]
        }
        CarrierPortalScrapeError | CarrierPortalDown => {
            &["Re-run the portal scrape and verify portal credentials"]
        }
        SubscriptionInactive => &["Reactivate the tracking subscription"],
        LoadNotFound | LoadDeleted => &["Verify the load number with the customer"],
        CarrierFileProcessingError | CarrierFileMalformed | FileIngestionError => {
            &["Inspect the latest carrier file and replay ingestion"]
        }
        IdentifierMismatch => &["Confirm container/booking identifiers with the carrier"],
        _ => &["Escalate to the tracking platform team with the collected evidence"],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

fn heuristic_rescore(hypothesis: &Hypothesis, finding: &Finding) -> Rescore {
    use RootCauseCategory::*;
    let summary = finding.summary.to_ascii_lowercase();
    let category = hypothesis.category;
    let confidence = hypothesis.confidence;

    let (verdict, new_confidence, rationale) = match (finding.outcome, category) {
        (ProbeOutcome::NotFound, LoadNotFound) => (
            RescoreVerdict::Support,
            0.95,
            "lookup confirmed the load does not exist",
        ),
        (ProbeOutcome::Ok, LoadNotFound) => (
            RescoreVerdict::Contradict,
            0.05,
            "the load exists in the platform",
        ),
        (ProbeOutcome::NotFound, NetworkRelationshipMissing)
            if finding.source_name == "network" =>
        {
            (
                RescoreVerdict::Support,
                0.92,
                "no shipper-carrier relationship on record",
            )
        }
        _ if summary.contains("inactive") && category == NetworkRelationshipInactive => (
            RescoreVerdict::Support,
            0.9,
            "relationship exists but is inactive",
        ),
        _ if summary.contains("0 tracking method")
            && (category == TrackingMethodNotEnabled || category == CarrierConfigMissing) =>
        {
            (
                RescoreVerdict::Support,
                0.9,
                "no tracking method configured for the carrier",
            )
        }
        _ if summary.contains("with errors")
            && (category == CarrierPortalScrapeError || category == CarrierPortalDown) =>
        {
            (
                RescoreVerdict::Support,
                (confidence + 0.35).min(1.0),
                "scrape history shows errors",
            )
        }
        _ if summary.contains("failed")
            && (category == SystemProcessingError || category == CarrierDataIncorrect) =>
        {
            (
                RescoreVerdict::Support,
                (confidence + 0.3).min(1.0),
                "delivery failures observed",
            )
        }
        _ if summary.contains("active") && category == NetworkRelationshipMissing => (
            RescoreVerdict::Contradict,
            0.05,
            "an active relationship exists",
        ),
        (ProbeOutcome::Timeout | ProbeOutcome::Error | ProbeOutcome::Skipped, _) => (
            RescoreVerdict::Irrelevant,
            confidence,
            "probe did not produce usable data",
        ),
        _ => (RescoreVerdict::Irrelevant, confidence, "no matching signal"),
    };

    Rescore {
        verdict,
        new_confidence,
        rationale: rationale.to_string(),
    }
}

#[async_trait]
impl ReasoningOracle for StaticOracle {
    async fn extract_identifiers(
        &self,
        _description: &str,
    ) -> Result<Vec<(String, String)>, OracleError> {
        // The deterministic regex pre-pass already ran; nothing to add.
        Ok(Vec::new())
    }

    async fn propose_hypotheses(
        &self,
        _identifiers: &IdentifierBag,
        _seed_evidence: &[Finding],
    ) -> Result<Vec<ProposedHypothesis>, OracleError> {
        // Empty means the engine uses its deterministic default set.
        Ok(Vec::new())
    }

    async fn rescore(
        &self,
        hypothesis: &Hypothesis,
        finding: &Finding,
    ) -> Result<Rescore, OracleError> {
        Ok(heuristic_rescore(hypothesis, finding))
    }

    async fn decide_next(
        &self,
        hypothesis: &Hypothesis,
        evidence_so_far: &[Finding],
        available_sources: &[CapabilityRef],
    ) -> Result<OracleAction, OracleError> {
        // Walk the suggested probes in order, skipping ones already done.
        let next = hypothesis
            .suggested_probes
            .iter()
            .find(|p| {
                available_sources
                    .iter()
                    .any(|c| c.source == p.source && c.capability == p.capability)
                    && !evidence_so_far
                        .iter()
                        .any(|f| f.capability_name == p.capability)
            });

        match next {
            Some(probe) => Ok(OracleAction::Probe {
                source: probe.source.clone(),
                capability: probe.capability.clone(),
                reason: probe.reason.clone(),
            }),
            None => Ok(OracleAction::Conclude {
                reason: "suggested probes exhausted".to_string(),
            }),
        }
    }

    async fn synthesize(
        &self,
        hypotheses: &[Hypothesis],
        all_evidence: &[Finding],
    ) -> Result<SynthesisDraft, OracleError> {
        let best = hypotheses
            .iter()
            .max_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| OracleError::Malformed {
                reason: "no hypotheses to synthesize from".to_string(),
            })?;

        Ok(SynthesisDraft {
            root_cause: best.description.clone(),
            category: best.category.as_str().to_string(),
            confidence: best.confidence,
            explanation: format!(
                "Tested {} hypotheses against {} findings; '{}' scored highest.",
                hypotheses.len(),
                all_evidence.len(),
                best.description
            ),
            recommended_actions: recommended_actions_for(best.category),
            remaining_uncertainties: hypotheses
                .iter()
                .filter(|h| h.status == lt_domain::HypothesisStatus::Open && h.id != best.id)
                .map(|h| h.description.clone())
                .collect(),
        })
    }
}
