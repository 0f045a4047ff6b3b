//! Incident routing: intent and transport-domain classification.
//!
//! Routing is a single scan over two declarative pattern tables compiled at
//! boot. It never consults external systems; the decision is a pure function
//! of the incident input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::incident::{IncidentRequest, ModeHint};

/// Top-level intent classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    TrackingIssue,
    LoadCreation,
    DataQuality,
    Billing,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrackingIssue => "tracking_issue",
            Self::LoadCreation => "load_creation",
            Self::DataQuality => "data_quality",
            Self::Billing => "billing",
            Self::Unknown => "unknown",
        }
    }
}

/// Transport-domain classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportDomain {
    Otr,
    Ocean,
    Drayage,
    Air,
    Unknown,
}

impl TransportDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Otr => "otr",
            Self::Ocean => "ocean",
            Self::Drayage => "drayage",
            Self::Air => "air",
            Self::Unknown => "unknown",
        }
    }
}

/// One routing pattern: a compiled regex, the label reported when it
/// matches, and the weight it contributes to its tag's score.
struct RoutePattern {
    regex: Regex,
    label: &'static str,
    weight: u32,
}

fn pattern(raw: &'static str, label: &'static str, weight: u32) -> RoutePattern {
    RoutePattern {
        regex: Regex::new(raw).expect("static routing pattern"),
        label,
        weight,
    }
}

static INTENT_TABLE: Lazy<Vec<(Intent, Vec<RoutePattern>)>> = Lazy::new(|| {
    vec![
        (
            Intent::TrackingIssue,
            vec![
                pattern(r"(?i)not tracking", "not tracking", 1),
                pattern(r"(?i)no updates?", "no updates", 1),
                pattern(r"(?i)not receiving", "not receiving", 1),
                pattern(r"(?i)positions? not showing", "positions not showing", 1),
                pattern(r"(?i)tracking stopped", "tracking stopped", 1),
                pattern(r"(?i)awaiting tracking", "awaiting tracking", 1),
                pattern(r"(?i)no events?", "no events", 1),
                pattern(r"(?i)missing (position|update)s?", "missing positions/updates", 1),
                pattern(r"(?i)cannot (track|find)", "cannot track/find", 1),
                pattern(r"(?i)visibility (issue|problem)", "visibility issue", 1),
                pattern(r"(?i)no position", "no position", 1),
                pattern(r"(?i)positions? (missing|stopped)", "positions missing/stopped", 1),
                pattern(r"(?i)callbacks? fail", "callbacks failing", 1),
            ],
        ),
        (
            Intent::LoadCreation,
            vec![
                pattern(r"(?i)create load", "create load", 1),
                pattern(r"(?i)new (load|shipment)", "new load/shipment", 1),
                pattern(r"(?i)tender", "tender", 1),
            ],
        ),
        (
            Intent::DataQuality,
            vec![
                pattern(r"(?i)incorrect data", "incorrect data", 1),
                pattern(r"(?i)wrong (address|time|date)", "wrong field", 1),
                pattern(r"(?i)duplicate", "duplicate", 1),
                pattern(r"(?i)data (issue|problem)", "data issue", 1),
            ],
        ),
        (
            Intent::Billing,
            vec![
                pattern(r"(?i)invoice", "invoice", 1),
                pattern(r"(?i)billing", "billing", 1),
                pattern(r"(?i)charge[sd]?\b", "charges", 1),
            ],
        ),
    ]
});

static DOMAIN_TABLE: Lazy<Vec<(TransportDomain, Vec<RoutePattern>)>> = Lazy::new(|| {
    vec![
        (
            TransportDomain::Ocean,
            vec![
                pattern(r"(?i)container", "container", 1),
                pattern(r"(?i)vessel", "vessel", 1),
                pattern(r"(?i)\bb/?o/?l\b", "BOL", 1),
                pattern(r"(?i)booking", "booking", 1),
                pattern(r"(?i)ocean", "ocean", 1),
                pattern(r"(?i)\bport\b", "port", 1),
                pattern(r"(?i)terminal", "terminal", 1),
                pattern(r"(?i)(imo|mmsi)\s*\d+", "vessel ID", 1),
            ],
        ),
        (
            TransportDomain::Otr,
            vec![
                pattern(r"(?i)truck", "truck", 1),
                pattern(r"(?i)\beld\b", "ELD", 1),
                pattern(r"(?i)\bgps\b", "GPS", 1),
                pattern(r"(?i)driver", "driver", 1),
                pattern(r"(?i)ground", "ground", 1),
                pattern(r"(?i)over.?the.?road", "over-the-road", 1),
                pattern(r"(?i)\b(ftl|ltl)\b", "FTL/LTL", 1),
                pattern(r"(?i)tractor|trailer", "tractor/trailer", 1),
            ],
        ),
        (
            TransportDomain::Drayage,
            vec![
                pattern(r"(?i)dray(age)?", "drayage", 1),
                pattern(r"(?i)\byard\b", "yard", 1),
                pattern(r"(?i)chassis", "chassis", 1),
                pattern(r"(?i)check.?in", "check-in", 1),
                pattern(r"(?i)check.?out", "check-out", 1),
            ],
        ),
        (
            TransportDomain::Air,
            vec![
                pattern(r"(?i)\bair\b", "air", 1),
                pattern(r"(?i)flight", "flight", 1),
                pattern(r"(?i)\bawb\b", "AWB", 1),
                pattern(r"(?i)aircraft", "aircraft", 1),
                pattern(r"(?i)airport", "airport", 1),
            ],
        ),
    ]
});

/// Result of routing an incident, with confidence and reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub skill_id: String,
    pub confidence: f64,
    pub intent: Intent,
    pub domain: TransportDomain,
    pub reasoning: String,
    pub matched_patterns: Vec<String>,
}

impl RoutingDecision {
    /// Human-readable confidence level.
    pub fn confidence_level(&self) -> &'static str {
        if self.confidence >= 0.85 {
            "HIGH"
        } else if self.confidence >= 0.60 {
            "MEDIUM"
        } else {
            "LOW"
        }
    }

    /// Whether confidence is high enough for auto-routing.
    pub fn should_auto_route(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }

    /// Whether the decision needs human review.
    pub fn needs_human_review(&self, threshold: f64) -> bool {
        self.confidence < threshold
    }
}

/// Classify the incident into an intent and a transport domain.
///
/// Each matching pattern contributes its weight to its tag's score; the
/// highest-scoring intent/domain pair wins. An explicit mode hint overrides
/// whatever the description says about the domain. Overall confidence is
/// the mean of the intent and domain confidences.
pub fn route(incident: &IncidentRequest) -> RoutingDecision {
    let description = incident.description.as_str();
    let mut matched_patterns = Vec::new();

    let (intent, intent_confidence) = classify_intent(description, &mut matched_patterns);

    if intent == Intent::Unknown {
        return RoutingDecision {
            skill_id: "unknown".to_string(),
            confidence: 0.0,
            intent,
            domain: TransportDomain::Unknown,
            reasoning: "Could not classify intent from description".to_string(),
            matched_patterns,
        };
    }

    let (domain, domain_confidence) =
        detect_domain(description, incident.mode_hint, &mut matched_patterns);

    let skill_id = select_skill(intent, domain);
    let confidence = (intent_confidence + domain_confidence) / 2.0;

    let reasoning = format!(
        "Intent: {} ({:.0}%) -> Domain: {} ({:.0}%) -> Skill: {}",
        intent.as_str(),
        intent_confidence * 100.0,
        domain.as_str(),
        domain_confidence * 100.0,
        skill_id
    );

    RoutingDecision {
        skill_id,
        confidence,
        intent,
        domain,
        reasoning,
        matched_patterns,
    }
}

fn classify_intent(description: &str, matched: &mut Vec<String>) -> (Intent, f64) {
    let mut best: Option<(Intent, u32, Vec<&'static str>)> = None;

    for (intent, patterns) in INTENT_TABLE.iter() {
        let mut score = 0;
        let mut labels = Vec::new();
        for p in patterns {
            if p.regex.is_match(description) {
                score += p.weight;
                labels.push(p.label);
            }
        }
        if score > 0 && best.as_ref().map_or(true, |(_, s, _)| score > *s) {
            best = Some((*intent, score, labels));
        }
    }

    match best {
        Some((intent, score, labels)) => {
            matched.extend(labels.iter().map(|l| l.to_string()));
            // Confidence grows with the number of matched patterns.
            let confidence = (0.7 + f64::from(score) * 0.05).min(0.95);
            (intent, confidence)
        }
        None => (Intent::Unknown, 0.0),
    }
}

fn detect_domain(
    description: &str,
    mode_hint: Option<ModeHint>,
    matched: &mut Vec<String>,
) -> (TransportDomain, f64) {
    if let Some(mode) = mode_hint {
        matched.push(format!("mode:{}", mode.as_str()));
        let domain = match mode {
            ModeHint::Ground => TransportDomain::Otr,
            ModeHint::Ocean => TransportDomain::Ocean,
            ModeHint::Drayage => TransportDomain::Drayage,
            ModeHint::Air => TransportDomain::Air,
        };
        return (domain, 0.95);
    }

    let mut best: Option<(TransportDomain, u32, Vec<&'static str>)> = None;
    for (domain, patterns) in DOMAIN_TABLE.iter() {
        let mut score = 0;
        let mut labels = Vec::new();
        for p in patterns {
            if p.regex.is_match(description) {
                score += p.weight;
                labels.push(p.label);
            }
        }
        if score > 0 && best.as_ref().map_or(true, |(_, s, _)| score > *s) {
            best = Some((*domain, score, labels));
        }
    }

    match best {
        Some((domain, score, labels)) => {
            matched.extend(labels.iter().map(|l| l.to_string()));
            let confidence = (0.6 + f64::from(score) * 0.1).min(0.95);
            (domain, confidence)
        }
        // Over-the-road is the most common mode; default to it at low
        // confidence rather than refusing to route.
        None => {
            matched.push("default:ground".to_string());
            (TransportDomain::Otr, 0.5)
        }
    }
}

fn select_skill(intent: Intent, domain: TransportDomain) -> String {
    let skill = match (intent, domain) {
        (Intent::TrackingIssue, TransportDomain::Otr) => "otr-rca",
        (Intent::TrackingIssue, TransportDomain::Ocean) => "ocean-rca",
        (Intent::TrackingIssue, TransportDomain::Drayage) => "drayage-rca",
        (Intent::TrackingIssue, TransportDomain::Air) => "air-rca",
        (Intent::LoadCreation, _) => "load-creation",
        (Intent::DataQuality, _) => "data-quality",
        (Intent::Billing, _) => "billing",
        _ => "unknown",
    };
    skill.to_string()
}
