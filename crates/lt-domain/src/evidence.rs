//! Findings: the recorded outcomes of probes.
//!
//! A finding's identity is the hash of its probe invocation
//! (source, capability, canonicalized parameter bag), so rerunning the same
//! probe within one investigation merges into the cached finding instead of
//! duplicating it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single probe parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Date(NaiveDate),
    StrList(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Ordered parameter bag for one probe invocation.
pub type ParamBag = BTreeMap<String, ParamValue>;

/// Canonical text form of a parameter bag.
///
/// Keys are sorted (the map is ordered), values are rendered in a stable
/// way, string values are trimmed. Canonicalization is idempotent:
/// `canon(canon(p)) == canon(p)`.
pub fn canonicalize(params: &ParamBag) -> String {
    let mut parts = Vec::with_capacity(params.len());
    for (key, value) in params {
        let rendered = match value {
            ParamValue::Str(s) => s.trim().to_string(),
            ParamValue::Int(i) => i.to_string(),
            ParamValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            ParamValue::StrList(items) => {
                let mut sorted: Vec<String> =
                    items.iter().map(|s| s.trim().to_string()).collect();
                sorted.sort();
                sorted.join(",")
            }
        };
        parts.push(format!("{key}={rendered}"));
    }
    parts.join("&")
}

/// Stable identifier of a finding, derived from its probe invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FindingId(String);

impl FindingId {
    /// Identity rule: `sha256(source | capability | canonical params)`.
    pub fn for_probe(source: &str, capability: &str, params: &ParamBag) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(b"|");
        hasher.update(capability.as_bytes());
        hasher.update(b"|");
        hasher.update(canonicalize(params).as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("fnd_{}", &digest[..16]))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a probe invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Ok,
    NotFound,
    Error,
    Timeout,
    Skipped,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Skipped => "skipped",
        }
    }
}

/// Cheap structural hint about whether a finding supports the hypothesis it
/// was gathered for. The oracle's rescore verdict is authoritative; this is
/// only a hint recorded at collection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportsHint {
    Support,
    Contradict,
    Unknown,
}

/// The time window a time-bounded probe actually queried, after any
/// retention clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Whether the requested window was adjusted to fit retention.
    pub clamped: bool,
}

/// One recorded probe outcome. Immutable once inserted into the evidence
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub source_name: String,
    pub capability_name: String,
    pub params: ParamBag,
    pub produced_at: DateTime<Utc>,
    pub latency_ms: u64,
    pub outcome: ProbeOutcome,
    pub payload: serde_json::Value,
    /// One-line human-readable summary of the payload.
    pub summary: String,
    pub supports_hint: SupportsHint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<QueryWindow>,
}

impl Finding {
    /// Build a completed finding from a probe payload.
    pub fn ok(
        source: &str,
        capability: &str,
        params: ParamBag,
        payload: serde_json::Value,
        latency_ms: u64,
    ) -> Self {
        let summary = summarize_payload(source, capability, &payload);
        Self {
            id: FindingId::for_probe(source, capability, &params),
            source_name: source.to_string(),
            capability_name: capability.to_string(),
            params,
            produced_at: Utc::now(),
            latency_ms,
            outcome: ProbeOutcome::Ok,
            payload,
            summary,
            supports_hint: SupportsHint::Unknown,
            window: None,
        }
    }

    /// Build a finding for a probe that found nothing.
    pub fn not_found(source: &str, capability: &str, params: ParamBag, latency_ms: u64) -> Self {
        Self {
            id: FindingId::for_probe(source, capability, &params),
            source_name: source.to_string(),
            capability_name: capability.to_string(),
            params,
            produced_at: Utc::now(),
            latency_ms,
            outcome: ProbeOutcome::NotFound,
            payload: serde_json::Value::Null,
            summary: format!("No data returned from {source}.{capability}"),
            supports_hint: SupportsHint::Unknown,
            window: None,
        }
    }

    /// Build a finding for a failed probe. Failures are evidence too: the
    /// oracle sees them and may re-route.
    pub fn failed(
        source: &str,
        capability: &str,
        params: ParamBag,
        outcome: ProbeOutcome,
        reason: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        let reason = reason.into();
        Self {
            id: FindingId::for_probe(source, capability, &params),
            source_name: source.to_string(),
            capability_name: capability.to_string(),
            params,
            produced_at: Utc::now(),
            latency_ms,
            outcome,
            payload: serde_json::json!({ "reason": reason }),
            summary: format!("{source}.{capability} {}: {reason}", outcome.as_str()),
            supports_hint: SupportsHint::Unknown,
            window: None,
        }
    }

    /// Build a skipped finding (missing or unparseable parameters).
    pub fn skipped(
        source: &str,
        capability: &str,
        params: ParamBag,
        reason: impl Into<String>,
    ) -> Self {
        Self::failed(source, capability, params, ProbeOutcome::Skipped, reason, 0)
    }

    pub fn with_window(mut self, window: QueryWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Deterministic per-source one-line summaries. These feed the progress
/// stream and the oracle prompts, so they stay short and factual.
pub fn summarize_payload(source: &str, capability: &str, payload: &serde_json::Value) -> String {
    let obj = match payload.as_object() {
        Some(o) => o,
        None => return format!("Result from {source}.{capability}"),
    };

    match source {
        "platform" => {
            let status = obj
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let carrier = obj
                .get("carrier_id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            format!("Load exists, status={status}, carrier={carrier}")
        }
        "network" => {
            let active = obj.get("active").and_then(|v| v.as_bool());
            match active {
                Some(true) => {
                    let methods = obj
                        .get("tracking_methods")
                        .and_then(|v| v.as_array())
                        .map(|a| a.len())
                        .unwrap_or(0);
                    format!("Network relationship active, {methods} tracking method(s) configured")
                }
                Some(false) => "Network relationship exists but is inactive".to_string(),
                None => "No shipper-carrier relationship found".to_string(),
            }
        }
        "portal" => {
            let events = obj.get("events").and_then(|v| v.as_u64()).unwrap_or(0);
            let errors = obj.get("errors").and_then(|v| v.as_u64()).unwrap_or(0);
            if events == 0 {
                "No portal scrape history found".to_string()
            } else if errors > 0 {
                format!("Found {events} scrape events, {errors} with errors")
            } else {
                format!("Found {events} scrape events, no errors")
            }
        }
        "webhook" => {
            let attempts = obj.get("attempts").and_then(|v| v.as_u64()).unwrap_or(0);
            let failures = obj.get("failures").and_then(|v| v.as_u64()).unwrap_or(0);
            if attempts == 0 {
                "No webhook delivery attempts recorded".to_string()
            } else {
                format!("{attempts} delivery attempts, {failures} failed")
            }
        }
        "warehouse" => {
            if capability == "warehouse-company-permalink" {
                let count = obj
                    .get("permalinks")
                    .and_then(|v| v.as_array())
                    .map(|a| a.len())
                    .unwrap_or(0);
                format!("{count} matching company permalink(s)")
            } else {
                let failures = obj
                    .get("failed_validations")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                let latest = obj
                    .get("latest_error")
                    .and_then(|v| v.as_str())
                    .unwrap_or("none");
                format!("{failures} failed validation(s), latest error: {latest}")
            }
        }
        "logs" => {
            let count = obj.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
            if count == 0 {
                "No matching log entries found".to_string()
            } else {
                format!("Found {count} matching log entries")
            }
        }
        "docs" => {
            let count = obj.get("results").and_then(|v| v.as_array()).map(|a| a.len());
            match count {
                Some(0) | None => "No matching documents found".to_string(),
                Some(n) => format!("Found {n} related document(s)"),
            }
        }
        _ => format!("Data from {source}.{capability}: {} fields", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, ParamValue)]) -> ParamBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_canonicalize_sorts_and_trims() {
        let bag = params(&[
            ("b", ParamValue::Str("  x ".to_string())),
            ("a", ParamValue::Int(7)),
        ]);
        assert_eq!(canonicalize(&bag), "a=7&b=x");
    }

    #[test]
    fn test_canonicalize_sorts_lists() {
        let bag = params(&[(
            "keywords",
            ParamValue::StrList(vec!["zebra".to_string(), "alpha".to_string()]),
        )]);
        assert_eq!(canonicalize(&bag), "keywords=alpha,zebra");
    }

    #[test]
    fn test_identity_stable_across_param_order() {
        let a = params(&[
            ("tracking_id", ParamValue::Int(607485162)),
            ("window_days", ParamValue::Int(7)),
        ]);
        let mut b = ParamBag::new();
        b.insert("window_days".to_string(), ParamValue::Int(7));
        b.insert("tracking_id".to_string(), ParamValue::Int(607485162));

        assert_eq!(
            FindingId::for_probe("webhook", "webhook-delivery-history", &a),
            FindingId::for_probe("webhook", "webhook-delivery-history", &b)
        );
    }

    #[test]
    fn test_identity_differs_by_capability() {
        let bag = params(&[("tracking_id", ParamValue::Int(1))]);
        assert_ne!(
            FindingId::for_probe("platform", "platform-load-lookup-by-id", &bag),
            FindingId::for_probe("warehouse", "warehouse-load-validation", &bag)
        );
    }

    #[test]
    fn test_summary_platform() {
        let payload = serde_json::json!({"status": "Awaiting Tracking Info", "carrier_id": "hardy-brothers"});
        let summary = summarize_payload("platform", "platform-load-lookup-by-id", &payload);
        assert!(summary.contains("Awaiting Tracking Info"));
        assert!(summary.contains("hardy-brothers"));
    }

    #[test]
    fn test_summary_webhook_failures() {
        let payload = serde_json::json!({"attempts": 120, "failures": 78});
        let summary = summarize_payload("webhook", "webhook-delivery-history", &payload);
        assert_eq!(summary, "120 delivery attempts, 78 failed");
    }

    #[test]
    fn test_skipped_finding() {
        let finding = Finding::skipped(
            "network",
            "network-relationship",
            ParamBag::new(),
            "missing required parameter carrier_id",
        );
        assert_eq!(finding.outcome, ProbeOutcome::Skipped);
        assert!(finding.summary.contains("carrier_id"));
        assert_eq!(finding.latency_ms, 0);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn canonicalization_is_idempotent(
            keys in proptest::collection::vec("[a-z_]{1,12}", 0..6),
            values in proptest::collection::vec(any::<i64>(), 0..6),
        ) {
            let bag: ParamBag = keys
                .into_iter()
                .zip(values)
                .map(|(k, v)| (k, ParamValue::Int(v)))
                .collect();
            let once = canonicalize(&bag);
            // Re-parse the canonical form into a bag and canonicalize again.
            let reparsed: ParamBag = once
                .split('&')
                .filter(|s| !s.is_empty())
                .filter_map(|kv| {
                    let (k, v) = kv.split_once('=')?;
                    Some((k.to_string(), ParamValue::Str(v.to_string())))
                })
                .collect();
            prop_assert_eq!(once, canonicalize(&reparsed));
        }
    }
}
