//! Data-source registry: the uniform façade over heterogeneous probes.
//!
//! Capabilities are enumerated at boot in a declarative table that carries,
//! per capability, the parameter specs (name, type, required, which
//! identifier-bag keys fill it, default), the probe deadline, and the
//! backend's retention window. The registry validates and fills parameters
//! before any external call; a missing or unparseable required parameter
//! produces a skipped finding, never a crash.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use lt_domain::{
    Finding, FindingId, IdKey, IdentifierBag, ParamBag, ParamValue, ProbeOutcome, QueryWindow,
};
use lt_ports::{CapabilityRef, DataSource, ProbeError, ProbePayload};

/// Parameter value type expected by a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Str,
    Int,
    Date,
    StrList,
}

/// Default applied when neither the caller nor the identifier bag provides
/// a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    None,
    Int(i64),
    Today,
    DaysAgo(u32),
}

/// One parameter of a capability.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Identifier-bag keys tried in order to fill this parameter.
    pub fill_from: &'static [IdKey],
    pub default: ParamDefault,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind, fill_from: &'static [IdKey]) -> Self {
        Self {
            name,
            kind,
            required: true,
            fill_from,
            default: ParamDefault::None,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind, fill_from: &'static [IdKey]) -> Self {
        Self {
            name,
            kind,
            required: false,
            fill_from,
            default: ParamDefault::None,
        }
    }

    const fn with_default(mut self, default: ParamDefault) -> Self {
        self.default = default;
        self
    }
}

/// Boot-time description of one probe capability.
#[derive(Debug, Clone)]
pub struct CapabilityDescriptor {
    pub source: &'static str,
    pub capability: &'static str,
    pub params: Vec<ParamSpec>,
    pub deadline: Duration,
    /// Retention window for time-bounded queries, if the backend has one.
    pub retention_days: Option<u32>,
    /// When set, the probe runs as long as at least one fillable parameter
    /// resolved (used where any one of several identifiers is enough).
    pub requires_any: bool,
}

impl CapabilityDescriptor {
    fn new(
        source: &'static str,
        capability: &'static str,
        params: Vec<ParamSpec>,
        deadline_ms: u64,
    ) -> Self {
        Self {
            source,
            capability,
            params,
            deadline: deadline_from_env(capability, deadline_ms),
            retention_days: None,
            requires_any: false,
        }
    }

    fn with_retention(mut self, days: u32) -> Self {
        self.retention_days = Some(days);
        self
    }

    fn any_of(mut self) -> Self {
        self.requires_any = true;
        self
    }
}

/// Per-capability deadline override: `PROBE_DEADLINE_MS_<NAME>` with the
/// capability name upper-snaked.
fn deadline_from_env(capability: &str, default_ms: u64) -> Duration {
    let key = format!(
        "PROBE_DEADLINE_MS_{}",
        capability.to_ascii_uppercase().replace('-', "_")
    );
    let ms = std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

/// The full capability table. Sources not registered at boot simply leave
/// their capabilities unavailable.
fn builtin_descriptors() -> Vec<CapabilityDescriptor> {
    use IdKey::*;
    use ParamKind::*;

    vec![
        CapabilityDescriptor::new(
            "platform",
            "platform-load-lookup-by-id",
            vec![ParamSpec::required("tracking_id", Int, &[TrackingId])],
            15_000,
        ),
        CapabilityDescriptor::new(
            "platform",
            "platform-load-lookup-by-number",
            vec![
                ParamSpec::required("load_number", Str, &[LoadNumber]),
                ParamSpec::optional("shipper_id", Str, &[ShipperId]),
            ],
            15_000,
        ),
        CapabilityDescriptor::new(
            "warehouse",
            "warehouse-load-validation",
            vec![
                ParamSpec::optional("tracking_id", Int, &[TrackingId]),
                ParamSpec::optional("load_number", Str, &[LoadNumber]),
            ],
            30_000,
        )
        .any_of(),
        CapabilityDescriptor::new(
            "warehouse",
            "warehouse-company-permalink",
            vec![ParamSpec::required(
                "company_name",
                Str,
                &[ShipperName, CarrierName],
            )],
            30_000,
        ),
        CapabilityDescriptor::new(
            "network",
            "network-relationship",
            vec![
                ParamSpec::required("shipper_id", Str, &[ShipperId]),
                ParamSpec::required("carrier_id", Str, &[CarrierId]),
            ],
            15_000,
        ),
        CapabilityDescriptor::new(
            "portal",
            "carrier-portal-scrape-history",
            vec![
                ParamSpec::required("subscription_id", Str, &[SubscriptionId]),
                ParamSpec::optional("window_days", Int, &[]).with_default(ParamDefault::Int(7)),
            ],
            15_000,
        ),
        CapabilityDescriptor::new(
            "webhook",
            "webhook-delivery-history",
            vec![
                ParamSpec::required("tracking_id", Str, &[TrackingId]),
                ParamSpec::optional("window_days", Int, &[]).with_default(ParamDefault::Int(7)),
            ],
            15_000,
        ),
        CapabilityDescriptor::new(
            "logs",
            "structured-log-search",
            vec![
                ParamSpec::required("service", Str, &[]),
                ParamSpec::required("start", Date, &[]).with_default(ParamDefault::DaysAgo(7)),
                ParamSpec::required("end", Date, &[]).with_default(ParamDefault::Today),
                ParamSpec::required("search", Str, &[TrackingId, LoadNumber]),
                ParamSpec::optional("tracking_id", Str, &[TrackingId]),
            ],
            120_000,
        )
        .with_retention(30),
        CapabilityDescriptor::new(
            "docs",
            "kv-doc-search",
            vec![
                ParamSpec::required("keywords", StrList, &[]),
                ParamSpec::optional("space", Str, &[]),
            ],
            20_000,
        ),
    ]
}

/// Registry errors. Probe failures are findings, not errors; only naming a
/// capability outside the boot-time table fails fast.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown capability: {source_name}.{capability}")]
    UnknownCapability { source_name: String, capability: String },
}

/// A probe invocation whose parameters validated successfully.
#[derive(Debug, Clone)]
pub struct PreparedProbe {
    pub source: String,
    pub capability: String,
    pub params: ParamBag,
    pub id: FindingId,
    pub deadline: Duration,
    pub window: Option<QueryWindow>,
}

/// Outcome of parameter preparation.
#[derive(Debug, Clone)]
pub enum Prepared {
    Ready(PreparedProbe),
    /// Required parameters missing or unparseable; the probe must be
    /// recorded as a skipped finding.
    Skipped { reason: String, params: ParamBag },
}

/// Uniform façade over all registered data sources.
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn DataSource>>,
    descriptors: HashMap<String, CapabilityDescriptor>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        let descriptors = builtin_descriptors()
            .into_iter()
            .map(|d| (d.capability.to_string(), d))
            .collect();
        Self {
            sources: HashMap::new(),
            descriptors,
        }
    }

    /// Register a data-source backend. Capabilities the backend claims but
    /// the table does not list are ignored with a warning.
    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        for capability in source.capabilities() {
            match self.descriptors.get(capability.as_str()) {
                Some(descriptor) if descriptor.source == source.name() => {}
                Some(descriptor) => warn!(
                    capability = %capability,
                    expected_source = descriptor.source,
                    actual_source = source.name(),
                    "capability registered under unexpected source, ignoring"
                ),
                None => warn!(
                    capability = %capability,
                    source = source.name(),
                    "backend claims capability not in the boot table, ignoring"
                ),
            }
        }
        self.sources.insert(source.name().to_string(), source);
    }

    /// Whether a `(source, capability)` pair is invokable right now.
    pub fn contains(&self, source: &str, capability: &str) -> bool {
        self.descriptors
            .get(capability)
            .is_some_and(|d| d.source == source)
            && self.sources.contains_key(source)
    }

    /// All invokable capabilities, for listing to the oracle.
    pub fn capability_refs(&self) -> Vec<CapabilityRef> {
        let mut refs: Vec<CapabilityRef> = self
            .descriptors
            .values()
            .filter(|d| self.sources.contains_key(d.source))
            .map(|d| CapabilityRef::new(d.source, d.capability))
            .collect();
        refs.sort_by(|a, b| a.capability.cmp(&b.capability));
        refs
    }

    /// Validate and fill parameters for one probe.
    ///
    /// Fill order per parameter: caller-derived value, then the first
    /// identifier-bag key that is present, then the declared default.
    pub fn prepare(
        &self,
        source: &str,
        capability: &str,
        bag: &IdentifierBag,
        derived: &ParamBag,
    ) -> Result<Prepared, RegistryError> {
        let descriptor = self
            .descriptors
            .get(capability)
            .filter(|d| d.source == source && self.sources.contains_key(source))
            .ok_or_else(|| RegistryError::UnknownCapability {
                source_name: source.to_string(),
                capability: capability.to_string(),
            })?;

        let today = Utc::now().date_naive();
        let mut params = ParamBag::new();
        let mut filled_any = false;

        for spec in &descriptor.params {
            let value = match derived.get(spec.name) {
                Some(v) => Some(v.clone()),
                None => fill_from_bag(spec, bag),
            };

            let value = match (value, spec.default) {
                (Some(v), _) => Some(v),
                (None, ParamDefault::Int(i)) => Some(ParamValue::Int(i)),
                (None, ParamDefault::Today) => Some(ParamValue::Date(today)),
                (None, ParamDefault::DaysAgo(d)) => {
                    Some(ParamValue::Date(today - ChronoDuration::days(i64::from(d))))
                }
                (None, ParamDefault::None) => None,
            };

            match value {
                Some(v) => {
                    if !matches_kind(&v, spec.kind) {
                        return Ok(Prepared::Skipped {
                            reason: format!(
                                "parameter '{}' could not be parsed as {:?}",
                                spec.name, spec.kind
                            ),
                            params,
                        });
                    }
                    params.insert(spec.name.to_string(), v);
                    filled_any = true;
                }
                None if spec.required && !descriptor.requires_any => {
                    return Ok(Prepared::Skipped {
                        reason: format!("missing required parameter '{}'", spec.name),
                        params,
                    });
                }
                None => {}
            }
        }

        if descriptor.requires_any && !filled_any {
            return Ok(Prepared::Skipped {
                reason: "no usable identifier for this probe".to_string(),
                params,
            });
        }

        let window = clamp_window(&mut params, descriptor.retention_days, today);
        let id = FindingId::for_probe(source, capability, &params);

        Ok(Prepared::Ready(PreparedProbe {
            source: source.to_string(),
            capability: capability.to_string(),
            params,
            id,
            deadline: descriptor.deadline,
            window,
        }))
    }

    /// Run a prepared probe against its backend, bounded by the capability
    /// deadline and the investigation's cancellation token. Every outcome
    /// is a finding.
    #[instrument(skip(self, prepared, cancel), fields(source = %prepared.source, capability = %prepared.capability))]
    pub async fn execute(&self, prepared: &PreparedProbe, cancel: &CancellationToken) -> Finding {
        let source = match self.sources.get(&prepared.source) {
            Some(s) => Arc::clone(s),
            None => {
                return Finding::failed(
                    &prepared.source,
                    &prepared.capability,
                    prepared.params.clone(),
                    ProbeOutcome::Error,
                    "source not registered",
                    0,
                );
            }
        };

        let started = std::time::Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            outcome = tokio::time::timeout(
                prepared.deadline,
                source.invoke(&prepared.capability, &prepared.params),
            ) => match outcome {
                Ok(inner) => inner,
                Err(_) => Err(ProbeError::Timeout {
                    deadline_ms: prepared.deadline.as_millis() as u64,
                }),
            },
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let finding = match result {
            Ok(ProbePayload::Found(payload)) => Finding::ok(
                &prepared.source,
                &prepared.capability,
                prepared.params.clone(),
                payload,
                latency_ms,
            ),
            Ok(ProbePayload::NotFound) => Finding::not_found(
                &prepared.source,
                &prepared.capability,
                prepared.params.clone(),
                latency_ms,
            ),
            Err(ProbeError::Timeout { deadline_ms }) => Finding::failed(
                &prepared.source,
                &prepared.capability,
                prepared.params.clone(),
                ProbeOutcome::Timeout,
                format!("deadline of {deadline_ms}ms expired"),
                latency_ms,
            ),
            Err(ProbeError::Cancelled) => Finding::failed(
                &prepared.source,
                &prepared.capability,
                prepared.params.clone(),
                ProbeOutcome::Error,
                "cancelled",
                latency_ms,
            ),
            Err(e) => Finding::failed(
                &prepared.source,
                &prepared.capability,
                prepared.params.clone(),
                ProbeOutcome::Error,
                e.to_string(),
                latency_ms,
            ),
        };

        match &prepared.window {
            Some(window) => finding.with_window(window.clone()),
            None => finding,
        }
    }
}

/// Resolve a parameter from the identifier bag. An unparseable numeric
/// value resolves to `None`, which for a required parameter turns into a
/// skipped finding at the call site.
fn fill_from_bag(spec: &ParamSpec, bag: &IdentifierBag) -> Option<ParamValue> {
    for key in spec.fill_from {
        if let Some(raw) = bag.get(*key) {
            return match spec.kind {
                ParamKind::Str => Some(ParamValue::Str(raw.to_string())),
                ParamKind::Int => raw.trim().parse::<i64>().ok().map(ParamValue::Int),
                // Dates and lists never come from the identifier bag.
                ParamKind::Date | ParamKind::StrList => None,
            };
        }
    }
    None
}

fn matches_kind(value: &ParamValue, kind: ParamKind) -> bool {
    matches!(
        (value, kind),
        (ParamValue::Str(_), ParamKind::Str)
            | (ParamValue::Int(_), ParamKind::Int)
            | (ParamValue::Date(_), ParamKind::Date)
            | (ParamValue::StrList(_), ParamKind::StrList)
    )
}

/// Clamp `start`/`end` date parameters into the backend's retention window
/// and report the window actually queried.
fn clamp_window(
    params: &mut ParamBag,
    retention_days: Option<u32>,
    today: NaiveDate,
) -> Option<QueryWindow> {
    let retention = retention_days?;
    let earliest = today - ChronoDuration::days(i64::from(retention));

    let start = match params.get("start") {
        Some(ParamValue::Date(d)) => *d,
        _ => return None,
    };
    let end = match params.get("end") {
        Some(ParamValue::Date(d)) => *d,
        _ => return None,
    };

    let clamped_start = start.max(earliest);
    let clamped_end = end.min(today);
    let clamped = clamped_start != start || clamped_end != end;

    params.insert("start".to_string(), ParamValue::Date(clamped_start));
    params.insert("end".to_string(), ParamValue::Date(clamped_end));

    Some(QueryWindow {
        start: clamped_start,
        end: clamped_end,
        clamped,
    })
}
