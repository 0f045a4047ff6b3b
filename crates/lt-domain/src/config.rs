//! Investigation configuration knobs.
//!
//! All limits and thresholds are environment-overridable with sensible
//! defaults, so a single `InvestigationConfig::from_env()` at service start
//! is enough to tune a deployment.

use std::time::Duration;

/// Confidence thresholds shared by routing, hypothesis status, and synthesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    /// At or above this a hypothesis is confirmed / a route is auto-routable.
    pub high: f64,
    /// Below this a verdict or route needs human review.
    pub med: f64,
    /// At or below this a hypothesis is eliminated.
    pub low: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.85,
            med: 0.60,
            low: 0.10,
        }
    }
}

/// Tunables for one investigation run.
#[derive(Debug, Clone)]
pub struct InvestigationConfig {
    /// Maximum concurrently-running sub-investigators.
    pub max_parallel: usize,
    /// Maximum depth of child-hypothesis expansion.
    pub max_child_depth: u32,
    /// Iteration budget per sub-investigator.
    pub max_iterations_per_agent: u32,
    /// Confidence thresholds.
    pub thresholds: ConfidenceThresholds,
    /// Interval between heartbeat events.
    pub heartbeat_interval: Duration,
    /// Hard wall clock for the whole investigation.
    pub investigation_deadline: Duration,
    /// Hard wall clock per sub-investigator.
    pub agent_deadline: Duration,
    /// Deadline per oracle call.
    pub oracle_deadline: Duration,
    /// Confidence delta below which hypothesis updates are not streamed.
    pub update_epsilon: f64,
    /// Dampening factor applied to rescored confidence while a hypothesis
    /// has fewer than three evidence items.
    pub sparse_evidence_dampener: f64,
}

impl Default for InvestigationConfig {
    fn default() -> Self {
        Self {
            max_parallel: 5,
            max_child_depth: 2,
            max_iterations_per_agent: 5,
            thresholds: ConfidenceThresholds::default(),
            heartbeat_interval: Duration::from_millis(2_000),
            investigation_deadline: Duration::from_millis(300_000),
            agent_deadline: Duration::from_millis(90_000),
            oracle_deadline: Duration::from_millis(30_000),
            update_epsilon: 0.01,
            sparse_evidence_dampener: 0.8,
        }
    }
}

impl InvestigationConfig {
    /// Create configuration from environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_parallel: env_parse("MAX_PARALLEL", defaults.max_parallel),
            max_child_depth: env_parse("MAX_CHILD_DEPTH", defaults.max_child_depth),
            max_iterations_per_agent: env_parse(
                "MAX_ITERATIONS_PER_AGENT",
                defaults.max_iterations_per_agent,
            ),
            thresholds: ConfidenceThresholds {
                high: env_parse("HIGH_CONFIDENCE", defaults.thresholds.high),
                med: env_parse("MED_CONFIDENCE", defaults.thresholds.med),
                low: env_parse("LOW_CONFIDENCE", defaults.thresholds.low),
            },
            heartbeat_interval: Duration::from_millis(env_parse(
                "HEARTBEAT_INTERVAL_MS",
                defaults.heartbeat_interval.as_millis() as u64,
            )),
            investigation_deadline: Duration::from_millis(env_parse(
                "INVESTIGATION_DEADLINE_MS",
                defaults.investigation_deadline.as_millis() as u64,
            )),
            agent_deadline: Duration::from_millis(env_parse(
                "AGENT_DEADLINE_MS",
                defaults.agent_deadline.as_millis() as u64,
            )),
            oracle_deadline: Duration::from_millis(env_parse(
                "ORACLE_DEADLINE_MS",
                defaults.oracle_deadline.as_millis() as u64,
            )),
            update_epsilon: defaults.update_epsilon,
            sparse_evidence_dampener: defaults.sparse_evidence_dampener,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
