//! Hypotheses: candidate root causes with evolving confidence.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::ConfidenceThresholds;
use crate::evidence::FindingId;

/// Closed vocabulary of root-cause categories. Oracle output is mapped into
/// this set; anything unmappable becomes `Unknown` rather than passing
/// through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCauseCategory {
    NetworkRelationshipMissing,
    NetworkRelationshipInactive,
    CarrierConfigMissing,
    CarrierPortalScrapeError,
    CarrierPortalDown,
    CarrierDataIncorrect,
    CarrierFileProcessingError,
    CarrierFileMalformed,
    TrackingMethodNotEnabled,
    SubscriptionInactive,
    IdentifierMismatch,
    AssetAssignmentFailure,
    LocationProcessingError,
    LocationValidationRejected,
    FileIngestionError,
    DataMappingError,
    GeocodingFailure,
    ValidationError,
    DuplicateLoad,
    LoadNotFound,
    LoadDeleted,
    SystemProcessingError,
    Unknown,
}

impl RootCauseCategory {
    pub const ALL: [RootCauseCategory; 23] = [
        Self::NetworkRelationshipMissing,
        Self::NetworkRelationshipInactive,
        Self::CarrierConfigMissing,
        Self::CarrierPortalScrapeError,
        Self::CarrierPortalDown,
        Self::CarrierDataIncorrect,
        Self::CarrierFileProcessingError,
        Self::CarrierFileMalformed,
        Self::TrackingMethodNotEnabled,
        Self::SubscriptionInactive,
        Self::IdentifierMismatch,
        Self::AssetAssignmentFailure,
        Self::LocationProcessingError,
        Self::LocationValidationRejected,
        Self::FileIngestionError,
        Self::DataMappingError,
        Self::GeocodingFailure,
        Self::ValidationError,
        Self::DuplicateLoad,
        Self::LoadNotFound,
        Self::LoadDeleted,
        Self::SystemProcessingError,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkRelationshipMissing => "network_relationship_missing",
            Self::NetworkRelationshipInactive => "network_relationship_inactive",
            Self::CarrierConfigMissing => "carrier_config_missing",
            Self::CarrierPortalScrapeError => "carrier_portal_scrape_error",
            Self::CarrierPortalDown => "carrier_portal_down",
            Self::CarrierDataIncorrect => "carrier_data_incorrect",
            Self::CarrierFileProcessingError => "carrier_file_processing_error",
            Self::CarrierFileMalformed => "carrier_file_malformed",
            Self::TrackingMethodNotEnabled => "tracking_method_not_enabled",
            Self::SubscriptionInactive => "subscription_inactive",
            Self::IdentifierMismatch => "identifier_mismatch",
            Self::AssetAssignmentFailure => "asset_assignment_failure",
            Self::LocationProcessingError => "location_processing_error",
            Self::LocationValidationRejected => "location_validation_rejected",
            Self::FileIngestionError => "file_ingestion_error",
            Self::DataMappingError => "data_mapping_error",
            Self::GeocodingFailure => "geocoding_failure",
            Self::ValidationError => "validation_error",
            Self::DuplicateLoad => "duplicate_load",
            Self::LoadNotFound => "load_not_found",
            Self::LoadDeleted => "load_deleted",
            Self::SystemProcessingError => "system_processing_error",
            Self::Unknown => "unknown",
        }
    }

    /// Map a loose category string (oracle output) into the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .find(|c| c.as_str() == normalized)
            .copied()
    }

    /// Like [`Self::parse`], but collapses unmappable values to `Unknown`.
    pub fn parse_or_unknown(value: &str) -> Self {
        Self::parse(value).unwrap_or(Self::Unknown)
    }

    /// Friendly base name for the sub-investigator testing a hypothesis of
    /// this category.
    pub fn agent_base_name(&self) -> &'static str {
        match self {
            Self::NetworkRelationshipMissing | Self::NetworkRelationshipInactive => {
                "Network Checker"
            }
            Self::CarrierConfigMissing | Self::TrackingMethodNotEnabled => "Config Checker",
            Self::CarrierPortalScrapeError | Self::CarrierPortalDown => "Portal Monitor",
            Self::CarrierDataIncorrect => "Carrier Monitor",
            Self::CarrierFileProcessingError
            | Self::CarrierFileMalformed
            | Self::FileIngestionError => "File Inspector",
            Self::SubscriptionInactive => "Subscription Checker",
            Self::IdentifierMismatch => "ID Validator",
            Self::AssetAssignmentFailure => "Asset Checker",
            Self::LocationProcessingError
            | Self::LocationValidationRejected
            | Self::GeocodingFailure => "Location Analyzer",
            Self::DataMappingError | Self::ValidationError => "Data Validator",
            Self::DuplicateLoad | Self::LoadNotFound | Self::LoadDeleted => "Load Finder",
            Self::SystemProcessingError => "System Analyzer",
            Self::Unknown => "Investigator",
        }
    }
}

impl std::fmt::Display for RootCauseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hypothesis lifecycle status. Always a pure function of confidence and
/// the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisStatus {
    Open,
    Confirmed,
    Eliminated,
}

impl HypothesisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Confirmed => "confirmed",
            Self::Eliminated => "eliminated",
        }
    }

    /// Recompute status from confidence.
    pub fn from_confidence(confidence: f64, thresholds: &ConfidenceThresholds) -> Self {
        if confidence >= thresholds.high {
            Self::Confirmed
        } else if confidence <= thresholds.low {
            Self::Eliminated
        } else {
            Self::Open
        }
    }
}

/// Hypothesis identifier: `hyp_<ULID>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HypothesisId(String);

impl HypothesisId {
    pub fn new() -> Self {
        Self(format!("hyp_{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HypothesisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HypothesisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A probe the oracle suggested for testing a hypothesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedProbe {
    pub source: String,
    pub capability: String,
    pub reason: String,
}

/// A candidate root cause under investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub description: String,
    pub category: RootCauseCategory,
    pub confidence: f64,
    pub status: HypothesisStatus,
    #[serde(default)]
    pub suggested_probes: Vec<SuggestedProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<HypothesisId>,
    #[serde(default)]
    pub evidence_for_ids: Vec<FindingId>,
    #[serde(default)]
    pub evidence_against_ids: Vec<FindingId>,
}

impl Hypothesis {
    pub fn new(
        description: impl Into<String>,
        category: RootCauseCategory,
        confidence: f64,
        thresholds: &ConfidenceThresholds,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            id: HypothesisId::new(),
            description: description.into(),
            category,
            confidence,
            status: HypothesisStatus::from_confidence(confidence, thresholds),
            suggested_probes: Vec::new(),
            parent_id: None,
            evidence_for_ids: Vec::new(),
            evidence_against_ids: Vec::new(),
        }
    }

    /// Promote a child description into a hypothesis, inheriting the parent
    /// category at dampened confidence.
    pub fn child_of(
        parent: &Hypothesis,
        description: impl Into<String>,
        thresholds: &ConfidenceThresholds,
    ) -> Self {
        let mut child = Self::new(
            description,
            parent.category,
            parent.confidence * 0.8,
            thresholds,
        );
        child.parent_id = Some(parent.id.clone());
        child
    }

    pub fn with_suggested_probes(mut self, probes: Vec<SuggestedProbe>) -> Self {
        self.suggested_probes = probes;
        self
    }

    /// Total evidence this hypothesis has been scored against.
    pub fn evidence_count(&self) -> usize {
        self.evidence_for_ids.len() + self.evidence_against_ids.len()
    }

    /// Apply an oracle rescore: record the evidence reference, replace the
    /// confidence (dampened while evidence is sparse, then clamped), and
    /// recompute status. Returns the signed confidence delta.
    pub fn apply_rescore(
        &mut self,
        new_confidence: f64,
        finding_id: FindingId,
        supports: bool,
        thresholds: &ConfidenceThresholds,
        sparse_dampener: f64,
    ) -> f64 {
        if supports {
            self.evidence_for_ids.push(finding_id);
        } else {
            self.evidence_against_ids.push(finding_id);
        }

        let old = self.confidence;
        let mut next = new_confidence;
        if self.evidence_count() < 3 {
            next *= sparse_dampener;
        }
        self.confidence = next.clamp(0.0, 1.0);
        self.status = HypothesisStatus::from_confidence(self.confidence, thresholds);
        self.confidence - old
    }

    /// Whether a sub-investigator should keep testing this hypothesis.
    pub fn is_settled(&self) -> bool {
        self.status != HypothesisStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ConfidenceThresholds {
        ConfidenceThresholds::default()
    }

    #[test]
    fn test_category_parse_round_trip() {
        for category in RootCauseCategory::ALL {
            assert_eq!(RootCauseCategory::parse(category.as_str()), Some(category));
        }
    }

    #[test]
    fn test_category_parse_loose_input() {
        assert_eq!(
            RootCauseCategory::parse("Network Relationship Missing"),
            Some(RootCauseCategory::NetworkRelationshipMissing)
        );
        assert_eq!(
            RootCauseCategory::parse_or_unknown("quantum flux error"),
            RootCauseCategory::Unknown
        );
    }

    #[test]
    fn test_status_from_confidence() {
        let t = thresholds();
        assert_eq!(
            HypothesisStatus::from_confidence(0.9, &t),
            HypothesisStatus::Confirmed
        );
        assert_eq!(
            HypothesisStatus::from_confidence(0.85, &t),
            HypothesisStatus::Confirmed
        );
        assert_eq!(
            HypothesisStatus::from_confidence(0.5, &t),
            HypothesisStatus::Open
        );
        assert_eq!(
            HypothesisStatus::from_confidence(0.10, &t),
            HypothesisStatus::Eliminated
        );
    }

    #[test]
    fn test_new_hypothesis_clamps_confidence() {
        let h = Hypothesis::new(
            "test",
            RootCauseCategory::LoadNotFound,
            1.7,
            &thresholds(),
        );
        assert_eq!(h.confidence, 1.0);
        assert_eq!(h.status, HypothesisStatus::Confirmed);
    }

    #[test]
    fn test_rescore_dampens_sparse_evidence() {
        let t = thresholds();
        let mut h = Hypothesis::new(
            "subscription inactive",
            RootCauseCategory::SubscriptionInactive,
            0.5,
            &t,
        );
        let finding = FindingId::from_string("fnd_test1".to_string());
        h.apply_rescore(1.0, finding, true, &t, 0.8);
        // One evidence item: 1.0 * 0.8 = 0.8, still open.
        assert!((h.confidence - 0.8).abs() < 1e-9);
        assert_eq!(h.status, HypothesisStatus::Open);
        assert_eq!(h.evidence_for_ids.len(), 1);
    }

    #[test]
    fn test_rescore_without_dampening_after_three_items() {
        let t = thresholds();
        let mut h = Hypothesis::new(
            "portal scrape failing",
            RootCauseCategory::CarrierPortalScrapeError,
            0.5,
            &t,
        );
        for i in 0..3 {
            h.apply_rescore(
                0.6,
                FindingId::from_string(format!("fnd_{i}")),
                true,
                &t,
                0.8,
            );
        }
        // Fourth rescore has three prior items, no dampening.
        h.apply_rescore(
            0.9,
            FindingId::from_string("fnd_final".to_string()),
            true,
            &t,
            0.8,
        );
        assert!((h.confidence - 0.9).abs() < 1e-9);
        assert_eq!(h.status, HypothesisStatus::Confirmed);
        assert!(h.is_settled());
    }

    #[test]
    fn test_contradicting_rescore_eliminates() {
        let t = thresholds();
        let mut h = Hypothesis::new(
            "relationship missing",
            RootCauseCategory::NetworkRelationshipMissing,
            0.4,
            &t,
        );
        let delta = h.apply_rescore(
            0.05,
            FindingId::from_string("fnd_net".to_string()),
            false,
            &t,
            0.8,
        );
        assert!(delta < 0.0);
        assert_eq!(h.status, HypothesisStatus::Eliminated);
        assert_eq!(h.evidence_against_ids.len(), 1);
    }

    #[test]
    fn test_child_inherits_dampened_confidence() {
        let t = thresholds();
        let parent = Hypothesis::new(
            "scrape errors",
            RootCauseCategory::CarrierPortalScrapeError,
            0.5,
            &t,
        );
        let child = Hypothesis::child_of(&parent, "specific subscription failing", &t);
        assert_eq!(child.category, parent.category);
        assert!((child.confidence - 0.4).abs() < 1e-9);
        assert_eq!(child.parent_id.as_ref(), Some(&parent.id));
    }
}
