//! Incident input and the identifier bag.
//!
//! The identifier bag is the only mutable shared record of what we know
//! about the shipment under investigation. Writes are append-only and
//! first-wins: a probe can add a newly discovered identifier but can never
//! overwrite one that is already set.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Transport mode hint supplied with an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeHint {
    Ground,
    Ocean,
    Drayage,
    Air,
}

impl ModeHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Ocean => "ocean",
            Self::Drayage => "drayage",
            Self::Air => "air",
        }
    }
}

/// An incoming incident to investigate.
///
/// At least one of `description`, `load_number`, or `tracking_id` must be
/// present for the incident to be investigable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentRequest {
    /// Free-form operator description of the problem.
    #[serde(default)]
    pub description: String,
    /// External ticket reference, if the incident came from a ticket.
    #[serde(default)]
    pub ticket_id: Option<String>,
    /// Customer-facing load number.
    #[serde(default)]
    pub load_number: Option<String>,
    /// Internal tracking id.
    #[serde(default)]
    pub tracking_id: Option<String>,
    /// Shipper hint (name or permalink).
    #[serde(default)]
    pub shipper: Option<String>,
    /// Carrier hint (name or permalink).
    #[serde(default)]
    pub carrier: Option<String>,
    /// Transport mode hint; overrides description-derived domain.
    #[serde(default)]
    pub mode_hint: Option<ModeHint>,
}

impl IncidentRequest {
    /// An incident is investigable when it carries a description or one of
    /// the two lookup identifiers.
    pub fn has_usable_input(&self) -> bool {
        !self.description.trim().is_empty()
            || self.load_number.is_some()
            || self.tracking_id.is_some()
    }
}

/// Canonical identifier keys. Closed set: probes and the oracle can only
/// contribute identifiers under these names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IdKey {
    TrackingId,
    LoadNumber,
    TicketId,
    ShipperId,
    CarrierId,
    ShipperName,
    CarrierName,
    ContainerNumber,
    BookingNumber,
    SubscriptionId,
    Mode,
}

impl IdKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrackingId => "tracking_id",
            Self::LoadNumber => "load_number",
            Self::TicketId => "ticket_id",
            Self::ShipperId => "shipper_id",
            Self::CarrierId => "carrier_id",
            Self::ShipperName => "shipper_name",
            Self::CarrierName => "carrier_name",
            Self::ContainerNumber => "container_number",
            Self::BookingNumber => "booking_number",
            Self::SubscriptionId => "subscription_id",
            Self::Mode => "mode",
        }
    }

    /// Parse a loose key name (as returned by the oracle) into a canonical
    /// key. Unknown names are dropped by callers, never fabricated.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tracking_id" | "load_id" => Some(Self::TrackingId),
            "load_number" => Some(Self::LoadNumber),
            "ticket_id" => Some(Self::TicketId),
            "shipper_id" | "shipper_permalink" => Some(Self::ShipperId),
            "carrier_id" | "carrier_permalink" => Some(Self::CarrierId),
            "shipper_name" | "shipper" => Some(Self::ShipperName),
            "carrier_name" | "carrier" => Some(Self::CarrierName),
            "container_number" | "container" => Some(Self::ContainerNumber),
            "booking_number" | "booking" => Some(Self::BookingNumber),
            "subscription_id" => Some(Self::SubscriptionId),
            "mode" => Some(Self::Mode),
            _ => None,
        }
    }
}

impl std::fmt::Display for IdKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only, first-wins identifier map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentifierBag {
    entries: BTreeMap<IdKey, String>,
}

impl IdentifierBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert only if the key is not already present. Returns whether the
    /// value was stored. Empty values are ignored.
    pub fn insert_first_wins(&mut self, key: IdKey, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.trim().is_empty() || self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    /// Merge another bag, keeping existing values on conflict.
    pub fn merge_first_wins(&mut self, other: &IdentifierBag) {
        for (key, value) in &other.entries {
            self.insert_first_wins(*key, value.clone());
        }
    }

    pub fn get(&self, key: IdKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: IdKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Whether the bag holds at least one identifier a seed lookup can use.
    pub fn has_lookup_identifier(&self) -> bool {
        self.contains(IdKey::TrackingId) || self.contains(IdKey::LoadNumber)
    }

    /// Seed the bag from the structured fields of an incident. Explicit
    /// fields always land first, so they win over anything extracted later.
    pub fn from_incident(incident: &IncidentRequest) -> Self {
        let mut bag = Self::new();
        if let Some(v) = &incident.tracking_id {
            bag.insert_first_wins(IdKey::TrackingId, v.clone());
        }
        if let Some(v) = &incident.load_number {
            bag.insert_first_wins(IdKey::LoadNumber, v.clone());
        }
        if let Some(v) = &incident.ticket_id {
            bag.insert_first_wins(IdKey::TicketId, v.clone());
        }
        if let Some(v) = &incident.shipper {
            bag.insert_first_wins(IdKey::ShipperName, v.clone());
        }
        if let Some(v) = &incident.carrier {
            bag.insert_first_wins(IdKey::CarrierName, v.clone());
        }
        if let Some(mode) = incident.mode_hint {
            bag.insert_first_wins(IdKey::Mode, mode.as_str());
        }
        bag
    }
}

static TRACKING_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)tracking[_\s]?id[:\s]*(\d+)",
        r"(?i)tracking[:\s]*(\d{9,})",
        r"(?i)load[_\s]?id[:\s]*(\d+)",
        r"(?i)\bid[:\s]*(\d{9,})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static LOAD_NUMBER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)load[_\s]?number[:\s]*([A-Za-z0-9\-_]+)",
        r"(?i)load[#:\s]+([A-Za-z0-9\-_]+)",
        r"(?i)(?:customer\s+)?load[:\s]*([A-Za-z0-9\-_]+)",
        r"\b([A-Z]{1,3}\d{8,})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static CONTAINER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{4}\d{7})\b").expect("static pattern"));

/// Deterministic identifier extraction from free text.
///
/// Runs before any oracle call so an investigation can still start when the
/// oracle is unavailable. Values extracted here lose to explicit request
/// fields (first-wins ordering is the caller's responsibility).
pub fn extract_identifiers(description: &str) -> IdentifierBag {
    let mut bag = IdentifierBag::new();

    for pattern in TRACKING_ID_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(description) {
            bag.insert_first_wins(IdKey::TrackingId, &captures[1]);
            break;
        }
    }

    for pattern in LOAD_NUMBER_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(description) {
            let candidate = &captures[1];
            // Real load numbers carry digits; this rejects prose like
            // "load not tracking" matching as a load number.
            if !candidate.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            // A purely numeric "load number" is really a tracking id.
            if candidate.chars().all(|c| c.is_ascii_digit()) && candidate.len() >= 9 {
                bag.insert_first_wins(IdKey::TrackingId, candidate);
            } else {
                bag.insert_first_wins(IdKey::LoadNumber, candidate);
            }
            break;
        }
    }

    if let Some(captures) = CONTAINER_PATTERN.captures(description) {
        bag.insert_first_wins(IdKey::ContainerNumber, &captures[1]);
    }

    bag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_wins_insert() {
        let mut bag = IdentifierBag::new();
        assert!(bag.insert_first_wins(IdKey::LoadNumber, "U110123982"));
        assert!(!bag.insert_first_wins(IdKey::LoadNumber, "OTHER"));
        assert_eq!(bag.get(IdKey::LoadNumber), Some("U110123982"));
    }

    #[test]
    fn test_empty_value_ignored() {
        let mut bag = IdentifierBag::new();
        assert!(!bag.insert_first_wins(IdKey::CarrierId, "  "));
        assert!(bag.is_empty());
    }

    #[test]
    fn test_merge_keeps_existing() {
        let mut bag = IdentifierBag::new();
        bag.insert_first_wins(IdKey::TrackingId, "607485162");
        let mut other = IdentifierBag::new();
        other.insert_first_wins(IdKey::TrackingId, "999");
        other.insert_first_wins(IdKey::CarrierId, "hardy-brothers");
        bag.merge_first_wins(&other);
        assert_eq!(bag.get(IdKey::TrackingId), Some("607485162"));
        assert_eq!(bag.get(IdKey::CarrierId), Some("hardy-brothers"));
    }

    #[test]
    fn test_extract_load_number() {
        let bag = extract_identifiers("Load U110123982 not tracking for Walmart");
        assert_eq!(bag.get(IdKey::LoadNumber), Some("U110123982"));
    }

    #[test]
    fn test_extract_tracking_id() {
        let bag = extract_identifiers("tracking_id: 607485162 callbacks failing");
        assert_eq!(bag.get(IdKey::TrackingId), Some("607485162"));
    }

    #[test]
    fn test_extract_container_number() {
        let bag = extract_identifiers("Container ABCD1234567 not tracking, vessel updates missing");
        assert_eq!(bag.get(IdKey::ContainerNumber), Some("ABCD1234567"));
    }

    #[test]
    fn test_extract_rejects_prose_after_load() {
        let bag = extract_identifiers("load not tracking for walmart");
        assert_eq!(bag.get(IdKey::LoadNumber), None);
    }

    #[test]
    fn test_extract_nothing_from_plain_text() {
        let bag = extract_identifiers("positions stopped showing yesterday");
        assert!(!bag.has_lookup_identifier());
    }

    #[test]
    fn test_incident_usable_input() {
        let incident = IncidentRequest::default();
        assert!(!incident.has_usable_input());

        let incident = IncidentRequest {
            tracking_id: Some("617624324".to_string()),
            ..Default::default()
        };
        assert!(incident.has_usable_input());
    }

    #[test]
    fn test_bag_from_incident_explicit_fields() {
        let incident = IncidentRequest {
            description: "Load U110123982 not tracking".to_string(),
            load_number: Some("EXPLICIT1".to_string()),
            mode_hint: Some(ModeHint::Ground),
            ..Default::default()
        };
        let mut bag = IdentifierBag::from_incident(&incident);
        bag.merge_first_wins(&extract_identifiers(&incident.description));
        // Explicit field wins over the extracted value.
        assert_eq!(bag.get(IdKey::LoadNumber), Some("EXPLICIT1"));
        assert_eq!(bag.get(IdKey::Mode), Some("ground"));
    }

    #[test]
    fn test_id_key_parse_aliases() {
        assert_eq!(IdKey::parse("load_id"), Some(IdKey::TrackingId));
        assert_eq!(IdKey::parse("Carrier"), Some(IdKey::CarrierName));
        assert_eq!(IdKey::parse("definitely_not_a_key"), None);
    }
}
