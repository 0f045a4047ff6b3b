//! Append-only evidence store for one investigation.
//!
//! Writers hold a short mutex; readers take snapshots. Findings are
//! immutable once inserted and deduplicated by identity, so a probe rerun
//! with identical inputs resolves to the already-stored finding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lt_domain::{Finding, FindingId};

#[derive(Default)]
struct Inner {
    order: Vec<Arc<Finding>>,
    by_id: HashMap<FindingId, Arc<Finding>>,
    by_capability: HashMap<(String, String), Vec<Arc<Finding>>>,
}

/// Concurrent append-only set of findings with dual indexes.
#[derive(Default)]
pub struct EvidenceStore {
    inner: Mutex<Inner>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a finding, deduplicating by id. Returns the stored finding
    /// and whether this call inserted it (false means an identical probe
    /// already ran and its finding was kept).
    pub fn insert(&self, finding: Finding) -> (Arc<Finding>, bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = inner.by_id.get(&finding.id) {
            return (Arc::clone(existing), false);
        }
        let stored = Arc::new(finding);
        inner.by_id.insert(stored.id.clone(), Arc::clone(&stored));
        inner
            .by_capability
            .entry((stored.source_name.clone(), stored.capability_name.clone()))
            .or_default()
            .push(Arc::clone(&stored));
        inner.order.push(Arc::clone(&stored));
        (stored, true)
    }

    pub fn get(&self, id: &FindingId) -> Option<Arc<Finding>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_id.get(id).cloned()
    }

    pub fn contains(&self, id: &FindingId) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_id.contains_key(id)
    }

    /// Consistent snapshot of all findings in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Finding>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.order.clone()
    }

    /// Findings recorded for one `(source, capability)` pair.
    pub fn by_capability(&self, source: &str, capability: &str) -> Vec<Arc<Finding>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .by_capability
            .get(&(source.to_string(), capability.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lt_domain::{ParamBag, ParamValue};

    fn finding(source: &str, capability: &str, id_param: i64) -> Finding {
        let mut params = ParamBag::new();
        params.insert("tracking_id".to_string(), ParamValue::Int(id_param));
        Finding::ok(
            source,
            capability,
            params,
            serde_json::json!({"status": "In Transit"}),
            12,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = EvidenceStore::new();
        let f = finding("platform", "platform-load-lookup-by-id", 1);
        let id = f.id.clone();
        let (stored, inserted) = store.insert(f);
        assert!(inserted);
        assert_eq!(store.get(&id).unwrap().id, stored.id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_probe_merges() {
        let store = EvidenceStore::new();
        let first = finding("platform", "platform-load-lookup-by-id", 1);
        let second = finding("platform", "platform-load-lookup-by-id", 1);
        assert_eq!(first.id, second.id);

        let (_, inserted_first) = store.insert(first);
        let (merged, inserted_second) = store.insert(second);
        assert!(inserted_first);
        assert!(!inserted_second);
        assert_eq!(store.len(), 1);
        // The kept finding is the first one.
        assert_eq!(merged.latency_ms, 12);
    }

    #[test]
    fn test_by_capability_index() {
        let store = EvidenceStore::new();
        store.insert(finding("platform", "platform-load-lookup-by-id", 1));
        store.insert(finding("platform", "platform-load-lookup-by-id", 2));
        store.insert(finding("webhook", "webhook-delivery-history", 1));

        assert_eq!(
            store
                .by_capability("platform", "platform-load-lookup-by-id")
                .len(),
            2
        );
        assert_eq!(store.by_capability("webhook", "webhook-delivery-history").len(), 1);
        assert!(store.by_capability("logs", "structured-log-search").is_empty());
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let store = EvidenceStore::new();
        store.insert(finding("platform", "platform-load-lookup-by-id", 1));
        store.insert(finding("webhook", "webhook-delivery-history", 1));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].source_name, "platform");
        assert_eq!(snapshot[1].source_name, "webhook");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_safe() {
        let store = Arc::new(EvidenceStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert(finding("webhook", "webhook-delivery-history", i));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 16);
    }
}
