//! The explicit investigation context.
//!
//! Everything an investigation touches travels in this value: configuration,
//! the source registry, the oracle, the evidence store, the event sink, the
//! progress tracker, and the cancellation token. Nothing is ambient.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use lt_domain::InvestigationConfig;
use lt_ports::ReasoningOracle;

use crate::evidence::EvidenceStore;
use crate::registry::SourceRegistry;
use crate::stream::{event_channel, EventSink, EventStream, ProgressTracker};

/// Shared context for one investigation run.
#[derive(Clone)]
pub struct InvestigationContext {
    pub config: Arc<InvestigationConfig>,
    pub registry: Arc<SourceRegistry>,
    pub oracle: Arc<dyn ReasoningOracle>,
    pub evidence: Arc<EvidenceStore>,
    pub sink: EventSink,
    pub tracker: Arc<ProgressTracker>,
    pub cancel: CancellationToken,
}

impl InvestigationContext {
    /// Build a fresh context and the linked event stream for its consumer.
    ///
    /// The registry and oracle are shared across investigations; the
    /// evidence store, channel, tracker, and cancellation token are owned
    /// by this run.
    pub fn new(
        config: Arc<InvestigationConfig>,
        registry: Arc<SourceRegistry>,
        oracle: Arc<dyn ReasoningOracle>,
    ) -> (Self, EventStream) {
        let cancel = CancellationToken::new();
        let (sink, stream) = event_channel(cancel.clone());
        (
            Self {
                config,
                registry,
                oracle,
                evidence: Arc::new(EvidenceStore::new()),
                sink,
                tracker: Arc::new(ProgressTracker::new()),
                cancel,
            },
            stream,
        )
    }
}
