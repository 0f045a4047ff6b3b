//! LoadTrace Investigation Core
//!
//! The hypothesis-driven investigation engine:
//! - `registry`: uniform façade over heterogeneous data-source probes
//! - `evidence`: append-only per-investigation evidence store
//! - `stream`: progress-event serializer, heartbeat, and delivery channel
//! - `sub_agent`: bounded per-hypothesis reasoning loop
//! - `orchestrator`: routing, seeding, hypothesis formation, parallel
//!   sub-investigation, child expansion, and verdict synthesis
//!
//! Everything external is reached through the `lt-ports` traits; the engine
//! itself performs no I/O beyond what those ports expose.

pub mod context;
pub mod evidence;
pub mod orchestrator;
pub mod registry;
pub mod stream;
pub mod sub_agent;

pub use context::InvestigationContext;
pub use evidence::EvidenceStore;
pub use orchestrator::Orchestrator;
pub use registry::{Prepared, PreparedProbe, RegistryError, SourceRegistry};
pub use stream::{EventSink, EventStream, ProgressTracker};
pub use sub_agent::{SubAgentOutcome, SubInvestigator};
