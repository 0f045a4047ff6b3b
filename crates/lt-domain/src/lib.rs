//! LoadTrace Domain Core
//!
//! This crate contains the pure domain model for LoadTrace RCA, including:
//! - Incident input and the identifier bag
//! - Incident routing (intent/domain classification)
//! - Findings (probe evidence) and their identity rules
//! - Hypotheses with confidence thresholds
//! - The final verdict and progress-event taxonomy
//!
//! This crate MUST NOT import DB clients, HTTP frameworks, async runtimes,
//! or LLM SDKs. Everything here is plain data plus pure functions.

pub mod config;
pub mod errors;
pub mod event;
pub mod evidence;
pub mod hypothesis;
pub mod incident;
pub mod routing;
pub mod verdict;

pub use config::*;
pub use errors::*;
pub use event::*;
pub use evidence::*;
pub use hypothesis::*;
pub use incident::*;
pub use routing::*;
pub use verdict::*;
