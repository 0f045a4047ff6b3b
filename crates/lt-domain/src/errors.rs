//! Domain errors

use thiserror::Error;

/// Domain errors for LoadTrace
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invariant violation: {invariant}")]
    InvariantViolation { invariant: String },

    #[error("Unknown root-cause category: {value}")]
    UnknownCategory { value: String },

    #[error("Unknown identifier key: {value}")]
    UnknownIdentifierKey { value: String },

    #[error("Confidence out of range: {value}")]
    ConfidenceOutOfRange { value: f64 },

    #[error("Insufficient input: {reason}")]
    InsufficientInput { reason: String },
}
