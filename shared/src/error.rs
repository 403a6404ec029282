//! Error types for the shared crate
//!
//! Decode-time and validation errors. Neither performs I/O, so both are
//! plain values the client crate wraps into its own stage-tagged failures.

use thiserror::Error;

/// Record decoding error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The document carries no identity key and cannot be mirrored
    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },
}

impl CodecError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord { reason: reason.into() }
    }
}

/// Draft validation error, raised before any I/O
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed, missing or invalid: {}", .missing.join(", "))]
pub struct ValidationError {
    /// Wire names of the offending fields, in check order
    pub missing: Vec<&'static str>,
}

impl ValidationError {
    pub fn contains(&self, field: &str) -> bool {
        self.missing.iter().any(|f| *f == field)
    }
}
