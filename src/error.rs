//! Typed errors for the cases callers need to inspect.
//!
//! Everything else flows through `anyhow::Error` with context attached at the
//! point of failure.

use thiserror::Error;

/// A namespace field or secret name that cannot be used as a path segment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} '{value}' must not contain '/'")]
    Separator { kind: &'static str, value: String },

    #[error("{kind} '{value}' is not a valid path segment")]
    Reserved { kind: &'static str, value: String },
}

/// Aggregated failures from a non-atomic batch write.
///
/// Every entry of the batch is attempted; `failures` holds one element per
/// entry that could not be written, in the order they were attempted.
#[derive(Debug, Error)]
#[error("failed to set {} of {attempted} secrets: {}", .failures.len(), names(.failures))]
pub struct SetAllError {
    pub attempted: usize,
    pub failures: Vec<(String, anyhow::Error)>,
}

impl SetAllError {
    /// Names of the entries that failed.
    pub fn failed_names(&self) -> Vec<&str> {
        self.failures.iter().map(|(name, _)| name.as_str()).collect()
    }
}

fn names(failures: &[(String, anyhow::Error)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{name} ({err:#})"))
        .collect::<Vec<_>>()
        .join(", ")
}
