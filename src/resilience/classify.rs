//! Failure classification
//!
//! Maps a failed attempt to a [`FailureKind`]. Typed errors decide first;
//! everything else is matched against a table of message markers.

use crate::Error;

/// How the wrapper reacts to a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Quota or rate limit exhausted; stop and go offline
    Quota,
    /// Provider unreachable; stop and go offline
    Connectivity,
    /// Reply missing an expected field; stop without touching status
    Malformed,
    /// Anything else, timeouts included; retry
    Transient,
}

/// Message markers per kind, checked in order, case-insensitive
pub const CLASSIFICATION_RULES: &[(FailureKind, &[&str])] = &[
    (
        FailureKind::Quota,
        &["quota", "exceeded", "rate limit", "insufficient_quota"],
    ),
    (FailureKind::Connectivity, &["network", "connection"]),
];

/// Classify a failed attempt
#[must_use]
pub fn classify(error: &Error) -> FailureKind {
    match error {
        Error::Timeout(_) => FailureKind::Transient,
        Error::MalformedResponse(_) => FailureKind::Malformed,
        other => classify_message(&other.to_string()),
    }
}

/// Classify an error message against [`CLASSIFICATION_RULES`]
#[must_use]
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
        .map_or(FailureKind::Transient, |(kind, _)| *kind)
}
