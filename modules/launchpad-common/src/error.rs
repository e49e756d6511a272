use thiserror::Error;

use crate::types::EntityKind;

pub type Result<T> = std::result::Result<T, LaunchpadError>;

#[derive(Error, Debug)]
pub enum LaunchpadError {
    #[error("Fetch error for {kind}: {reason}")]
    Fetch { kind: EntityKind, reason: String },

    #[error("Max retries exceeded fetching {kind} after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        kind: EntityKind,
        attempts: u32,
        last_error: String,
    },

    #[error("Enrichment error for {kind} {external_id}: {reason}")]
    Enrichment {
        kind: EntityKind,
        external_id: String,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No update was made: {0}")]
    NoUpdate(String),

    /// One half of a paired cross-document update applied, the other did not.
    /// The applied half is not rolled back.
    #[error("Partial update in {operation}: {applied} applied, {failed} not applied")]
    PartialConsistency {
        operation: &'static str,
        applied: String,
        failed: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cancelled by shutdown")]
    Cancelled,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl LaunchpadError {
    /// Upstream unavailability: the cycle is skipped and retried from scratch.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            LaunchpadError::Fetch { .. } | LaunchpadError::MaxRetriesExceeded { .. }
        )
    }
}
