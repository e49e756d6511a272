use launchpad_common::LaunchpadError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid field path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Type mismatch at '{path}': expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("Duplicate document id {0}")]
    Duplicate(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for LaunchpadError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(id) => LaunchpadError::Conflict(format!("document {id} already exists")),
            other => LaunchpadError::Store(other.to_string()),
        }
    }
}
