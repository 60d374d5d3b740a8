//! Error types for Hearth operations

/// Result type for Hearth operations
pub type Result<T> = std::result::Result<T, HearthError>;

/// Error types for the Hearth chat engine
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// Completion client failed (transport, model, or protocol error)
    #[error("Completion error: {0}")]
    Completion(String),

    /// Conversation store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Audit log operation failed
    #[error("Event log error: {0}")]
    EventLog(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for HearthError {
    fn from(s: String) -> Self {
        HearthError::Other(s)
    }
}

impl From<&str> for HearthError {
    fn from(s: &str) -> Self {
        HearthError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for HearthError {
    fn from(err: anyhow::Error) -> Self {
        HearthError::Other(err.to_string())
    }
}
