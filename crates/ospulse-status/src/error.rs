/// Errors that can occur within the status store.
///
/// # Examples
///
/// ```rust
/// use ospulse_status::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "saved_search",
///     id: "missing-uuid".to_string(),
/// };
/// assert!(err.to_string().contains("saved_search"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (query templates).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A state column held a value outside the service-state machine.
    #[error("Storage: invalid service state '{0}'")]
    InvalidState(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
