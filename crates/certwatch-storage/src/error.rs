use certwatch_common::datetime::FormatError;

/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use certwatch_storage::error::StorageError;
///
/// let err = StorageError::Duplicate {
///     domain: "example.com".to_string(),
/// };
/// assert!(err.to_string().contains("example.com"));
/// assert!(err.is_duplicate());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The domain is already on the watchlist.
    #[error("Storage: domain '{domain}' is already being watched")]
    Duplicate { domain: String },

    /// Input was rejected before any row was touched.
    #[error("Storage: {0}")]
    Validation(String),

    /// A date did not match an accepted format.
    #[error("Storage: {0}")]
    Format(#[from] FormatError),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (SAN list column).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The data directory could not be prepared.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StorageError::Duplicate { .. })
    }

    /// True for errors caused by the caller's input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StorageError::Validation(_) | StorageError::Format(_)
        )
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
