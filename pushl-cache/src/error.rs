use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize cache record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("corrupt cache record for key {0}")]
    Corrupt(String),
}
