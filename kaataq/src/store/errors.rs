//! Error types for the key-path store.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// `create` targeted a path that already holds data
    #[error("Path already holds data: {0}")]
    AlreadyExists(String),

    /// Malformed key path
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    /// Unknown subscription handle
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(u64),

    /// Connectivity to the store was lost
    #[error("Store is disconnected")]
    Disconnected,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the operation can be retried as-is once connectivity returns
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Disconnected)
    }
}
