//! Error types for the kansync ecosystem.

use thiserror::Error;

/// Errors that can occur in kansync operations.
#[derive(Error, Debug)]
pub enum KanSyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Store provider error: {0}")]
    Provider(String),

    #[error("Store provider '{0}' not found in PATH")]
    ProviderNotInstalled(String),

    #[error("Store request timed out after {0}s")]
    StoreTimeout(u64),

    #[error("Store temporarily unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store connection closed")]
    StoreClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl KanSyncError {
    /// Whether retrying the failed operation can reasonably succeed.
    ///
    /// Timeouts and unavailability are transient; everything else is
    /// terminal for the operation that hit it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KanSyncError::StoreTimeout(_) | KanSyncError::StoreUnavailable(_)
        )
    }

    pub(crate) fn not_found(collection: impl AsRef<str>, id: impl AsRef<str>) -> Self {
        KanSyncError::NotFound(format!("{}/{}", collection.as_ref(), id.as_ref()))
    }
}

/// Result type alias for kansync operations.
pub type KanSyncResult<T> = Result<T, KanSyncError>;
