use fieldboard_client::ClientError;
use fieldboard_core::CoreError;

use crate::store::StoreError;

/// Errors surfaced by the sync layer.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A domain-level rejection from `fieldboard_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The remote API call failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The local durable store could not be read or written.
    #[error("Local storage error: {0}")]
    Storage(#[from] StoreError),

    /// A remote operation was requested while the connectivity signal is offline.
    #[error("Offline: {0}")]
    Offline(String),
}

impl SyncError {
    /// Whether the user can usefully retry the failed action.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Client(e) => e.is_transient(),
            SyncError::Offline(_) => true,
            SyncError::Core(_) | SyncError::Storage(_) => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
