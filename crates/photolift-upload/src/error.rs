//! Error types for the upload engine.

use std::time::Duration;

use photolift_core::ports::RemoteError;
use thiserror::Error;

use crate::retry::{BackoffClass, RemoteOperation};

/// Result type for upload engine operations
pub type Result<T> = std::result::Result<T, UploadError>;

/// Errors that can end an upload operation.
///
/// [`UploadError::UserCorrectable`] is the only variant that the engine turns
/// into a per-file [`KeyedError`](photolift_core::domain::KeyedError) instead
/// of aborting; every other variant stops the enclosing directory or album
/// operation.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The remote rejected the request in a way the user can fix
    #[error("{0}")]
    UserCorrectable(String),

    /// A remote call failed in a way that is neither retryable nor user-correctable
    #[error("{operation} failed: {source}")]
    Remote {
        operation: RemoteOperation,
        #[source]
        source: RemoteError,
    },

    /// A retryable remote failure persisted past its backoff ceiling
    #[error("{operation} still failing after {elapsed:?} of {class} retries: {source}")]
    RetriesExhausted {
        operation: RemoteOperation,
        class: BackoffClass,
        elapsed: Duration,
        #[source]
        source: RemoteError,
    },

    /// Remote storage usage violates the configured policy
    #[error("drive space limit reached: {0}")]
    DriveSpace(String),

    /// The quota could not be queried
    #[error("quota check failed: {0}")]
    QuotaCheck(#[source] RemoteError),

    /// The upload state could not be read or persisted
    #[error("state store error: {0}")]
    Store(String),

    /// The remote answered with something the engine cannot interpret
    #[error("invalid response from {operation}: {message}")]
    InvalidResponse {
        operation: RemoteOperation,
        message: String,
    },

    /// The operation was cancelled while waiting
    #[error("operation cancelled")]
    Cancelled,

    /// The worker pool was shut down
    #[error("worker pool closed")]
    PoolClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Returns true if the failure should be reported against the affected
    /// items while the rest of the work continues
    pub fn is_user_correctable(&self) -> bool {
        matches!(self, UploadError::UserCorrectable(_))
    }

    /// Message suitable for a per-item failure report
    pub fn user_message(&self) -> String {
        match self {
            UploadError::UserCorrectable(message) => message.clone(),
            other => other.to_string(),
        }
    }
}
