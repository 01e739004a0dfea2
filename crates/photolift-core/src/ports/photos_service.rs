//! Photo library port (driven/secondary port)
//!
//! This module defines the interface to the remote photo-library service:
//! binary uploads, media-item creation and album management.
//!
//! ## Design Notes
//!
//! - Unlike the storage ports, methods return the typed [`RemoteError`]. The
//!   upload engine classifies failures by status code to decide between
//!   retrying, reporting the failure against a file, or aborting.
//! - The wire transport and authentication live entirely in the adapter.
//! - Concurrency limits are applied by the caller around each call.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::{AlbumId, MediaId, UploadToken};

// ============================================================================
// Remote errors
// ============================================================================

/// Status code attached to every remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Unknown => "UNKNOWN",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::Aborted => "ABORTED",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DataLoss => "DATA_LOSS",
            StatusCode::Unauthenticated => "UNAUTHENTICATED",
        };
        write!(f, "{}", s)
    }
}

/// Failure reported by the photo service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RemoteError {
    pub code: StatusCode,
    pub message: String,
}

impl RemoteError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Result type for photo service calls
pub type RemoteResult<T> = Result<T, RemoteError>;

// ============================================================================
// Remote entities
// ============================================================================

/// An album as listed by the photo service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: AlbumId,
    pub title: String,
    /// Whether this application may add or remove items
    pub writable: bool,
    pub item_count: u64,
    /// Browser URL of the album, used to point the user at it
    pub product_url: Option<String>,
}

impl RemoteAlbum {
    /// Locator used when reporting a problem with this album
    pub fn report_key(&self) -> String {
        self.product_url
            .clone()
            .unwrap_or_else(|| format!("{} ({})", self.title, self.id))
    }
}

/// A media item created in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMediaItem {
    pub id: MediaId,
    pub filename: String,
    /// Capture time extracted by the service, when known
    pub creation_time: Option<DateTime<Utc>>,
}

/// Request entry for media-item creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub token: UploadToken,
    pub file_name: String,
}

// ============================================================================
// IPhotosService trait
// ============================================================================

/// Photo library operations
///
/// Implementations wrap the concrete API client. Every call may fail with a
/// [`RemoteError`] whose status code drives the engine's retry policy.
#[async_trait::async_trait]
pub trait IPhotosService: Send + Sync {
    /// Uploads the raw bytes of a file and returns a token for item creation
    async fn upload_binary(&self, path: &Path) -> RemoteResult<UploadToken>;

    /// Creates media items from previously uploaded binaries
    ///
    /// When `album` is set the items are created directly inside it. The
    /// returned vector has one entry per request entry, in the same order;
    /// each entry is either the created item or the per-item failure.
    async fn create_media_items(
        &self,
        album: Option<&AlbumId>,
        items: &[NewMediaItem],
    ) -> RemoteResult<Vec<RemoteResult<RemoteMediaItem>>>;

    /// Creates a new, empty, writable album
    async fn create_album(&self, title: &str) -> RemoteResult<RemoteAlbum>;

    /// Lists every album in the library
    ///
    /// `progress` is invoked with the running number of albums fetched.
    async fn list_albums(
        &self,
        progress: &(dyn Fn(usize) + Send + Sync),
    ) -> RemoteResult<Vec<RemoteAlbum>>;

    /// Lists the ids of the items in an album
    async fn list_album_items(&self, album: &AlbumId) -> RemoteResult<Vec<MediaId>>;

    /// Adds existing items to an album
    async fn add_items_to_album(&self, album: &AlbumId, items: &[MediaId]) -> RemoteResult<()>;

    /// Removes items from an album (the items stay in the library)
    async fn remove_items_from_album(&self, album: &AlbumId, items: &[MediaId])
        -> RemoteResult<()>;
}
