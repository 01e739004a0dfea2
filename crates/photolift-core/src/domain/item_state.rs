//! Per-file upload progress
//!
//! An [`ItemState`] records how far a single local file has progressed
//! through the remote upload:
//!
//! ```text
//!   Unstarted ──upload binary──► DataUploaded ──create item──► MediaCreated
//!       ▲                              │
//!       └──── token older than 23h ────┘
//! ```
//!
//! States only ever gain information. A token expiring sends the file back to
//! `Unstarted` for the binary upload, but never clears a media id that has
//! already been assigned.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{AlbumId, MediaId, UploadToken};

/// Hours after which the remote service discards an upload token
pub const UPLOAD_TOKEN_LIFETIME_HOURS: i64 = 23;

/// Record of a completed binary upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedBinary {
    /// Token to exchange for a media item
    pub token: UploadToken,
    /// When the binary upload finished
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedBinary {
    pub fn new(token: UploadToken, uploaded_at: DateTime<Utc>) -> Self {
        Self { token, uploaded_at }
    }

    /// Returns true once the token can no longer be used for item creation
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.uploaded_at + Duration::hours(UPLOAD_TOKEN_LIFETIME_HOURS)
    }
}

/// Where a file currently stands in the upload state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemPhase {
    /// No usable binary upload; the bytes must be sent
    Unstarted,
    /// Binary uploaded with a live token; the media item must be created
    DataUploaded,
    /// Media item exists remotely
    MediaCreated,
}

/// Remote-upload progress of one local file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uploaded: Option<UploadedBinary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    media_id: Option<MediaId>,
    /// Capture time reported by the service when the item was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    captured_at: Option<DateTime<Utc>>,
    /// Album the item has been attached to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    album_id: Option<AlbumId>,
}

impl ItemState {
    /// Creates an empty (unstarted) state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&self) -> Option<&UploadedBinary> {
        self.uploaded.as_ref()
    }

    pub fn media_id(&self) -> Option<&MediaId> {
        self.media_id.as_ref()
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    pub fn album_id(&self) -> Option<&AlbumId> {
        self.album_id.as_ref()
    }

    /// Computes the state-machine phase at the given instant
    pub fn phase_at(&self, now: DateTime<Utc>) -> ItemPhase {
        if self.media_id.is_some() {
            return ItemPhase::MediaCreated;
        }
        match &self.uploaded {
            Some(binary) if !binary.is_expired_at(now) => ItemPhase::DataUploaded,
            _ => ItemPhase::Unstarted,
        }
    }

    /// Returns a live upload token, if the binary is uploaded and not expired
    pub fn live_token_at(&self, now: DateTime<Utc>) -> Option<&UploadToken> {
        self.uploaded
            .as_ref()
            .filter(|binary| !binary.is_expired_at(now))
            .map(|binary| &binary.token)
    }

    /// Returns true if the item is attached to the given album
    pub fn is_in_album(&self, album: &AlbumId) -> bool {
        self.album_id.as_ref() == Some(album)
    }

    /// Records a (possibly repeated) binary upload
    #[must_use]
    pub fn with_upload(mut self, binary: UploadedBinary) -> Self {
        self.uploaded = Some(binary);
        self
    }

    /// Records the media item created from the uploaded binary
    #[must_use]
    pub fn with_media(mut self, media_id: MediaId, captured_at: Option<DateTime<Utc>>) -> Self {
        self.media_id = Some(media_id);
        if captured_at.is_some() {
            self.captured_at = captured_at;
        }
        self
    }

    /// Records album membership
    #[must_use]
    pub fn with_album(mut self, album_id: AlbumId) -> Self {
        self.album_id = Some(album_id);
        self
    }
}
