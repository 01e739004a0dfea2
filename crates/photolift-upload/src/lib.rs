//! Photolift Upload - Resumable upload and album reconciliation engine
//!
//! Provides:
//! - Three-stage per-file upload (binary, media item, album) that survives restarts
//! - Status-code classification with per-class exponential backoff
//! - Duplicate album detection and merging
//! - Drive space checks during long uploads
//!
//! ## Modules
//!
//! - [`uploader`] - Entry point running a whole upload
//! - [`pipeline`] - Per-file state machine for one directory
//! - [`album`] - Album resolution and merging
//! - [`retry`] - Failure classification and backoff
//! - [`state_store`] - Serialized writer for the persisted upload state

pub mod album;
pub mod batch;
pub mod drive_space;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod state_store;
pub mod strategy;
pub mod uploader;
pub mod worker_pool;

pub use error::{Result, UploadError};
pub use state_store::UploadStateStore;
pub use strategy::AddToAlbumStrategy;
pub use uploader::{UploadSummary, Uploader};
