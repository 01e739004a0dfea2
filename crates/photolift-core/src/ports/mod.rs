//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! upload engine. The engine depends on these interfaces; their
//! implementations live in adapter crates or in tests.
//!
//! ## Ports Overview
//!
//! - [`IPhotosService`] - Remote photo library: uploads, items, albums
//! - [`IQuotaService`] - Account storage quota
//! - [`IKeyValueStore`] - Durable JSON documents for resumable state
//! - [`IProgressSink`] - Progress and failure reporting

pub mod key_value_store;
pub mod photos_service;
pub mod progress;
pub mod quota_service;

pub use key_value_store::IKeyValueStore;
pub use photos_service::{
    IPhotosService, NewMediaItem, RemoteAlbum, RemoteError, RemoteMediaItem, RemoteResult,
    StatusCode,
};
pub use progress::{IProgressSink, ProgressCounter};
pub use quota_service::{IQuotaService, Quota};
