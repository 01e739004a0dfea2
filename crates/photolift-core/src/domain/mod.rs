//! Domain entities and state-transition rules
//!
//! This module contains the core domain types for Photolift:
//! - Newtypes for remote identifiers and upload tokens
//! - The per-file upload state machine
//! - The persisted upload aggregate
//! - Album directories and keyed failures
//! - Domain-specific error types

pub mod album_directory;
pub mod errors;
pub mod item_state;
pub mod keyed_error;
pub mod newtypes;
pub mod upload_state;

// Re-export commonly used types
pub use album_directory::{AlbumDirectory, DEFAULT_TITLE_SEPARATOR};
pub use errors::DomainError;
pub use item_state::{ItemPhase, ItemState, UploadedBinary, UPLOAD_TOKEN_LIFETIME_HOURS};
pub use keyed_error::KeyedError;
pub use newtypes::*;
pub use upload_state::{PathState, UploadState};
