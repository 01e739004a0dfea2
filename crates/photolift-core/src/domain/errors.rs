//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as validation of remote identifiers, upload tokens and album titles.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Path is not located below the configured scan root
    #[error("Path not within scan root: {0}")]
    PathNotInRoot(String),

    /// Remote identifier (media item or album) is malformed
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Upload token is empty or malformed
    #[error("Invalid upload token: {0}")]
    InvalidUploadToken(String),

    /// Album title is empty after trimming
    #[error("Invalid album title: {0}")]
    InvalidAlbumTitle(String),
}
