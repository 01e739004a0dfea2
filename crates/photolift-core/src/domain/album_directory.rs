//! Directories to upload and the album titles derived from them

use std::path::{Component, Path, PathBuf};

use super::errors::DomainError;

/// Separator placed between path segments when deriving an album title
pub const DEFAULT_TITLE_SEPARATOR: &str = " / ";

/// A scanned directory whose files are uploaded into one album
///
/// The scan root itself has no title: its files are uploaded to the library
/// without album membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumDirectory {
    path: PathBuf,
    title: Option<String>,
    files: Vec<PathBuf>,
}

impl AlbumDirectory {
    /// Builds a directory below `root`, deriving its title from the segments
    /// between `root` and `path`
    ///
    /// # Errors
    /// Returns [`DomainError::PathNotInRoot`] if `path` is not `root` or below it,
    /// and [`DomainError::InvalidAlbumTitle`] if the derived title is blank.
    pub fn new(
        root: &Path,
        path: impl Into<PathBuf>,
        files: Vec<PathBuf>,
        separator: &str,
    ) -> Result<Self, DomainError> {
        let path = path.into();
        let relative = path
            .strip_prefix(root)
            .map_err(|_| DomainError::PathNotInRoot(path.display().to_string()))?;

        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let title = if segments.is_empty() {
            None
        } else {
            let title = segments.join(separator);
            if title.trim().is_empty() {
                return Err(DomainError::InvalidAlbumTitle(path.display().to_string()));
            }
            Some(title)
        };

        Ok(Self { path, title, files })
    }

    /// Builds a directory with an explicit title (or none)
    pub fn with_title(path: impl Into<PathBuf>, title: Option<String>, files: Vec<PathBuf>) -> Self {
        Self {
            path: path.into(),
            title,
            files,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Album title, `None` for the scan root
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn is_root(&self) -> bool {
        self.title.is_none()
    }
}
