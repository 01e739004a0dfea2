//! Persisted upload aggregate and per-path outcomes

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::item_state::ItemState;

/// Mapping of absolute path string to item state
///
/// This is the value stored under the state key of the key-value store. Every
/// entry is a consistent point from which an upload can resume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadState {
    items: BTreeMap<String, ItemState>,
}

impl UploadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key used for a path in the persisted map
    pub fn key_for(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    pub fn get(&self, path: &Path) -> Option<&ItemState> {
        self.items.get(&Self::key_for(path))
    }

    /// Inserts or replaces the state for a path, returning the previous value
    pub fn insert(&mut self, path: &Path, state: ItemState) -> Option<ItemState> {
        self.items.insert(Self::key_for(path), state)
    }

    /// Removes the state for a path, returning it if present
    pub fn remove(&mut self, path: &Path) -> Option<ItemState> {
        self.items.remove(&Self::key_for(path))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemState)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Outcome of processing a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathState {
    pub path: PathBuf,
    /// Final item state, or a human-readable failure message
    pub outcome: Result<ItemState, String>,
}

impl PathState {
    pub fn success(path: PathBuf, state: ItemState) -> Self {
        Self {
            path,
            outcome: Ok(state),
        }
    }

    pub fn failure(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            path,
            outcome: Err(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
