use std::fmt;

use serde::{Deserialize, Serialize};

/// A failure attached to the thing it concerns
///
/// The key is whatever locates the problem for the user: a file path, an
/// album URL, or an album title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedError {
    pub key: String,
    pub message: String,
}

impl KeyedError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for KeyedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}
