//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the opaque identifiers handed out by the
//! photo service. Each newtype rejects empty or whitespace-only values at
//! construction time so that downstream code never has to re-check them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Remote identifiers
// ============================================================================

macro_rules! remote_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", $label)]
            ///
            /// # Errors
            /// Returns error if the ID is empty or contains whitespace
            pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(DomainError::InvalidRemoteId(format!(
                        "{} cannot be empty",
                        $label
                    )));
                }
                if id.chars().any(char::is_whitespace) {
                    return Err(DomainError::InvalidRemoteId(format!(
                        "{} contains whitespace: {id}",
                        $label
                    )));
                }
                Ok(Self(id))
            }

            /// Get the inner string reference
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

remote_id!(
    /// Identifier of a media item created in the remote library
    MediaId,
    "Media ID"
);

remote_id!(
    /// Identifier of a remote album
    AlbumId,
    "Album ID"
);

// ============================================================================
// UploadToken
// ============================================================================

/// Opaque, time-limited handle returned by a binary upload
///
/// The token is later exchanged for a media item. Its contents are never
/// interpreted locally; only emptiness is rejected.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadToken(String);

impl UploadToken {
    /// Create a new UploadToken
    ///
    /// # Errors
    /// Returns error if the token is empty
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DomainError::InvalidUploadToken(
                "Upload token cannot be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials for a pending upload; keep them out of logs.
impl fmt::Debug for UploadToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "UploadToken(<{} bytes>)", self.0.len())
    }
}

impl TryFrom<String> for UploadToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UploadToken> for String {
    fn from(token: UploadToken) -> Self {
        token.0
    }
}
