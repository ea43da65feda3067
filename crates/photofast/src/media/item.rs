use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque, stable handle for a photo in the host's media library.
///
/// The core never interprets the key; it only uses it for identity
/// (cache keys, dedup leases) and hands it back to the collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaItem(String);

impl MediaItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaItem {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for MediaItem {
    fn from(key: String) -> Self {
        Self(key)
    }
}
