//! Sound print records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::FinalEqState;

/// Maximum prints kept private before the oldest is pushed to trash
pub const PRIVATE_CAPACITY: usize = 6;
/// Maximum prints in trash before the oldest is discarded for good
pub const TRASH_CAPACITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Private,
}

impl Privacy {
    pub fn opposite(self) -> Self {
        match self {
            Privacy::Public => Privacy::Private,
            Privacy::Private => Privacy::Public,
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privacy::Public => write!(f, "public"),
            Privacy::Private => write!(f, "private"),
        }
    }
}

/// One of the three keyed collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Public,
    Private,
    Trash,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Public, Collection::Private, Collection::Trash];

    /// Collection a print of this privacy lives in when not trashed
    pub fn for_privacy(privacy: Privacy) -> Self {
        match privacy {
            Privacy::Public => Collection::Public,
            Privacy::Private => Collection::Private,
        }
    }

    /// `None` means unbounded
    pub fn capacity(self) -> Option<usize> {
        match self {
            Collection::Public => None,
            Collection::Private => Some(PRIVATE_CAPACITY),
            Collection::Trash => Some(TRASH_CAPACITY),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Collection::Public => "public",
            Collection::Private => "private",
            Collection::Trash => "trash",
        }
    }

    /// Store key holding the collection's records
    pub fn store_key(self) -> String {
        format!("collections/{}.json", self.name())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Collection::Public),
            "private" => Ok(Collection::Private),
            "trash" => Ok(Collection::Trash),
            other => Err(format!("unknown collection '{}' (public, private, trash)", other)),
        }
    }
}

/// Descriptive fields supplied by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintMeta {
    pub name: String,
    pub tribe: String,
    pub title: String,
}

/// A persisted artifact record. Blob bytes live under `image_key` and
/// `audio_key` in the same store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundPrint {
    pub id: Uuid,
    pub name: String,
    pub tribe: String,
    pub title: String,
    pub image_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_key: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub privacy: Privacy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub checksum: String,
    #[serde(default)]
    pub final_eq: FinalEqState,
}

impl SoundPrint {
    pub fn image_key_for(id: &Uuid) -> String {
        format!("blobs/{}/image.png", id)
    }

    pub fn audio_key_for(id: &Uuid) -> String {
        format!("blobs/{}/audio.wav", id)
    }

    /// Blob keys this record references
    pub fn blob_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.image_key.as_str()).chain(self.audio_key.as_deref())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
