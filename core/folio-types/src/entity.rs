//! The folder / page / content hierarchy records.
//!
//! Ownership is implicit: a page belongs to whichever folder lists its id,
//! a content fragment to whichever page lists it. No entity carries a
//! back-reference to its parent, and list order is the display order.

use crate::{ContentStyle, EntityId, SubscriberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length of a content fragment's text, in characters.
pub const MAX_CONTENT_LEN: usize = 4000;

/// Top-level container: an ordered list of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub page_ids: Vec<EntityId>,
}

impl Folder {
    /// Creates an empty folder.
    #[must_use]
    pub fn new(name: Option<String>) -> Self {
        Self {
            id: EntityId::new(),
            name,
            page_ids: Vec::new(),
        }
    }
}

/// A page: an ordered list of content fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Vec<EntityId>,
}

impl Page {
    /// Creates an empty page.
    #[must_use]
    pub fn new(name: Option<String>) -> Self {
        Self {
            id: EntityId::new(),
            name,
            content: Vec::new(),
        }
    }
}

/// Leaf node: a text fragment with a presentation style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: EntityId,
    pub value: String,
    #[serde(default)]
    pub style: ContentStyle,
}

impl Content {
    /// Creates a content fragment.
    #[must_use]
    pub fn new(value: impl Into<String>, style: ContentStyle) -> Self {
        Self {
            id: EntityId::new(),
            value: value.into(),
            style,
        }
    }
}

/// The singleton record defining global folder order.
///
/// Persisted under the well-known row id `"default"` and created lazily on
/// first contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootIndex {
    #[serde(default)]
    pub folder_ids: Vec<EntityId>,
}

/// A client's persistent subscription record.
///
/// Survives reconnects when the client presents its [`SubscriberId`]
/// again; swept after seven days of inactivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriberId,
    #[serde(default)]
    pub folders: BTreeSet<EntityId>,
    /// Last-active timestamp, milliseconds since the Unix epoch.
    pub last_active: i64,
}

impl Subscription {
    /// Creates a fresh subscription record.
    #[must_use]
    pub fn new(id: SubscriberId, now_ms: i64) -> Self {
        Self {
            id,
            folders: BTreeSet::new(),
            last_active: now_ms,
        }
    }

    /// Idempotently adds a folder to the subscribed set.
    /// Returns `true` when the set actually grew.
    pub fn subscribe(&mut self, folder_id: EntityId) -> bool {
        self.folders.insert(folder_id)
    }

    /// Removes a folder from the subscribed set by exact token.
    ///
    /// Exact-token removal matters: one id being a substring of another
    /// must never corrupt unrelated entries.
    pub fn unsubscribe(&mut self, folder_id: &EntityId) -> bool {
        self.folders.remove(folder_id)
    }

    /// Refreshes the last-active timestamp.
    pub fn touch(&mut self, now_ms: i64) {
        self.last_active = now_ms;
    }
}
