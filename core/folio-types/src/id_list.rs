//! Ordered id-list codec and splice helpers.
//!
//! Ordered lists (a folder's pages, a page's content, the root folder
//! index) are persisted as a single space-delimited string. Ids are UUIDs
//! and can never contain the delimiter. List order is the only source of
//! display order.

use crate::EntityId;

/// Serializes an ordered id list to its persisted form.
#[must_use]
pub fn join(ids: &[EntityId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a persisted id list. Empty tokens (doubled or trailing
/// delimiters left behind by older writers) are skipped.
pub fn split(s: &str) -> Result<Vec<EntityId>, uuid::Error> {
    s.split(' ')
        .filter(|token| !token.is_empty())
        .map(EntityId::parse)
        .collect()
}

/// Splices `id` immediately after `anchor`. Returns `false` (list
/// untouched) when the anchor is not present.
pub fn insert_after(list: &mut Vec<EntityId>, anchor: &EntityId, id: EntityId) -> bool {
    match list.iter().position(|x| x == anchor) {
        Some(pos) => {
            list.insert(pos + 1, id);
            true
        }
        None => false,
    }
}

/// Splices `id` immediately before `anchor`. Returns `false` (list
/// untouched) when the anchor is not present.
pub fn insert_before(list: &mut Vec<EntityId>, anchor: &EntityId, id: EntityId) -> bool {
    match list.iter().position(|x| x == anchor) {
        Some(pos) => {
            list.insert(pos, id);
            true
        }
        None => false,
    }
}

/// Removes the first occurrence of `id`. Returns `false` when absent.
pub fn remove(list: &mut Vec<EntityId>, id: &EntityId) -> bool {
    match list.iter().position(|x| x == id) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}
