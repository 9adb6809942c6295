//! SQLite storage layer for Folio.
//!
//! Provides persistent storage for the folder / page / content hierarchy,
//! the singleton root index, and subscription records.
//!
//! # Architecture
//!
//! - Each entity kind lives in its own table, keyed by id
//! - Ordered id lists are persisted as a single space-delimited column
//! - Schema migrations run automatically on open
//! - Calls return only after SQLite has accepted the write; there is no
//!   transaction spanning multiple entities — a crash between two related
//!   writes can leave the hierarchy inconsistent, which the sync layer
//!   accepts and documents

mod entity_store;
mod error;

pub use entity_store::EntityStore;
pub use error::{StorageError, StorageResult};

/// Well-known row id of the singleton root index.
pub const ROOT_INDEX_ID: &str = "default";
