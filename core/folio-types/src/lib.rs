//! Core type definitions for Folio.
//!
//! This crate defines the fundamental types shared by the storage and sync
//! layers:
//! - Entity and subscriber identifiers (UUID v7)
//! - The folder / page / content hierarchy records
//! - The ordered id-list codec (space-delimited, as persisted)
//!
//! Nothing here touches I/O; rendering and transport concerns live in their
//! respective crates.

pub mod id_list;

mod entity;
mod ids;
mod style;

pub use entity::{Content, Folder, Page, RootIndex, Subscription, MAX_CONTENT_LEN};
pub use ids::{EntityId, SubscriberId};
pub use style::ContentStyle;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid style code: {0}")]
    InvalidStyle(String),
}
