//! Per-aggregate serialization.
//!
//! A folder and its transitively owned pages/content form one aggregate.
//! Multi-step mutations (split, merge, cascade delete) hold the folder's
//! lock for their whole duration, so two concurrent handlers never
//! interleave reads and writes on the same folder.
//!
//! Lock ordering: handlers that touch both the root index and a folder
//! take the root lock first, then the folder lock.

use folio_types::EntityId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Folder-id-keyed async mutexes plus one lock for the root index.
///
/// Lock entries are created on first use and kept for the process
/// lifetime; folder cardinality is assumed bounded, like the limiter's
/// source records.
#[derive(Debug, Default)]
pub struct AggregateLocks {
    folders: Mutex<HashMap<EntityId, Arc<tokio::sync::Mutex<()>>>>,
    root: Arc<tokio::sync::Mutex<()>>,
}

impl AggregateLocks {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for one folder aggregate.
    pub async fn acquire(&self, folder_id: EntityId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut folders = self.folders.lock().expect("lock map poisoned");
            folders.entry(folder_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Acquires the root-index lock.
    pub async fn acquire_root(&self) -> OwnedMutexGuard<()> {
        self.root.clone().lock_owned().await
    }
}
