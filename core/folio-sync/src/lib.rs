//! Real-time hierarchy synchronization engine for Folio.
//!
//! Clients connect over websockets and exchange JSON envelopes. Every
//! mutation is validated, persisted through [`folio_storage::EntityStore`],
//! and re-broadcast to the folder's topic so all viewers converge.
//!
//! # Components
//!
//! - **Protocol**: tagged request/event enums — the wire format
//! - **Topics**: maps topic names to connected subscribers
//! - **Limiter**: per-source-address abuse counters
//! - **Engine**: one handler per mutation, ordering-aware broadcasts
//! - **Locks**: per-folder serialization of multi-step mutations
//! - **Sweeper**: process-wide timers for counter reset and stale
//!   subscription eviction
//!
//! # Consistency model
//!
//! Edits are last-write-wins at the granularity of a single storage write.
//! The per-folder lock makes multi-step operations (split, merge, cascade
//! delete) atomic with respect to other mutations on the same folder, but
//! multi-entity writes are not transactional: a crash mid-handler can leave
//! partial state, and earlier writes are not rolled back on failure.

pub mod engine;
pub mod limiter;
pub mod locks;
pub mod protocol;
pub mod sweeper;
pub mod topics;

mod error;

pub use engine::{ConnectionCtx, MutationEngine};
pub use error::{EngineError, EngineResult};
pub use limiter::{Admission, RateLimiter, RATE_LIMIT};
pub use locks::AggregateLocks;
pub use protocol::{ClientRequest, ServerEvent, KEEP_ALIVE};
pub use topics::{ConnectionId, Topic, TopicRegistry, FOLDERS_TOPIC};

/// Milliseconds since the Unix epoch, as stored in subscription records.
#[must_use]
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_millis() as i64
}
