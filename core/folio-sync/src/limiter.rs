//! Per-source-address abuse rate limiter.
//!
//! Each distinct network source gets a request counter, incremented on
//! connection-open and on every inbound message. Crossing [`RATE_LIMIT`]
//! within the current window marks the source blocked, but the triggering
//! request itself is still admitted; the connection is closed on the
//! *next* inbound message. Counters reset to zero every two seconds.
//! Blocked stays blocked across resets until an administrative unblock.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{info, warn};

/// Requests allowed per source per reset window.
pub const RATE_LIMIT: u32 = 100;

/// How often non-zero counters reset to zero.
pub const RESET_INTERVAL: Duration = Duration::from_secs(2);

/// Admission decision for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Process the message.
    Allowed,
    /// The source was already blocked: close the connection.
    Close,
}

/// One source's counter state. Created on first contact, garbage-collected
/// only by count-reset, never deleted (bounded cardinality assumed).
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceRate {
    /// Requests seen in the current window.
    pub count: u32,
    /// Set once the counter exceeds [`RATE_LIMIT`]; cleared only by
    /// administrative unblock.
    pub blocked: bool,
}

/// Tracks request counters per source address.
#[derive(Debug, Default)]
pub struct RateLimiter {
    sources: Mutex<HashMap<IpAddr, SourceRate>>,
}

impl RateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection-open from `source`.
    ///
    /// Opens count against the same window as messages. A blocked source
    /// is still admitted here; its first message will close it.
    pub fn record_connect(&self, source: IpAddr) {
        let mut sources = self.sources.lock().expect("limiter poisoned");
        let rate = sources.entry(source).or_default();
        rate.count += 1;
        if rate.count > RATE_LIMIT && !rate.blocked {
            rate.blocked = true;
            warn!(%source, "rate limit exceeded on connect, source blocked");
        }
    }

    /// Records an inbound message from `source` and decides admission.
    pub fn record_message(&self, source: IpAddr) -> Admission {
        let mut sources = self.sources.lock().expect("limiter poisoned");
        let rate = sources.entry(source).or_default();
        if rate.blocked {
            return Admission::Close;
        }
        rate.count += 1;
        if rate.count > RATE_LIMIT {
            // Admit this message; the next one closes the connection.
            rate.blocked = true;
            warn!(%source, count = rate.count, "rate limit exceeded, source blocked");
        }
        Admission::Allowed
    }

    /// Resets every non-zero counter to zero. Blocked sources stay
    /// blocked. Runs on the process-wide two-second timer.
    pub fn reset_counters(&self) {
        let mut sources = self.sources.lock().expect("limiter poisoned");
        for rate in sources.values_mut() {
            rate.count = 0;
        }
    }

    /// Administrative unblock. Returns `false` when the source was not
    /// blocked (or unknown).
    pub fn unblock(&self, source: &IpAddr) -> bool {
        let mut sources = self.sources.lock().expect("limiter poisoned");
        match sources.get_mut(source) {
            Some(rate) if rate.blocked => {
                rate.blocked = false;
                rate.count = 0;
                info!(%source, "source unblocked");
                true
            }
            _ => false,
        }
    }

    /// Whether a source is currently blocked.
    pub fn is_blocked(&self, source: &IpAddr) -> bool {
        let sources = self.sources.lock().expect("limiter poisoned");
        sources.get(source).is_some_and(|r| r.blocked)
    }

    /// Snapshot of all records, for the admin surface.
    pub fn snapshot(&self) -> Vec<(IpAddr, SourceRate)> {
        let sources = self.sources.lock().expect("limiter poisoned");
        sources.iter().map(|(addr, rate)| (*addr, *rate)).collect()
    }
}
