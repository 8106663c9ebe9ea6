//! Exponential backoff on failed unlocks, keyed by client id (§4.3).

use std::collections::HashMap;

/// Backoff delays in seconds, indexed by consecutive failure count. The
/// last entry is a cap, not a step: failure counts beyond the schedule's
/// length stay at 300s.
pub const BACKOFF_SCHEDULE_SECS: [u64; 9] = [1, 2, 4, 8, 16, 32, 60, 120, 300];

/// A client with no failed attempts for this long has its state dropped
/// rather than carried forward indefinitely (§4.3).
pub const IDLE_RESET_SECS: u64 = 3600;

struct Entry {
    failures: u32,
    locked_until: u64,
    last_seen: u64,
}

/// Per-client exponential backoff state for failed vault unlocks.
#[derive(Default)]
pub struct BackoffTracker {
    entries: HashMap<String, Entry>,
}

impl BackoffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Some(retry_after_secs)` if `client_id` is currently inside
    /// a backoff window, `None` if the attempt may proceed.
    pub fn check(&self, client_id: &str, now: u64) -> Option<u64> {
        let entry = self.entries.get(client_id)?;
        if now < entry.locked_until {
            Some(entry.locked_until - now)
        } else {
            None
        }
    }

    /// Record a failed unlock attempt, advancing the client's backoff.
    pub fn record_failure(&mut self, client_id: &str, now: u64) {
        let entry = self.entries.entry(client_id.to_string()).or_insert(Entry {
            failures: 0,
            locked_until: 0,
            last_seen: now,
        });
        entry.failures = entry.failures.saturating_add(1);
        entry.last_seen = now;
        let index = (entry.failures as usize - 1).min(BACKOFF_SCHEDULE_SECS.len() - 1);
        entry.locked_until = now + BACKOFF_SCHEDULE_SECS[index];
    }

    /// Clear a client's backoff state after a successful unlock.
    pub fn record_success(&mut self, client_id: &str) {
        self.entries.remove(client_id);
    }

    /// Drop entries that have had no failures for `IDLE_RESET_SECS`.
    pub fn sweep(&mut self, now: u64) {
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.last_seen) < IDLE_RESET_SECS);
    }
}
