//! Local revocation cache (§4.7 open question 3): a short-TTL cache
//! consulted before falling back to the relay, so a chatty `execute` loop
//! does not hit the network on every call.

use ocmt_core::CapabilityId;
use std::collections::HashMap;

/// How long a cached revocation answer (positive or negative) is trusted
/// before the relay is consulted again.
pub const CACHE_TTL_SECS: u64 = 30;

struct Entry {
    revoked: bool,
    cached_at: u64,
}

pub struct RevocationCache {
    entries: parking_lot::Mutex<HashMap<CapabilityId, Entry>>,
}

impl RevocationCache {
    pub fn new() -> Self {
        Self {
            entries: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// `None` means the cache has no fresh answer; the caller must consult
    /// the relay.
    pub fn get(&self, id: CapabilityId, now: u64) -> Option<bool> {
        let entries = self.entries.lock();
        let entry = entries.get(&id)?;
        if now.saturating_sub(entry.cached_at) > CACHE_TTL_SECS {
            return None;
        }
        Some(entry.revoked)
    }

    pub fn put(&self, id: CapabilityId, revoked: bool, now: u64) {
        self.entries.lock().insert(id, Entry { revoked, cached_at: now });
    }
}

impl Default for RevocationCache {
    fn default() -> Self {
        Self::new()
    }
}
