//! Snapshot store (§4.6): pure blind storage of encrypted CACHED-tier
//! payloads, addressed by capability id. The relay never decrypts or
//! inspects `encrypted_data`.

use crate::error::{RelayError, Result};
use crate::persist::{read_json, write_json_atomic, Debouncer, DEBOUNCE_INTERVAL_SECS};
use ocmt_capability::EncryptedSnapshot;
use ocmt_core::{CapabilityId, Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct SnapshotFile {
    #[serde(default)]
    format_version: u8,
    snapshots: Vec<EncryptedSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotStats {
    pub count: usize,
    pub total_bytes: usize,
    pub oldest_created_at: Option<u64>,
    pub newest_created_at: Option<u64>,
}

struct Inner {
    path: PathBuf,
    snapshots: parking_lot::Mutex<HashMap<CapabilityId, EncryptedSnapshot>>,
    clock: Box<dyn Clock>,
    debouncer: Debouncer,
}

/// Handle to the relay's snapshot store. Cheap to clone.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::with_clock(path, Box::new(SystemClock))
    }

    pub fn with_clock(path: PathBuf, clock: Box<dyn Clock>) -> Result<Self> {
        let loaded: Option<SnapshotFile> = read_json(&path)?;
        let mut snapshots = HashMap::new();
        if let Some(file) = loaded {
            for snapshot in file.snapshots {
                snapshots.insert(snapshot.capability_id, snapshot);
            }
        }
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                snapshots: parking_lot::Mutex::new(snapshots),
                clock,
                debouncer: Debouncer::new(),
            }),
        })
    }

    /// Validates required fields, rejects an already-expired snapshot, and
    /// overwrites any existing snapshot for the same capability id (§4.6).
    pub fn store(&self, snapshot: EncryptedSnapshot) -> Result<()> {
        if snapshot.encrypted_data.is_empty() {
            return Err(RelayError::InvalidSnapshot("encrypted_data"));
        }
        if snapshot.nonce.is_empty() {
            return Err(RelayError::InvalidSnapshot("nonce"));
        }
        let now = self.inner.clock.now();
        if snapshot.expires_at < now {
            return Err(RelayError::SnapshotExpired);
        }
        self.inner
            .snapshots
            .lock()
            .insert(snapshot.capability_id, snapshot);
        self.schedule_flush();
        Ok(())
    }

    /// Returns the snapshot, or `None` if absent or expired. Reading an
    /// expired entry purges it as a side effect (§4.6's "lazily purges
    /// expired entries on read").
    pub fn get(&self, id: CapabilityId) -> Option<EncryptedSnapshot> {
        let now = self.inner.clock.now();
        let mut snapshots = self.inner.snapshots.lock();
        match snapshots.get(&id) {
            Some(snapshot) if snapshot.expires_at < now => {
                snapshots.remove(&id);
                drop(snapshots);
                self.schedule_flush();
                None
            }
            Some(snapshot) => Some(snapshot.clone()),
            None => None,
        }
    }

    pub fn delete(&self, id: CapabilityId) {
        let removed = self.inner.snapshots.lock().remove(&id).is_some();
        if removed {
            self.schedule_flush();
        }
    }

    /// Removes all expired snapshots, returning the count removed.
    pub fn cleanup(&self) -> usize {
        let now = self.inner.clock.now();
        let mut snapshots = self.inner.snapshots.lock();
        let before = snapshots.len();
        snapshots.retain(|_, s| s.expires_at >= now);
        let removed = before - snapshots.len();
        drop(snapshots);
        if removed > 0 {
            self.schedule_flush();
        }
        removed
    }

    pub fn get_stats(&self) -> SnapshotStats {
        let snapshots = self.inner.snapshots.lock();
        if snapshots.is_empty() {
            return SnapshotStats::default();
        }
        let total_bytes: usize = snapshots
            .values()
            .map(|s| s.encrypted_data.len() + s.nonce.len())
            .sum();
        let oldest = snapshots.values().map(|s| s.created_at).min();
        let newest = snapshots.values().map(|s| s.created_at).max();
        SnapshotStats {
            count: snapshots.len(),
            total_bytes,
            oldest_created_at: oldest,
            newest_created_at: newest,
        }
    }

    fn schedule_flush(&self) {
        if !self.inner.debouncer.should_schedule() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(DEBOUNCE_INTERVAL_SECS)).await;
            if let Err(e) = flush(&inner) {
                tracing::warn!(error = %e, "failed to persist snapshot store");
            }
            inner.debouncer.clear();
        });
    }

    pub fn flush_now(&self) -> Result<()> {
        flush(&self.inner)
    }
}

fn flush(inner: &Inner) -> Result<()> {
    let snapshots: Vec<EncryptedSnapshot> = inner.snapshots.lock().values().cloned().collect();
    write_json_atomic(
        &inner.path,
        &SnapshotFile {
            format_version: FORMAT_VERSION,
            snapshots,
        },
    )
}
