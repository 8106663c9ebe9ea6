//! Revocation store (§4.5): Bloom-filter-fronted authoritative set of
//! revoked capability ids, with signed-revocation ingestion and a replay
//! window.

use crate::bloom::BloomFilter;
use crate::error::{RelayError, Result};
use crate::persist::{read_json, write_json_atomic, Debouncer, DEBOUNCE_INTERVAL_SECS};
use ocmt_capability::SignedRevocation;
use ocmt_core::{CapabilityId, Clock, SystemClock};
use ocmt_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Replay window: a revocation claiming a `revokedAt` more than this many
/// seconds away from the relay's own clock is rejected as stale or
/// backdated (§4.5 step 3, scenario S5).
pub const REPLAY_WINDOW_SECS: u64 = 5 * 60;

const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RevocationFile {
    #[serde(default)]
    format_version: u8,
    records: Vec<SignedRevocation>,
}

/// Where an `isRevoked` answer came from, for observability (§6:
/// `revocations.isRevoked` returns `{revoked, source}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationSource {
    /// The Bloom filter reported "definitely not present"; the backing
    /// store was never touched.
    BloomNegative,
    /// The Bloom filter said "maybe"; the backing store gave the final
    /// answer.
    Store,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsRevokedResult {
    pub revoked: bool,
    pub source: RevocationSource,
}

struct State {
    records: HashMap<CapabilityId, SignedRevocation>,
    bloom: BloomFilter,
}

struct Inner {
    path: PathBuf,
    state: parking_lot::Mutex<State>,
    clock: Box<dyn Clock>,
    debouncer: Debouncer,
}

/// Handle to the relay's revocation store. Cheap to clone; clones share the
/// same backing state and persistence path.
#[derive(Clone)]
pub struct RevocationStore {
    inner: Arc<Inner>,
}

impl RevocationStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        Self::with_clock(path, Box::new(SystemClock))
    }

    pub fn with_clock(path: PathBuf, clock: Box<dyn Clock>) -> Result<Self> {
        let loaded: Option<RevocationFile> = read_json(&path)?;
        let mut bloom = BloomFilter::new_default();
        let mut records = HashMap::new();
        if let Some(file) = loaded {
            for record in file.records {
                bloom.insert(&record.body.capability_id);
                records.insert(record.body.capability_id, record);
            }
        }
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                state: parking_lot::Mutex::new(State { records, bloom }),
                clock,
                debouncer: Debouncer::new(),
            }),
        })
    }

    /// Accepts a signed revocation. Verifies the signature, enforces the
    /// replay window, and is idempotent: re-submitting the same id returns
    /// the record already on file rather than creating a second one (§4.5
    /// step 3, invariant 5 in §8).
    pub fn add(&self, record: SignedRevocation) -> Result<SignedRevocation> {
        record.verify()?;

        let now = self.inner.clock.now();
        let revoked_at = record.body.revoked_at;
        let delta = revoked_at.abs_diff(now);
        if delta > REPLAY_WINDOW_SECS {
            return Err(RelayError::ReplayWindowExceeded { delta_secs: delta });
        }

        let id = record.body.capability_id;
        let mut state = self.inner.state.lock();
        if let Some(existing) = state.records.get(&id) {
            return Ok(existing.clone());
        }
        state.bloom.insert(&id);
        state.records.insert(id, record.clone());
        drop(state);

        self.schedule_flush();
        Ok(record)
    }

    /// No false negatives: a "definitely not" from the Bloom filter short
    /// circuits without touching the backing store; a "maybe" always
    /// consults it (§4.5 step 2, invariant in §8).
    pub fn is_revoked(&self, id: CapabilityId) -> IsRevokedResult {
        let state = self.inner.state.lock();
        if !state.bloom.might_contain(&id) {
            return IsRevokedResult {
                revoked: false,
                source: RevocationSource::BloomNegative,
            };
        }
        IsRevokedResult {
            revoked: state.records.contains_key(&id),
            source: RevocationSource::Store,
        }
    }

    pub fn list(
        &self,
        revoked_by: Option<PublicKey>,
        limit: Option<usize>,
        offset: usize,
    ) -> Vec<SignedRevocation> {
        let state = self.inner.state.lock();
        let mut matching: Vec<SignedRevocation> = state
            .records
            .values()
            .filter(|r| revoked_by.map_or(true, |issuer| r.body.revoked_by == issuer))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.body.revoked_at);
        let matching: Vec<SignedRevocation> = matching.into_iter().skip(offset).collect();
        match limit {
            Some(n) => matching.into_iter().take(n).collect(),
            None => matching,
        }
    }

    /// Purges records whose `originalExpiry` has passed; records with no
    /// `originalExpiry` are retained indefinitely (§4.5 step 5). Returns
    /// the number of records removed.
    pub fn cleanup(&self) -> usize {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock();
        let before = state.records.len();
        state
            .records
            .retain(|_, record| record.body.original_expiry.map_or(true, |exp| exp >= now));
        let removed = before - state.records.len();
        if removed > 0 {
            let mut bloom = BloomFilter::new_default();
            for id in state.records.keys() {
                bloom.insert(id);
            }
            state.bloom = bloom;
            drop(state);
            self.schedule_flush();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn schedule_flush(&self) {
        if !self.inner.debouncer.should_schedule() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(DEBOUNCE_INTERVAL_SECS)).await;
            if let Err(e) = flush(&inner) {
                tracing::warn!(error = %e, "failed to persist revocation store");
            }
            inner.debouncer.clear();
        });
    }

    /// Forces an immediate synchronous flush, bypassing the debounce. Used
    /// by tests and graceful shutdown paths that cannot wait out the
    /// debounce interval.
    pub fn flush_now(&self) -> Result<()> {
        flush(&self.inner)
    }
}

fn flush(inner: &Inner) -> Result<()> {
    let records: Vec<SignedRevocation> = inner.state.lock().records.values().cloned().collect();
    write_json_atomic(
        &inner.path,
        &RevocationFile {
            format_version: FORMAT_VERSION,
            records,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocmt_crypto::IdentityKeyPair;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FakeClock(Arc<AtomicU64>);
    impl Clock for FakeClock {
        fn now(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn store_at(now: u64) -> (RevocationStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revocations.json");
        let store = RevocationStore::with_clock(path, Box::new(FakeClock(Arc::new(AtomicU64::new(now)))))
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn add_then_is_revoked_reports_true_via_store() {
        let (store, _dir) = store_at(1_000);
        let issuer = IdentityKeyPair::generate();
        let id = CapabilityId::random();
        let record = SignedRevocation::sign(id, 1_000, None, None, &issuer).unwrap();
        store.add(record).unwrap();
        let result = store.is_revoked(id);
        assert!(result.revoked);
        assert_eq!(result.source, RevocationSource::Store);
    }

    #[test]
    fn unknown_id_is_rejected_by_bloom_without_touching_store() {
        let (store, _dir) = store_at(1_000);
        let result = store.is_revoked(CapabilityId::random());
        assert!(!result.revoked);
        assert_eq!(result.source, RevocationSource::BloomNegative);
    }

    #[tokio::test]
    async fn add_is_idempotent_with_earliest_record_retained() {
        let (store, _dir) = store_at(1_000);
        let issuer = IdentityKeyPair::generate();
        let id = CapabilityId::random();
        let first = SignedRevocation::sign(id, 1_000, Some("first".to_string()), None, &issuer).unwrap();
        let second = SignedRevocation::sign(id, 1_050, Some("second".to_string()), None, &issuer).unwrap();
        let accepted_first = store.add(first).unwrap();
        let accepted_second = store.add(second).unwrap();
        assert_eq!(accepted_first.body.reason, accepted_second.body.reason);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stale_revocation_outside_replay_window_is_rejected() {
        let (store, _dir) = store_at(10_000);
        let issuer = IdentityKeyPair::generate();
        let record = SignedRevocation::sign(CapabilityId::random(), 10_000 - 601, None, None, &issuer).unwrap();
        let err = store.add(record).unwrap_err();
        assert!(matches!(err, RelayError::ReplayWindowExceeded { .. }));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let (store, _dir) = store_at(1_000);
        let issuer = IdentityKeyPair::generate();
        let mut record = SignedRevocation::sign(CapabilityId::random(), 1_000, None, None, &issuer).unwrap();
        record.body.reason = Some("forged".to_string());
        let err = store.add(record).unwrap_err();
        assert!(matches!(err, RelayError::InvalidSignature));
    }

    #[tokio::test]
    async fn cleanup_purges_only_records_with_expired_original_expiry() {
        let (store, _dir) = store_at(10_000);
        let issuer = IdentityKeyPair::generate();
        let expired = SignedRevocation::sign(CapabilityId::random(), 10_000, None, Some(5_000), &issuer).unwrap();
        let not_expired = SignedRevocation::sign(CapabilityId::random(), 10_000, None, Some(20_000), &issuer).unwrap();
        let no_expiry = SignedRevocation::sign(CapabilityId::random(), 10_000, None, None, &issuer).unwrap();
        store.add(expired).unwrap();
        store.add(not_expired.clone()).unwrap();
        store.add(no_expiry.clone()).unwrap();

        let removed = store.cleanup();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert!(store.is_revoked(not_expired.body.capability_id).revoked);
        assert!(store.is_revoked(no_expiry.body.capability_id).revoked);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_persists_records_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revocations.json");
        let store = RevocationStore::with_clock(path.clone(), Box::new(FakeClock(Arc::new(AtomicU64::new(1_000)))))
            .unwrap();
        let issuer = IdentityKeyPair::generate();
        let record = SignedRevocation::sign(CapabilityId::random(), 1_000, None, None, &issuer).unwrap();
        let id = record.body.capability_id;
        store.add(record).unwrap();
        store.flush_now().unwrap();

        let reloaded = RevocationStore::with_clock(path, Box::new(FakeClock(Arc::new(AtomicU64::new(1_000)))))
            .unwrap();
        assert!(reloaded.is_revoked(id).revoked);
    }
}
