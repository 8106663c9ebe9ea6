//! The sync engine: pushes outgoing CACHED snapshots, pulls incoming ones,
//! and answers the capability engine's transport seams for revocation and
//! snapshot lookups (§4.7).

use crate::error::{Result, SyncError};
use crate::revocation_cache::RevocationCache;
use crate::source::{SnapshotSource, SubjectKeyDirectory};
use async_trait::async_trait;
use ocmt_capability::{
    CachedSnapshotSource, EncryptedSnapshot, RevocationChecker, RevocationPublisher, SignedRevocation,
    TransportError, DEFAULT_REFRESH_INTERVAL_SECS, MIN_REFRESH_INTERVAL_SECS,
};
use ocmt_core::{CapabilityId, Clock, SystemClock, Tier};
use ocmt_crypto::{X25519PublicKey, X25519StaticSecret};
use ocmt_relay::RelayService;
use ocmt_vault::{CapabilityScope, IssuedCapabilityRecord, LocalSnapshotMeta, Vault};
use std::sync::Arc;

/// Outcome of one `sync_snapshots` pass.
#[derive(Debug, Default)]
pub struct SyncSnapshotsOutcome {
    pub refreshed: usize,
    pub pushed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Outcome of one `fetch_all_available_snapshots` pass.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub fetched: usize,
    pub errors: Vec<String>,
}

/// Drives the sync loop for one container: push, fetch, and revocation
/// lookups all go through here so the capability engine stays transport-free
/// (§4.7). Holds the vault directly, rather than taking it per call, because
/// the `CachedSnapshotSource`/`RevocationChecker` seams it implements carry
/// no vault parameter of their own.
pub struct SyncEngine {
    vault: Arc<Vault>,
    relay: Arc<dyn RelayService>,
    snapshot_source: Arc<dyn SnapshotSource>,
    subject_keys: Arc<dyn SubjectKeyDirectory>,
    clock: Box<dyn Clock>,
    refresh_interval_secs: u64,
    revocation_cache: RevocationCache,
    push_lock: tokio::sync::Mutex<()>,
    fetch_lock: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        vault: Arc<Vault>,
        relay: Arc<dyn RelayService>,
        snapshot_source: Arc<dyn SnapshotSource>,
        subject_keys: Arc<dyn SubjectKeyDirectory>,
    ) -> Self {
        Self::with_clock(vault, relay, snapshot_source, subject_keys, Box::new(SystemClock))
    }

    pub fn with_clock(
        vault: Arc<Vault>,
        relay: Arc<dyn RelayService>,
        snapshot_source: Arc<dyn SnapshotSource>,
        subject_keys: Arc<dyn SubjectKeyDirectory>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            vault,
            relay,
            snapshot_source,
            subject_keys,
            clock,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            revocation_cache: RevocationCache::new(),
            push_lock: tokio::sync::Mutex::new(()),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Override the refresh interval used when scheduling the *next* push
    /// for a capability, floored at `MIN_REFRESH_INTERVAL_SECS` (§4.7 open
    /// question 2).
    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs.max(MIN_REFRESH_INTERVAL_SECS);
        self
    }

    /// Issued CACHED capabilities whose `nextSnapshotDueAt` has passed.
    pub async fn get_capabilities_needing_refresh(&self) -> Result<Vec<CapabilityId>> {
        let now = self.clock.now();
        Ok(self
            .vault
            .issued_needing_refresh(now)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Push a fresh snapshot for every issued CACHED capability due for
    /// refresh (§4.7). At most one push job runs at a time per engine; a
    /// concurrent call returns `SyncError::AlreadyRunning` rather than
    /// blocking, so a caller on a timer never piles up work.
    pub async fn sync_snapshots(&self) -> Result<SyncSnapshotsOutcome> {
        let _guard = self.push_lock.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        let now = self.clock.now();
        let due = self.vault.issued_needing_refresh(now).await?;

        let mut outcome = SyncSnapshotsOutcome { refreshed: due.len(), ..Default::default() };
        for (id, record) in due {
            match self.push_one(id, &record, now).await {
                Ok(()) => outcome.pushed += 1,
                Err(e) => {
                    tracing::warn!(%id, error = %e, "snapshot push failed");
                    outcome.failed += 1;
                    outcome.errors.push(format!("{id}: {e}"));
                }
            }
        }
        Ok(outcome)
    }

    async fn push_one(&self, id: CapabilityId, record: &IssuedCapabilityRecord, now: u64) -> Result<()> {
        let subject_kem_key = self
            .subject_keys
            .x25519_public_key(record.subject_public_key)
            .await
            .ok_or(SyncError::SubjectKeyUnknown)?;

        let plaintext = self
            .snapshot_source
            .materialize(&record.resource)
            .await
            .map_err(|e| SyncError::SourceFailed(e.to_string()))?;

        let handshake = ocmt_crypto::seal_handshake(subject_kem_key);
        let (nonce, ciphertext) = ocmt_crypto::seal(&handshake.aead_key, &plaintext)
            .map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;

        let identity = self.vault.identity().await?;
        let snapshot = EncryptedSnapshot::sign(
            id,
            handshake.ephemeral_public_key,
            nonce.to_vec(),
            ciphertext,
            now,
            record.expires_at,
            &identity,
        )
        .map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;

        self.relay.store_snapshot(snapshot).await?;

        let refresh_interval_secs = self.refresh_interval_secs;
        self.vault
            .update_issued_capability(id, move |r| {
                r.last_snapshot_at = Some(now);
                r.next_snapshot_due_at = Some(now + refresh_interval_secs);
            })
            .await?;
        Ok(())
    }

    /// Fetch and decrypt every available snapshot for received CACHED
    /// capabilities, caching the plaintext in the vault (§4.7). At most one
    /// fetch job runs at a time per engine.
    pub async fn fetch_all_available_snapshots(&self) -> Result<FetchOutcome> {
        let _guard = self.fetch_lock.try_lock().map_err(|_| SyncError::AlreadyRunning)?;
        let summaries = self.vault.list_capabilities(CapabilityScope::Received).await?;

        let mut outcome = FetchOutcome::default();
        for summary in summaries {
            if summary.tier != Tier::Cached || summary.revoked {
                continue;
            }
            match self.fetch_one(summary.id).await {
                Ok(true) => outcome.fetched += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(id = %summary.id, error = %e, "snapshot fetch failed");
                    outcome.errors.push(format!("{}: {e}", summary.id));
                }
            }
        }
        Ok(outcome)
    }

    async fn fetch_one(&self, id: CapabilityId) -> Result<bool> {
        let record = match self.vault.get_received_capability(id).await? {
            Some(r) => r,
            None => return Ok(false),
        };

        let snapshot = match self.relay.get_snapshot(id).await? {
            Some(s) => s,
            None => return Ok(false),
        };

        let now = self.clock.now();
        if snapshot.expires_at <= now {
            return Ok(false);
        }
        snapshot
            .verify_signature(record.issuer_public_key)
            .map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;

        let secret = self.vault.identity_x25519().await?;
        let aead_key = ocmt_crypto::open_handshake(&secret, snapshot.ephemeral_public_key);
        let nonce: [u8; ocmt_crypto::NONCE_LENGTH] = snapshot
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| SyncError::InvalidSnapshot("bad nonce length".to_string()))?;
        let plaintext = ocmt_crypto::open(&aead_key, &nonce, &snapshot.encrypted_data)
            .map_err(|e| SyncError::InvalidSnapshot(e.to_string()))?;

        self.vault
            .update_received_capability(id, move |r| {
                r.local_snapshot_ciphertext = Some(plaintext.to_vec());
                r.local_snapshot_meta = Some(LocalSnapshotMeta {
                    fetched_at: now,
                    expires_at: snapshot.expires_at,
                });
            })
            .await?;
        Ok(true)
    }

    /// Check a capability's revocation status, consulting the short-TTL
    /// local cache before falling back to the relay (§4.7 open question 3).
    async fn check_revoked(&self, id: CapabilityId) -> bool {
        let now = self.clock.now();
        if let Some(cached) = self.revocation_cache.get(id, now) {
            return cached;
        }
        match self.relay.is_revoked(id).await {
            Ok(result) => {
                self.revocation_cache.put(id, result.revoked, now);
                result.revoked
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "revocation check against relay failed, treating as not revoked");
                false
            }
        }
    }
}

#[async_trait]
impl RevocationChecker for SyncEngine {
    async fn is_revoked(&self, capability_id: CapabilityId) -> bool {
        self.check_revoked(capability_id).await
    }
}

#[async_trait]
impl RevocationPublisher for SyncEngine {
    async fn publish(&self, record: &SignedRevocation) -> std::result::Result<(), TransportError> {
        self.relay
            .add_revocation(record.clone())
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Unreachable(e.to_string()))
    }
}

#[async_trait]
impl CachedSnapshotSource for SyncEngine {
    async fn get_decrypted(&self, capability_id: CapabilityId) -> std::result::Result<Option<Vec<u8>>, TransportError> {
        match self.fetch_one(capability_id).await {
            Ok(true) => match self.vault.get_received_capability(capability_id).await {
                Ok(Some(record)) => Ok(record.local_snapshot_ciphertext),
                Ok(None) => Ok(None),
                Err(e) => Err(TransportError::Unreachable(e.to_string())),
            },
            Ok(false) => Ok(None),
            Err(e) => Err(TransportError::Unreachable(e.to_string())),
        }
    }
}
