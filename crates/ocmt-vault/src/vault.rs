//! The vault's public contract (§4.2).

use crate::error::{Result, VaultError};
use crate::file::VaultFile;
use crate::plaintext::VaultPlaintext;
use crate::records::{
    CapabilitySummary, IntegrationPayload, IntegrationSummary, IssuedCapabilityRecord,
    ReceivedCapabilityRecord,
};
use ocmt_core::CapabilityId;
use ocmt_crypto::{IdentityKeyPair, KdfParams, PublicKey, X25519StaticSecret};
use std::path::PathBuf;
use tokio::sync::Mutex;
use zeroize::Zeroizing;

const MIN_PASSWORD_LENGTH: usize = 8;

enum VaultState {
    Locked,
    Unlocked {
        key: Zeroizing<[u8; 32]>,
        kdf: KdfParams,
        plaintext: VaultPlaintext,
    },
}

/// The at-rest encrypted store of integrations, identity keys, and
/// capability records for one container.
pub struct Vault {
    path: PathBuf,
    state: Mutex<VaultState>,
}

impl Vault {
    /// Open a vault backed by the file at `path`. Does not touch the
    /// filesystem; the vault starts locked regardless of whether the file
    /// exists yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(VaultState::Locked),
        }
    }

    /// Whether a vault file already exists on disk.
    pub fn is_initialized(&self) -> bool {
        self.path.exists()
    }

    /// Create the vault file for the first time (§4.2: never recreated).
    pub async fn initialize(&self, password: &str) -> Result<()> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(VaultError::WeakPassword);
        }
        if self.is_initialized() {
            return Err(VaultError::AlreadyInitialized);
        }

        let identity = IdentityKeyPair::generate();
        let kem_identity = X25519StaticSecret::generate();
        let plaintext = VaultPlaintext::new(
            identity.seed().to_vec(),
            identity.public_key().as_bytes().to_vec(),
            kem_identity.to_bytes().to_vec(),
            kem_identity.public_key().as_bytes().to_vec(),
        );

        let kdf = KdfParams::generate_default();
        let key = ocmt_crypto::derive_key(password, &kdf)
            .map_err(|e| VaultError::Corrupted(e.to_string()))?;
        self.encrypt_and_save(&kdf, &key, &plaintext)?;

        tracing::info!(path = %self.path.display(), "vault initialized");
        Ok(())
    }

    /// Derive the key from `password`, decrypt the vault file, and hold the
    /// plaintext in memory until `lock()` or process exit. Wrong passwords
    /// are indistinguishable from AEAD tampering failures (§4.2: "on AEAD
    /// failure the attempt counts as an invalid password").
    pub async fn unlock(&self, password: &str) -> Result<PublicKey> {
        if !self.is_initialized() {
            return Err(VaultError::NotInitialized);
        }
        let file = VaultFile::load(&self.path)?;
        let key = ocmt_crypto::derive_key(password, &file.kdf)
            .map_err(|e| VaultError::Corrupted(e.to_string()))?;
        let nonce = file.nonce_array();
        let plaintext_bytes = ocmt_crypto::open(&key, &nonce, &file.ciphertext)
            .map_err(|_| VaultError::InvalidPassword)?;
        let plaintext: VaultPlaintext = serde_json::from_slice(&plaintext_bytes)
            .map_err(|e| VaultError::Corrupted(format!("vault payload malformed: {e}")))?;

        let public_key_bytes: [u8; 32] = plaintext
            .identity_public_key
            .clone()
            .try_into()
            .map_err(|_| VaultError::Corrupted("bad identity public key length".to_string()))?;
        let public_key = PublicKey::from_bytes(public_key_bytes);

        let mut state = self.state.lock().await;
        *state = VaultState::Unlocked {
            key,
            kdf: file.kdf,
            plaintext,
        };
        tracing::info!("vault unlocked");
        Ok(public_key)
    }

    /// Lock the vault, dropping the decrypted plaintext and derived key.
    pub async fn lock(&self) {
        let mut state = self.state.lock().await;
        *state = VaultState::Locked;
        tracing::info!("vault locked");
    }

    pub async fn is_unlocked(&self) -> bool {
        matches!(*self.state.lock().await, VaultState::Unlocked { .. })
    }

    /// The container's identity keypair, available only while unlocked.
    pub async fn identity(&self) -> Result<IdentityKeyPair> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => {
                let seed: [u8; 32] = plaintext
                    .identity_private_key
                    .clone()
                    .try_into()
                    .map_err(|_| VaultError::Corrupted("bad identity seed length".to_string()))?;
                Ok(IdentityKeyPair::from_seed(&Zeroizing::new(seed)))
            }
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    /// The container's X25519 KEM identity, used by `ocmt-sync` to open
    /// CACHED-tier snapshots addressed to this subject, and by snapshot
    /// sealing to publish this identity's public half.
    pub async fn identity_x25519(&self) -> Result<X25519StaticSecret> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => {
                let bytes: [u8; 32] = plaintext
                    .identity_x25519_private_key
                    .clone()
                    .try_into()
                    .map_err(|_| VaultError::Corrupted("bad x25519 secret length".to_string()))?;
                Ok(X25519StaticSecret::from_bytes(Zeroizing::new(bytes)))
            }
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    pub async fn set_integration(&self, provider: &str, payload: IntegrationPayload) -> Result<()> {
        validate_integration_payload(&payload)?;
        self.mutate(|plaintext| {
            plaintext.integrations.insert(provider.to_string(), payload);
            Ok(())
        })
        .await
    }

    pub async fn get_integration(&self, provider: &str) -> Result<Option<IntegrationPayload>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => {
                Ok(plaintext.integrations.get(provider).cloned())
            }
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    pub async fn list_integrations(&self) -> Result<Vec<IntegrationSummary>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => Ok(plaintext
                .integrations
                .iter()
                .map(|(provider, payload)| IntegrationSummary {
                    provider: provider.clone(),
                    email: payload.email.clone(),
                    expires_at: payload.expires_at.clone(),
                })
                .collect()),
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    pub async fn remove_integration(&self, provider: &str) -> Result<()> {
        self.mutate(|plaintext| {
            plaintext.integrations.remove(provider);
            Ok(())
        })
        .await
    }

    /// Insert a freshly issued capability record (used by `ocmt-capability`).
    pub async fn insert_issued_capability(
        &self,
        id: CapabilityId,
        record: IssuedCapabilityRecord,
    ) -> Result<()> {
        self.mutate(|plaintext| {
            plaintext.issued_capabilities.insert(id, record);
            Ok(())
        })
        .await
    }

    /// Insert a capability received from another container (`capabilities.store`).
    pub async fn insert_received_capability(
        &self,
        id: CapabilityId,
        record: ReceivedCapabilityRecord,
    ) -> Result<()> {
        self.mutate(|plaintext| {
            plaintext.received_capabilities.insert(id, record);
            Ok(())
        })
        .await
    }

    /// Mark an issued capability revoked (monotonic: never un-revokes).
    pub async fn mark_issued_revoked(&self, id: CapabilityId) -> Result<bool> {
        let mut found = false;
        self.mutate(|plaintext| {
            if let Some(record) = plaintext.issued_capabilities.get_mut(&id) {
                found = !record.revoked;
                record.mark_revoked();
            }
            Ok(())
        })
        .await?;
        Ok(found)
    }

    pub async fn get_issued_capability(&self, id: CapabilityId) -> Result<Option<IssuedCapabilityRecord>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => {
                Ok(plaintext.issued_capabilities.get(&id).cloned())
            }
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    pub async fn get_received_capability(
        &self,
        id: CapabilityId,
    ) -> Result<Option<ReceivedCapabilityRecord>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => {
                Ok(plaintext.received_capabilities.get(&id).cloned())
            }
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    /// Update a received capability in place (e.g. after fetching a
    /// snapshot). `f` returns `false` if no such record exists.
    pub async fn update_received_capability<F>(&self, id: CapabilityId, f: F) -> Result<bool>
    where
        F: FnOnce(&mut ReceivedCapabilityRecord),
    {
        let mut updated = false;
        self.mutate(|plaintext| {
            if let Some(record) = plaintext.received_capabilities.get_mut(&id) {
                f(record);
                updated = true;
            }
            Ok(())
        })
        .await?;
        Ok(updated)
    }

    /// Update an issued capability in place (e.g. after pushing a snapshot).
    /// `f` returns `false` if no such record exists.
    pub async fn update_issued_capability<F>(&self, id: CapabilityId, f: F) -> Result<bool>
    where
        F: FnOnce(&mut IssuedCapabilityRecord),
    {
        let mut updated = false;
        self.mutate(|plaintext| {
            if let Some(record) = plaintext.issued_capabilities.get_mut(&id) {
                f(record);
                updated = true;
            }
            Ok(())
        })
        .await?;
        Ok(updated)
    }

    /// Capabilities due for a snapshot refresh (`nextSnapshotDueAt <= now`).
    pub async fn issued_needing_refresh(&self, now: u64) -> Result<Vec<(CapabilityId, IssuedCapabilityRecord)>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => Ok(plaintext
                .issued_capabilities
                .iter()
                .filter(|(_, record)| {
                    !record.revoked
                        && record
                            .next_snapshot_due_at
                            .map(|due| due <= now)
                            .unwrap_or(false)
                })
                .map(|(id, record)| (*id, record.clone()))
                .collect()),
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    pub async fn list_capabilities(&self, scope: CapabilityScope) -> Result<Vec<CapabilitySummary>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => Ok(match scope {
                CapabilityScope::Issued => plaintext
                    .issued_capabilities
                    .iter()
                    .map(|(id, record)| CapabilitySummary {
                        id: *id,
                        resource: record.resource.clone(),
                        scope: record.scope.clone(),
                        tier: record.tier,
                        expires_at: record.expires_at,
                        revoked: record.revoked,
                    })
                    .collect(),
                CapabilityScope::Received => plaintext
                    .received_capabilities
                    .iter()
                    .map(|(id, record)| CapabilitySummary {
                        id: *id,
                        resource: record.resource.clone(),
                        scope: record.scope.clone(),
                        tier: record.tier,
                        expires_at: record.expires_at,
                        revoked: false,
                    })
                    .collect(),
            }),
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    /// Bulk export for migration (§6: `export`). Refuses when locked.
    pub async fn export_integrations(&self) -> Result<std::collections::HashMap<String, IntegrationPayload>> {
        let state = self.state.lock().await;
        match &*state {
            VaultState::Unlocked { plaintext, .. } => Ok(plaintext.integrations.clone()),
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    /// Run `f` against the unlocked plaintext, then re-encrypt with a fresh
    /// nonce and write atomically (§4.2: "all mutations re-encrypt with a
    /// fresh nonce; writes are atomic"). The lock is held across
    /// serialize+encrypt+write, matching the "single critical section per
    /// mutation" model in SPEC_FULL §5.
    async fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut VaultPlaintext) -> Result<()>,
    {
        let mut state = self.state.lock().await;
        match &mut *state {
            VaultState::Unlocked { key, kdf, plaintext } => {
                f(plaintext)?;
                self.encrypt_and_save(kdf, key, plaintext)
            }
            VaultState::Locked => Err(VaultError::Locked),
        }
    }

    fn encrypt_and_save(
        &self,
        kdf: &KdfParams,
        key: &Zeroizing<[u8; 32]>,
        plaintext: &VaultPlaintext,
    ) -> Result<()> {
        let plaintext_bytes = serde_json::to_vec(plaintext)
            .map_err(|e| VaultError::Corrupted(format!("failed to serialize vault payload: {e}")))?;
        let (nonce, ciphertext) = ocmt_crypto::seal(key, &plaintext_bytes)
            .map_err(|e| VaultError::Corrupted(e.to_string()))?;
        let file = VaultFile::new(kdf.clone(), nonce, ciphertext);
        file.save_atomic(&self.path)
    }
}

/// Scope selector for `listCapabilities` (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityScope {
    Issued,
    Received,
}

fn validate_integration_payload(payload: &IntegrationPayload) -> Result<()> {
    if payload.access_token.is_empty() {
        return Err(VaultError::InvalidPayload("accessToken must not be empty".into()));
    }
    if chrono::DateTime::parse_from_rfc3339(&payload.expires_at).is_err() {
        return Err(VaultError::InvalidPayload(
            "expiresAt must be an RFC3339 timestamp".into(),
        ));
    }
    Ok(())
}
