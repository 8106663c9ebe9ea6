//! The plaintext structure the vault's ciphertext decrypts to (§3).

use crate::records::{IntegrationPayload, IssuedCapabilityRecord, ReceivedCapabilityRecord};
use ocmt_core::CapabilityId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use zeroize::Zeroize;

/// Everything the vault's AEAD ciphertext decrypts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultPlaintext {
    /// Ed25519 seed, set exactly once per vault lifetime (§3 invariant).
    pub identity_private_key: Vec<u8>,
    pub identity_public_key: Vec<u8>,
    /// X25519 static secret used to open CACHED-tier snapshots addressed to
    /// this identity (§4.1 "KEM for snapshots"). Deliberately a separate
    /// keypair from the Ed25519 signing identity, generated once alongside
    /// it and never rotated within a vault lifetime.
    pub identity_x25519_private_key: Vec<u8>,
    pub identity_x25519_public_key: Vec<u8>,
    pub integrations: HashMap<String, IntegrationPayload>,
    pub issued_capabilities: HashMap<CapabilityId, IssuedCapabilityRecord>,
    pub received_capabilities: HashMap<CapabilityId, ReceivedCapabilityRecord>,
}

impl VaultPlaintext {
    pub fn new(
        identity_private_key: Vec<u8>,
        identity_public_key: Vec<u8>,
        identity_x25519_private_key: Vec<u8>,
        identity_x25519_public_key: Vec<u8>,
    ) -> Self {
        Self {
            identity_private_key,
            identity_public_key,
            identity_x25519_private_key,
            identity_x25519_public_key,
            integrations: HashMap::new(),
            issued_capabilities: HashMap::new(),
            received_capabilities: HashMap::new(),
        }
    }
}

/// Best-effort in-memory zeroization on lock/drop (§3: "no plaintext ...
/// retained in memory" while locked). This clears the identity seed and
/// every token/secret string reachable from the plaintext; it does not
/// attempt to scrub compiler-introduced copies, which is a known
/// limitation of zeroizing owned Rust values rather than using a
/// allocator-level secure-memory facility.
impl Drop for VaultPlaintext {
    fn drop(&mut self) {
        self.identity_private_key.zeroize();
        self.identity_public_key.zeroize();
        self.identity_x25519_private_key.zeroize();
        self.identity_x25519_public_key.zeroize();
        for integration in self.integrations.values_mut() {
            integration.access_token.zeroize();
            if let Some(refresh) = integration.refresh_token.as_mut() {
                refresh.zeroize();
            }
        }
        for record in self.received_capabilities.values_mut() {
            record.token.zeroize();
            if let Some(ciphertext) = record.local_snapshot_ciphertext.as_mut() {
                ciphertext.zeroize();
            }
        }
    }
}
