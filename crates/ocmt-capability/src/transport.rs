//! Transport seams the capability engine dispatches through at `execute`
//! time, so the core stays testable without real network I/O (§4.4).

use async_trait::async_trait;
use ocmt_core::CapabilityId;
use ocmt_crypto::{IdentityKeyPair, PublicKey, X25519PublicKey};
use serde::Serialize;
use serde_json::Value;

/// Performs a LIVE-tier request against a peer container's identity,
/// routed however the runtime layer sees fit (relay-brokered, direct, ...).
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn call(
        &self,
        issuer: PublicKey,
        operation: &str,
        params: &Value,
    ) -> Result<Value, TransportError>;
}

/// Locates the latest decryptable CACHED snapshot for a capability,
/// fetching from the relay and decrypting as needed. Implemented by
/// `ocmt-sync`, which owns the X25519 key agreement and local snapshot
/// cache; the capability engine only ever sees the decrypted bytes.
#[async_trait]
pub trait CachedSnapshotSource: Send + Sync {
    async fn get_decrypted(&self, capability_id: ocmt_core::CapabilityId) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Wire shape of a relay-hosted encrypted snapshot (§3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EncryptedSnapshot {
    pub capability_id: ocmt_core::CapabilityId,
    pub ephemeral_public_key: ocmt_crypto::X25519PublicKey,
    pub nonce: Vec<u8>,
    pub encrypted_data: Vec<u8>,
    pub signature: ocmt_crypto::SignatureBytes,
    pub created_at: u64,
    pub expires_at: u64,
}

impl EncryptedSnapshot {
    /// Build and sign a snapshot envelope: the signature covers every other
    /// field's canonical bytes (§3: "signature is Ed25519 over all other
    /// fields, by the issuer").
    pub fn sign(
        capability_id: CapabilityId,
        ephemeral_public_key: X25519PublicKey,
        nonce: Vec<u8>,
        encrypted_data: Vec<u8>,
        created_at: u64,
        expires_at: u64,
        signing_key: &IdentityKeyPair,
    ) -> crate::error::Result<Self> {
        let signable = SnapshotSignable {
            capability_id: &capability_id,
            ephemeral_public_key: &ephemeral_public_key,
            nonce: &nonce,
            encrypted_data: &encrypted_data,
            created_at,
            expires_at,
        };
        let bytes = canonical_snapshot_bytes(&signable)?;
        let signature = signing_key.sign(&bytes);
        Ok(Self {
            capability_id,
            ephemeral_public_key,
            nonce,
            encrypted_data,
            signature,
            created_at,
            expires_at,
        })
    }

    /// Verify the envelope's signature against the claimed issuer's public
    /// key. Callers are responsible for checking `expires_at` separately.
    pub fn verify_signature(&self, issuer: PublicKey) -> crate::error::Result<()> {
        let signable = SnapshotSignable {
            capability_id: &self.capability_id,
            ephemeral_public_key: &self.ephemeral_public_key,
            nonce: &self.nonce,
            encrypted_data: &self.encrypted_data,
            created_at: self.created_at,
            expires_at: self.expires_at,
        };
        let bytes = canonical_snapshot_bytes(&signable)?;
        ocmt_crypto::verify(issuer, &bytes, &self.signature)
            .map_err(|_| crate::error::VerifyError::BadSignature.into())
    }
}

#[derive(Serialize)]
struct SnapshotSignable<'a> {
    capability_id: &'a CapabilityId,
    ephemeral_public_key: &'a X25519PublicKey,
    nonce: &'a [u8],
    encrypted_data: &'a [u8],
    created_at: u64,
    expires_at: u64,
}

fn canonical_snapshot_bytes(signable: &SnapshotSignable<'_>) -> crate::error::Result<Vec<u8>> {
    ocmt_core::canonical_json(signable)
        .map_err(|e| crate::error::VerifyError::MalformedToken(e.to_string()).into())
}

/// Executes an operation against a DELEGATED tier's wrapped secondary
/// credential. The handshake that produced the wrapped credential, and the
/// credential's own shape, are out of this core's scope (SPEC open
/// question 4); this trait is only the seam.
#[async_trait]
pub trait DelegationTransport: Send + Sync {
    async fn execute(
        &self,
        wrapped_credential: &[u8],
        operation: &str,
        params: &Value,
    ) -> Result<Value, TransportError>;
}

/// Best-effort delivery of a signed revocation to the relay.
#[async_trait]
pub trait RevocationPublisher: Send + Sync {
    async fn publish(&self, record: &crate::revocation::SignedRevocation) -> Result<(), TransportError>;
}

/// Consulted before dispatching `execute`: local cache + relay Bloom/DB
/// (§4.7). Implemented by `ocmt-sync` in the full runtime.
#[async_trait]
pub trait RevocationChecker: Send + Sync {
    async fn is_revoked(&self, capability_id: ocmt_core::CapabilityId) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("transport request timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let issuer = IdentityKeyPair::generate();
        let ephemeral = ocmt_crypto::X25519StaticSecret::generate();
        let snapshot = EncryptedSnapshot::sign(
            CapabilityId::random(),
            ephemeral.public_key(),
            vec![1, 2, 3],
            b"ciphertext".to_vec(),
            1_000,
            2_000,
            &issuer,
        )
        .unwrap();
        assert!(snapshot.verify_signature(issuer.public_key()).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_envelope() {
        let issuer = IdentityKeyPair::generate();
        let ephemeral = ocmt_crypto::X25519StaticSecret::generate();
        let mut snapshot = EncryptedSnapshot::sign(
            CapabilityId::random(),
            ephemeral.public_key(),
            vec![1, 2, 3],
            b"ciphertext".to_vec(),
            1_000,
            2_000,
            &issuer,
        )
        .unwrap();
        snapshot.encrypted_data = b"tampered".to_vec();
        assert!(snapshot.verify_signature(issuer.public_key()).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer() {
        let issuer = IdentityKeyPair::generate();
        let impostor = IdentityKeyPair::generate();
        let ephemeral = ocmt_crypto::X25519StaticSecret::generate();
        let snapshot = EncryptedSnapshot::sign(
            CapabilityId::random(),
            ephemeral.public_key(),
            vec![1, 2, 3],
            b"ciphertext".to_vec(),
            1_000,
            2_000,
            &issuer,
        )
        .unwrap();
        assert!(snapshot.verify_signature(impostor.public_key()).is_err());
    }
}
