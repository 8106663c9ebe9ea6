//! The relay's logical RPC surface (§6), expressed as a plain async trait
//! so `ocmt-node`/`ocmt-sync` can depend on either this in-process
//! implementation or a `reqwest`-based client talking to a real relay
//! process without changing a call site.

use crate::error::Result;
use crate::revocation::IsRevokedResult;
use async_trait::async_trait;
use ocmt_capability::{EncryptedSnapshot, SignedRevocation};
use ocmt_core::CapabilityId;
use ocmt_crypto::PublicKey;

#[async_trait]
pub trait RelayService: Send + Sync {
    async fn add_revocation(&self, record: SignedRevocation) -> Result<SignedRevocation>;
    async fn is_revoked(&self, id: CapabilityId) -> Result<IsRevokedResult>;
    async fn list_revocations(
        &self,
        revoked_by: Option<PublicKey>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<SignedRevocation>>;

    async fn store_snapshot(&self, snapshot: EncryptedSnapshot) -> Result<()>;
    async fn get_snapshot(&self, id: CapabilityId) -> Result<Option<EncryptedSnapshot>>;
    async fn delete_snapshot(&self, id: CapabilityId) -> Result<()>;
}

/// In-process implementation backed by this crate's own stores. `ocmt-node`
/// wraps this directly when running the relay role in the same container as
/// its tests; a real deployment would instead point at a `reqwest`-based
/// client hitting a separately hosted relay process (out of this core's
/// scope to implement, per §1).
pub struct LocalRelay {
    pub revocations: crate::revocation::RevocationStore,
    pub snapshots: crate::snapshot::SnapshotStore,
}

impl LocalRelay {
    pub fn new(revocations: crate::revocation::RevocationStore, snapshots: crate::snapshot::SnapshotStore) -> Self {
        Self { revocations, snapshots }
    }
}

#[async_trait]
impl RelayService for LocalRelay {
    async fn add_revocation(&self, record: SignedRevocation) -> Result<SignedRevocation> {
        self.revocations.add(record)
    }

    async fn is_revoked(&self, id: CapabilityId) -> Result<IsRevokedResult> {
        Ok(self.revocations.is_revoked(id))
    }

    async fn list_revocations(
        &self,
        revoked_by: Option<PublicKey>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<SignedRevocation>> {
        Ok(self.revocations.list(revoked_by, limit, offset))
    }

    async fn store_snapshot(&self, snapshot: EncryptedSnapshot) -> Result<()> {
        self.snapshots.store(snapshot)
    }

    async fn get_snapshot(&self, id: CapabilityId) -> Result<Option<EncryptedSnapshot>> {
        Ok(self.snapshots.get(id))
    }

    async fn delete_snapshot(&self, id: CapabilityId) -> Result<()> {
        self.snapshots.delete(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocmt_crypto::IdentityKeyPair;

    fn local_relay() -> (LocalRelay, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let revocations =
            crate::revocation::RevocationStore::new(dir.path().join("revocations.json")).unwrap();
        let snapshots =
            crate::snapshot::SnapshotStore::new(dir.path().join("snapshots.json")).unwrap();
        (LocalRelay::new(revocations, snapshots), dir)
    }

    #[tokio::test]
    async fn add_revocation_then_is_revoked_round_trips() {
        let (relay, _dir) = local_relay();
        let issuer = IdentityKeyPair::generate();
        let now = ocmt_core::now_unix();
        let record =
            SignedRevocation::sign(CapabilityId::random(), now, None, None, &issuer).unwrap();
        let id = record.body.capability_id;
        relay.add_revocation(record).await.unwrap();
        assert!(relay.is_revoked(id).await.unwrap().revoked);
    }
}
