//! End-to-end coverage of spec.md §8 S4: issuer A pushes a CACHED snapshot,
//! subject B fetches and decrypts it, then B's capability engine
//! `execute(T, "read", {})` returns the decrypted view — without A being
//! contacted again — chaining `ocmt-sync`'s push/fetch into
//! `ocmt-capability`'s `CapabilityEngine::execute` tier dispatch.

use async_trait::async_trait;
use ocmt_capability::{
    CapabilityEngine, CapabilityToken, DelegationTransport, ExecuteContext, ParamAllowList, PeerTransport,
    TransportError,
};
use ocmt_core::Tier;
use ocmt_crypto::{PublicKey, X25519PublicKey};
use ocmt_relay::{LocalRelay, RevocationStore, SnapshotStore};
use ocmt_sync::{SnapshotSource, SubjectKeyDirectory, SyncEngine};
use ocmt_vault::{ReceivedCapabilityRecord, Vault};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct EchoSource;
#[async_trait]
impl SnapshotSource for EchoSource {
    async fn materialize(&self, resource: &str) -> Result<Vec<u8>, ocmt_sync::SyncError> {
        Ok(serde_json::to_vec(&serde_json::json!({"resource": resource})).unwrap())
    }
}

struct StaticDirectory(Mutex<HashMap<PublicKey, X25519PublicKey>>);
impl StaticDirectory {
    fn new() -> Self {
        Self(Mutex::new(HashMap::new()))
    }
    fn insert(&self, subject: PublicKey, key: X25519PublicKey) {
        self.0.lock().insert(subject, key);
    }
}
#[async_trait]
impl SubjectKeyDirectory for StaticDirectory {
    async fn x25519_public_key(&self, subject: PublicKey) -> Option<X25519PublicKey> {
        self.0.lock().get(&subject).copied()
    }
}

struct UnreachablePeer;
#[async_trait]
impl PeerTransport for UnreachablePeer {
    async fn call(&self, _issuer: PublicKey, _op: &str, _params: &serde_json::Value) -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Unreachable("LIVE transport must not be used for a CACHED execute".into()))
    }
}

struct UnreachableDelegation;
#[async_trait]
impl DelegationTransport for UnreachableDelegation {
    async fn execute(&self, _w: &[u8], _op: &str, _p: &serde_json::Value) -> Result<serde_json::Value, TransportError> {
        Err(TransportError::Unreachable("DELEGATED transport must not be used for a CACHED execute".into()))
    }
}

fn relay() -> (Arc<dyn ocmt_relay::RelayService>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let revocations = RevocationStore::new(dir.path().join("revocations.json")).unwrap();
    let snapshots = SnapshotStore::new(dir.path().join("snapshots.json")).unwrap();
    (Arc::new(LocalRelay::new(revocations, snapshots)), dir)
}

#[tokio::test]
async fn cached_execute_returns_decrypted_view_without_contacting_issuer() {
    let (relay, _relay_dir) = relay();

    let issuer_dir = tempfile::tempdir().unwrap();
    let issuer_vault = Vault::new(issuer_dir.path().join("issuer.enc"));
    issuer_vault.initialize("correct horse battery staple").await.unwrap();
    issuer_vault.unlock("correct horse battery staple").await.unwrap();
    let issuer_vault = Arc::new(issuer_vault);
    let issuer_identity = issuer_vault.identity().await.unwrap();

    let subject_dir = tempfile::tempdir().unwrap();
    let subject_vault = Vault::new(subject_dir.path().join("subject.enc"));
    subject_vault.initialize("correct horse battery staple").await.unwrap();
    let subject_public = subject_vault.unlock("correct horse battery staple").await.unwrap();
    let subject_vault = Arc::new(subject_vault);
    let subject_kem = subject_vault.identity_x25519().await.unwrap().public_key();

    let directory = Arc::new(StaticDirectory::new());
    directory.insert(subject_public, subject_kem);

    // A issues B a CACHED capability over "calendar", scope ["read"].
    let allow_list = ParamAllowList::new();
    let engine = CapabilityEngine::new(allow_list);
    let issued = engine
        .issue(&issuer_vault, subject_public, "calendar", vec!["read".into()], Tier::Cached, 3600)
        .await
        .unwrap();

    // A's syncSnapshots pushes the sealed snapshot to the relay.
    let issuer_sync = SyncEngine::new(issuer_vault.clone(), relay.clone(), Arc::new(EchoSource), directory);
    let push_outcome = issuer_sync.sync_snapshots().await.unwrap();
    assert_eq!(push_outcome.pushed, 1);

    // B stores the token it received out of band, matching how
    // `ContainerService::store_capability` records a received capability.
    let token = CapabilityToken::from_wire(&issued.token).unwrap();
    let id = token.header.id;
    subject_vault
        .insert_received_capability(
            id,
            ReceivedCapabilityRecord {
                issuer_container_id: "issuer-1".into(),
                issuer_public_key: issuer_identity.public_key(),
                token: issued.token.clone(),
                resource: token.header.resource.clone(),
                scope: token.header.scope.clone(),
                tier: token.header.tier,
                expires_at: token.header.exp,
                local_snapshot_ciphertext: None,
                local_snapshot_meta: None,
            },
        )
        .await
        .unwrap();

    // B's fetchAllAvailableSnapshots retrieves and decrypts it.
    let subject_sync = SyncEngine::new(
        subject_vault.clone(),
        relay,
        Arc::new(EchoSource),
        Arc::new(StaticDirectory::new()),
    );
    let fetch_outcome = subject_sync.fetch_all_available_snapshots().await.unwrap();
    assert_eq!(fetch_outcome.fetched, 1);

    // B's execute(T, "read", {}) returns the decrypted view via the
    // CACHED tier dispatch, sourced from the already-cached plaintext —
    // no PeerTransport/DelegationTransport call is ever made.
    let result = engine
        .execute(
            &subject_vault,
            id,
            "read",
            serde_json::Map::new(),
            ExecuteContext {
                peer_transport: &UnreachablePeer,
                snapshot_source: &subject_sync,
                delegation_transport: &UnreachableDelegation,
                revocation_checker: &subject_sync,
            },
        )
        .await
        .unwrap();

    assert_eq!(result, serde_json::json!({"resource": "calendar"}));
}
