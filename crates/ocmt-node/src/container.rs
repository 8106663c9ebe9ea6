//! Wires one container process's vault, session, capability, and sync
//! layers into a single explicitly constructed handle (§6, §9: deliberately
//! not a `static` singleton — a host process may run more than one).

use crate::config::NodeConfig;
use crate::transport::{HttpPeerTransport, PeerDirectory, UnimplementedDelegationTransport};
use ocmt_capability::{CapabilityEngine, DelegationTransport, ParamAllowList, PeerTransport};
use ocmt_relay::{LocalRelay, RelayService, RevocationStore, SnapshotStore};
use ocmt_session::SessionManager;
use ocmt_sync::{RelayClient, SnapshotSource, SubjectKeyDirectory, SyncEngine};
use ocmt_vault::Vault;
use std::sync::Arc;

/// The wiring error surface for building a [`Container`]; everything past
/// this point uses [`crate::error::NodeError`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to prepare relay storage directory: {0}")]
    RelayStorage(#[from] ocmt_relay::RelayError),
}

/// One container's runtime: the unlocked-or-locked vault, the session
/// discipline in front of it, the capability engine, and the sync engine,
/// plus the transports `execute`/`sync` dispatch through.
pub struct Container {
    pub session: SessionManager,
    pub capabilities: CapabilityEngine,
    pub sync: Arc<SyncEngine>,
    pub relay: Arc<dyn RelayService>,
    pub peer_transport: Arc<dyn PeerTransport>,
    pub delegation_transport: Arc<dyn DelegationTransport>,
    pub vault: Arc<Vault>,
}

impl Container {
    /// Build a container from `config`, auto-unlocking from
    /// `config.vault_password` when present (§6: "absent = vault stays
    /// locked"). `allow_list` and the three application-supplied seams are
    /// the host's own policy and data plumbing, never this core's concern.
    pub async fn build(
        config: NodeConfig,
        allow_list: ParamAllowList,
        snapshot_source: Arc<dyn SnapshotSource>,
        subject_keys: Arc<dyn SubjectKeyDirectory>,
        peer_directory: Arc<dyn PeerDirectory>,
    ) -> Result<Self, BuildError> {
        let vault = Arc::new(Vault::new(config.vault_path()));
        let session = SessionManager::new(vault.clone());
        let capabilities = CapabilityEngine::new(allow_list);

        let relay: Arc<dyn RelayService> = match &config.relay_url {
            Some(url) => Arc::new(RelayClient::new(url.clone())),
            None => {
                std::fs::create_dir_all(config.base_dir.join("relay")).ok();
                let revocations = RevocationStore::new(config.relay_revocations_path())?;
                let snapshots = SnapshotStore::new(config.relay_snapshots_path())?;
                Arc::new(LocalRelay::new(revocations, snapshots))
            }
        };

        let sync = Arc::new(
            SyncEngine::new(vault.clone(), relay.clone(), snapshot_source, subject_keys)
                .with_refresh_interval_secs(config.refresh_interval_secs),
        );

        let peer_transport: Arc<dyn PeerTransport> = Arc::new(HttpPeerTransport::new(peer_directory));
        let delegation_transport: Arc<dyn DelegationTransport> = Arc::new(UnimplementedDelegationTransport);

        if let Some(password) = &config.vault_password {
            if vault.is_initialized() {
                if let Err(e) = session.unlock("auto-unlock", password).await {
                    tracing::warn!(error = %e, "auto-unlock from OCMT_VAULT_PASSWORD failed");
                }
            }
        }

        Ok(Self {
            session,
            capabilities,
            sync,
            relay,
            peer_transport,
            delegation_transport,
            vault,
        })
    }
}
