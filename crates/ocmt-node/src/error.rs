//! Runtime glue error taxonomy (§7): wraps every lower layer's errors so a
//! `ContainerService` caller matches on one closed set.

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Session(#[from] ocmt_session::SessionError),
    #[error(transparent)]
    Vault(#[from] ocmt_vault::VaultError),
    #[error(transparent)]
    Capability(#[from] ocmt_capability::CapabilityError),
    #[error(transparent)]
    Sync(#[from] ocmt_sync::SyncError),
    #[error(transparent)]
    Relay(#[from] ocmt_relay::RelayError),
    #[error("bearer token did not match")]
    Unauthenticated,
    #[error("malformed request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
