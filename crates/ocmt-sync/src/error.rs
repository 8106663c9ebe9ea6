//! Sync engine error taxonomy (§4.7, §7).

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Vault(#[from] ocmt_vault::VaultError),
    #[error("a sync job is already running for this direction")]
    AlreadyRunning,
    #[error("application-supplied snapshot source failed: {0}")]
    SourceFailed(String),
    #[error("no X25519 key on file for subject, cannot seal a snapshot")]
    SubjectKeyUnknown,
    #[error(transparent)]
    Relay(#[from] ocmt_relay::RelayError),
    #[error("snapshot envelope failed to decrypt or verify: {0}")]
    InvalidSnapshot(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
