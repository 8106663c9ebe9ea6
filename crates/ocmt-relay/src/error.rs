//! Relay-side error taxonomy (§7).

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("revocation record failed signature verification")]
    InvalidSignature,
    #[error("revocation record rejected: revokedAt is {delta_secs}s outside the replay window")]
    ReplayWindowExceeded { delta_secs: u64 },
    #[error("snapshot rejected: expiresAt is already in the past")]
    SnapshotExpired,
    #[error("snapshot is missing a required field: {0}")]
    InvalidSnapshot(&'static str),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("malformed revocation or snapshot payload: {0}")]
    Malformed(String),
    #[error("relay request failed: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;

impl From<ocmt_capability::CapabilityError> for RelayError {
    fn from(_: ocmt_capability::CapabilityError) -> Self {
        RelayError::InvalidSignature
    }
}
