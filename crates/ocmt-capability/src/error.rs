//! Capability engine error taxonomy (§4.4, §7).

/// Errors raised verifying a capability token's wire format, signature,
/// or claims. None of these are retriable.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed capability token: {0}")]
    MalformedToken(String),
    #[error("capability signature does not verify")]
    BadSignature,
    #[error("capability expired at {expires_at}, now {now}")]
    Expired { expires_at: u64, now: u64 },
    #[error("capability subject does not match expected subject")]
    SubjectMismatch,
}

/// Errors raised by the capability engine's higher-level operations.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error(transparent)]
    Verify(#[from] VerifyError),
    #[error(transparent)]
    Vault(#[from] ocmt_vault::VaultError),
    #[error("no capability found with that id")]
    NotFound,
    #[error("capability has been revoked")]
    Revoked,
    #[error("operation is not within the capability's scope")]
    ScopeViolation,
    #[error("no decryptable cached snapshot available for this capability")]
    NoSnapshotAvailable,
    #[error("issuer's container is unreachable for a LIVE-tier capability")]
    IssuerUnreachable,
    #[error("delegated credential transport failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
