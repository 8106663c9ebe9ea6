//! Vault error taxonomy (§7).

/// Errors raised by vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// `initialize` called on a vault file that already exists.
    #[error("vault is already initialized")]
    AlreadyInitialized,
    /// An operation that requires an initialized vault found none.
    #[error("vault has not been initialized")]
    NotInitialized,
    /// `unlock` was called with a password that does not decrypt the vault.
    #[error("invalid password")]
    InvalidPassword,
    /// `initialize` was called with a password shorter than 8 characters.
    #[error("password must be at least 8 characters")]
    WeakPassword,
    /// A mutating or reading operation was attempted while the vault is
    /// locked.
    #[error("vault is locked")]
    Locked,
    /// `setIntegration` was given a payload that fails validation.
    #[error("invalid integration payload: {0}")]
    InvalidPayload(String),
    /// The on-disk vault file is corrupted or uses an unsupported format
    /// version.
    #[error("corrupted vault file: {0}")]
    Corrupted(String),
    /// Filesystem I/O failure reading or writing the vault file.
    #[error("vault I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Io(err.to_string())
    }
}
