//! Crypto error taxonomy (§7: Integrity kind).

/// Errors raised by the primitives in this crate.
///
/// These map onto the `AEADFailure` / `BadSignature` kinds of §7; higher
/// layers (`ocmt-vault`, `ocmt-capability`) wrap these into their own
/// richer error enums rather than exposing `CryptoError` directly, so that
/// a caller never has to guess whether a `CryptoError::Aead` means "wrong
/// password" or "corrupted file" — that distinction is the caller's to
/// make from context.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD encryption or decryption failed (wrong key, tampered
    /// ciphertext, or corrupted nonce/tag).
    #[error("AEAD operation failed")]
    Aead,
    /// Ed25519 signature verification failed.
    #[error("signature verification failed")]
    BadSignature,
    /// Key derivation (Argon2id) failed, typically due to invalid params.
    #[error("key derivation failed: {0}")]
    Kdf(String),
    /// A byte slice was not the expected length for the operation.
    #[error("invalid key or buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CryptoError>;
