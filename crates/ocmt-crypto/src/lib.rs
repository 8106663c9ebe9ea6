//! Concrete cryptographic primitives for the trust core (§4.1).
//!
//! Every choice here is pinned by the specification: Argon2id for password
//! KDF, XChaCha20-Poly1305 for at-rest and in-transit AEAD, Ed25519 for
//! signatures, X25519 + HKDF-SHA256 for snapshot key agreement, SHA-256 for
//! fingerprints and bloom filter hashing, and a constant-time compare for
//! anything secret. Higher layers (`ocmt-vault`, `ocmt-capability`,
//! `ocmt-relay`) never reach for a different algorithm.

pub mod aead;
pub mod compare;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod kem;
pub mod signing;

pub use aead::{open, random_nonce, seal, NONCE_LENGTH};
pub use compare::constant_time_eq;
pub use error::{CryptoError, Result};
pub use hash::{bloom_hash, double_hash, sha256};
pub use kdf::{derive_key, KdfParams, KEY_LENGTH};
pub use kem::{open_handshake, seal_handshake, SenderHandshake, X25519PublicKey, X25519StaticSecret};
pub use signing::{verify, IdentityKeyPair, PublicKey, SignatureBytes};
