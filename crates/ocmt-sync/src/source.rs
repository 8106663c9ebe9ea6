//! Seams the sync engine dispatches through, left for the hosting
//! application to implement (§4.7).

use async_trait::async_trait;
use ocmt_crypto::{PublicKey, X25519PublicKey};

/// Re-materializes the shared view behind an issued CACHED capability.
/// What "the resource" means, and how it is produced, is entirely an
/// application concern (§4.7: "an application-supplied function, out of
/// core scope").
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn materialize(&self, resource: &str) -> Result<Vec<u8>, crate::error::SyncError>;
}

/// Resolves a subject's X25519 KEM public key from their (Ed25519)
/// identity public key, so the issuer can seal a snapshot addressed to
/// them. How subjects publish/exchange this key is a directory concern
/// out of this core's scope, mirroring `DelegationTransport`'s handshake
/// being out of scope on the execute side.
#[async_trait]
pub trait SubjectKeyDirectory: Send + Sync {
    async fn x25519_public_key(&self, subject: PublicKey) -> Option<X25519PublicKey>;
}
