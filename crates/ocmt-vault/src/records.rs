//! The plaintext records stored inside the vault's encrypted blob (§3).

use ocmt_core::{CapabilityId, Tier};
use ocmt_crypto::PublicKey;
use serde::{Deserialize, Serialize};

/// A third-party integration's credentials and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationPayload {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// RFC3339 timestamp.
    pub expires_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
}

/// Summary returned by `listIntegrations` — never the raw tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSummary {
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub expires_at: String,
}

/// A capability this container has issued to some other subject (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCapabilityRecord {
    pub subject_public_key: PublicKey,
    pub resource: String,
    pub scope: Vec<String>,
    pub tier: Tier,
    pub expires_at: u64,
    pub created_at: u64,
    pub revoked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_snapshot_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_snapshot_due_at: Option<u64>,
}

impl IssuedCapabilityRecord {
    /// Mark this capability revoked. Monotonic: once true, a later call is
    /// a no-op rather than an error (§3 invariant, §8 property 5).
    pub fn mark_revoked(&mut self) {
        self.revoked = true;
    }
}

/// A capability this container has received from some other issuer (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedCapabilityRecord {
    pub issuer_container_id: String,
    pub issuer_public_key: PublicKey,
    /// The full serialized wire form, re-verified at execution time.
    pub token: String,
    pub resource: String,
    pub scope: Vec<String>,
    pub tier: Tier,
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_snapshot_ciphertext: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_snapshot_meta: Option<LocalSnapshotMeta>,
}

/// Metadata about a locally cached, decrypted CACHED-tier snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSnapshotMeta {
    pub fetched_at: u64,
    pub expires_at: u64,
}

/// A received-side summary for `listCapabilities(received)`: deliberately
/// omits the raw token (§4.4: "never the raw tokens of received
/// capabilities if the vault is locked" — and the vault being the only
/// place the token lives, omitting it here by default keeps callers from
/// leaking it through a summary listing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySummary {
    pub id: CapabilityId,
    pub resource: String,
    pub scope: Vec<String>,
    pub tier: Tier,
    pub expires_at: u64,
    pub revoked: bool,
}
