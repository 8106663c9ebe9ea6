//! The at-rest encrypted vault holding a container's identity, integration
//! credentials, and capability records (§3, §4.2).

pub mod error;
pub mod file;
pub mod plaintext;
pub mod records;
pub mod vault;

pub use error::{Result, VaultError};
pub use file::VaultFile;
pub use plaintext::VaultPlaintext;
pub use records::{
    CapabilitySummary, IntegrationPayload, IntegrationSummary, IssuedCapabilityRecord,
    LocalSnapshotMeta, ReceivedCapabilityRecord,
};
pub use vault::{CapabilityScope, Vault};
