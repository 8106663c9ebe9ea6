//! Capability token issuance, verification, revocation, and tiered
//! execution (§4.4).

pub mod engine;
pub mod error;
pub mod revocation;
pub mod scope;
pub mod token;
pub mod transport;

/// Default CACHED-tier snapshot refresh interval, in seconds (SPEC open
/// question 2: 300s default, never configured below 30s).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;
/// The floor `ocmt-sync` enforces on a configured refresh interval.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 30;

pub use engine::{CapabilityEngine, ExecuteContext, IssueResult, RevokeOutcome};
pub use error::{CapabilityError, Result, VerifyError};
pub use revocation::{RevocationBody, SignedRevocation};
pub use scope::ParamAllowList;
pub use token::{CapabilityHeader, CapabilityToken};
pub use transport::{
    CachedSnapshotSource, DelegationTransport, EncryptedSnapshot, PeerTransport, RevocationChecker,
    RevocationPublisher, TransportError,
};
