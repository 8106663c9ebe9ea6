//! The container-side sync engine (§4.7): pushes outgoing CACHED snapshots,
//! pulls incoming ones, and answers the capability engine's revocation and
//! snapshot-source transport seams from a local cache backed by the relay.

pub mod engine;
pub mod error;
pub mod relay_client;
pub mod revocation_cache;
pub mod source;

pub use engine::{FetchOutcome, SyncEngine, SyncSnapshotsOutcome};
pub use error::{Result, SyncError};
pub use relay_client::RelayClient;
pub use revocation_cache::{RevocationCache, CACHE_TTL_SECS};
pub use source::{SnapshotSource, SubjectKeyDirectory};
