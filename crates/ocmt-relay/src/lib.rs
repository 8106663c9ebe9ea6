//! The untrusted relay role: a Bloom-filter-fronted revocation store and a
//! blind encrypted-snapshot store (§4.5, §4.6). Sees ciphertext, public
//! keys, signatures, and timestamps — never plaintext secrets.

pub mod bloom;
pub mod error;
pub mod persist;
pub mod revocation;
pub mod service;
pub mod snapshot;

pub use bloom::BloomFilter;
pub use error::{RelayError, Result};
pub use revocation::{IsRevokedResult, RevocationSource, RevocationStore, REPLAY_WINDOW_SECS};
pub use service::{LocalRelay, RelayService};
pub use snapshot::{SnapshotStats, SnapshotStore};
