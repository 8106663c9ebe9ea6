//! Shared types used across the trust core: time, ids, and canonical JSON.
//!
//! This crate has no cryptographic dependencies of its own; it exists so
//! that `ocmt-vault`, `ocmt-capability`, and `ocmt-relay` agree on the exact
//! bytes that get hashed and signed without depending on each other.

pub mod canonical;
pub mod ids;
pub mod tier;
pub mod time;

pub use canonical::canonical_json;
pub use ids::CapabilityId;
pub use tier::Tier;
pub use time::{now_unix, Clock, SystemClock, CLOCK_SKEW_SECONDS};
