//! Capability access tiers (GLOSSARY: "Tier").

use serde::{Deserialize, Serialize};

/// The mode of access a capability grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// Real-time access; the issuer's container must be reachable.
    Live,
    /// Access through a periodically refreshed encrypted relay snapshot.
    Cached,
    /// Access through a long-lived secondary credential handed to the
    /// subject out of band.
    Delegated,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tier::Live => "LIVE",
            Tier::Cached => "CACHED",
            Tier::Delegated => "DELEGATED",
        };
        write!(f, "{s}")
    }
}
