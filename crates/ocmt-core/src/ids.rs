//! Identifier newtypes.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A capability id: a cryptographically random 128-bit value, serialized
/// base64url without padding on the wire (§3, "Capability token (wire
/// format)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(#[serde(with = "b64_128")] [u8; 16]);

impl CapabilityId {
    /// Draw a fresh random id from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// The raw 128 bits backing this id.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parse from a base64url string (no padding).
    pub fn parse(s: &str) -> Result<Self, InvalidCapabilityId> {
        let decoded = base64_url_decode(s).ok_or(InvalidCapabilityId)?;
        let bytes: [u8; 16] = decoded.try_into().map_err(|_| InvalidCapabilityId)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", base64_url_encode(&self.0))
    }
}

/// Error returned when a capability id cannot be parsed from the wire.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("malformed capability id")]
pub struct InvalidCapabilityId;

mod b64_128 {
    use super::{base64_url_decode, base64_url_encode};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 16], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64_url_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 16], D::Error> {
        let s = String::deserialize(de)?;
        let decoded = base64_url_decode(&s).ok_or_else(|| serde::de::Error::custom("bad b64"))?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("wrong length"))
    }
}

/// Base64url (no padding) encode, shared by ids and the wire-format
/// modules in `ocmt-crypto` that need the same alphabet.
pub fn base64_url_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url (no padding) string.
pub fn base64_url_decode(s: &str) -> Option<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s).ok()
}
