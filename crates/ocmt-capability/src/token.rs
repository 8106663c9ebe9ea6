//! The capability token wire format: canonical JSON header plus an Ed25519
//! signature over its canonical bytes (§3, §4.4).

use crate::error::VerifyError;
use ocmt_core::{CapabilityId, Tier, CLOCK_SKEW_SECONDS};
use ocmt_crypto::{PublicKey, SignatureBytes};
use serde::{Deserialize, Serialize};

/// The signable header of a capability token. Field names match the wire
/// format exactly (`iss`, `sub`, `exp`, `iat`) since this struct's
/// canonical-JSON encoding IS the signed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityHeader {
    pub iss: PublicKey,
    pub sub: PublicKey,
    pub resource: String,
    pub scope: Vec<String>,
    pub tier: Tier,
    pub id: CapabilityId,
    pub exp: u64,
    pub iat: u64,
}

/// A capability header plus the issuer's signature over its canonical
/// bytes — the unit that travels over the wire and gets stored verbatim in
/// a received-capability record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityToken {
    #[serde(flatten)]
    pub header: CapabilityHeader,
    pub signature: SignatureBytes,
}

impl CapabilityToken {
    /// Sign a header, producing the wire token.
    pub fn sign(header: CapabilityHeader, signing_key: &ocmt_crypto::IdentityKeyPair) -> crate::error::Result<Self> {
        let bytes = canonical_header_bytes(&header)?;
        let signature = signing_key.sign(&bytes);
        Ok(Self { header, signature })
    }

    /// Serialize to the wire string form (canonical JSON header + signature
    /// field, itself re-serialized through serde so recipients can parse
    /// with plain `serde_json::from_str`).
    pub fn to_wire(&self) -> crate::error::Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VerifyError::MalformedToken(e.to_string()).into())
    }

    pub fn from_wire(wire: &str) -> crate::error::Result<Self> {
        serde_json::from_str(wire).map_err(|e| VerifyError::MalformedToken(e.to_string()).into())
    }

    /// Verify the signature and temporal claims, optionally pinning the
    /// expected subject (§4.4 `verify`).
    pub fn verify(&self, now: u64, expected_subject: Option<&PublicKey>) -> Result<(), VerifyError> {
        let bytes = canonical_header_bytes(&self.header)
            .map_err(|_| VerifyError::MalformedToken("failed to re-encode header".into()))?;
        ocmt_crypto::verify(self.header.iss, &bytes, &self.signature)
            .map_err(|_| VerifyError::BadSignature)?;

        if now > self.header.exp {
            return Err(VerifyError::Expired { expires_at: self.header.exp, now });
        }
        if self.header.iat > now + CLOCK_SKEW_SECONDS {
            return Err(VerifyError::Expired { expires_at: self.header.exp, now });
        }
        if let Some(expected) = expected_subject {
            if expected != &self.header.sub {
                return Err(VerifyError::SubjectMismatch);
            }
        }
        Ok(())
    }
}

fn canonical_header_bytes(header: &CapabilityHeader) -> crate::error::Result<Vec<u8>> {
    ocmt_core::canonical_json(header).map_err(|e| VerifyError::MalformedToken(e.to_string()).into())
}
