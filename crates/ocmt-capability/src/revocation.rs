//! Signed revocation records (§3): constructed locally on `revoke`, and the
//! wire shape the relay's revocation store consumes.

use ocmt_core::CapabilityId;
use ocmt_crypto::{IdentityKeyPair, PublicKey, SignatureBytes};
use rand::RngCore;
use serde::{Deserialize, Serialize};

fn random_nonce() -> [u8; 16] {
    let mut nonce = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// The signable body of a revocation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationBody {
    pub capability_id: CapabilityId,
    pub revoked_by: PublicKey,
    pub revoked_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_expiry: Option<u64>,
    /// Random nonce folded into the signed bytes so two revocations issued
    /// in the same second are not byte-identical (§3: signature covers
    /// `{capabilityId, revokedAt, reason?, nonce}`).
    pub nonce: [u8; 16],
}

/// A revocation body plus the issuer's signature, as posted to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedRevocation {
    #[serde(flatten)]
    pub body: RevocationBody,
    pub signature: SignatureBytes,
}

impl SignedRevocation {
    pub fn sign(
        capability_id: CapabilityId,
        revoked_at: u64,
        reason: Option<String>,
        original_expiry: Option<u64>,
        signing_key: &IdentityKeyPair,
    ) -> crate::error::Result<Self> {
        let body = RevocationBody {
            capability_id,
            revoked_by: signing_key.public_key(),
            revoked_at,
            reason,
            original_expiry,
            nonce: random_nonce(),
        };
        let bytes = canonical_bytes(&body)?;
        let signature = signing_key.sign(&bytes);
        Ok(Self { body, signature })
    }

    pub fn verify(&self) -> crate::error::Result<()> {
        let bytes = canonical_bytes(&self.body)?;
        ocmt_crypto::verify(self.body.revoked_by, &bytes, &self.signature)
            .map_err(|_| crate::error::VerifyError::BadSignature.into())
    }
}

fn canonical_bytes(body: &RevocationBody) -> crate::error::Result<Vec<u8>> {
    ocmt_core::canonical_json(body)
        .map_err(|e| crate::error::VerifyError::MalformedToken(e.to_string()).into())
}
