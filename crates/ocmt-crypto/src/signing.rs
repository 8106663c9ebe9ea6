//! Ed25519 signatures (§4.1).

use crate::error::{CryptoError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A 32-byte Ed25519 public key, base64url-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(#[serde(with = "key_b64")] [u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn to_dalek(self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::BadSignature)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", ocmt_core::ids::base64_url_encode(&self.0))
    }
}

/// An Ed25519 signature, base64url-encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignatureBytes(#[serde(with = "sig_b64")] [u8; 64]);

impl SignatureBytes {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// A container identity's long-lived Ed25519 keypair (§3: `identityPrivateKey`
/// is an Ed25519 seed, set exactly once per vault lifetime).
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        Self { signing_key }
    }

    /// Reconstruct a keypair from a stored 32-byte Ed25519 seed.
    pub fn from_seed(seed: &Zeroizing<[u8; 32]>) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// The 32-byte seed to persist in the vault (`identityPrivateKey`).
    pub fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// The corresponding public key (`identityPublicKey`).
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message with this identity.
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes(self.signing_key.sign(message).to_bytes())
    }
}

/// Verify `signature` over `message` under `public_key`.
pub fn verify(public_key: PublicKey, message: &[u8], signature: &SignatureBytes) -> Result<()> {
    let verifying_key = public_key.to_dalek()?;
    let sig = Signature::from_bytes(&signature.0);
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::BadSignature)
}

mod key_b64 {
    use ocmt_core::ids::{base64_url_decode, base64_url_encode};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64_url_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(de)?;
        let decoded = base64_url_decode(&s).ok_or_else(|| serde::de::Error::custom("bad key b64"))?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("wrong key length"))
    }
}

mod sig_b64 {
    use ocmt_core::ids::{base64_url_decode, base64_url_encode};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64_url_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<[u8; 64], D::Error> {
        let s = String::deserialize(de)?;
        let decoded = base64_url_decode(&s).ok_or_else(|| serde::de::Error::custom("bad sig b64"))?;
        decoded
            .try_into()
            .map_err(|_| serde::de::Error::custom("wrong signature length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let identity = IdentityKeyPair::generate();
        let sig = identity.sign(b"hello capability");
        assert!(verify(identity.public_key(), b"hello capability", &sig).is_ok());
    }

    #[test]
    fn verify_fails_under_wrong_key() {
        let a = IdentityKeyPair::generate();
        let b = IdentityKeyPair::generate();
        let sig = a.sign(b"payload");
        assert!(verify(b.public_key(), b"payload", &sig).is_err());
    }

    #[test]
    fn verify_fails_on_tampered_message() {
        let identity = IdentityKeyPair::generate();
        let sig = identity.sign(b"payload");
        assert!(verify(identity.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn seed_round_trips_to_same_identity() {
        let a = IdentityKeyPair::generate();
        let seed = a.seed();
        let b = IdentityKeyPair::from_seed(&seed);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn public_key_json_round_trips() {
        let identity = IdentityKeyPair::generate();
        let pk = identity.public_key();
        let json = serde_json::to_string(&pk).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, back);
    }
}
