//! X25519 key agreement + HKDF-SHA256 expansion for snapshot encryption
//! (§4.1: "KEM for snapshots").

use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519Dalek, StaticSecret};
use zeroize::Zeroizing;

/// Fixed HKDF info label for snapshot key expansion (§4.1).
pub const SNAPSHOT_INFO_LABEL: &[u8] = b"ocmt/snapshot/v1";

/// A subject's long-lived X25519 public key, used as the KEM recipient key
/// for snapshots addressed to them. Derived from the subject's Ed25519
/// identity is deliberately *not* done here — callers maintain a separate
/// X25519 static keypair for KEM, matching the distinct-key-per-algorithm
/// best practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct X25519PublicKey(#[serde(with = "key_b64")] [u8; 32]);

impl X25519PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A subject's static X25519 secret key, used to open snapshots addressed
/// to them.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    pub fn from_bytes(bytes: Zeroizing<[u8; 32]>) -> Self {
        Self(StaticSecret::from(*bytes))
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey(X25519Dalek::from(&self.0).to_bytes())
    }
}

/// Output of generating a fresh ephemeral sender side of a snapshot
/// encryption: the ephemeral public key to embed in the envelope, plus the
/// derived AEAD key to seal it with.
pub struct SenderHandshake {
    pub ephemeral_public_key: X25519PublicKey,
    pub aead_key: Zeroizing<[u8; 32]>,
}

/// Issuer side: draw a fresh ephemeral X25519 keypair, agree with the
/// subject's static public key, and HKDF-expand to an AEAD key.
pub fn seal_handshake(subject_public_key: X25519PublicKey) -> SenderHandshake {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public_key = X25519Dalek::from(&ephemeral).to_bytes();
    let shared = ephemeral.diffie_hellman(&X25519Dalek::from(subject_public_key.0));
    let aead_key = expand(shared.as_bytes());
    SenderHandshake {
        ephemeral_public_key: X25519PublicKey(ephemeral_public_key),
        aead_key,
    }
}

/// Subject side: given the issuer's ephemeral public key from the
/// envelope, re-derive the same AEAD key using our static secret.
pub fn open_handshake(
    our_secret: &X25519StaticSecret,
    ephemeral_public_key: X25519PublicKey,
) -> Zeroizing<[u8; 32]> {
    let shared = our_secret
        .0
        .diffie_hellman(&X25519Dalek::from(ephemeral_public_key.0));
    expand(shared.as_bytes())
}

fn expand(shared_secret: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, shared_secret);
    let mut out = Zeroizing::new([0u8; 32]);
    hk.expand(SNAPSHOT_INFO_LABEL, out.as_mut())
        .expect("32 is a valid HKDF-SHA256 output length");
    out
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
