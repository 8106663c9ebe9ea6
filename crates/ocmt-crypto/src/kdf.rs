//! Argon2id key derivation (§4.1).
//!
//! Defaults match §4.1 exactly: memory = 64 MiB, iterations = 3,
//! parallelism = 4, output = 32 bytes, salt = 16 random bytes. An
//! implementer may expose these as configuration (`KdfParams::new`) but
//! must never go below these defaults (§9, open question 2) — there is no
//! "fast/insecure" constructor in this module on purpose.

use crate::error::{CryptoError, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Output length of the derived key, in bytes.
pub const KEY_LENGTH: usize = 32;
/// Salt length, in bytes.
pub const SALT_LENGTH: usize = 16;

/// Conservative Argon2id defaults mandated by §4.1.
pub const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
pub const DEFAULT_ITERATIONS: u32 = 3;
pub const DEFAULT_PARALLELISM: u32 = 4;

/// The KDF parameters recorded in a vault file header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
    #[serde(with = "salt_b64")]
    pub salt: [u8; SALT_LENGTH],
}

impl KdfParams {
    /// The mandated defaults, with a freshly drawn random salt.
    pub fn generate_default() -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self {
            memory_kib: DEFAULT_MEMORY_KIB,
            iterations: DEFAULT_ITERATIONS,
            parallelism: DEFAULT_PARALLELISM,
            salt,
        }
    }

    /// Construct parameters at least as strong as the defaults. Returns
    /// `None` if any parameter is weaker than §4.1 mandates.
    pub fn at_least_default(memory_kib: u32, iterations: u32, parallelism: u32) -> Option<Self> {
        if memory_kib < DEFAULT_MEMORY_KIB
            || iterations < DEFAULT_ITERATIONS
            || parallelism < DEFAULT_PARALLELISM
        {
            return None;
        }
        let mut salt = [0u8; SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Some(Self {
            memory_kib,
            iterations,
            parallelism,
            salt,
        })
    }

    fn to_argon2_params(&self) -> Result<Params> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| CryptoError::Kdf(e.to_string()))
    }
}

/// Derive a 32-byte key from a password and the given parameters.
///
/// This is CPU/memory intensive by design (§4.1); callers that need a hard
/// time ceiling should run it on a blocking thread pool and enforce the
/// ceiling there (§5: "30s hard ceiling on the KDF").
pub fn derive_key(password: &str, params: &KdfParams) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2_params()?);
    let mut out = Zeroizing::new([0u8; KEY_LENGTH]);
    argon2
        .hash_password_into(password.as_bytes(), &params.salt, out.as_mut())
        .map_err(|e| CryptoError::Kdf(e.to_string()))?;
    Ok(out)
}

mod salt_b64 {
    use super::SALT_LENGTH;
    use ocmt_core::ids::{base64_url_decode, base64_url_encode};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(salt: &[u8; SALT_LENGTH], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64_url_encode(salt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<[u8; SALT_LENGTH], D::Error> {
        let s = String::deserialize(de)?;
        let bytes = base64_url_decode(&s).ok_or_else(|| serde::de::Error::custom("bad salt b64"))?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("wrong salt length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_params_derive_same_key() {
        let params = KdfParams::generate_default();
        let a = derive_key("correct horse battery staple", &params).unwrap();
        let b = derive_key("correct horse battery staple", &params).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn different_passwords_derive_different_keys() {
        let params = KdfParams::generate_default();
        let a = derive_key("password one", &params).unwrap();
        let b = derive_key("password two", &params).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = KdfParams::generate_default();
        let b = KdfParams::generate_default();
        let ka = derive_key("same password", &a).unwrap();
        let kb = derive_key("same password", &b).unwrap();
        assert_ne!(*ka, *kb);
    }

    #[test]
    fn defaults_match_spec() {
        let params = KdfParams::generate_default();
        assert_eq!(params.memory_kib, 64 * 1024);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.parallelism, 4);
    }

    #[test]
    fn at_least_default_rejects_weaker_params() {
        assert!(KdfParams::at_least_default(1024, 1, 1).is_none());
        assert!(KdfParams::at_least_default(DEFAULT_MEMORY_KIB, DEFAULT_ITERATIONS, DEFAULT_PARALLELISM).is_some());
    }

    #[test]
    fn kdf_params_round_trip_through_json() {
        let params = KdfParams::generate_default();
        let json = serde_json::to_string(&params).unwrap();
        let back: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
