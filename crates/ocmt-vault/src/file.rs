//! The vault file on disk: header + nonce + AEAD ciphertext (§3).
//!
//! Written atomically (write-to-temp + rename) with owner-only permissions,
//! matching the invariant in §3.

use crate::error::{Result, VaultError};
use ocmt_crypto::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current on-disk format version. Bumped whenever the header shape or the
/// ciphertext's internal schema changes in a way old readers cannot parse.
pub const FORMAT_VERSION: u8 = 1;

/// The vault file's plaintext header plus its encrypted payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultFile {
    pub format_version: u8,
    pub kdf: KdfParams,
    #[serde(with = "hex_bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
}

impl VaultFile {
    pub fn new(kdf: KdfParams, nonce: [u8; ocmt_crypto::NONCE_LENGTH], ciphertext: Vec<u8>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            kdf,
            nonce: nonce.to_vec(),
            ciphertext,
        }
    }

    /// Read and parse a vault file, rejecting formats this implementation
    /// cannot safely interpret.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file: VaultFile = serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::Corrupted(format!("malformed vault file: {e}")))?;
        if file.format_version != FORMAT_VERSION {
            return Err(VaultError::Corrupted(format!(
                "unsupported vault format version {}",
                file.format_version
            )));
        }
        if file.nonce.len() != ocmt_crypto::NONCE_LENGTH {
            return Err(VaultError::Corrupted("wrong nonce length".to_string()));
        }
        Ok(file)
    }

    /// Write atomically: serialize to a temp file in the same directory,
    /// fsync-adjacent rename, owner-only permissions.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(
            ".{}.tmp-{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("vault"),
            ocmt_core::ids::CapabilityId::random()
        ));
        let bytes = serde_json::to_vec(self)
            .map_err(|e| VaultError::Corrupted(format!("failed to serialize vault file: {e}")))?;
        std::fs::write(&tmp_path, &bytes)?;
        set_owner_only(&tmp_path)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn nonce_array(&self) -> [u8; ocmt_crypto::NONCE_LENGTH] {
        let mut out = [0u8; ocmt_crypto::NONCE_LENGTH];
        out.copy_from_slice(&self.nonce);
        out
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(|e| serde::de::Error::custom(format!("bad hex: {e}")))
    }
}
