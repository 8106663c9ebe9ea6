//! Atomic write-to-temp-then-rename persistence, shared by the revocation
//! and snapshot stores (§4.5, §4.6). Mirrors the vault file's save
//! discipline without the AEAD layer: the relay only ever persists data it
//! is already trusted to see (ciphertext, signatures, timestamps).

use crate::error::{RelayError, Result};
use serde::Serialize;
use std::path::Path;

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| RelayError::Persistence(e.to_string()))?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("relay"),
        ocmt_core::CapabilityId::random()
    ));
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| RelayError::Persistence(format!("failed to serialize: {e}")))?;
    std::fs::write(&tmp_path, &bytes).map_err(|e| RelayError::Persistence(e.to_string()))?;
    set_owner_only(&tmp_path)?;
    std::fs::rename(&tmp_path, path).map_err(|e| RelayError::Persistence(e.to_string()))?;
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| RelayError::Persistence(e.to_string()))?;
    let value = serde_json::from_slice(&bytes)
        .map_err(|e| RelayError::Malformed(format!("{}: {e}", path.display())))?;
    Ok(Some(value))
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| RelayError::Persistence(e.to_string()))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

/// Coalesces bursts of mutations into roughly one disk write per second
/// (§4.5, §4.6). A single in-flight flush task is tracked per store; a
/// mutation that lands while one is pending just lets the pending flush
/// pick up its change instead of scheduling a second one.
pub struct Debouncer {
    pending: std::sync::atomic::AtomicBool,
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            pending: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Returns `true` if the caller won the race to schedule the next flush
    /// and should spawn the delayed write; `false` if one is already queued.
    pub fn should_schedule(&self) -> bool {
        !self.pending.swap(true, std::sync::atomic::Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.pending.store(false, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

pub const DEBOUNCE_INTERVAL_SECS: u64 = 1;
