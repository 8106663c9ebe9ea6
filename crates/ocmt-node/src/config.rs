//! Runtime configuration, loadable from `OCMT_`-prefixed environment
//! variables with documented defaults (§2.1, §9). No default here may
//! weaken a §4 parameter; knobs only loosen in the unsafe direction with an
//! explicit opt-in, never silently.

use std::path::PathBuf;

/// Resolve the container's base directory.
///
/// Priority: `$OCMT_BASE_DIR`, else `~/.ocmt`, else `./.ocmt`.
pub fn default_base_dir() -> PathBuf {
    std::env::var("OCMT_BASE_DIR")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".ocmt")))
        .unwrap_or_else(|| PathBuf::from(".ocmt"))
}

/// Runtime configuration for one container process.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory holding `secrets.enc` and, for the relay role, `relay/`.
    pub base_dir: PathBuf,
    /// Optional auto-unlock password read from `OCMT_VAULT_PASSWORD` at
    /// boot. Absent means the vault stays locked until an explicit unlock
    /// (§6: "absent = vault stays locked").
    pub vault_password: Option<String>,
    /// How often a pushed CACHED snapshot is refreshed, floored at
    /// `ocmt_capability::MIN_REFRESH_INTERVAL_SECS` by the sync engine.
    pub refresh_interval_secs: u64,
    /// Base URL of a separately hosted relay process. `None` runs the
    /// relay in-process via `ocmt_relay::LocalRelay`.
    pub relay_url: Option<String>,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            base_dir: default_base_dir(),
            vault_password: std::env::var("OCMT_VAULT_PASSWORD").ok(),
            refresh_interval_secs: std::env::var("OCMT_REFRESH_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(ocmt_capability::DEFAULT_REFRESH_INTERVAL_SECS),
            relay_url: std::env::var("OCMT_RELAY_URL").ok(),
        }
    }

    pub fn vault_path(&self) -> PathBuf {
        self.base_dir.join("secrets.enc")
    }

    pub fn relay_snapshots_path(&self) -> PathBuf {
        self.base_dir.join("relay").join("snapshots.json")
    }

    pub fn relay_revocations_path(&self) -> PathBuf {
        self.base_dir.join("relay").join("revocations.json")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            vault_password: None,
            refresh_interval_secs: ocmt_capability::DEFAULT_REFRESH_INTERVAL_SECS,
            relay_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_spec_refresh_interval() {
        let config = NodeConfig { base_dir: PathBuf::from("/tmp/ocmt-test"), ..Default::default() };
        assert_eq!(config.refresh_interval_secs, 300);
        assert_eq!(config.vault_path(), PathBuf::from("/tmp/ocmt-test/secrets.enc"));
    }
}
