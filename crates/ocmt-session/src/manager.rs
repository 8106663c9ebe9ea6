//! The session manager: TTL expiry, keep-alive, and the backoff/rate-limit
//! guards in front of [`ocmt_vault::Vault::unlock`] (§4.3).

use crate::backoff::BackoffTracker;
use crate::error::{Result, SessionError};
use crate::rate_limit::RateLimiter;
use ocmt_core::{Clock, SystemClock};
use ocmt_crypto::PublicKey;
use ocmt_vault::{CapabilityScope, CapabilitySummary, IntegrationPayload, IntegrationSummary, Vault, VaultError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default session lifetime from last activity, in seconds (§4.3).
pub const SESSION_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    unlocked_at: u64,
    expires_at: u64,
    last_activity: u64,
}

enum SessionState {
    Inactive,
    Active(ActiveSession),
}

/// Answer to the `status` RPC (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub initialized: bool,
    pub locked: bool,
    pub expires_in_secs: Option<u64>,
    pub public_key: Option<PublicKey>,
}

/// Wraps a [`Vault`] with the process-local session discipline described in
/// §4.3: TTL expiry from last keep-alive, per-client exponential backoff on
/// failed unlocks, and a per-client operation rate limit. `Vault::unlock`
/// itself never rate-limits; that responsibility lives entirely here so the
/// vault's own error surface stays `InvalidPassword` / `NotInitialized`.
pub struct SessionManager {
    vault: Arc<Vault>,
    state: tokio::sync::Mutex<SessionState>,
    backoff: Mutex<BackoffTracker>,
    rate_limiter: Mutex<RateLimiter>,
    clock: Box<dyn Clock>,
}

impl SessionManager {
    /// Takes a shared handle so a runtime layer (`ocmt-node`) can hand the
    /// same unlocked vault to a sync engine without a second in-memory copy
    /// of its decrypted state.
    pub fn new(vault: Arc<Vault>) -> Self {
        Self::with_clock(vault, Box::new(SystemClock))
    }

    pub fn with_clock(vault: Arc<Vault>, clock: Box<dyn Clock>) -> Self {
        Self {
            vault,
            state: tokio::sync::Mutex::new(SessionState::Inactive),
            backoff: Mutex::new(BackoffTracker::new()),
            rate_limiter: Mutex::new(RateLimiter::new()),
            clock,
        }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Summary for the `status` RPC (§6): whether a vault file exists, the
    /// current lock state, time left on the active session, and the
    /// identity's public key while unlocked.
    pub async fn status(&self) -> SessionStatus {
        self.expire_if_due().await;
        let now = self.clock.now();
        let locked = !self.vault.is_unlocked().await;
        let (expires_in_secs, public_key) = if locked {
            (None, None)
        } else {
            let expires_in = match &*self.state.lock().await {
                SessionState::Active(session) => Some(session.expires_at.saturating_sub(now)),
                SessionState::Inactive => None,
            };
            let public_key = self.vault.identity().await.ok().map(|id| id.public_key());
            (expires_in, public_key)
        };
        SessionStatus {
            initialized: self.vault.is_initialized(),
            locked,
            expires_in_secs,
            public_key,
        }
    }

    /// Attempt to unlock the vault on behalf of `client_id`, subject to
    /// that client's backoff window.
    pub async fn unlock(&self, client_id: &str, password: &str) -> Result<PublicKey> {
        let now = self.clock.now();
        {
            let backoff = self.backoff.lock();
            if let Some(retry_after_secs) = backoff.check(client_id, now) {
                return Err(SessionError::RateLimited { retry_after_secs });
            }
        }

        match self.vault.unlock(password).await {
            Ok(public_key) => {
                self.backoff.lock().record_success(client_id);
                let mut state = self.state.lock().await;
                *state = SessionState::Active(ActiveSession {
                    unlocked_at: now,
                    expires_at: now + SESSION_TTL_SECS,
                    last_activity: now,
                });
                tracing::info!(client_id, "session established");
                Ok(public_key)
            }
            Err(VaultError::InvalidPassword) => {
                self.backoff.lock().record_failure(client_id, now);
                Err(SessionError::Vault(VaultError::InvalidPassword))
            }
            Err(other) => Err(SessionError::Vault(other)),
        }
    }

    /// Explicitly end the session, locking and zeroizing the vault.
    pub async fn lock(&self) {
        self.vault.lock().await;
        let mut state = self.state.lock().await;
        *state = SessionState::Inactive;
        tracing::info!("session ended");
    }

    /// Whether a session is active and has not passed its expiry. Lazily
    /// locks the vault and clears the session if the TTL elapsed since the
    /// last keep-alive (§4.3: "if no call for TTL, the manager locks and
    /// zeroizes keys").
    pub async fn is_unlocked(&self) -> bool {
        self.expire_if_due().await;
        self.vault.is_unlocked().await
    }

    /// Push the session's expiry out by `SESSION_TTL_SECS` from now
    /// (`extendSession` / keep-alive, §4.3).
    pub async fn extend_session(&self) -> Result<()> {
        self.expire_if_due().await;
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        match &mut *state {
            SessionState::Active(session) => {
                session.last_activity = now;
                session.expires_at = now + SESSION_TTL_SECS;
                Ok(())
            }
            SessionState::Inactive => Err(SessionError::NoSession),
        }
    }

    /// Check `client_id`'s per-minute secret-store operation quota, apart
    /// from the unlock backoff.
    pub fn check_rate_limit(&self, client_id: &str) -> Result<()> {
        let now = self.clock.now();
        if self.rate_limiter.lock().check_and_record(client_id, now) {
            Ok(())
        } else {
            Err(SessionError::TooManyRequests)
        }
    }

    /// Periodic maintenance: ages out idle per-client backoff state.
    /// Intended to be called on a timer by the runtime layer.
    pub fn sweep_backoff(&self) {
        self.backoff.lock().sweep(self.clock.now());
    }

    async fn expire_if_due(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        if let SessionState::Active(session) = &*state {
            if now >= session.expires_at {
                self.vault.lock().await;
                *state = SessionState::Inactive;
                tracing::info!("session expired after TTL");
            }
        }
    }

    pub async fn set_integration(&self, client_id: &str, provider: &str, payload: IntegrationPayload) -> Result<()> {
        self.check_rate_limit(client_id)?;
        self.expire_if_due().await;
        self.vault.set_integration(provider, payload).await?;
        Ok(())
    }

    pub async fn get_integration(&self, client_id: &str, provider: &str) -> Result<Option<IntegrationPayload>> {
        self.check_rate_limit(client_id)?;
        self.expire_if_due().await;
        Ok(self.vault.get_integration(provider).await?)
    }

    pub async fn list_integrations(&self, client_id: &str) -> Result<Vec<IntegrationSummary>> {
        self.check_rate_limit(client_id)?;
        self.expire_if_due().await;
        Ok(self.vault.list_integrations().await?)
    }

    pub async fn remove_integration(&self, client_id: &str, provider: &str) -> Result<()> {
        self.check_rate_limit(client_id)?;
        self.expire_if_due().await;
        self.vault.remove_integration(provider).await?;
        Ok(())
    }

    pub async fn list_capabilities(&self, client_id: &str, scope: CapabilityScope) -> Result<Vec<CapabilitySummary>> {
        self.check_rate_limit(client_id)?;
        self.expire_if_due().await;
        Ok(self.vault.list_capabilities(scope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocmt_core::Clock;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FakeClock(Arc<AtomicU64>);
    impl Clock for FakeClock {
        fn now(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn manager(dir: &tempfile::TempDir, now: Arc<AtomicU64>) -> SessionManager {
        let vault = Arc::new(Vault::new(dir.path().join("secrets.enc")));
        SessionManager::with_clock(vault, Box::new(FakeClock(now)))
    }

    #[tokio::test]
    async fn unlock_establishes_session() {
        let dir = tempdir().unwrap();
        let now = Arc::new(AtomicU64::new(0));
        let mgr = manager(&dir, now.clone());
        mgr.vault().initialize("correct horse battery staple").await.unwrap();

        mgr.unlock("client-a", "correct horse battery staple").await.unwrap();
        assert!(mgr.is_unlocked().await);
    }

    #[tokio::test]
    async fn session_expires_after_ttl_with_no_keepalive() {
        let dir = tempdir().unwrap();
        let now = Arc::new(AtomicU64::new(0));
        let mgr = manager(&dir, now.clone());
        mgr.vault().initialize("correct horse battery staple").await.unwrap();
        mgr.unlock("client-a", "correct horse battery staple").await.unwrap();

        now.store(SESSION_TTL_SECS + 1, Ordering::SeqCst);
        assert!(!mgr.is_unlocked().await);
    }

    #[tokio::test]
    async fn extend_session_pushes_expiry_out() {
        let dir = tempdir().unwrap();
        let now = Arc::new(AtomicU64::new(0));
        let mgr = manager(&dir, now.clone());
        mgr.vault().initialize("correct horse battery staple").await.unwrap();
        mgr.unlock("client-a", "correct horse battery staple").await.unwrap();

        now.store(SESSION_TTL_SECS - 10, Ordering::SeqCst);
        mgr.extend_session().await.unwrap();

        now.store(SESSION_TTL_SECS + SESSION_TTL_SECS - 11, Ordering::SeqCst);
        assert!(mgr.is_unlocked().await);
    }

    #[tokio::test]
    async fn status_reports_lock_state_and_expiry() {
        let dir = tempdir().unwrap();
        let now = Arc::new(AtomicU64::new(0));
        let mgr = manager(&dir, now.clone());

        let before_init = mgr.status().await;
        assert!(!before_init.initialized);
        assert!(before_init.locked);

        mgr.vault().initialize("correct horse battery staple").await.unwrap();
        let locked_status = mgr.status().await;
        assert!(locked_status.initialized);
        assert!(locked_status.locked);
        assert!(locked_status.public_key.is_none());

        mgr.unlock("client-a", "correct horse battery staple").await.unwrap();
        let unlocked_status = mgr.status().await;
        assert!(!unlocked_status.locked);
        assert_eq!(unlocked_status.expires_in_secs, Some(SESSION_TTL_SECS));
        assert!(unlocked_status.public_key.is_some());
    }

    #[tokio::test]
    async fn failed_unlock_triggers_backoff() {
        let dir = tempdir().unwrap();
        let now = Arc::new(AtomicU64::new(0));
        let mgr = manager(&dir, now.clone());
        mgr.vault().initialize("correct horse battery staple").await.unwrap();

        assert!(mgr.unlock("client-a", "wrong password").await.is_err());
        match mgr.unlock("client-a", "correct horse battery staple").await {
            Err(SessionError::RateLimited { retry_after_secs }) => assert_eq!(retry_after_secs, 1),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_blocks_after_quota() {
        let dir = tempdir().unwrap();
        let now = Arc::new(AtomicU64::new(0));
        let mgr = manager(&dir, now.clone());
        mgr.vault().initialize("correct horse battery staple").await.unwrap();
        mgr.unlock("client-a", "correct horse battery staple").await.unwrap();

        for _ in 0..crate::rate_limit::MAX_OPS_PER_WINDOW {
            mgr.list_integrations("client-a").await.unwrap();
        }
        assert!(matches!(
            mgr.list_integrations("client-a").await,
            Err(SessionError::TooManyRequests)
        ));
    }
}
