//! End-to-end coverage of spec.md §8 S2: five rapid `unlock("wrong")`
//! calls through the session layer fail `InvalidPassword`, and the sixth
//! is rejected up front with `RateLimited { retry_after_secs: 16 }` —
//! the full `[1, 2, 4, 8, 16, ...]` schedule, not just its first step.

use ocmt_core::Clock;
use ocmt_session::{SessionError, SessionManager};
use ocmt_vault::{Vault, VaultError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

struct FakeClock(Arc<AtomicU64>);
impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn five_failed_unlocks_then_sixteen_second_backoff() {
    let dir = tempdir().unwrap();
    let now = Arc::new(AtomicU64::new(0));
    let vault = Arc::new(Vault::new(dir.path().join("secrets.enc")));
    let mgr = SessionManager::with_clock(vault, Box::new(FakeClock(now.clone())));
    mgr.vault().initialize("correct horse battery staple").await.unwrap();

    // Attempts 1-5 each run just past the backoff window the previous
    // failure set, so every one reaches the vault and fails InvalidPassword
    // rather than being short-circuited by the backoff check itself. The
    // pre-attempt clock values are exactly the schedule's running total:
    // 0, 1, 1+2=3, 3+4=7, 7+8=15.
    for &attempt_at in &[0u64, 1, 3, 7, 15] {
        now.store(attempt_at, Ordering::SeqCst);
        match mgr.unlock("client-a", "wrong password").await {
            Err(SessionError::Vault(VaultError::InvalidPassword)) => {}
            other => panic!("expected InvalidPassword, got {other:?}"),
        }
    }

    // Attempt 6, issued at the same instant as attempt 5 (rapid
    // succession, no further clock advance), is rejected before ever
    // touching the vault: attempt 5's failure set a 16s window from t=15.
    match mgr.unlock("client-a", "wrong password").await {
        Err(SessionError::RateLimited { retry_after_secs }) => {
            assert!(retry_after_secs >= 16, "expected >= 16s, got {retry_after_secs}");
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}
