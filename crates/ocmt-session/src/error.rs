//! Session error taxonomy (§7).

/// Errors raised by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `unlock` failed because the caller is inside a backoff window.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    /// `unlock` failed because the caller exceeded the per-minute op quota.
    #[error("operation rate limit exceeded for this client")]
    TooManyRequests,
    /// No session is active for this caller.
    #[error("no active session")]
    NoSession,
    /// The underlying vault rejected the operation.
    #[error(transparent)]
    Vault(#[from] ocmt_vault::VaultError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
