//! Process-local session discipline layered on top of [`ocmt_vault::Vault`]:
//! TTL expiry, keep-alive, exponential unlock backoff, and operation rate
//! limiting (§4.3).

pub mod backoff;
pub mod error;
pub mod manager;
pub mod rate_limit;

pub use backoff::BackoffTracker;
pub use error::{Result, SessionError};
pub use manager::{SessionManager, SessionStatus, SESSION_TTL_SECS};
pub use rate_limit::RateLimiter;
