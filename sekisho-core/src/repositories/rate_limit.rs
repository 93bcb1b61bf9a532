//! Repository trait for the authoritative rate-limit store.
//!
//! Unlike the local limiter, the authoritative store must combine check and
//! increment into one conditional update — two concurrent attempts for the
//! same identifier must never both observe "attempt N of threshold" and both
//! proceed past the limit.

use async_trait::async_trait;

use crate::Error;

/// The store's answer to one check-and-increment call.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether this attempt may proceed to the credential verifier.
    pub allowed: bool,
    /// Attempts left in the current window after this one. Takes precedence
    /// over any local estimate for user-facing messages.
    pub remaining: u32,
    /// How long to wait when blocked; zero when allowed.
    pub retry_after_seconds: i64,
}

/// Authoritative, remote-backed rate limiting.
#[async_trait]
pub trait RateLimitRepository: Send + Sync + 'static {
    /// Atomically evaluate and count one attempt for the identifier.
    ///
    /// Blocked attempts must not be counted — they never reach the credential
    /// verifier and must not double-bill the window.
    async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitDecision, Error>;

    /// Drop all rate-limit state for the identifier. Called on successful
    /// authentication.
    async fn clear(&self, identifier: &str) -> Result<(), Error>;
}
