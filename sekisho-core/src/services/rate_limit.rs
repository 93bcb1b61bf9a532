//! Dual rate limiting for login attempts.
//!
//! Every attempt is checked against two limiters at once: a local limiter
//! whose state is derived from the attempt ledger, and an authoritative
//! remote store consulted through [`RateLimitRepository`]. An attempt
//! proceeds only when both allow it.
//!
//! The authoritative store is consulted with a timeout. When it errors or
//! times out, the pipeline degrades to the local verdict alone rather than
//! refusing logins outright; the degradation is logged.

use std::sync::Arc;

use chrono::Duration;

use crate::{
    Error,
    attempt::{AttemptOutcome, LoginAttempt},
    clock::Clock,
    repositories::{AttemptLedgerRepository, RateLimitDecision, RateLimitRepository},
};

/// Configuration for both halves of the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enforced at all.
    pub enabled: bool,
    /// Failed attempts allowed per identifier per window.
    pub max_attempts: u32,
    /// Sliding window over which failures are counted.
    pub window: Duration,
    /// How long an identifier stays blocked after hitting the limit,
    /// measured from its most recent failure.
    pub lockout_duration: Duration,
    /// How long to wait for the authoritative store before degrading to the
    /// local verdict.
    pub authority_timeout: std::time::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            window: Duration::minutes(15),
            lockout_duration: Duration::minutes(15),
            authority_timeout: std::time::Duration::from_secs(5),
        }
    }
}

impl RateLimitConfig {
    /// Configuration with rate limiting turned off. Intended for tests.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// The combined answer of both limiters for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The attempt may proceed to credential verification.
    Allowed {
        /// Attempts left in the window after this one. Comes from the
        /// authoritative store when it answered, from the local estimate
        /// otherwise.
        remaining: u32,
        /// True when the authoritative store could not be reached and the
        /// verdict rests on local state alone.
        degraded: bool,
    },
    /// The attempt is refused before reaching the credential verifier.
    Blocked { retry_after_seconds: i64 },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed { .. })
    }
}

/// In-process limiter that derives window occupancy from the attempt ledger.
///
/// The limiter itself holds no counters. The window resets implicitly as
/// failures age past the cutoff, and [`record_success`](Self::record_success)
/// clears an identifier outright.
pub struct LocalRateLimiter<L, C> {
    ledger: Arc<L>,
    clock: Arc<C>,
    config: RateLimitConfig,
}

impl<L, C> LocalRateLimiter<L, C>
where
    L: AttemptLedgerRepository,
    C: Clock,
{
    pub fn new(ledger: Arc<L>, clock: Arc<C>, config: RateLimitConfig) -> Self {
        Self {
            ledger,
            clock,
            config,
        }
    }

    /// Evaluate one attempt against the ledger without recording anything.
    pub async fn check(&self, identifier: &str) -> Result<RateLimitDecision, Error> {
        let now = self.clock.now();
        let since = now - self.config.window;
        let stats = self.ledger.attempt_stats(identifier, since).await?;

        if stats.failed_count < self.config.max_attempts {
            return Ok(RateLimitDecision {
                allowed: true,
                remaining: self
                    .config
                    .max_attempts
                    .saturating_sub(stats.failed_count + 1),
                retry_after_seconds: 0,
            });
        }

        // Lockout expiry is measured from the most recent counted failure.
        let locked_until = stats
            .latest_failure_at
            .map(|at| at + self.config.lockout_duration);

        match locked_until {
            Some(until) if until > now => Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_seconds: (until - now).num_seconds().max(1),
            }),
            _ => Ok(RateLimitDecision {
                allowed: true,
                remaining: 0,
                retry_after_seconds: 0,
            }),
        }
    }

    /// Append a failed-credential record for the identifier.
    pub async fn record_failure(&self, identifier: &str) -> Result<(), Error> {
        self.ledger
            .record_attempt(LoginAttempt {
                identifier: identifier.to_string(),
                attempted_at: self.clock.now(),
                outcome: AttemptOutcome::InvalidCredentials,
            })
            .await
    }

    /// Append an audit record for an attempt refused by the limiter. Does not
    /// affect window occupancy.
    pub async fn record_rate_limited(&self, identifier: &str) -> Result<(), Error> {
        self.ledger
            .record_attempt(LoginAttempt {
                identifier: identifier.to_string(),
                attempted_at: self.clock.now(),
                outcome: AttemptOutcome::RateLimited,
            })
            .await
    }

    /// Record a success and clear the identifier's failure history.
    pub async fn record_success(&self, identifier: &str) -> Result<(), Error> {
        self.ledger
            .record_attempt(LoginAttempt {
                identifier: identifier.to_string(),
                attempted_at: self.clock.now(),
                outcome: AttemptOutcome::Success,
            })
            .await?;
        self.ledger.clear_attempts(identifier).await?;
        Ok(())
    }
}

/// Fans one attempt out to the local limiter and the authoritative store.
pub struct DualRateLimiter<L, A, C> {
    local: LocalRateLimiter<L, C>,
    authority: Arc<A>,
    config: RateLimitConfig,
}

impl<L, A, C> DualRateLimiter<L, A, C>
where
    L: AttemptLedgerRepository,
    A: RateLimitRepository,
    C: Clock,
{
    pub fn new(ledger: Arc<L>, authority: Arc<A>, clock: Arc<C>, config: RateLimitConfig) -> Self {
        Self {
            local: LocalRateLimiter::new(ledger, clock, config.clone()),
            authority,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Evaluate one attempt against both limiters.
    ///
    /// The two checks run concurrently. The authoritative call also counts
    /// the attempt in the remote window when it is allowed, so this must be
    /// called at most once per submission.
    pub async fn check(&self, identifier: &str) -> Result<Verdict, Error> {
        if !self.config.enabled {
            return Ok(Verdict::Allowed {
                remaining: self.config.max_attempts,
                degraded: false,
            });
        }

        let (local, authority) = tokio::join!(
            self.local.check(identifier),
            tokio::time::timeout(
                self.config.authority_timeout,
                self.authority.check_and_increment(identifier),
            ),
        );
        let local = local?;

        let remote = match authority {
            Ok(Ok(decision)) => Some(decision),
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    identifier = identifier,
                    "Authoritative rate-limit store failed, degrading to local verdict"
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    identifier = identifier,
                    timeout = ?self.config.authority_timeout,
                    "Authoritative rate-limit store timed out, degrading to local verdict"
                );
                None
            }
        };

        let verdict = match remote {
            Some(remote) => {
                if local.allowed && remote.allowed {
                    Verdict::Allowed {
                        remaining: remote.remaining,
                        degraded: false,
                    }
                } else {
                    Verdict::Blocked {
                        retry_after_seconds: local
                            .retry_after_seconds
                            .max(remote.retry_after_seconds)
                            .max(1),
                    }
                }
            }
            None if local.allowed => Verdict::Allowed {
                remaining: local.remaining,
                degraded: true,
            },
            None => Verdict::Blocked {
                retry_after_seconds: local.retry_after_seconds,
            },
        };

        Ok(verdict)
    }

    /// Record a failed-credential attempt in the ledger.
    ///
    /// The authoritative store counted the attempt at check time, so only the
    /// local side needs updating here.
    pub async fn record_failure(&self, identifier: &str) -> Result<(), Error> {
        if !self.config.enabled {
            return Ok(());
        }
        self.local.record_failure(identifier).await
    }

    /// Record an attempt that was refused by the limiter. Audit-only.
    pub async fn record_rate_limited(&self, identifier: &str) -> Result<(), Error> {
        if !self.config.enabled {
            return Ok(());
        }
        self.local.record_rate_limited(identifier).await
    }

    /// Clear both limiters for the identifier after a successful login.
    ///
    /// A failure to clear the authoritative store is logged and swallowed;
    /// the user has already authenticated and must not be failed for it.
    pub async fn record_success(&self, identifier: &str) -> Result<(), Error> {
        if !self.config.enabled {
            return Ok(());
        }
        self.local.record_success(identifier).await?;
        if let Err(e) = self.authority.clear(identifier).await {
            tracing::warn!(
                error = %e,
                identifier = identifier,
                "Failed to clear authoritative rate-limit state after successful login"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::AttemptStats;
    use crate::clock::ManualClock;
    use crate::error::StorageError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockLedger {
        attempts: Mutex<Vec<LoginAttempt>>,
    }

    impl MockLedger {
        fn new() -> Self {
            Self {
                attempts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AttemptLedgerRepository for MockLedger {
        async fn record_attempt(&self, attempt: LoginAttempt) -> Result<(), Error> {
            self.attempts.lock().unwrap().push(attempt);
            Ok(())
        }

        async fn attempt_stats(
            &self,
            identifier: &str,
            since: DateTime<Utc>,
        ) -> Result<AttemptStats, Error> {
            let attempts = self.attempts.lock().unwrap();
            let matching: Vec<_> = attempts
                .iter()
                .filter(|a| {
                    a.identifier == identifier
                        && a.attempted_at >= since
                        && a.outcome == AttemptOutcome::InvalidCredentials
                })
                .collect();
            Ok(AttemptStats {
                failed_count: matching.len() as u32,
                latest_failure_at: matching.iter().map(|a| a.attempted_at).max(),
            })
        }

        async fn clear_attempts(&self, identifier: &str) -> Result<u64, Error> {
            let mut attempts = self.attempts.lock().unwrap();
            let before = attempts.len();
            attempts.retain(|a| a.identifier != identifier);
            Ok((before - attempts.len()) as u64)
        }

        async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
            let mut attempts = self.attempts.lock().unwrap();
            let len = attempts.len();
            attempts.retain(|a| a.attempted_at >= before);
            Ok((len - attempts.len()) as u64)
        }
    }

    struct MockAuthority {
        counts: Mutex<HashMap<String, u32>>,
        max: u32,
        unavailable: AtomicBool,
        delay: Option<std::time::Duration>,
    }

    impl MockAuthority {
        fn new(max: u32) -> Self {
            Self {
                counts: Mutex::new(HashMap::new()),
                max,
                unavailable: AtomicBool::new(false),
                delay: None,
            }
        }

        fn slow(max: u32, delay: std::time::Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(max)
            }
        }
    }

    #[async_trait]
    impl RateLimitRepository for MockAuthority {
        async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitDecision, Error> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("authority down".to_string()).into());
            }
            let mut counts = self.counts.lock().unwrap();
            let count = counts.entry(identifier.to_string()).or_insert(0);
            if *count >= self.max {
                return Ok(RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    retry_after_seconds: 60,
                });
            }
            *count += 1;
            Ok(RateLimitDecision {
                allowed: true,
                remaining: self.max - *count,
                retry_after_seconds: 0,
            })
        }

        async fn clear(&self, identifier: &str) -> Result<(), Error> {
            self.counts.lock().unwrap().remove(identifier);
            Ok(())
        }
    }

    fn limiter(
        ledger: Arc<MockLedger>,
        authority: Arc<MockAuthority>,
        clock: Arc<ManualClock>,
        config: RateLimitConfig,
    ) -> DualRateLimiter<MockLedger, MockAuthority, ManualClock> {
        DualRateLimiter::new(ledger, authority, clock, config)
    }

    #[tokio::test]
    async fn test_attempts_allowed_up_to_limit() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(100));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::default());

        for _ in 0..5 {
            let verdict = limiter.check("user@example.com").await.unwrap();
            assert!(verdict.is_allowed());
            limiter.record_failure("user@example.com").await.unwrap();
        }

        let verdict = limiter.check("user@example.com").await.unwrap();
        match verdict {
            Verdict::Blocked {
                retry_after_seconds,
            } => assert!(retry_after_seconds > 0),
            other => panic!("expected blocked verdict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(100));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::default());

        for _ in 0..5 {
            limiter.record_failure("locked@example.com").await.unwrap();
        }

        assert!(!limiter.check("locked@example.com").await.unwrap().is_allowed());
        assert!(limiter.check("other@example.com").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_window_resets_after_lockout_expires() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(100));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(
            ledger,
            authority,
            clock.clone(),
            RateLimitConfig::default(),
        );

        for _ in 0..5 {
            limiter.record_failure("user@example.com").await.unwrap();
        }
        assert!(!limiter.check("user@example.com").await.unwrap().is_allowed());

        clock.advance(Duration::minutes(16));
        assert!(limiter.check("user@example.com").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_authority_block_overrides_local_allow() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(1));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::default());

        assert!(limiter.check("user@example.com").await.unwrap().is_allowed());

        // Local ledger is still empty but the authority has hit its limit.
        let verdict = limiter.check("user@example.com").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Blocked {
                retry_after_seconds: 60
            }
        );
    }

    #[tokio::test]
    async fn test_authority_failure_degrades_to_local_verdict() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(100));
        authority.unavailable.store(true, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::default());

        let verdict = limiter.check("user@example.com").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Allowed {
                remaining: 4,
                degraded: true
            }
        );
    }

    #[tokio::test]
    async fn test_degraded_mode_still_enforces_local_lockout() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(100));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(
            ledger,
            authority.clone(),
            clock,
            RateLimitConfig::default(),
        );

        for _ in 0..5 {
            limiter.record_failure("user@example.com").await.unwrap();
        }
        authority.unavailable.store(true, Ordering::SeqCst);

        assert!(!limiter.check("user@example.com").await.unwrap().is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_authority_timeout_degrades_to_local_verdict() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::slow(
            100,
            std::time::Duration::from_secs(30),
        ));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::default());

        let verdict = limiter.check("user@example.com").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Allowed {
                remaining: 4,
                degraded: true
            }
        );
    }

    #[tokio::test]
    async fn test_disabled_config_always_allows() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(0));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::disabled());

        for _ in 0..10 {
            assert!(limiter.check("user@example.com").await.unwrap().is_allowed());
        }
    }

    #[tokio::test]
    async fn test_success_clears_both_limiters() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(3));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(
            ledger.clone(),
            authority.clone(),
            clock,
            RateLimitConfig::default(),
        );

        for _ in 0..3 {
            limiter.check("user@example.com").await.unwrap();
            limiter.record_failure("user@example.com").await.unwrap();
        }
        limiter.record_success("user@example.com").await.unwrap();

        assert!(ledger.attempts.lock().unwrap().is_empty());
        assert!(authority.counts.lock().unwrap().is_empty());
        assert!(limiter.check("user@example.com").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_rate_limited_records_do_not_count_toward_window() {
        let ledger = Arc::new(MockLedger::new());
        let authority = Arc::new(MockAuthority::new(100));
        let clock = Arc::new(ManualClock::default());
        let limiter = limiter(ledger, authority, clock, RateLimitConfig::default());

        for _ in 0..4 {
            limiter.record_failure("user@example.com").await.unwrap();
        }
        for _ in 0..10 {
            limiter
                .record_rate_limited("user@example.com")
                .await
                .unwrap();
        }

        // Four failures plus audit records still leave one attempt.
        assert!(limiter.check("user@example.com").await.unwrap().is_allowed());
    }
}
