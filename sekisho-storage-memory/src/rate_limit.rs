use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sekisho_core::{
    Error,
    clock::Clock,
    error::StorageError,
    repositories::{RateLimitDecision, RateLimitRepository},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct RateLimitState {
    window_start: DateTime<Utc>,
    attempt_count: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// Authoritative fixed-window rate limiter held in process memory.
///
/// Each identifier's state is mutated under its map entry guard, so
/// check-and-increment is atomic per identifier: concurrent attempts can
/// never both consume the final slot.
pub struct MemoryRateLimitStore {
    states: DashMap<String, RateLimitState>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    window: Duration,
    lockout: Duration,
    unavailable: AtomicBool,
}

impl MemoryRateLimitStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, 5, Duration::minutes(15), Duration::minutes(15))
    }

    pub fn with_limits(
        clock: Arc<dyn Clock>,
        max_attempts: u32,
        window: Duration,
        lockout: Duration,
    ) -> Self {
        Self {
            states: DashMap::new(),
            clock,
            max_attempts,
            window,
            lockout,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Toggle simulated unavailability. Test hook.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimitRepository for MemoryRateLimitStore {
    async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitDecision, Error> {
        if !self.available() {
            return Err(StorageError::Unavailable("rate-limit store offline".to_string()).into());
        }

        let now = self.clock.now();
        let mut state = self
            .states
            .entry(identifier.to_string())
            .or_insert_with(|| RateLimitState {
                window_start: now,
                attempt_count: 0,
                locked_until: None,
            });

        if let Some(until) = state.locked_until {
            if until > now {
                return Ok(RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    retry_after_seconds: (until - now).num_seconds().max(1),
                });
            }
            // Lockout elapsed; the identifier starts a fresh window.
            state.window_start = now;
            state.attempt_count = 0;
            state.locked_until = None;
        }

        if now - state.window_start >= self.window {
            state.window_start = now;
            state.attempt_count = 0;
        }

        if state.attempt_count >= self.max_attempts {
            let until = *state.locked_until.get_or_insert(now + self.lockout);
            tracing::debug!(
                identifier = identifier,
                locked_until = %until,
                "Rate limit hit, identifier locked"
            );
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_seconds: (until - now).num_seconds().max(1),
            });
        }

        state.attempt_count += 1;
        Ok(RateLimitDecision {
            allowed: true,
            remaining: self.max_attempts - state.attempt_count,
            retry_after_seconds: 0,
        })
    }

    async fn clear(&self, identifier: &str) -> Result<(), Error> {
        if !self.available() {
            return Err(StorageError::Unavailable("rate-limit store offline".to_string()).into());
        }
        self.states.remove(identifier);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sekisho_core::ManualClock;
    use std::sync::atomic::AtomicU32;

    fn store(clock: Arc<ManualClock>) -> MemoryRateLimitStore {
        MemoryRateLimitStore::new(clock)
    }

    #[tokio::test]
    async fn test_allows_up_to_limit_then_blocks() {
        let clock = Arc::new(ManualClock::default());
        let store = store(clock);

        for expected_remaining in (0..5).rev() {
            let decision = store.check_and_increment("a@example.com").await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = store.check_and_increment("a@example.com").await.unwrap();
        assert!(!decision.allowed);
        assert!(decision.retry_after_seconds > 0);
        assert!(decision.retry_after_seconds <= 15 * 60);
    }

    #[tokio::test]
    async fn test_blocked_attempts_do_not_extend_the_lockout() {
        let clock = Arc::new(ManualClock::default());
        let store = store(clock.clone());

        for _ in 0..6 {
            store.check_and_increment("a@example.com").await.unwrap();
        }
        let first = store.check_and_increment("a@example.com").await.unwrap();

        clock.advance(Duration::minutes(5));
        let later = store.check_and_increment("a@example.com").await.unwrap();
        assert!(!later.allowed);
        assert!(later.retry_after_seconds < first.retry_after_seconds);
    }

    #[tokio::test]
    async fn test_lockout_expires() {
        let clock = Arc::new(ManualClock::default());
        let store = store(clock.clone());

        for _ in 0..6 {
            store.check_and_increment("a@example.com").await.unwrap();
        }
        assert!(!store.check_and_increment("a@example.com").await.unwrap().allowed);

        clock.advance(Duration::minutes(16));
        let decision = store.check_and_increment("a@example.com").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_window_rolls_over_without_lockout() {
        let clock = Arc::new(ManualClock::default());
        let store = store(clock.clone());

        for _ in 0..3 {
            store.check_and_increment("a@example.com").await.unwrap();
        }
        clock.advance(Duration::minutes(16));

        let decision = store.check_and_increment("a@example.com").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_clear_resets_state() {
        let clock = Arc::new(ManualClock::default());
        let store = store(clock);

        for _ in 0..6 {
            store.check_and_increment("a@example.com").await.unwrap();
        }
        store.clear("a@example.com").await.unwrap();

        let decision = store.check_and_increment("a@example.com").await.unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 4);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let clock = Arc::new(ManualClock::default());
        let store = store(clock);

        for _ in 0..6 {
            store.check_and_increment("locked@example.com").await.unwrap();
        }
        assert!(store.check_and_increment("other@example.com").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn test_concurrent_attempts_never_exceed_the_limit() {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryRateLimitStore::new(clock));
        let allowed = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let allowed = allowed.clone();
            handles.push(tokio::spawn(async move {
                let decision = store.check_and_increment("a@example.com").await.unwrap();
                if decision.allowed {
                    allowed.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 5);
    }
}
