use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sekisho_core::{
    AttemptOutcome, AttemptStats, Error, LoginAttempt, error::StorageError,
    repositories::AttemptLedgerRepository,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory attempt ledger keyed by normalized identifier.
///
/// Records are append-only per identifier. The `unavailable` flag lets tests
/// simulate an offline backend.
#[derive(Default)]
pub struct MemoryAttemptLedger {
    attempts: DashMap<String, Vec<LoginAttempt>>,
    unavailable: AtomicBool,
}

impl MemoryAttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated unavailability. Test hook.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), Error> {
        if self.available() {
            Ok(())
        } else {
            Err(StorageError::Unavailable("attempt ledger offline".to_string()).into())
        }
    }
}

#[async_trait]
impl AttemptLedgerRepository for MemoryAttemptLedger {
    async fn record_attempt(&self, attempt: LoginAttempt) -> Result<(), Error> {
        self.ensure_available()?;
        self.attempts
            .entry(attempt.identifier.clone())
            .or_default()
            .push(attempt);
        Ok(())
    }

    async fn attempt_stats(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        self.ensure_available()?;
        let Some(attempts) = self.attempts.get(identifier) else {
            return Ok(AttemptStats::default());
        };

        let mut stats = AttemptStats::default();
        for attempt in attempts
            .iter()
            .filter(|a| a.attempted_at >= since && a.outcome == AttemptOutcome::InvalidCredentials)
        {
            stats.failed_count += 1;
            if stats.latest_failure_at.is_none_or(|latest| attempt.attempted_at > latest) {
                stats.latest_failure_at = Some(attempt.attempted_at);
            }
        }
        Ok(stats)
    }

    async fn clear_attempts(&self, identifier: &str) -> Result<u64, Error> {
        self.ensure_available()?;
        let removed = self
            .attempts
            .remove(identifier)
            .map(|(_, attempts)| attempts.len() as u64)
            .unwrap_or(0);
        Ok(removed)
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.ensure_available()?;
        let mut removed = 0u64;
        for mut entry in self.attempts.iter_mut() {
            let len = entry.len();
            entry.retain(|a| a.attempted_at >= before);
            removed += (len - entry.len()) as u64;
        }
        self.attempts.retain(|_, attempts| !attempts.is_empty());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn attempt(identifier: &str, at: DateTime<Utc>, outcome: AttemptOutcome) -> LoginAttempt {
        LoginAttempt {
            identifier: identifier.to_string(),
            attempted_at: at,
            outcome,
        }
    }

    #[tokio::test]
    async fn test_only_failures_count_toward_stats() {
        let ledger = MemoryAttemptLedger::new();
        let now = Utc::now();

        for outcome in [
            AttemptOutcome::InvalidCredentials,
            AttemptOutcome::RateLimited,
            AttemptOutcome::Success,
        ] {
            ledger
                .record_attempt(attempt("a@example.com", now, outcome))
                .await
                .unwrap();
        }

        let stats = ledger
            .attempt_stats("a@example.com", now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.latest_failure_at, Some(now));
    }

    #[tokio::test]
    async fn test_stats_respect_the_cutoff() {
        let ledger = MemoryAttemptLedger::new();
        let now = Utc::now();

        ledger
            .record_attempt(attempt(
                "a@example.com",
                now - Duration::minutes(30),
                AttemptOutcome::InvalidCredentials,
            ))
            .await
            .unwrap();
        ledger
            .record_attempt(attempt(
                "a@example.com",
                now,
                AttemptOutcome::InvalidCredentials,
            ))
            .await
            .unwrap();

        let stats = ledger
            .attempt_stats("a@example.com", now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_only_one_identifier() {
        let ledger = MemoryAttemptLedger::new();
        let now = Utc::now();

        ledger
            .record_attempt(attempt("a@example.com", now, AttemptOutcome::InvalidCredentials))
            .await
            .unwrap();
        ledger
            .record_attempt(attempt("b@example.com", now, AttemptOutcome::InvalidCredentials))
            .await
            .unwrap();

        assert_eq!(ledger.clear_attempts("a@example.com").await.unwrap(), 1);
        let stats = ledger
            .attempt_stats("b@example.com", now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(stats.failed_count, 1);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_errors() {
        let ledger = MemoryAttemptLedger::new();
        ledger.set_unavailable(true);

        let result = ledger
            .attempt_stats("a@example.com", Utc::now())
            .await;
        assert!(result.is_err_and(|e| e.is_storage_error()));
    }
}
