//! Repository trait for the attempt ledger.
//!
//! The ledger is an append-only log of login attempts per identifier. The
//! local rate limiter derives window occupancy from it; nothing else mutates
//! it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    attempt::{AttemptStats, LoginAttempt},
};

/// Append-only storage of login attempts.
///
/// # Security Considerations
///
/// - Attempts are recorded for all identifiers, whether or not an account
///   exists, to avoid user enumeration.
/// - Implementations must provide atomic read-check-write per identifier;
///   cross-identifier locking is not required.
#[async_trait]
pub trait AttemptLedgerRepository: Send + Sync + 'static {
    /// Append one attempt record.
    ///
    /// This method does not evaluate limits; occupancy is computed separately
    /// via [`attempt_stats`](Self::attempt_stats).
    async fn record_attempt(&self, attempt: LoginAttempt) -> Result<(), Error>;

    /// Aggregate failed attempts for an identifier since a cutoff.
    ///
    /// Only `InvalidCredentials` outcomes contribute to the count; rate-limited
    /// records are audit-only and must be excluded.
    async fn attempt_stats(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error>;

    /// Delete all attempts for an identifier.
    ///
    /// Called on successful authentication. Returns the number of records
    /// removed.
    async fn clear_attempts(&self, identifier: &str) -> Result<u64, Error>;

    /// Delete attempts recorded before the given instant, for all
    /// identifiers. Periodic housekeeping; returns the number removed.
    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
