//! Attempt ledger records
//!
//! Every login submission produces one [`LoginAttempt`] — including attempts
//! rejected by the rate limiter. Occupancy of the limit window is computed
//! from `InvalidCredentials` records only: an attempt that never reached the
//! credential verifier must not count against the limit a second time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a recorded login attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// Primary credential accepted.
    Success,
    /// Primary or second-factor credential rejected.
    InvalidCredentials,
    /// Rejected before reaching the credential verifier. Audit-only.
    RateLimited,
}

/// One row in the append-only attempt ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Normalized rate-limit key (e.g. a lowercased email).
    pub identifier: String,
    pub attempted_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// Aggregate view of a ledger window for one identifier.
#[derive(Debug, Clone, Default)]
pub struct AttemptStats {
    /// Failed attempts inside the window. Only `InvalidCredentials` counts.
    pub failed_count: u32,
    /// Timestamp of the most recent counted failure, if any.
    pub latest_failure_at: Option<DateTime<Utc>>,
}
