//! Second-factor challenges
//!
//! A challenge is one issued opportunity to prove a registered second factor.
//! The credential store mints the challenge; the MFA orchestrator enforces its
//! expiry and attempt budget. The challenge is destroyed on success, expiry,
//! or exhaustion — a new one requires restarting from primary authentication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// Opaque identifier of a registered second factor (e.g. a TOTP enrollment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactorId(String);

impl FactorId {
    pub fn new(id: &str) -> Self {
        FactorId(id.to_string())
    }

    pub fn new_random() -> Self {
        FactorId(generate_prefixed_id("fct"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "fct")
    }
}

impl std::fmt::Display for FactorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of one issued challenge instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(String);

impl ChallengeId {
    pub fn new(id: &str) -> Self {
        ChallengeId(id.to_string())
    }

    pub fn new_random() -> Self {
        ChallengeId(generate_prefixed_id("chl"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "chl")
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A second factor registered for a subject, as reported by the credential
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorDescriptor {
    pub id: FactorId,
    /// Human-readable label chosen at enrollment, if any.
    pub label: Option<String>,
}

/// One issued challenge instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaChallenge {
    pub challenge_id: ChallengeId,
    pub factor_id: FactorId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Verification attempts left before the challenge is destroyed.
    pub attempts_remaining: u32,
}

impl MfaChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Caller-facing view of a pending challenge, returned in
/// [`crate::LoginOutcome::MfaRequired`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeDescriptor {
    pub challenge_id: ChallengeId,
    pub factor_id: FactorId,
    pub expires_at: DateTime<Utc>,
    pub attempts_remaining: u32,
    /// Unused backup codes the subject could fall back on.
    pub backup_codes_remaining: u32,
}

/// Which kind of proof a second-factor submission carries.
///
/// Both kinds transition into the same satisfied state with the same
/// assurance level; only the backup path consumes a stored code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondFactorKind {
    Totp,
    BackupCode,
}
