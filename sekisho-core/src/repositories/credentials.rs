//! Repository trait for the external credential store.
//!
//! The identity provider owns credential storage, password hashing, and TOTP
//! secrets. The pipeline only calls `verify` once the rate limiter allows the
//! attempt, and the MFA orchestrator drives the challenge operations.

use async_trait::async_trait;

use crate::{
    Error,
    challenge::{ChallengeId, FactorDescriptor, FactorId, MfaChallenge},
    subject::SubjectId,
};

/// Result of primary credential verification.
#[derive(Debug, Clone)]
pub enum CredentialVerification {
    /// Credential accepted; the store reports which account it belongs to.
    Valid(SubjectId),
    /// Credential rejected. Deliberately carries no detail — the store must
    /// not reveal whether the identifier exists.
    Invalid,
}

/// Result of verifying a code against an issued challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeVerification {
    Verified,
    Rejected,
}

/// External identity-provider boundary.
///
/// Unavailability of this store must surface as a storage error, never as
/// `Invalid` — an outage reported as wrong credentials would trigger false
/// lockouts.
#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Verify a primary credential.
    async fn verify(&self, identifier: &str, secret: &str)
    -> Result<CredentialVerification, Error>;

    /// List the second factors registered for a subject. Empty means no MFA.
    async fn list_factors(&self, subject: &SubjectId) -> Result<Vec<FactorDescriptor>, Error>;

    /// Mint a fresh challenge instance for a registered factor.
    async fn issue_challenge(&self, factor_id: &FactorId) -> Result<MfaChallenge, Error>;

    /// Verify a TOTP code against an issued challenge.
    async fn verify_challenge(
        &self,
        challenge_id: &ChallengeId,
        code: &str,
    ) -> Result<ChallengeVerification, Error>;
}
