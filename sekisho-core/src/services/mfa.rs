//! Multi-factor challenge orchestration.
//!
//! The credential store mints challenges and verifies TOTP codes; the backup
//! store consumes recovery codes. This service owns everything in between:
//! the pending-challenge table, expiry enforcement, and the per-challenge
//! attempt budget.
//!
//! A challenge moves through exactly one of three terminal states — satisfied,
//! expired, or exhausted — and is removed from the pending table the moment it
//! reaches one. A removed challenge is indistinguishable from one that never
//! existed, so stale or fabricated challenge ids report as expired.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    Error,
    challenge::{ChallengeDescriptor, ChallengeId, MfaChallenge, SecondFactorKind},
    clock::Clock,
    repositories::{
        BackupCodeRepository, BackupCodeStatus, ChallengeVerification, CredentialRepository,
    },
    session::AssuranceLevel,
    subject::SubjectId,
};

/// What the orchestrator decided after primary authentication succeeded.
#[derive(Debug, Clone)]
pub enum MfaDisposition {
    /// No second factor is registered for the subject.
    NotRequired,
    /// The caller already holds multi-factor assurance for this subject.
    AlreadySatisfied,
    /// A challenge was issued; the caller must submit a code.
    ChallengeIssued(ChallengeDescriptor),
}

/// What happened to a submitted second-factor code.
#[derive(Debug, Clone)]
pub enum MfaSubmission {
    /// Code accepted; the challenge is consumed.
    Satisfied {
        subject: SubjectId,
        identifier: String,
    },
    /// Code rejected; the challenge survives with a reduced budget.
    Rejected {
        identifier: String,
        attempts_remaining: u32,
    },
    /// Code rejected and the budget is spent; the challenge is destroyed.
    Exhausted { identifier: String },
    /// The challenge id is unknown, already consumed, or past its expiry.
    Expired,
}

struct PendingChallenge {
    subject: SubjectId,
    identifier: String,
    challenge: MfaChallenge,
}

/// Orchestrates second-factor challenges between the credential store and the
/// backup-code store.
///
/// The pending table is in-process state; a challenge does not survive a
/// restart, which forces the login to start over from the primary credential.
pub struct MfaService<C, B, K> {
    credentials: Arc<C>,
    backup_codes: Arc<B>,
    clock: Arc<K>,
    pending: DashMap<ChallengeId, PendingChallenge>,
}

impl<C, B, K> MfaService<C, B, K>
where
    C: CredentialRepository,
    B: BackupCodeRepository,
    K: Clock,
{
    pub fn new(credentials: Arc<C>, backup_codes: Arc<B>, clock: Arc<K>) -> Self {
        Self {
            credentials,
            backup_codes,
            clock,
            pending: DashMap::new(),
        }
    }

    /// Decide whether a just-verified subject needs a second factor, issuing
    /// a challenge if so.
    ///
    /// `prior_assurance` is the assurance the caller already holds for this
    /// subject, if any; multi-factor assurance is not re-proven.
    pub async fn begin(
        &self,
        subject: &SubjectId,
        identifier: &str,
        prior_assurance: Option<AssuranceLevel>,
    ) -> Result<MfaDisposition, Error> {
        self.purge_expired();

        if prior_assurance == Some(AssuranceLevel::MultiFactor) {
            return Ok(MfaDisposition::AlreadySatisfied);
        }

        let factors = self.credentials.list_factors(subject).await?;
        let Some(factor) = factors.first() else {
            return Ok(MfaDisposition::NotRequired);
        };

        let challenge = self.credentials.issue_challenge(&factor.id).await?;
        let backup_codes_remaining = self.backup_codes.remaining_codes(subject).await?;

        let descriptor = ChallengeDescriptor {
            challenge_id: challenge.challenge_id.clone(),
            factor_id: challenge.factor_id.clone(),
            expires_at: challenge.expires_at,
            attempts_remaining: challenge.attempts_remaining,
            backup_codes_remaining,
        };

        tracing::debug!(
            challenge_id = %challenge.challenge_id,
            factor_id = %challenge.factor_id,
            "Issued second-factor challenge"
        );

        self.pending.insert(
            challenge.challenge_id.clone(),
            PendingChallenge {
                subject: subject.clone(),
                identifier: identifier.to_string(),
                challenge,
            },
        );

        Ok(MfaDisposition::ChallengeIssued(descriptor))
    }

    /// Verify a submitted code against a pending challenge.
    ///
    /// Expiry is checked before the code is, so a correct code submitted too
    /// late still reports expired.
    pub async fn submit(
        &self,
        challenge_id: &ChallengeId,
        code: &str,
        kind: SecondFactorKind,
    ) -> Result<MfaSubmission, Error> {
        // Clone out what the verification needs so no map guard is held
        // across an await.
        let (subject, identifier, challenge) = match self.pending.get(challenge_id) {
            Some(entry) => (
                entry.subject.clone(),
                entry.identifier.clone(),
                entry.challenge.clone(),
            ),
            None => return Ok(MfaSubmission::Expired),
        };

        if challenge.is_expired(self.clock.now()) {
            self.pending.remove(challenge_id);
            tracing::debug!(challenge_id = %challenge_id, "Challenge expired before verification");
            return Ok(MfaSubmission::Expired);
        }

        let verified = match kind {
            SecondFactorKind::Totp => matches!(
                self.credentials.verify_challenge(challenge_id, code).await?,
                ChallengeVerification::Verified
            ),
            SecondFactorKind::BackupCode => matches!(
                self.backup_codes.verify_and_consume(&subject, code).await?,
                BackupCodeStatus::Consumed
            ),
        };

        if verified {
            self.pending.remove(challenge_id);
            return Ok(MfaSubmission::Satisfied {
                subject,
                identifier,
            });
        }

        // Re-acquire the entry; a concurrent submission may have consumed or
        // destroyed the challenge while the store call was in flight.
        let Some(mut entry) = self.pending.get_mut(challenge_id) else {
            return Ok(MfaSubmission::Expired);
        };
        entry.challenge.attempts_remaining = entry.challenge.attempts_remaining.saturating_sub(1);
        let attempts_remaining = entry.challenge.attempts_remaining;
        drop(entry);

        if attempts_remaining == 0 {
            self.pending.remove(challenge_id);
            tracing::debug!(challenge_id = %challenge_id, "Challenge attempt budget exhausted");
            return Ok(MfaSubmission::Exhausted { identifier });
        }

        Ok(MfaSubmission::Rejected {
            identifier,
            attempts_remaining,
        })
    }

    /// Drop every pending challenge past its expiry.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.pending
            .retain(|_, pending| !pending.challenge.is_expired(now));
    }

    /// Number of challenges currently pending. Diagnostic only.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
