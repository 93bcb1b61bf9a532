use crate::{
    Error,
    attempt::{AttemptStats, LoginAttempt},
    challenge::{ChallengeId, FactorDescriptor, FactorId, MfaChallenge},
    repositories::{
        AttemptLedgerRepository, BackupCodeRepository, BackupCodeStatus, ChallengeVerification,
        CredentialRepository, CredentialVerification, RateLimitDecision, RateLimitRepository,
        RepositoryProvider,
    },
    subject::SubjectId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements individual repository traits
pub struct AttemptLedgerAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptLedgerAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AttemptLedgerRepository for AttemptLedgerAdapter<R> {
    async fn record_attempt(&self, attempt: LoginAttempt) -> Result<(), Error> {
        self.provider.attempts().record_attempt(attempt).await
    }

    async fn attempt_stats(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        self.provider.attempts().attempt_stats(identifier, since).await
    }

    async fn clear_attempts(&self, identifier: &str) -> Result<u64, Error> {
        self.provider.attempts().clear_attempts(identifier).await
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempts().cleanup_old_attempts(before).await
    }
}

pub struct RateLimitAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> RateLimitAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> RateLimitRepository for RateLimitAdapter<R> {
    async fn check_and_increment(&self, identifier: &str) -> Result<RateLimitDecision, Error> {
        self.provider.rate_limit().check_and_increment(identifier).await
    }

    async fn clear(&self, identifier: &str) -> Result<(), Error> {
        self.provider.rate_limit().clear(identifier).await
    }
}

pub struct CredentialAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> CredentialAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> CredentialRepository for CredentialAdapter<R> {
    async fn verify(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<CredentialVerification, Error> {
        self.provider.credentials().verify(identifier, secret).await
    }

    async fn list_factors(&self, subject: &SubjectId) -> Result<Vec<FactorDescriptor>, Error> {
        self.provider.credentials().list_factors(subject).await
    }

    async fn issue_challenge(&self, factor_id: &FactorId) -> Result<MfaChallenge, Error> {
        self.provider.credentials().issue_challenge(factor_id).await
    }

    async fn verify_challenge(
        &self,
        challenge_id: &ChallengeId,
        code: &str,
    ) -> Result<ChallengeVerification, Error> {
        self.provider
            .credentials()
            .verify_challenge(challenge_id, code)
            .await
    }
}

pub struct BackupCodeAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> BackupCodeAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> BackupCodeRepository for BackupCodeAdapter<R> {
    async fn verify_and_consume(
        &self,
        subject: &SubjectId,
        code: &str,
    ) -> Result<BackupCodeStatus, Error> {
        self.provider
            .backup_codes()
            .verify_and_consume(subject, code)
            .await
    }

    async fn remaining_codes(&self, subject: &SubjectId) -> Result<u32, Error> {
        self.provider.backup_codes().remaining_codes(subject).await
    }
}
