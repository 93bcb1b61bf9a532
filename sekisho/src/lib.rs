//! # Sekisho
//!
//! Sekisho is a login authentication pipeline for Rust applications. It sits
//! in front of an external identity provider and drives a login attempt
//! through four stages:
//!
//! 1. Dual rate limiting: a local limiter fed by an attempt ledger and an
//!    authoritative remote store, checked concurrently; both must allow the
//!    attempt. If the authoritative store is unreachable the pipeline
//!    degrades to the local verdict instead of refusing logins.
//! 2. Credential verification against the external credential store.
//! 3. Multi-factor orchestration: TOTP challenges with a bounded attempt
//!    budget and expiry, plus single-use backup codes as an equivalent path.
//! 4. Session finalization: an opaque token with the assurance level the
//!    login actually reached.
//!
//! Every entry point returns a [`LoginOutcome`] rather than an error for
//! expected failures, so callers pattern-match instead of parsing error
//! strings. Outages of external stores surface as
//! [`LoginOutcome::ServiceUnavailable`], never as invalid credentials.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sekisho::{LoginOutcome, Sekisho};
//! use sekisho_storage_memory::MemoryRepositoryProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repositories = Arc::new(MemoryRepositoryProvider::new());
//!     repositories
//!         .credential_store()
//!         .register_subject("user@example.com", "correct horse battery staple");
//!
//!     let sekisho = Sekisho::new(repositories);
//!     match sekisho
//!         .attempt_login("user@example.com", "correct horse battery staple")
//!         .await?
//!     {
//!         LoginOutcome::Authenticated(session) => println!("token: {}", session.token),
//!         LoginOutcome::MfaRequired(challenge) => println!("challenge: {}", challenge.challenge_id),
//!         other => println!("login refused: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use sekisho_core::{
    clock::{Clock, SystemClock},
    repositories::{
        AttemptLedgerAdapter, BackupCodeAdapter, CredentialAdapter, CredentialRepository,
        CredentialVerification, RateLimitAdapter, RepositoryProvider,
    },
    services::{
        DualRateLimiter, MfaDisposition, MfaService, MfaSubmission, SessionFinalizer, Verdict,
    },
    validation::{normalize_identifier, validate_code, validate_identifier},
};

/// Re-export core types from sekisho_core
///
/// These types are commonly used when working with the Sekisho API.
pub use sekisho_core::{
    AssuranceLevel, AuthSession, ChallengeDescriptor, ChallengeId, Error, FactorDescriptor,
    FactorId, LoginOutcome, ManualClock, SecondFactorKind, SessionToken, SubjectId,
    error::ValidationError, services::RateLimitConfig,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature
/// is enabled.
#[cfg(feature = "memory")]
pub use sekisho_storage_memory::MemoryRepositoryProvider;

/// The login pipeline, generic over the repository provider and clock.
///
/// `Sekisho` wires the rate limiter, the MFA orchestrator, and the session
/// finalizer over the four stores a [`RepositoryProvider`] supplies. It is
/// cheap to share behind an `Arc` across tasks.
pub struct Sekisho<R: RepositoryProvider, K: Clock = SystemClock> {
    repositories: Arc<R>,
    clock: Arc<K>,
    rate_limiter: DualRateLimiter<AttemptLedgerAdapter<R>, RateLimitAdapter<R>, K>,
    mfa: MfaService<CredentialAdapter<R>, BackupCodeAdapter<R>, K>,
    finalizer: SessionFinalizer<K>,
    credentials: Arc<CredentialAdapter<R>>,
    verify_timeout: std::time::Duration,
}

impl<R: RepositoryProvider> Sekisho<R, SystemClock> {
    /// Create a pipeline with the system clock and default rate limits.
    pub fn new(repositories: Arc<R>) -> Self {
        Self::with_clock(repositories, Arc::new(SystemClock))
    }
}

impl<R: RepositoryProvider, K: Clock> Sekisho<R, K> {
    /// Create a pipeline against a caller-supplied clock.
    ///
    /// Tests pass a [`ManualClock`] so rate-limit windows and challenge
    /// expiry can be stepped through deterministically.
    pub fn with_clock(repositories: Arc<R>, clock: Arc<K>) -> Self {
        Self::build(repositories, clock, RateLimitConfig::default())
    }

    /// Replace the rate-limit configuration.
    pub fn with_rate_limit_config(self, config: RateLimitConfig) -> Self {
        Self::build(self.repositories, self.clock, config)
            .with_verify_timeout(self.verify_timeout)
    }

    /// Set the timeout applied to credential store calls.
    pub fn with_verify_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.verify_timeout = timeout;
        self
    }

    fn build(repositories: Arc<R>, clock: Arc<K>, config: RateLimitConfig) -> Self {
        let ledger = Arc::new(AttemptLedgerAdapter::new(repositories.clone()));
        let authority = Arc::new(RateLimitAdapter::new(repositories.clone()));
        let credentials = Arc::new(CredentialAdapter::new(repositories.clone()));
        let backup_codes = Arc::new(BackupCodeAdapter::new(repositories.clone()));

        Self {
            rate_limiter: DualRateLimiter::new(ledger, authority, clock.clone(), config),
            mfa: MfaService::new(credentials.clone(), backup_codes, clock.clone()),
            finalizer: SessionFinalizer::new(clock.clone()),
            credentials,
            repositories,
            clock,
            verify_timeout: std::time::Duration::from_secs(5),
        }
    }

    /// Check connectivity to all backing stores.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Run a primary login attempt through the pipeline.
    ///
    /// The identifier is normalized (trimmed, lowercased) before anything
    /// else, so variants of the same address share one rate-limit window.
    /// Returns `Err` only for malformed input; every operational result is a
    /// [`LoginOutcome`].
    pub async fn attempt_login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<LoginOutcome, Error> {
        self.login(identifier, secret, None).await
    }

    /// Re-run primary authentication for a subject that already holds a
    /// session, preserving multi-factor assurance.
    ///
    /// A caller with a multi-factor session is not re-challenged; a caller
    /// with only primary assurance goes through MFA as usual. The held
    /// session only counts if it belongs to the subject the credentials
    /// resolve to; a session for some other subject confers nothing.
    pub async fn reauthenticate(
        &self,
        session: &AuthSession,
        identifier: &str,
        secret: &str,
    ) -> Result<LoginOutcome, Error> {
        self.login(identifier, secret, Some(session)).await
    }

    async fn login(
        &self,
        identifier: &str,
        secret: &str,
        prior_session: Option<&AuthSession>,
    ) -> Result<LoginOutcome, Error> {
        let identifier = normalize_identifier(identifier);
        validate_identifier(&identifier)?;
        if secret.is_empty() {
            return Err(ValidationError::MissingField("Credential is required".to_string()).into());
        }

        let verdict = match self.rate_limiter.check(&identifier).await {
            Ok(verdict) => verdict,
            Err(e) if e.is_storage_error() => {
                tracing::warn!(error = %e, "Rate-limit check failed, refusing attempt");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
            Err(e) => return Err(e),
        };

        let remaining = match verdict {
            Verdict::Blocked {
                retry_after_seconds,
            } => {
                if let Err(e) = self.rate_limiter.record_rate_limited(&identifier).await {
                    tracing::warn!(error = %e, "Failed to record rate-limited attempt");
                }
                tracing::info!(
                    identifier = %identifier,
                    retry_after_seconds = retry_after_seconds,
                    "Login attempt rate limited"
                );
                return Ok(LoginOutcome::RateLimited {
                    retry_after_seconds,
                });
            }
            Verdict::Allowed { remaining, .. } => remaining,
        };

        let verification = match tokio::time::timeout(
            self.verify_timeout,
            self.credentials.verify(&identifier, secret),
        )
        .await
        {
            Ok(Ok(verification)) => verification,
            Ok(Err(e)) if e.is_storage_error() => {
                tracing::warn!(error = %e, "Credential store unavailable");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::warn!(timeout = ?self.verify_timeout, "Credential store timed out");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
        };

        let subject = match verification {
            CredentialVerification::Valid(subject) => subject,
            CredentialVerification::Invalid => {
                if let Err(e) = self.rate_limiter.record_failure(&identifier).await {
                    tracing::warn!(error = %e, "Failed to record login failure");
                    return Ok(LoginOutcome::ServiceUnavailable);
                }
                return Ok(LoginOutcome::InvalidCredentials {
                    remaining_attempts: Some(remaining),
                });
            }
        };

        // Primary success clears the identifier's failure history; the MFA
        // attempt budget is its own brute-force control from here on.
        if let Err(e) = self.rate_limiter.record_success(&identifier).await {
            tracing::warn!(error = %e, "Failed to clear limiter state after primary success");
        }

        // A held session vouches for its own subject only; proving another
        // subject's password must not inherit its assurance.
        let prior_assurance = prior_session
            .filter(|session| session.subject_id == subject)
            .map(|session| session.assurance_level);

        let disposition = match tokio::time::timeout(
            self.verify_timeout,
            self.mfa.begin(&subject, &identifier, prior_assurance),
        )
        .await
        {
            Ok(Ok(disposition)) => disposition,
            Ok(Err(e)) if e.is_storage_error() => {
                tracing::warn!(error = %e, "Second-factor lookup unavailable");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::warn!(timeout = ?self.verify_timeout, "Second-factor lookup timed out");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
        };

        match disposition {
            MfaDisposition::NotRequired => Ok(self.finalize(&subject, AssuranceLevel::Primary)),
            MfaDisposition::AlreadySatisfied => {
                Ok(self.finalize(&subject, AssuranceLevel::MultiFactor))
            }
            MfaDisposition::ChallengeIssued(descriptor) => {
                Ok(LoginOutcome::MfaRequired(descriptor))
            }
        }
    }

    /// Submit a second-factor code for a pending challenge.
    ///
    /// TOTP codes and backup codes are equivalent paths; both produce a
    /// multi-factor session. A rejected code spends one attempt from the
    /// challenge budget and counts toward the identifier's rate-limit window.
    pub async fn submit_second_factor(
        &self,
        challenge_id: &ChallengeId,
        code: &str,
        kind: SecondFactorKind,
    ) -> Result<LoginOutcome, Error> {
        validate_code(code)?;

        let submission = match tokio::time::timeout(
            self.verify_timeout,
            self.mfa.submit(challenge_id, code, kind),
        )
        .await
        {
            Ok(Ok(submission)) => submission,
            Ok(Err(e)) if e.is_storage_error() => {
                tracing::warn!(error = %e, "Second-factor store unavailable");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::warn!(timeout = ?self.verify_timeout, "Second-factor store timed out");
                return Ok(LoginOutcome::ServiceUnavailable);
            }
        };

        match submission {
            MfaSubmission::Satisfied {
                subject,
                identifier,
            } => {
                if let Err(e) = self.rate_limiter.record_success(&identifier).await {
                    tracing::warn!(error = %e, "Failed to clear limiter state after MFA success");
                }
                Ok(self.finalize(&subject, AssuranceLevel::MultiFactor))
            }
            MfaSubmission::Rejected {
                identifier,
                attempts_remaining,
            } => {
                if let Err(e) = self.rate_limiter.record_failure(&identifier).await {
                    tracing::warn!(error = %e, "Failed to record second-factor rejection");
                    return Ok(LoginOutcome::ServiceUnavailable);
                }
                Ok(LoginOutcome::InvalidCredentials {
                    remaining_attempts: Some(attempts_remaining),
                })
            }
            MfaSubmission::Exhausted { identifier } => {
                if let Err(e) = self.rate_limiter.record_failure(&identifier).await {
                    tracing::warn!(error = %e, "Failed to record second-factor rejection");
                    return Ok(LoginOutcome::ServiceUnavailable);
                }
                Ok(LoginOutcome::ChallengeExhausted)
            }
            MfaSubmission::Expired => Ok(LoginOutcome::ChallengeExpired),
        }
    }

    fn finalize(&self, subject: &SubjectId, assurance: AssuranceLevel) -> LoginOutcome {
        match self.finalizer.finalize(subject, assurance) {
            Ok(session) => LoginOutcome::Authenticated(session),
            Err(e) => {
                tracing::error!(error = %e, subject_id = %subject, "Session finalization failed");
                LoginOutcome::SessionCreationFailed
            }
        }
    }
}
