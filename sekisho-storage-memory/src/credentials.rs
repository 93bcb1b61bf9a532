use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use password_auth::{generate_hash, verify_password};
use sekisho_core::{
    ChallengeId, Error, FactorDescriptor, FactorId, MfaChallenge, SubjectId,
    clock::Clock,
    error::{AuthError, CryptoError, MfaError, StorageError},
    repositories::{ChallengeVerification, CredentialRepository, CredentialVerification},
    validation::normalize_identifier,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use totp_rs::{Algorithm, Secret, TOTP};

const CHALLENGE_TTL_MINUTES: i64 = 5;
const CHALLENGE_ATTEMPTS: u32 = 3;
const TOTP_ISSUER: &str = "sekisho";

struct SubjectRecord {
    subject_id: SubjectId,
    password_hash: String,
}

struct FactorRecord {
    descriptor: FactorDescriptor,
    secret_base32: String,
    account: String,
}

struct ChallengeRecord {
    factor_id: FactorId,
    expires_at: DateTime<Utc>,
}

/// Result of enrolling a TOTP factor, for provisioning an authenticator app.
pub struct TotpEnrollment {
    pub factor_id: FactorId,
    /// Base32-encoded shared secret.
    pub secret: String,
    /// `otpauth://` provisioning URI.
    pub uri: String,
}

/// In-memory identity provider with argon2 password hashes and TOTP factors.
///
/// This is the reference stand-in for a real external credential store. The
/// `unavailable` flag simulates an outage; while set, every call errors
/// instead of answering, so the pipeline's degraded paths can be exercised.
pub struct MemoryCredentialStore {
    clock: Arc<dyn Clock>,
    subjects: DashMap<String, SubjectRecord>,
    factors: DashMap<SubjectId, Vec<FactorRecord>>,
    challenges: DashMap<ChallengeId, ChallengeRecord>,
    dummy_hash: String,
    unavailable: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            subjects: DashMap::new(),
            factors: DashMap::new(),
            challenges: DashMap::new(),
            // Verified against unknown identifiers so lookup misses cost the
            // same as hash mismatches.
            dummy_hash: generate_hash("sekisho-dummy-credential"),
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

    fn ensure_available(&self) -> Result<(), Error> {
        if self.available() {
            Ok(())
        } else {
            Err(StorageError::Unavailable("credential store offline".to_string()).into())
        }
    }

    /// Register a subject with a password. Returns the new subject id.
    pub fn register_subject(&self, identifier: &str, password: &str) -> SubjectId {
        let subject_id = SubjectId::new_random();
        self.subjects.insert(
            normalize_identifier(identifier),
            SubjectRecord {
                subject_id: subject_id.clone(),
                password_hash: generate_hash(password),
            },
        );
        subject_id
    }

    /// Enroll a TOTP factor for a registered subject.
    pub fn enroll_totp(
        &self,
        subject: &SubjectId,
        label: Option<&str>,
    ) -> Result<TotpEnrollment, Error> {
        let account = self
            .subjects
            .iter()
            .find(|entry| entry.subject_id == *subject)
            .map(|entry| entry.key().clone())
            .ok_or(AuthError::SubjectNotFound)?;

        let secret = Secret::generate_secret();
        let secret_base32 = secret.to_encoded().to_string();
        let totp = build_totp(&secret_base32, &account)?;

        let factor_id = FactorId::new_random();
        self.factors.entry(subject.clone()).or_default().push(FactorRecord {
            descriptor: FactorDescriptor {
                id: factor_id.clone(),
                label: label.map(|l| l.to_string()),
            },
            secret_base32: secret_base32.clone(),
            account,
        });

        Ok(TotpEnrollment {
            factor_id,
            secret: secret_base32,
            uri: totp.get_url(),
        })
    }

    /// Current valid code for an enrolled factor. Test helper; a real
    /// deployment reads this from an authenticator app.
    pub fn current_code(&self, factor_id: &FactorId) -> Result<String, Error> {
        let (secret, account) = self
            .find_factor(factor_id)
            .ok_or_else(|| MfaError::FactorNotFound(factor_id.to_string()))?;
        let totp = build_totp(&secret, &account)?;
        totp.generate_current()
            .map_err(|e| CryptoError::Totp(e.to_string()).into())
    }

    fn find_factor(&self, factor_id: &FactorId) -> Option<(String, String)> {
        self.factors.iter().find_map(|entry| {
            entry
                .iter()
                .find(|record| record.descriptor.id == *factor_id)
                .map(|record| (record.secret_base32.clone(), record.account.clone()))
        })
    }
}

fn build_totp(secret_base32: &str, account: &str) -> Result<TOTP, Error> {
    let secret = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|e| CryptoError::Totp(format!("invalid secret: {e:?}")))?;

    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret,
        Some(TOTP_ISSUER.to_string()),
        account.to_string(),
    )
    .map_err(|e| CryptoError::Totp(e.to_string()).into())
}

#[async_trait]
impl CredentialRepository for MemoryCredentialStore {
    async fn verify(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<CredentialVerification, Error> {
        self.ensure_available()?;

        match self.subjects.get(&normalize_identifier(identifier)) {
            Some(record) => {
                if verify_password(secret, &record.password_hash).is_ok() {
                    Ok(CredentialVerification::Valid(record.subject_id.clone()))
                } else {
                    Ok(CredentialVerification::Invalid)
                }
            }
            None => {
                // Burn a comparable amount of work for unknown identifiers.
                let _ = verify_password(secret, &self.dummy_hash);
                Ok(CredentialVerification::Invalid)
            }
        }
    }

    async fn list_factors(&self, subject: &SubjectId) -> Result<Vec<FactorDescriptor>, Error> {
        self.ensure_available()?;
        Ok(self
            .factors
            .get(subject)
            .map(|records| records.iter().map(|r| r.descriptor.clone()).collect())
            .unwrap_or_default())
    }

    async fn issue_challenge(&self, factor_id: &FactorId) -> Result<MfaChallenge, Error> {
        self.ensure_available()?;

        if self.find_factor(factor_id).is_none() {
            return Err(MfaError::FactorNotFound(factor_id.to_string()).into());
        }

        let now = self.clock.now();
        // Abandoned challenges are reclaimed here; nothing else walks the map.
        self.challenges.retain(|_, record| now <= record.expires_at);

        let challenge = MfaChallenge {
            challenge_id: ChallengeId::new_random(),
            factor_id: factor_id.clone(),
            issued_at: now,
            expires_at: now + Duration::minutes(CHALLENGE_TTL_MINUTES),
            attempts_remaining: CHALLENGE_ATTEMPTS,
        };
        self.challenges.insert(
            challenge.challenge_id.clone(),
            ChallengeRecord {
                factor_id: factor_id.clone(),
                expires_at: challenge.expires_at,
            },
        );
        Ok(challenge)
    }

    async fn verify_challenge(
        &self,
        challenge_id: &ChallengeId,
        code: &str,
    ) -> Result<ChallengeVerification, Error> {
        self.ensure_available()?;

        let (factor_id, expires_at) = self
            .challenges
            .get(challenge_id)
            .map(|entry| (entry.factor_id.clone(), entry.expires_at))
            .ok_or(MfaError::ChallengeNotFound)?;
        if self.clock.now() > expires_at {
            self.challenges.remove(challenge_id);
            return Err(MfaError::ChallengeNotFound.into());
        }
        let (secret, account) = self
            .find_factor(&factor_id)
            .ok_or_else(|| MfaError::FactorNotFound(factor_id.to_string()))?;

        let totp = build_totp(&secret, &account)?;
        let code = code.replace([' ', '-'], "");
        match totp.check_current(&code) {
            Ok(true) => {
                // One redemption per challenge.
                self.challenges.remove(challenge_id);
                Ok(ChallengeVerification::Verified)
            }
            Ok(false) => Ok(ChallengeVerification::Rejected),
            Err(e) => {
                tracing::warn!(error = %e, "TOTP verification failed against system time");
                Ok(ChallengeVerification::Rejected)
            }
        }
    }
}
