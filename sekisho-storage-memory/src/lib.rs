//! In-memory storage backend for the sekisho login pipeline
//!
//! Backs all four repository traits with process-local state: a real
//! fixed-window rate limiter, an argon2-hashing credential store with TOTP
//! factors, hashed single-use backup codes, and an append-only attempt
//! ledger. Useful as the reference backend, for tests, and for single-node
//! deployments that accept losing limiter state on restart.
//!
//! Each store carries a `set_unavailable` hook so outage handling can be
//! exercised without real infrastructure.

mod attempts;
mod backup_codes;
mod credentials;
mod rate_limit;

pub use attempts::MemoryAttemptLedger;
pub use backup_codes::MemoryBackupCodeStore;
pub use credentials::{MemoryCredentialStore, TotpEnrollment};
pub use rate_limit::MemoryRateLimitStore;

use async_trait::async_trait;
use sekisho_core::{
    Error, SystemClock,
    clock::Clock,
    error::StorageError,
    repositories::{
        AttemptLedgerProvider, BackupCodeStoreProvider, CredentialStoreProvider,
        RateLimitStoreProvider, RepositoryProvider,
    },
};
use std::sync::Arc;

/// Repository provider wiring all four in-memory stores together.
pub struct MemoryRepositoryProvider {
    attempts: Arc<MemoryAttemptLedger>,
    rate_limit: Arc<MemoryRateLimitStore>,
    credentials: Arc<MemoryCredentialStore>,
    backup_codes: Arc<MemoryBackupCodeStore>,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Build the stores against a caller-supplied clock. Tests pass a manual
    /// clock to step through windows and expiries.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            attempts: Arc::new(MemoryAttemptLedger::new()),
            rate_limit: Arc::new(MemoryRateLimitStore::new(clock.clone())),
            credentials: Arc::new(MemoryCredentialStore::new(clock)),
            backup_codes: Arc::new(MemoryBackupCodeStore::new()),
        }
    }

    /// The attempt ledger, for direct inspection or fault injection.
    pub fn attempt_ledger(&self) -> &MemoryAttemptLedger {
        &self.attempts
    }

    /// The authoritative rate-limit store.
    pub fn rate_limit_store(&self) -> &MemoryRateLimitStore {
        &self.rate_limit
    }

    /// The credential store, for registering subjects and enrolling factors.
    pub fn credential_store(&self) -> &MemoryCredentialStore {
        &self.credentials
    }

    /// The backup-code store, for issuing recovery codes.
    pub fn backup_code_store(&self) -> &MemoryBackupCodeStore {
        &self.backup_codes
    }
}

impl Default for MemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptLedgerProvider for MemoryRepositoryProvider {
    type AttemptLedger = MemoryAttemptLedger;

    fn attempts(&self) -> &Self::AttemptLedger {
        &self.attempts
    }
}

impl RateLimitStoreProvider for MemoryRepositoryProvider {
    type RateLimitStore = MemoryRateLimitStore;

    fn rate_limit(&self) -> &Self::RateLimitStore {
        &self.rate_limit
    }
}

impl CredentialStoreProvider for MemoryRepositoryProvider {
    type CredentialStore = MemoryCredentialStore;

    fn credentials(&self) -> &Self::CredentialStore {
        &self.credentials
    }
}

impl BackupCodeStoreProvider for MemoryRepositoryProvider {
    type BackupCodeStore = MemoryBackupCodeStore;

    fn backup_codes(&self) -> &Self::BackupCodeStore {
        &self.backup_codes
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn health_check(&self) -> Result<(), Error> {
        for (name, available) in [
            ("attempt ledger", self.attempts.available()),
            ("rate-limit store", self.rate_limit.available()),
            ("credential store", self.credentials.available()),
            ("backup-code store", self.backup_codes.available()),
        ] {
            if !available {
                return Err(StorageError::Unavailable(format!("{name} offline")).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_reflects_store_state() {
        let provider = MemoryRepositoryProvider::new();
        assert!(provider.health_check().await.is_ok());

        provider.credential_store().set_unavailable(true);
        assert!(provider.health_check().await.is_err());

        provider.credential_store().set_unavailable(false);
        assert!(provider.health_check().await.is_ok());
    }
}
