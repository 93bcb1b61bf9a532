//! Repository traits for the pipeline's external collaborators
//!
//! The pipeline consumes four stores — the attempt ledger, the authoritative
//! rate-limit store, the credential store, and the backup-code store — through
//! the traits defined here. The credential and backup-code traits are pure
//! collaborator boundaries: the core calls them, it never implements their
//! internals.
//!
//! # Trait Hierarchy
//!
//! - Individual `*Repository` traits define the operations for each store
//! - Individual `*Provider` traits expose one repository each
//! - [`RepositoryProvider`] is a supertrait combining all of them plus a
//!   health check
//!
//! A backend implements only the repositories it actually backs; a full
//! provider wires all four together (see `sekisho-storage-memory` for the
//! in-process reference implementation).

pub mod adapter;
pub mod attempts;
pub mod backup_codes;
pub mod credentials;
pub mod rate_limit;

pub use adapter::{
    AttemptLedgerAdapter, BackupCodeAdapter, CredentialAdapter, RateLimitAdapter,
};
pub use attempts::AttemptLedgerRepository;
pub use backup_codes::{BackupCodeRepository, BackupCodeStatus};
pub use credentials::{ChallengeVerification, CredentialRepository, CredentialVerification};
pub use rate_limit::{RateLimitDecision, RateLimitRepository};

use async_trait::async_trait;

use crate::Error;

/// Provider trait for attempt ledger access.
pub trait AttemptLedgerProvider: Send + Sync + 'static {
    /// The attempt ledger implementation type
    type AttemptLedger: AttemptLedgerRepository;

    /// Get the attempt ledger
    fn attempts(&self) -> &Self::AttemptLedger;
}

/// Provider trait for the authoritative rate-limit store.
pub trait RateLimitStoreProvider: Send + Sync + 'static {
    /// The rate-limit store implementation type
    type RateLimitStore: RateLimitRepository;

    /// Get the rate-limit store
    fn rate_limit(&self) -> &Self::RateLimitStore;
}

/// Provider trait for the external credential store.
pub trait CredentialStoreProvider: Send + Sync + 'static {
    /// The credential store implementation type
    type CredentialStore: CredentialRepository;

    /// Get the credential store
    fn credentials(&self) -> &Self::CredentialStore;
}

/// Provider trait for the backup-code store.
pub trait BackupCodeStoreProvider: Send + Sync + 'static {
    /// The backup-code store implementation type
    type BackupCodeStore: BackupCodeRepository;

    /// Get the backup-code store
    fn backup_codes(&self) -> &Self::BackupCodeStore;
}

/// Provider trait that backends implement to supply all four stores.
#[async_trait]
pub trait RepositoryProvider:
    AttemptLedgerProvider + RateLimitStoreProvider + CredentialStoreProvider + BackupCodeStoreProvider
{
    /// Health check for all backing stores
    async fn health_check(&self) -> Result<(), Error>;
}
