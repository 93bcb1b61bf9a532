//! Repository trait for single-use backup codes.

use async_trait::async_trait;

use crate::{Error, subject::SubjectId};

/// Outcome of a backup-code consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupCodeStatus {
    /// The code matched an unused entry and has now been burned.
    Consumed,
    /// The code matched nothing, or matched an entry that was already used.
    /// The two cases are indistinguishable by design.
    InvalidOrUsed,
}

/// Storage for hashed single-use recovery codes.
///
/// `verify_and_consume` must be atomic per subject: two concurrent
/// submissions of the same code may each observe it unused, but only one may
/// consume it.
#[async_trait]
pub trait BackupCodeRepository: Send + Sync + 'static {
    /// Check a submitted code against the subject's unused codes and mark the
    /// matching entry used in the same step.
    async fn verify_and_consume(
        &self,
        subject: &SubjectId,
        code: &str,
    ) -> Result<BackupCodeStatus, Error>;

    /// Number of unused codes remaining for the subject.
    async fn remaining_codes(&self, subject: &SubjectId) -> Result<u32, Error>;
}
