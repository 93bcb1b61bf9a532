//! Session finalization.
//!
//! The last pipeline stage: once identity is proven to the required assurance
//! level, mint the opaque session marker the caller will own. Token entropy
//! failures surface as errors so the facade can report
//! `SessionCreationFailed` instead of a misleading credential failure.

use std::sync::Arc;

use crate::{
    Error,
    clock::Clock,
    session::{AssuranceLevel, AuthSession, SessionToken},
    subject::SubjectId,
};

pub struct SessionFinalizer<K> {
    clock: Arc<K>,
}

impl<K: Clock> SessionFinalizer<K> {
    pub fn new(clock: Arc<K>) -> Self {
        Self { clock }
    }

    /// Mint a session for a subject whose identity has been proven.
    pub fn finalize(
        &self,
        subject: &SubjectId,
        assurance: AssuranceLevel,
    ) -> Result<AuthSession, Error> {
        let token = SessionToken::try_new_random()?;

        tracing::info!(
            subject_id = %subject,
            assurance = ?assurance,
            "Login completed, session issued"
        );

        Ok(AuthSession {
            token,
            subject_id: subject.clone(),
            assurance_level: assurance,
            issued_at: self.clock.now(),
        })
    }
}
