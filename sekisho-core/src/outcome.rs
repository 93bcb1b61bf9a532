//! Typed login outcomes
//!
//! Every entry point returns a [`LoginOutcome`]; failures never cross the
//! library boundary as errors. Callers pattern-match exhaustively and decide
//! what to render — the core never retries on the caller's behalf.

use serde::{Deserialize, Serialize};

use crate::{challenge::ChallengeDescriptor, session::AuthSession};

/// Result of `attempt_login` or `submit_second_factor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoginOutcome {
    /// Fully authenticated. The session is owned by the caller.
    Authenticated(AuthSession),

    /// Primary credential accepted; a second factor must be submitted.
    MfaRequired(ChallengeDescriptor),

    /// Credential or second-factor code rejected. `remaining_attempts` is the
    /// authoritative count when available, suitable for a user-facing hint.
    InvalidCredentials { remaining_attempts: Option<u32> },

    /// Rejected before the credential verifier was consulted. Recoverable by
    /// waiting.
    RateLimited { retry_after_seconds: i64 },

    /// The pending challenge passed its expiry (or was never issued).
    /// Recoverable only by restarting from primary authentication.
    ChallengeExpired,

    /// The pending challenge ran out of verification attempts. Recoverable
    /// only by restarting from primary authentication.
    ChallengeExhausted,

    /// An external store was unreachable. Deliberately distinct from
    /// `InvalidCredentials` so outages are never masked as user error.
    ServiceUnavailable,

    /// Identity was proven but the session marker could not be produced.
    SessionCreationFailed,
}

impl LoginOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, LoginOutcome::Authenticated(_))
    }

    /// The session, if this outcome carries one.
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            LoginOutcome::Authenticated(session) => Some(session),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{AssuranceLevel, SessionToken};
    use crate::subject::SubjectId;
    use chrono::Utc;

    #[test]
    fn test_outcome_helpers() {
        let session = AuthSession {
            token: SessionToken::try_new_random().unwrap(),
            subject_id: SubjectId::new_random(),
            assurance_level: AssuranceLevel::Primary,
            issued_at: Utc::now(),
        };

        let outcome = LoginOutcome::Authenticated(session);
        assert!(outcome.is_authenticated());
        assert!(outcome.session().is_some());

        let outcome = LoginOutcome::RateLimited {
            retry_after_seconds: 60,
        };
        assert!(!outcome.is_authenticated());
        assert!(outcome.session().is_none());
    }
}
