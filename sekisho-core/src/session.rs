//! Authenticated session marker
//!
//! The pipeline produces an [`AuthSession`] on full success and hands it to
//! the caller. The core never stores sessions — where they live (cookie, JWT
//! wrapper, server-side table) is the embedding application's choice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, id::try_generate_token, subject::SubjectId};

/// How strongly the session's identity claim was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssuranceLevel {
    /// Only the primary credential was proven.
    Primary,
    /// A second factor (TOTP or backup code) was also satisfied.
    MultiFactor,
}

/// Opaque session token with 256 bits of entropy, usable for lookups in
/// whatever session storage the caller chooses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: &str) -> Self {
        SessionToken(token.to_string())
    }

    /// Generate a fresh random token.
    ///
    /// Entropy failures propagate; the finalizer reports them as
    /// `SessionCreationFailed` rather than panicking.
    pub fn try_new_random() -> Result<Self, Error> {
        Ok(SessionToken(try_generate_token(32)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The output of a fully successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: SessionToken,
    pub subject_id: SubjectId,
    pub assurance_level: AssuranceLevel,
    pub issued_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_multi_factor(&self) -> bool {
        self.assurance_level == AssuranceLevel::MultiFactor
    }
}
