//! Core functionality for the sekisho login pipeline
//!
//! This crate contains the decision logic that sits in front of an external
//! identity provider: dual (local + authoritative) rate limiting, the
//! multi-factor challenge state machine, and session finalization.
//!
//! The external collaborators — the credential store, the backup-code store,
//! and the authoritative rate-limit store — are consumed through the traits in
//! [`repositories`]. The crate never implements credential storage or TOTP
//! secret management itself; it orchestrates the protocol around them.
//!
//! See [`LoginOutcome`] for the typed results the pipeline produces and
//! [`services`] for the individual pipeline stages.

pub mod attempt;
pub mod challenge;
pub mod clock;
pub mod error;
pub mod id;
pub mod outcome;
pub mod repositories;
pub mod services;
pub mod session;
pub mod subject;
pub mod validation;

pub use attempt::{AttemptOutcome, AttemptStats, LoginAttempt};
pub use challenge::{
    ChallengeDescriptor, ChallengeId, FactorDescriptor, FactorId, MfaChallenge, SecondFactorKind,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use outcome::LoginOutcome;
pub use session::{AssuranceLevel, AuthSession, SessionToken};
pub use subject::SubjectId;
