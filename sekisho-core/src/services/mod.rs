//! Service layer for the login pipeline stages
//!
//! This module contains the concrete services the pipeline is assembled from:
//! rate limiting, multi-factor orchestration, and session finalization.

pub mod mfa;
pub mod rate_limit;
pub mod session;

pub use mfa::{MfaDisposition, MfaService, MfaSubmission};
pub use rate_limit::{DualRateLimiter, LocalRateLimiter, RateLimitConfig, Verdict};
pub use session::SessionFinalizer;
