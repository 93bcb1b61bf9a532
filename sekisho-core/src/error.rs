use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Challenge error: {0}")]
    Mfa(#[from] MfaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Subject not found")]
    SubjectNotFound,

    #[error("Too many attempts, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: i64 },
}

#[derive(Debug, Error)]
pub enum MfaError {
    #[error("Challenge not found")]
    ChallengeNotFound,

    #[error("Challenge expired")]
    ChallengeExpired,

    #[error("Challenge attempts exhausted")]
    ChallengeExhausted,

    #[error("No second factor registered: {0}")]
    FactorNotFound(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid code: {0}")]
    InvalidCode(String),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    #[error("TOTP failure: {0}")]
    Totp(String),
}

impl Error {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub fn is_mfa_error(&self) -> bool {
        matches!(self, Error::Mfa(_))
    }

    /// True when the underlying cause is an unreachable or timed-out store.
    ///
    /// The pipeline maps these to `LoginOutcome::ServiceUnavailable` rather
    /// than `InvalidCredentials`, so an outage is never reported as user error.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let auth_error = Error::Auth(AuthError::InvalidCredentials);
        assert_eq!(
            auth_error.to_string(),
            "Authentication error: Invalid credentials"
        );

        let mfa_error = Error::Mfa(MfaError::ChallengeExpired);
        assert_eq!(mfa_error.to_string(), "Challenge error: Challenge expired");

        let storage_error = Error::Storage(StorageError::NotFound);
        assert_eq!(storage_error.to_string(), "Storage error: Record not found");
    }

    #[test]
    fn test_rate_limited_display() {
        let error = AuthError::RateLimited {
            retry_after_seconds: 90,
        };
        assert_eq!(error.to_string(), "Too many attempts, retry after 90s");
    }

    #[test]
    fn test_is_storage_error() {
        assert!(Error::Storage(StorageError::Unavailable("down".to_string())).is_storage_error());
        assert!(!Error::Auth(AuthError::InvalidCredentials).is_storage_error());
    }

    #[test]
    fn test_error_from_conversions() {
        let error: Error = AuthError::InvalidCredentials.into();
        assert!(matches!(error, Error::Auth(AuthError::InvalidCredentials)));

        let error: Error = MfaError::ChallengeExhausted.into();
        assert!(matches!(error, Error::Mfa(MfaError::ChallengeExhausted)));

        let error: Error =
            ValidationError::MissingField("identifier".to_string()).into();
        assert!(error.is_validation_error());
    }
}
