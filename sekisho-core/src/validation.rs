//! Input normalization and validation
//!
//! Single source of truth for identifier and code hygiene before anything
//! reaches the rate limiter or the external stores.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

/// Identifiers may not contain whitespace or control characters.
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s\x00-\x1f\x7f]+$").expect("Invalid identifier regex"));

/// Normalize a login identifier into its rate-limit key form.
///
/// Trims surrounding whitespace and lowercases, so `" A@Example.com "` and
/// `"a@example.com"` share one limit window.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Validate a normalized identifier.
pub fn validate_identifier(identifier: &str) -> Result<(), ValidationError> {
    if identifier.is_empty() {
        return Err(ValidationError::MissingField(
            "Identifier is required".to_string(),
        ));
    }

    if identifier.len() > 254 {
        return Err(ValidationError::InvalidIdentifier(
            "Identifier is too long".to_string(),
        ));
    }

    if IDENTIFIER_REGEX.is_match(identifier) {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(
            "Identifier contains whitespace or control characters".to_string(),
        ))
    }
}

/// Validate a second-factor code submission before dispatching it.
///
/// Format-level only; whether the code matches is the store's call.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().is_empty() {
        return Err(ValidationError::MissingField("Code is required".to_string()));
    }

    if code.len() > 64 {
        return Err(ValidationError::InvalidCode("Code is too long".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("  A@Example.COM "), "a@example.com");
        assert_eq!(normalize_identifier("user"), "user");
    }

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("a@example.com").is_ok());
        assert!(validate_identifier("user-123").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("tab\there").is_err());
        assert!(validate_identifier(&"a".repeat(255)).is_err());
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("123456").is_ok());
        assert!(validate_code("ABCD-EFGH").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("   ").is_err());
        assert!(validate_code(&"9".repeat(65)).is_err());
    }
}
