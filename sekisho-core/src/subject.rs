//! Subject identity
//!
//! A subject is the account a login attempt resolves to. The pipeline never
//! inspects the inner value; it is minted by the external credential store and
//! treated as opaque.

use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for an authenticated account.
///
/// This value should be treated as opaque even if it resembles a known format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: &str) -> Self {
        SubjectId(id.to_string())
    }

    pub fn new_random() -> Self {
        SubjectId(generate_prefixed_id("sub"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate that this ID has the expected format for a subject ID.
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "sub")
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_id() {
        let id = SubjectId::new("test");
        assert_eq!(id.as_str(), "test");
        assert_eq!(SubjectId::from(id.as_str()), id);
    }

    #[test]
    fn test_subject_id_random() {
        let id = SubjectId::new_random();
        assert!(id.as_str().starts_with("sub_"));
        assert!(id.is_valid());
        assert_ne!(id, SubjectId::new_random());

        assert!(!SubjectId::new("plain").is_valid());
    }
}
