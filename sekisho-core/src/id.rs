//! ID and token generation utilities with prefix support
//!
//! Opaque identifiers (`sub_…`, `fct_…`, `chl_…`) are generated with at least
//! 96 bits of entropy and are URL-safe. Session tokens carry 256 bits and use
//! the fallible generation path so an exhausted entropy source surfaces as an
//! error instead of a panic.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

use crate::error::CryptoError;

/// Generate a prefixed ID with 96 bits of entropy.
///
/// The ID format is `{prefix}_{random}` where the random part is base64
/// URL-safe encoded without padding.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS entropy source unavailable");

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate an opaque token with the requested number of random bytes.
///
/// Unlike [`generate_prefixed_id`], entropy failures are propagated; the
/// session finalizer reports them as a distinct outcome rather than panicking
/// mid-login.
pub fn try_generate_token(bytes: usize) -> Result<String, CryptoError> {
    let mut raw = vec![0u8; bytes];
    OsRng
        .try_fill_bytes(&mut raw)
        .map_err(|e| CryptoError::TokenGeneration(e.to_string()))?;

    Ok(BASE64_URL_SAFE_NO_PAD.encode(raw))
}

/// Validate that a prefixed ID has the expected shape and enough entropy.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12,
        Err(_) => false,
    }
}
