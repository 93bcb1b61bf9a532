use async_trait::async_trait;
use dashmap::DashMap;
use rand::{TryRngCore, rngs::OsRng};
use sekisho_core::{
    Error, SubjectId,
    error::{CryptoError, StorageError},
    repositories::{BackupCodeRepository, BackupCodeStatus},
};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use subtle::ConstantTimeEq;

// No 0, O, 1, I; 32 entries so a random byte maps without modulo bias.
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 8;

struct StoredCode {
    hash: [u8; 32],
    used: bool,
}

/// In-memory store of hashed single-use backup codes.
///
/// Only SHA-256 digests are retained; plaintext codes exist once, in the
/// return value of [`issue_codes`](Self::issue_codes). Consumption happens
/// under the subject's map entry guard, so a code can be burned exactly once
/// no matter how many submissions race.
#[derive(Default)]
pub struct MemoryBackupCodeStore {
    codes: DashMap<SubjectId, Vec<StoredCode>>,
    unavailable: AtomicBool,
}

impl MemoryBackupCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated unavailability. Test hook.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), Error> {
        if self.available() {
            Ok(())
        } else {
            Err(StorageError::Unavailable("backup-code store offline".to_string()).into())
        }
    }

    /// Replace the subject's codes with a fresh set, returning the plaintext
    /// codes in `XXXX-XXXX` display form.
    pub fn issue_codes(&self, subject: &SubjectId, count: usize) -> Result<Vec<String>, Error> {
        let mut plaintext = Vec::with_capacity(count);
        let mut stored = Vec::with_capacity(count);

        for _ in 0..count {
            let code = generate_code()?;
            stored.push(StoredCode {
                hash: hash_code(&code),
                used: false,
            });
            plaintext.push(format!("{}-{}", &code[..4], &code[4..]));
        }

        self.codes.insert(subject.clone(), stored);
        Ok(plaintext)
    }
}

fn generate_code() -> Result<String, Error> {
    let mut bytes = [0u8; CODE_LENGTH];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::TokenGeneration(e.to_string()))?;

    Ok(bytes
        .iter()
        .map(|b| CHARSET[(*b as usize) % CHARSET.len()] as char)
        .collect())
}

/// Strip dashes and spaces, uppercase.
fn normalize_code(code: &str) -> String {
    code.replace(['-', ' '], "").to_uppercase()
}

fn hash_code(normalized: &str) -> [u8; 32] {
    Sha256::digest(normalized.as_bytes()).into()
}

#[async_trait]
impl BackupCodeRepository for MemoryBackupCodeStore {
    async fn verify_and_consume(
        &self,
        subject: &SubjectId,
        code: &str,
    ) -> Result<BackupCodeStatus, Error> {
        self.ensure_available()?;

        let submitted = hash_code(&normalize_code(code));
        let Some(mut entry) = self.codes.get_mut(subject) else {
            return Ok(BackupCodeStatus::InvalidOrUsed);
        };

        for stored in entry.iter_mut() {
            // Constant-time digest comparison; used codes still get compared
            // but can no longer match as consumable.
            let matches: bool = stored.hash.ct_eq(&submitted).into();
            if matches && !stored.used {
                stored.used = true;
                return Ok(BackupCodeStatus::Consumed);
            }
        }

        Ok(BackupCodeStatus::InvalidOrUsed)
    }

    async fn remaining_codes(&self, subject: &SubjectId) -> Result<u32, Error> {
        self.ensure_available()?;
        Ok(self
            .codes
            .get(subject)
            .map(|codes| codes.iter().filter(|c| !c.used).count() as u32)
            .unwrap_or(0))
    }
}
