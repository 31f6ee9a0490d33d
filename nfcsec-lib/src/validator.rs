//! Authorization check for recovered tag UIDs
//!
//! A UID is authorized if it is on the registry's allow-list, or if it
//! matches one of the salted hashes (bcrypt or Argon2). Hash verification
//! is slow on purpose, so the scan runs on the blocking pool and the calling
//! request suspends while it completes.

use crate::error::GateError;
use crate::registry::Registry;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng};
use argon2::Argon2;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct UidValidator {
    registry: Arc<Registry>,
}

impl UidValidator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Decide whether `uid` is an authorized tag
    pub async fn is_authorized(&self, uid: &str) -> Result<bool, GateError> {
        if self.registry.is_allow_listed(uid) {
            debug!(%uid, "UID found in allow-list");
            return Ok(true);
        }

        if self.registry.hashed_tags().is_empty() {
            return Ok(false);
        }

        let registry = Arc::clone(&self.registry);
        let candidate = uid.trim().to_uppercase();
        let matched = tokio::task::spawn_blocking(move || scan_hashed(registry.hashed_tags(), &candidate))
            .await
            .map_err(|e| GateError::Validation(format!("hash comparison task failed: {e}")))??;

        debug!(%uid, matched, "Hashed registry scan finished");
        Ok(matched)
    }
}

/// Compare `candidate` against each hash in order, stopping at the first match
///
/// Entries are bcrypt (`$2a$`, `$2b$`, `$2y$`) as written by the earlier
/// deployment, or Argon2 PHC strings as written by `hash_tag_id`.
fn scan_hashed(hashes: &[String], candidate: &str) -> Result<bool, GateError> {
    let argon2 = Argon2::default();
    for (index, encoded) in hashes.iter().enumerate() {
        let matched = if is_bcrypt(encoded) {
            bcrypt::verify(candidate, encoded)
                .map_err(|e| GateError::Validation(format!("hashed entry {index} is malformed: {e}")))?
        } else {
            verify_phc(&argon2, index, encoded, candidate)?
        };
        if matched {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_bcrypt(encoded: &str) -> bool {
    ["$2a$", "$2b$", "$2y$"].iter().any(|prefix| encoded.starts_with(prefix))
}

fn verify_phc(argon2: &Argon2<'_>, index: usize, encoded: &str, candidate: &str) -> Result<bool, GateError> {
    let parsed = PasswordHash::new(encoded)
        .map_err(|e| GateError::Validation(format!("hashed entry {index} is malformed: {e}")))?;
    match argon2.verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(GateError::Validation(format!("hashed entry {index}: {e}"))),
    }
}

/// Produce a salted PHC hash string for a tag id, suitable for the registry
pub fn hash_tag_id(uid: &str, argon2: &Argon2<'_>) -> Result<String, GateError> {
    let salt = SaltString::generate(&mut OsRng);
    let normalized = uid.trim().to_uppercase();
    argon2
        .hash_password(normalized.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| GateError::Hashing(e.to_string()))
}
