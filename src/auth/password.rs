use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::{AppError, AppResult};

// Checks against the decoy are discarded; only its cost matters.
const DECOY_PASSWORD: &str = "scribe-decoy-password";

static DECOYS: OnceLock<Mutex<HashMap<u32, String>>> = OnceLock::new();

/// Hash a raw password with a per-call random salt.
pub fn hash_password(raw: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(raw, cost)
}

/// A stored hash that bcrypt cannot parse counts as a mismatch.
pub fn verify_password(raw: &str, hash: &str) -> bool {
    match bcrypt::verify(raw, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Unreadable password hash: {}", e);
            false
        }
    }
}

/// A hash at `cost` to verify against when no account matched, so that a
/// miss takes as long as a wrong password. Computed once per cost.
pub fn decoy_hash(cost: u32) -> AppResult<String> {
    let mut decoys = DECOYS
        .get_or_init(Default::default)
        .lock()
        .map_err(|_| AppError::Internal("decoy hash cache poisoned".into()))?;
    if let Some(hash) = decoys.get(&cost) {
        return Ok(hash.clone());
    }
    let hash = hash_password(DECOY_PASSWORD, cost)?;
    decoys.insert(cost, hash.clone());
    Ok(hash)
}
