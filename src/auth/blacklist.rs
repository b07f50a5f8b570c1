use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};

use crate::auth::tokens::Claims;
use crate::error::AppResult;

/// Record a refresh token as revoked. Returns `false` when the token was
/// already blacklisted or its account no longer exists.
pub fn insert(conn: &Connection, claims: &Claims) -> AppResult<bool> {
    let result = conn.execute(
        "INSERT OR IGNORE INTO token_blacklist (jti, account_id, expires_at) VALUES (?1, ?2, ?3)",
        params![claims.jti, claims.user_id, claims.exp],
    );

    match result {
        Ok(inserted) => Ok(inserted == 1),
        // OR IGNORE does not cover foreign keys
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn contains(conn: &Connection, jti: &str) -> AppResult<bool> {
    let found = conn.query_row(
        "SELECT COUNT(*) > 0 FROM token_blacklist WHERE jti = ?1",
        params![jti],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Entries for tokens that have expired are dead weight: verification
/// rejects those tokens on expiry alone.
pub fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> AppResult<usize> {
    let purged = conn.execute(
        "DELETE FROM token_blacklist WHERE expires_at <= ?1",
        params![now.timestamp()],
    )?;
    if purged > 0 {
        tracing::debug!("Purged {} expired blacklist entries", purged);
    }
    Ok(purged)
}
