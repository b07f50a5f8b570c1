use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;

use crate::auth::blacklist;
use crate::auth::password;
use crate::auth::tokens::{Claims, TokenSigner, TokenType};
use crate::db::models::Account;
use crate::error::{AppError, AppResult};
use crate::identity;

/// What a successful sign-in or registration hands back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: String,
    pub username: String,
    pub access: String,
    pub refresh: String,
}

pub fn issue_session(signer: &TokenSigner, account: &Account) -> AppResult<Session> {
    let pair = signer.issue_pair(&account.id, &account.username, Utc::now())?;
    Ok(Session {
        user_id: account.id.clone(),
        username: account.username.clone(),
        access: pair.access,
        refresh: pair.refresh,
    })
}

/// Unknown username and wrong password are indistinguishable to the caller,
/// in the response and in the time it takes: a miss is checked against a
/// decoy hash of the same `cost`. A disabled account is only reported as
/// such once the password matched.
pub fn authenticate(
    conn: &Connection,
    signer: &TokenSigner,
    username: &str,
    raw_password: &str,
    cost: u32,
) -> AppResult<Session> {
    let account = match identity::find_account_by_username(conn, username) {
        Ok(account) => account,
        Err(AppError::NotFound) => {
            password::verify_password(raw_password, &password::decoy_hash(cost)?);
            tracing::info!("Login failed for unknown username");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e),
    };

    if !password::verify_password(raw_password, &account.password_hash) {
        tracing::info!("Login failed for {}: bad password", account.username);
        return Err(AppError::InvalidCredentials);
    }

    if !account.is_active {
        tracing::info!("Login refused for disabled account {}", account.username);
        return Err(AppError::AccountDisabled);
    }

    tracing::info!("Login succeeded for {}", account.username);
    issue_session(signer, &account)
}

/// Blacklist a refresh token. Every failure, including a repeat revocation,
/// is reported as `InvalidToken`; the cause only goes to the log.
pub fn revoke(conn: &Connection, signer: &TokenSigner, refresh_token: &str) -> AppResult<()> {
    let now = Utc::now();
    let claims = verify_refresh(signer, refresh_token)?;

    blacklist::purge_expired(conn, now)?;
    if !blacklist::insert(conn, &claims)? {
        tracing::warn!("Refresh token {} already revoked", claims.jti);
        return Err(AppError::InvalidToken);
    }

    tracing::info!("Revoked refresh token {} for {}", claims.jti, claims.username);
    Ok(())
}

/// Mint a new access token from a live refresh token.
pub fn refresh_access(
    conn: &Connection,
    signer: &TokenSigner,
    refresh_token: &str,
) -> AppResult<String> {
    let claims = verify_refresh(signer, refresh_token)?;

    if blacklist::contains(conn, &claims.jti)? {
        tracing::warn!("Blacklisted refresh token {} presented", claims.jti);
        return Err(AppError::InvalidToken);
    }

    let account = match identity::find_account_by_id(conn, &claims.user_id) {
        Ok(account) if account.is_active => account,
        Ok(_) | Err(AppError::NotFound) => return Err(AppError::InvalidToken),
        Err(e) => return Err(e),
    };

    let access = signer.issue(TokenType::Access, &account.id, &account.username, Utc::now())?;
    Ok(access)
}

/// Resolve a bearer access token to its claims.
pub fn verify_access(signer: &TokenSigner, token: &str) -> AppResult<Claims> {
    signer
        .verify(token, TokenType::Access, Utc::now())
        .map_err(|e| {
            tracing::debug!("Rejected access token: {}", e);
            AppError::Unauthorized
        })
}

fn verify_refresh(signer: &TokenSigner, token: &str) -> AppResult<Claims> {
    signer
        .verify(token, TokenType::Refresh, Utc::now())
        .map_err(|e| {
            tracing::warn!("Rejected refresh token: {}", e);
            AppError::InvalidToken
        })
}
