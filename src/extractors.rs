use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;

use crate::auth::credentials;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Represents the currently authenticated account.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub profile_id: Option<i64>,
}

impl CurrentUser {
    /// Content is authored by profiles; staff accounts created from the CLI
    /// have none.
    pub fn require_profile(&self) -> AppResult<i64> {
        self.profile_id
            .ok_or_else(|| AppError::invalid("author", "This account has no profile."))
    }
}

/// Extractor that requires a valid access token for an active account.
/// Returns 401 otherwise.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let claims = credentials::verify_access(&state.tokens, token)?;

        let conn = state.db.get()?;
        let row = conn
            .query_row(
                "SELECT a.id, a.username, a.is_active, p.id
                 FROM accounts a
                 LEFT JOIN profiles p ON p.account_id = a.id
                 WHERE a.id = ?1",
                params![claims.user_id],
                |row| {
                    Ok((
                        CurrentUser {
                            id: row.get(0)?,
                            username: row.get(1)?,
                            profile_id: row.get(3)?,
                        },
                        row.get::<_, bool>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((user, true)) => Ok(user),
            _ => Err(AppError::Unauthorized),
        }
    }
}

/// Optional user extractor: returns None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

/// `Json<T>` whose rejections come back in the error envelope.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}
