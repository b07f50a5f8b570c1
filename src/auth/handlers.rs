use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::credentials;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, JsonBody};
use crate::identity::{self, RegistrationInput};
use crate::state::AppState;
use crate::validation::{FieldErrors, REQUIRED};

// -- Request types --

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

// -- Handlers --

/// POST /user_auth/register_user/: create account + profile, sign the user in
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegistrationInput>,
) -> AppResult<Response> {
    let new = req.validate()?;

    let mut conn = state.db.get()?;
    let account = identity::create_account(&mut conn, &new, state.config.auth.bcrypt_cost)?;
    let session = credentials::issue_session(&state.tokens, &account)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "data": session,
        })),
    )
        .into_response())
}

/// POST /user_auth/login_user/
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> AppResult<Response> {
    let mut errors = FieldErrors::new();
    let username = errors.text("username", req.username.as_deref(), usize::MAX);
    let password = req
        .password
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    if password.is_none() {
        errors.add("password", REQUIRED);
    }
    errors.into_result()?;

    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::InvalidCredentials);
    };

    let conn = state.db.get()?;
    let session = credentials::authenticate(
        &conn,
        &state.tokens,
        &username,
        &password,
        state.config.auth.bcrypt_cost,
    )?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Login successful",
            "data": session,
        })),
    )
        .into_response())
}

/// POST /user_auth/logout_user/: blacklist the given refresh token.
/// Any problem with the body or the token is reported as an invalid token.
pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Response> {
    let refresh = refresh_token_from(payload)?;

    let conn = state.db.get()?;
    credentials::revoke(&conn, &state.tokens, &refresh)?;
    tracing::info!("{} logged out", user.username);

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Logout successful",
        })),
    )
        .into_response())
}

/// POST /user_auth/token_refresh/: trade a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AppResult<Response> {
    let token = refresh_token_from(payload)?;

    let conn = state.db.get()?;
    let access = credentials::refresh_access(&conn, &state.tokens, &token)?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Token refreshed",
            "data": { "access": access },
        })),
    )
        .into_response())
}

/// A missing or unreadable refresh token is reported like a bad one.
fn refresh_token_from(payload: Result<Json<RefreshRequest>, JsonRejection>) -> AppResult<String> {
    match payload {
        Ok(Json(RefreshRequest {
            refresh: Some(token),
        })) => Ok(token),
        Ok(_) => Err(AppError::InvalidToken),
        Err(rejection) => {
            tracing::warn!("Unreadable refresh token body: {}", rejection);
            Err(AppError::InvalidToken)
        }
    }
}
