use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::validation::FieldErrors;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{field}: {message}")]
    Conflict { field: String, message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account disabled")]
    AccountDisabled,

    #[error("Invalid refresh token")]
    InvalidToken,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Password hashing error: {0}")]
    Password(#[from] bcrypt::BcryptError),

    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }

    pub fn conflict(field: &str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::Conflict { .. } | AppError::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Password(_)
            | AppError::Token(_)
            | AppError::Internal(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => json!({
                "success": false,
                "message": "Validation failed",
                "errors": errors,
            }),
            AppError::Conflict { field, message } => {
                let mut errors = FieldErrors::new();
                errors.add(&field, message);
                json!({
                    "success": false,
                    "message": "Validation failed",
                    "errors": errors,
                })
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_body()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                internal_body()
            }
            AppError::Password(e) => {
                tracing::error!("Password hashing error: {}", e);
                internal_body()
            }
            AppError::Token(e) => {
                tracing::error!("Token signing error: {}", e);
                internal_body()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal_body()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                internal_body()
            }
            other => json!({ "success": false, "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Bodies that are not JSON, or do not fit the request type, are reported
/// like any other validation failure instead of axum's plain-text rejection.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        AppError::invalid(NON_FIELD_ERRORS, rejection.body_text())
    }
}

/// Error key for problems with the body as a whole.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

fn internal_body() -> serde_json::Value {
    json!({ "success": false, "message": "Internal server error" })
}

pub type AppResult<T> = Result<T, AppError>;
