//! Application error type returned by handlers.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::AuthError;
use crate::http::response::failure_with_detail;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include underlying error text in 500 responses (development only).
pub fn expose_error_details(enabled: bool) {
    EXPOSE_DETAILS.store(enabled, Ordering::Relaxed);
}

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Database(sqlx::Error::Database(db)) => match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => (
                    StatusCode::BAD_REQUEST,
                    "Duplicate field value entered".to_string(),
                ),
                Some(FOREIGN_KEY_VIOLATION) => (
                    StatusCode::BAD_REQUEST,
                    "Referenced record does not exist".to_string(),
                ),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string()),
            },
            AppError::Database(_) | AppError::Internal(_) | AppError::Auth(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Auth(err) = self {
            return err.into_response();
        }

        let (status, message) = self.status_and_message();

        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            EXPOSE_DETAILS
                .load(Ordering::Relaxed)
                .then(|| self.to_string())
        } else {
            None
        };

        failure_with_detail(status, message, detail)
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
