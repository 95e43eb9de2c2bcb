//! Authentication.
//!
//! # Data Flow
//! ```text
//! register/login:
//!     password.rs (hash / verify) → jwt.rs (issue token)
//!
//! protected request:
//!     middleware.rs (Bearer token) → jwt.rs (verify)
//!     → user still exists? → AuthUser extension → handler
//! ```

pub mod jwt;
pub mod middleware;
pub mod password;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::failure;

pub use jwt::{Claims, JwtHandler};
pub use middleware::{protect, AuthUser};
pub use password::{Argon2Hasher, PasswordHasher};

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authorized to access this route")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("The user belonging to this token no longer exists")]
    UserNotFound,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("failed to hash password: {0}")]
    Hashing(String),

    #[error("user lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::UserNotFound => failure(StatusCode::UNAUTHORIZED, self.to_string()),
            AuthError::Signing(_) | AuthError::Hashing(_) | AuthError::Lookup(_) => {
                tracing::error!(error = %self, "Authentication failure");
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        }
    }
}
