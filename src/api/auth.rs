//! Registration, login and the current user.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::json_body;
use crate::auth::{AuthError, AuthUser};
use crate::error::{AppError, AppResult};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::models::User;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Hash on the blocking pool.
async fn hash_password(state: &AppState, password: String) -> AppResult<String> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

async fn verify_password(state: &AppState, password: String, hash: String) -> AppResult<bool> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;

    let (Some(username), Some(email), Some(password)) = (
        required(&input.username),
        required(&input.email),
        input.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request(
            "Please provide username, email and password",
        ));
    };

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if User::username_or_email_taken(&state.pool, username, email).await? {
        return Err(AppError::bad_request(
            "User with that email or username already exists",
        ));
    }

    let hash = hash_password(&state, password.to_string()).await?;
    let user = User::create(&state.pool, username, email, &hash).await?;
    let token = state.jwt.generate_token(user.id)?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            AuthPayload { user, token },
        )),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;

    let (Some(email), Some(password)) = (
        required(&input.email),
        input.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::bad_request("Please provide email and password"));
    };

    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = User::find_by_email(&state.pool, email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&state, password.to_string(), user.password.clone()).await? {
        tracing::debug!(user_id = user.id, "Login rejected");
        return Err(invalid());
    }

    let token = state.jwt.generate_token(user.id)?;
    Ok(Json(ApiResponse::with_message(
        "Login successful",
        AuthPayload { user, token },
    )))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = User::find_by_id(&state.pool, auth.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(Json(ApiResponse::data(user)))
}
