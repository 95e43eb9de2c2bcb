//! Contact CRUD for the authenticated user.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;

use crate::api::json_body;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::models::{Contact, ContactUpdate, NewContact};

const NOT_OWNED: &str = "Contact not found or not authorized";

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> AppResult<Json<ApiResponse<Vec<Contact>>>> {
    let contacts = Contact::list_for_user(&state.pool, auth.id).await?;
    Ok(Json(ApiResponse::list(contacts)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Contact>>> {
    let contact = Contact::find_owned(&state.pool, id, auth.id)
        .await?
        .ok_or_else(|| AppError::not_found("Contact not found"))?;
    Ok(Json(ApiResponse::data(contact)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    payload: Result<Json<NewContact>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let input = json_body(payload)?;
    let (first, last) = input
        .names()
        .ok_or_else(|| AppError::bad_request("Please provide at least first and last name"))?;

    let contact = Contact::create(&state.pool, auth.id, first, last, &input).await?;
    tracing::debug!(contact_id = contact.id, user_id = auth.id, "Contact created");

    Ok((StatusCode::CREATED, Json(ApiResponse::data(contact))))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    payload: Result<Json<ContactUpdate>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Contact>>> {
    let changes = json_body(payload)?;
    let existing = Contact::find_owned(&state.pool, id, auth.id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_OWNED))?;

    let contact = changes
        .apply(existing)
        .save(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_OWNED))?;
    Ok(Json(ApiResponse::data(contact)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    if !Contact::delete(&state.pool, id, auth.id).await? {
        return Err(AppError::not_found(NOT_OWNED));
    }
    Ok(Json(ApiResponse::with_message(
        "Contact deleted successfully",
        json!({}),
    )))
}
