//! Notes nested under a contact.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Value};

use crate::api::json_body;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::http::response::ApiResponse;
use crate::http::server::AppState;
use crate::models::note::normalize_note_body;
use crate::models::{Contact, Note};
use crate::processing::process_note;

const BODY_REQUIRED: &str = "Note body is required";

async fn ensure_contact(state: &AppState, contact_id: i64, user_id: i64) -> AppResult<()> {
    Contact::find_owned(&state.pool, contact_id, user_id)
        .await?
        .map(|_| ())
        .ok_or_else(contact_not_found)
}

fn contact_not_found() -> AppError {
    AppError::not_found("Contact not found or not authorized")
}

fn note_not_found() -> AppError {
    AppError::not_found("Note not found or not authorized")
}

fn required_body(payload: &Value) -> AppResult<String> {
    normalize_note_body(payload).ok_or_else(|| AppError::bad_request(BODY_REQUIRED))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(contact_id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<Note>>>> {
    ensure_contact(&state, contact_id, auth.id).await?;
    let notes = Note::list_for_contact(&state.pool, contact_id, auth.id).await?;
    Ok(Json(ApiResponse::list(notes)))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((contact_id, id)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<Note>>> {
    let note = Note::find_owned(&state.pool, id, contact_id, auth.id)
        .await?
        .ok_or_else(note_not_found)?;
    Ok(Json(ApiResponse::data(note)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(contact_id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    // Ownership is checked before the payload is looked at.
    ensure_contact(&state, contact_id, auth.id).await?;
    let body = required_body(&json_body(payload)?)?;

    let note = Note::create(&state.pool, contact_id, auth.id, &body).await?;

    let pool = state.pool.clone();
    let pending = note.clone();
    tokio::spawn(async move {
        if let Err(e) = process_note(&pool, &pending).await {
            tracing::error!(note_id = pending.id, error = %e, "Note processing failed");
        }
    });

    Ok((StatusCode::CREATED, Json(ApiResponse::data(note))))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((contact_id, id)): Path<(i64, i64)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<ApiResponse<Note>>> {
    let body = required_body(&json_body(payload)?)?;

    Note::find_owned(&state.pool, id, contact_id, auth.id)
        .await?
        .ok_or_else(note_not_found)?;
    let note = Note::update_body(&state.pool, id, auth.id, &body)
        .await?
        .ok_or_else(note_not_found)?;
    Ok(Json(ApiResponse::data(note)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((contact_id, id)): Path<(i64, i64)>,
) -> AppResult<Json<ApiResponse<Value>>> {
    Note::find_owned(&state.pool, id, contact_id, auth.id)
        .await?
        .ok_or_else(note_not_found)?;
    if !Note::delete(&state.pool, id, auth.id).await? {
        return Err(note_not_found());
    }
    Ok(Json(ApiResponse::with_message("Note deleted successfully", json!({}))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;

    async fn message(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        (status, json["message"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_not_found_messages() {
        assert_eq!(
            message(note_not_found()).await,
            (StatusCode::NOT_FOUND, "Note not found or not authorized".to_string())
        );
        assert_eq!(
            message(contact_not_found()).await,
            (StatusCode::NOT_FOUND, "Contact not found or not authorized".to_string())
        );
    }

    #[tokio::test]
    async fn test_required_body() {
        assert_eq!(required_body(&json!({ "content": "hi" })).unwrap(), "hi");

        let err = required_body(&json!({ "title": "no body" })).unwrap_err();
        assert_eq!(
            message(err).await,
            (StatusCode::BAD_REQUEST, BODY_REQUIRED.to_string())
        );
    }
}
