//! Service routes outside the versioned API.

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::db;
use crate::http::response::failure;
use crate::http::server::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = if db::check_health(&state.pool).await {
        "connected"
    } else {
        "unavailable"
    };

    Json(json!({
        "success": true,
        "message": "Service is healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "database": database,
    }))
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Welcome to the Contact Notes API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn not_found(uri: Uri) -> Response {
    failure(StatusCode::NOT_FOUND, format!("Route not found: {}", uri.path()))
}
