//! Response envelopes shared by handlers and middleware.
//!
//! Every body is JSON: `{ "success": true, ... }` on success and
//! `{ "success": false, "message": ... }` on failure.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Successful response carrying `data`, optionally with a count and message.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            count: None,
            data,
        }
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            success: true,
            message: None,
            count: Some(data.len()),
            data,
        }
    }
}

/// Failure body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build a failure response with the given status.
pub fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    failure_with_detail(status, message, None)
}

pub fn failure_with_detail(
    status: StatusCode,
    message: impl Into<String>,
    error: Option<String>,
) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            message: message.into(),
            error,
        }),
    )
        .into_response()
}

/// 429 with a `Retry-After` header in whole seconds.
pub fn too_many_requests(retry_after_secs: u64, message: impl Into<String>) -> Response {
    let mut response = failure(StatusCode::TOO_MANY_REQUESTS, message);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

/// 503 produced when a request outlives its deadline.
pub fn request_timed_out() -> Response {
    failure(
        StatusCode::SERVICE_UNAVAILABLE,
        "Request timed out. Please try again later.",
    )
}
