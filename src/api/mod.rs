//! Route handlers.
//!
//! # Routes
//! ```text
//! /api/v1/auth      register, login, me        (auth limiter)
//! /api/v1/contacts  contact CRUD               (protect → api limiter → deadline)
//!     /{contact_id}/notes  note CRUD           (+ backoff limiter)
//! /health, /                                   service info
//! ```

pub mod auth;
pub mod contacts;
pub mod notes;
pub mod system;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{AppError, AppResult};

/// Turn a JSON extraction failure into a 400 with the envelope body.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}
