//! Contact Notes API library.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http (request id, trace, metrics, security headers)
//!                │
//!                ├─▶ /api/v1/auth ──── security::rate_limit (auth) ──▶ api::auth
//!                │
//!                └─▶ /api/v1/contacts ─ auth::protect
//!                                       → security::rate_limit (api)
//!                                       → resilience::timeouts (deadline)
//!                                       → [notes] security::backoff
//!                                       → api::contacts / api::notes ──▶ models ──▶ PostgreSQL
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod processing;
pub mod resilience;
pub mod security;

pub use config::ApiConfig;
pub use error::{AppError, AppResult};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
