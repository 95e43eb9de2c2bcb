//! Fixed-window rate limiting per client IP.
//!
//! Every response passing through the limiter carries `RateLimit-Limit`,
//! `RateLimit-Remaining` and `RateLimit-Reset`; rejections add
//! `Retry-After` set to the full window length.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::http::response::too_many_requests;
use crate::observability::metrics;
use crate::security::backoff::{now_millis, wait_secs};
use crate::security::client_ip;

static RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Counter for the current window of one client.
#[derive(Debug, Clone, Copy)]
struct Window {
    started_ms: u64,
    hits: u32,
}

/// Result of a window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the current window resets.
    pub reset_secs: u64,
}

/// State for one named fixed-window limiter.
pub struct RateLimiterState {
    name: &'static str,
    windows: DashMap<IpAddr, Window>,
    window_ms: u64,
    max_requests: u32,
    message: String,
}

impl RateLimiterState {
    pub fn new(
        name: &'static str,
        window_ms: u64,
        max_requests: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name,
            windows: DashMap::new(),
            window_ms,
            max_requests,
            message: message.into(),
        }
    }

    /// Limiter for general API routes.
    pub fn api(window_ms: u64, max_requests: u32) -> Self {
        Self::new(
            "api",
            window_ms,
            max_requests,
            "Too many requests, please try again later.",
        )
    }

    /// Stricter limiter for authentication routes.
    pub fn auth(window_ms: u64, max_requests: u32) -> Self {
        Self::new(
            "auth",
            window_ms,
            max_requests,
            "Too many authentication attempts, please try again later.",
        )
    }

    pub fn check_at(&self, client: IpAddr, now_ms: u64) -> WindowStatus {
        let mut window = self.windows.entry(client).or_insert(Window {
            started_ms: now_ms,
            hits: 0,
        });

        if now_ms.saturating_sub(window.started_ms) >= self.window_ms {
            window.started_ms = now_ms;
            window.hits = 0;
        }
        window.hits = window.hits.saturating_add(1);

        let elapsed = now_ms.saturating_sub(window.started_ms);
        WindowStatus {
            allowed: window.hits <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(window.hits),
            reset_secs: wait_secs(self.window_ms.saturating_sub(elapsed)),
        }
    }

    /// Drop windows that have fully elapsed.
    pub fn purge_expired(&self, now_ms: u64) {
        self.windows
            .retain(|_, w| now_ms.saturating_sub(w.started_ms) < self.window_ms);
    }
}

/// Purge elapsed windows of every limiter once per `period` until shutdown.
pub async fn run_purge(
    limiters: Vec<Arc<RateLimiterState>>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = now_millis();
                for limiter in &limiters {
                    limiter.purge_expired(now);
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Middleware function for fixed-window rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&request);

    let status = state.check_at(client, now_millis());

    let mut response = if status.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %client, limiter = state.name, "Rate limit exceeded");
        metrics::record_rate_limited(state.name);
        too_many_requests(wait_secs(state.window_ms), state.message.clone())
    };

    let headers = response.headers_mut();
    headers.insert(RATELIMIT_LIMIT.clone(), HeaderValue::from(status.limit));
    headers.insert(RATELIMIT_REMAINING.clone(), HeaderValue::from(status.remaining));
    headers.insert(RATELIMIT_RESET.clone(), HeaderValue::from(status.reset_secs));
    response
}
