//! Request deadline enforcement.
//!
//! Downstream processing runs on its own task and races a one-shot timer.
//! Whichever side finishes first claims a single-assignment latch; only the
//! claimant may produce the response. A timed-out request is answered with
//! 503 while the downstream task keeps running and its late result is
//! dropped.
//!
//! ```text
//!            ┌────────────── spawn ──────────────┐
//! request ──▶│ downstream future ── claim latch ─┼─▶ response
//!            └───────────────────────────────────┘
//!                timer ──── claim latch ───────────▶ 503 timed out
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Sleep;

use crate::http::response::{failure, request_timed_out};
use crate::observability::metrics;

/// Why the guard could not hand back the downstream result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("request exceeded its deadline of {0:?}")]
    Exceeded(Duration),

    #[error("downstream task ended without producing a response")]
    Aborted,
}

/// Marker inserted into responses produced by the timer path.
#[derive(Debug, Clone, Copy)]
pub struct RequestTimedOut;

/// Single-assignment "response already sent" flag.
#[derive(Debug, Clone, Default)]
pub struct ResponseLatch(Arc<AtomicBool>);

impl ResponseLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for exactly one caller.
    pub fn claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One-shot timer that can be disarmed any number of times.
#[derive(Debug)]
pub struct DeadlineTimer {
    sleep: Option<Pin<Box<Sleep>>>,
    fired: bool,
}

impl DeadlineTimer {
    pub fn arm(bound: Duration) -> Self {
        Self {
            sleep: Some(Box::pin(tokio::time::sleep(bound))),
            fired: false,
        }
    }

    /// Stop the timer. No-op when already disarmed or fired.
    pub fn disarm(&mut self) {
        self.sleep = None;
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Resolves when the timer fires; never resolves once disarmed.
    pub async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
                self.fired = true;
            }
            None => std::future::pending().await,
        }
    }
}

/// Races downstream work against a fixed bound.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineGuard {
    bound: Duration,
}

impl DeadlineGuard {
    pub fn new(bound: Duration) -> Self {
        Self { bound }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn bound(&self) -> Duration {
        self.bound
    }

    /// Run `work` under the deadline.
    ///
    /// `work` is spawned and is never cancelled by the guard.
    pub async fn run<F>(&self, work: F) -> Result<F::Output, DeadlineError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let latch = ResponseLatch::new();
        let (tx, mut rx) = oneshot::channel();

        let task_latch = latch.clone();
        tokio::spawn(async move {
            let output = work.await;
            if task_latch.claim() {
                let _ = tx.send(output);
            } else {
                tracing::debug!("Discarding downstream result produced after the deadline");
            }
        });

        let mut timer = DeadlineTimer::arm(self.bound);
        let finished = tokio::select! {
            biased;
            result = &mut rx => Some(result),
            _ = timer.expired() => None,
        };
        timer.disarm();

        match finished {
            Some(Ok(output)) => Ok(output),
            Some(Err(_)) => Err(DeadlineError::Aborted),
            None if latch.claim() => Err(DeadlineError::Exceeded(self.bound)),
            // Downstream claimed the latch in the same instant the timer fired.
            None => rx.await.map_err(|_| DeadlineError::Aborted),
        }
    }
}

/// Middleware stage enforcing the request deadline.
pub async fn deadline_middleware(
    State(guard): State<DeadlineGuard>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match guard.run(next.run(request)).await {
        Ok(response) => response,
        Err(DeadlineError::Exceeded(bound)) => {
            tracing::warn!(
                method = %method,
                path = %path,
                deadline_ms = bound.as_millis() as u64,
                "Request deadline exceeded"
            );
            metrics::record_deadline_exceeded();
            let mut response = request_timed_out();
            response.extensions_mut().insert(RequestTimedOut);
            response
        }
        Err(DeadlineError::Aborted) => {
            tracing::error!(method = %method, path = %path, "Downstream handler aborted");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, routing::get, Router};
    use std::time::Instant;
    use tower::ServiceExt;

    #[test]
    fn test_latch_claims_once() {
        let latch = ResponseLatch::new();
        let other = latch.clone();
        assert!(latch.claim());
        assert!(!other.claim());
        assert!(!latch.claim());
        assert!(other.is_claimed());
    }

    #[tokio::test]
    async fn test_disarm_is_idempotent() {
        let mut timer = DeadlineTimer::arm(Duration::from_millis(10));
        timer.disarm();
        timer.disarm();
        assert!(!timer.is_armed());
        assert!(!timer.has_fired());

        let mut timer = DeadlineTimer::arm(Duration::from_millis(5));
        timer.expired().await;
        assert!(timer.has_fired());
        timer.disarm();
        assert!(!timer.is_armed());
    }

    #[tokio::test]
    async fn test_disarmed_timer_never_fires() {
        let mut timer = DeadlineTimer::arm(Duration::from_millis(5));
        timer.disarm();
        let res = tokio::time::timeout(Duration::from_millis(50), timer.expired()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_fast_work_wins() {
        let guard = DeadlineGuard::from_millis(200);
        let result = guard
            .run(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                7
            })
            .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_work_just_inside_bound_is_never_overridden() {
        let guard = DeadlineGuard::from_millis(100);
        let result = guard
            .run(async {
                tokio::time::sleep(Duration::from_millis(90)).await;
                1
            })
            .await;
        assert_eq!(result, Ok(1));

        // Sleep well past the bound; the disarmed timer never fires.
        let mut timer = DeadlineTimer::arm(Duration::from_millis(100));
        timer.disarm();
        let late = tokio::time::timeout(Duration::from_millis(150), timer.expired()).await;
        assert!(late.is_err());
        assert!(!timer.has_fired());
    }

    #[tokio::test]
    async fn test_middleware_keeps_response_past_bound() {
        let app = Router::new()
            .route(
                "/edge",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(90)).await;
                    "edge"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                DeadlineGuard::from_millis(100),
                deadline_middleware,
            ));

        let response = app
            .oneshot(Request::get("/edge").body(Body::empty()).unwrap())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<RequestTimedOut>().is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"edge");
    }

    #[tokio::test]
    async fn test_stalled_work_times_out_once() {
        let guard = DeadlineGuard::from_millis(50);
        let start = Instant::now();
        let result = guard.run(std::future::pending::<()>()).await;

        assert_eq!(result, Err(DeadlineError::Exceeded(Duration::from_millis(50))));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_timed_out_work_keeps_running() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let guard = DeadlineGuard::from_millis(20);

        let result = guard
            .run(async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                flag.store(true, Ordering::SeqCst);
            })
            .await;
        assert!(matches!(result, Err(DeadlineError::Exceeded(_))));
        assert!(!done.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_work_is_reported() {
        let guard = DeadlineGuard::from_millis(500);
        let result = guard
            .run(async {
                panic!("boom");
            })
            .await;
        assert_eq!(result, Err::<(), _>(DeadlineError::Aborted));
    }

    fn app(bound_ms: u64) -> Router {
        Router::new()
            .route("/fast", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    "late"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                DeadlineGuard::from_millis(bound_ms),
                deadline_middleware,
            ))
    }

    #[tokio::test]
    async fn test_middleware_passes_fast_response() {
        let response = app(200)
            .oneshot(Request::get("/fast").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.extensions().get::<RequestTimedOut>().is_none());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_middleware_answers_503_on_timeout() {
        let response = app(50)
            .oneshot(Request::get("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.extensions().get::<RequestTimedOut>().is_some());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "message": "Request timed out. Please try again later."
            })
        );
    }
}
