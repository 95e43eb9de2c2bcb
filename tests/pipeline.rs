//! End-to-end checks of the middleware pipeline over real sockets.

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use contact_notes_api::auth::{Claims, JwtHandler};
use contact_notes_api::config::BackoffConfig;
use contact_notes_api::resilience::{deadline_middleware, DeadlineGuard};
use contact_notes_api::security::{backoff_middleware, BackoffLimiter, BackoffStore};
use reqwest::StatusCode;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_backoff_over_http() {
    let limiter = Arc::new(BackoffLimiter::new(BackoffConfig::default()));
    let router = Router::new()
        .route("/notes", get(|| async { "ok" }))
        .layer(from_fn_with_state(limiter.clone(), backoff_middleware));
    let addr = common::serve(router).await;
    let client = common::client();
    let url = format!("http://{addr}/notes");

    for _ in 0..5 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "2");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "Rate limited by external service. Try again in 2 seconds."
    );

    // Still cooling down.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limiter.store().len(), 1);
}

#[tokio::test]
async fn test_deadline_over_http() {
    let router = Router::new()
        .route("/fast", get(|| async { "fast" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "slow"
            }),
        )
        .layer(from_fn_with_state(
            DeadlineGuard::from_millis(100),
            deadline_middleware,
        ));
    let addr = common::serve(router).await;
    let client = common::client();

    let res = client.get(format!("http://{addr}/fast")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "fast");

    let res = client.get(format!("http://{addr}/slow")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Request timed out. Please try again later.");
}

#[tokio::test]
async fn test_service_routes() {
    let app = common::spawn_app(common::test_config()).await;

    let res = app.client.get(app.url("/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert_eq!(res.headers()["x-xss-protection"], "1; mode=block");
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    let res = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Service is healthy");
    assert_eq!(body["database"], "unavailable");

    let res = app.client.get(app.url("/nope")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Route not found: /nope");
}

#[tokio::test]
async fn test_protected_routes_reject_bad_tokens() {
    let app = common::spawn_app(common::test_config()).await;
    let url = app.url("/api/v1/contacts");

    let res = app.client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Not authorized to access this route");

    let res = app
        .client
        .get(&url)
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token");

    let jwt = JwtHandler::new(common::JWT_SECRET, Duration::from_secs(60));
    let expired = jwt
        .sign(&Claims {
            id: 1,
            iat: 1_000,
            exp: 2_000,
        })
        .unwrap();
    let res = app
        .client
        .get(app.url("/api/v1/contacts/1/notes"))
        .bearer_auth(expired)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Token expired");
}

#[tokio::test]
async fn test_register_validation_and_auth_limiter() {
    let mut config = common::test_config();
    config.rate_limit.auth_max_requests = 2;
    let app = common::spawn_app(config).await;
    let url = app.url("/api/v1/auth/register");

    let res = app
        .client
        .post(&url)
        .json(&serde_json::json!({ "username": "ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.headers()["ratelimit-limit"], "2");
    assert_eq!(res.headers()["ratelimit-remaining"], "1");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Please provide username, email and password");

    let res = app
        .client
        .post(&url)
        .json(&serde_json::json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = app.client.post(&url).json(&serde_json::json!({})).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "3600");
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Too many authentication attempts, please try again later."
    );
}
