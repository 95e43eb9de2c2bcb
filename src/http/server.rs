//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, metrics, limits, auth)
//! - Spawn limiter maintenance tasks
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::api::{auth, contacts, notes, system};
use crate::auth::{protect, Argon2Hasher, JwtHandler, PasswordHasher};
use crate::config::ApiConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestSpan};
use crate::observability::metrics;
use crate::resilience::timeouts::{deadline_middleware, DeadlineGuard};
use crate::security::{
    backoff_middleware, rate_limit_middleware, run_eviction, run_purge,
    with_security_headers, BackoffLimiter, RateLimiterState,
};

const WINDOW_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: Arc<JwtHandler>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub config: Arc<ApiConfig>,
}

/// Per-process limiter instances shared by the router and maintenance tasks.
#[derive(Clone)]
pub struct Limiters {
    pub api: Arc<RateLimiterState>,
    pub auth: Arc<RateLimiterState>,
    pub backoff: Arc<BackoffLimiter>,
}

impl Limiters {
    pub fn from_config(config: &ApiConfig) -> Self {
        let rl = &config.rate_limit;
        Self {
            api: Arc::new(RateLimiterState::api(rl.api_window_ms, rl.api_max_requests)),
            auth: Arc::new(RateLimiterState::auth(rl.auth_window_ms, rl.auth_max_requests)),
            backoff: Arc::new(BackoffLimiter::new(config.backoff.clone())),
        }
    }
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    limiters: Limiters,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and pool.
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let jwt = JwtHandler::new(
            &config.auth.jwt_secret,
            Duration::from_secs(config.auth.token_ttl_secs),
        );
        let limiters = Limiters::from_config(&config);

        let state = AppState {
            pool,
            jwt: Arc::new(jwt),
            hasher: Arc::new(Argon2Hasher),
            config: Arc::new(config),
        };

        let router = build_router(state, &limiters);
        Self { router, limiters }
    }

    /// The fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn limiters(&self) -> &Limiters {
        &self.limiters
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(run_eviction(
            self.limiters.backoff.clone(),
            shutdown.resubscribe(),
        ));
        tokio::spawn(run_purge(
            vec![self.limiters.api.clone(), self.limiters.auth.clone()],
            WINDOW_PURGE_INTERVAL,
            shutdown.resubscribe(),
        ));

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layer order, outermost first:
/// ```text
/// set request id → propagate request id → trace → metrics → body limit
///     → security headers → route
/// /api/v1/auth:      auth limiter → handler (me: + protect)
/// /api/v1/contacts:  protect → api limiter → deadline → [notes: backoff] → handler
/// ```
pub fn build_router(state: AppState, limiters: &Limiters) -> Router {
    let config = state.config.clone();
    let guard = DeadlineGuard::from_millis(config.timeouts.request_ms);

    let auth_routes = Router::new()
        .route(
            "/api/v1/auth/me",
            get(auth::me).route_layer(from_fn_with_state(state.clone(), protect)),
        )
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(
            limiters.auth.clone(),
            rate_limit_middleware,
        ));

    let note_routes = Router::new()
        .route(
            "/api/v1/contacts/{contact_id}/notes",
            get(notes::list).post(notes::create),
        )
        .route(
            "/api/v1/contacts/{contact_id}/notes/{id}",
            get(notes::get).put(notes::update).delete(notes::delete),
        )
        .route_layer(from_fn_with_state(
            limiters.backoff.clone(),
            backoff_middleware,
        ));

    let contact_routes = Router::new()
        .route(
            "/api/v1/contacts",
            get(contacts::list).post(contacts::create),
        )
        .route(
            "/api/v1/contacts/{id}",
            get(contacts::get)
                .put(contacts::update)
                .delete(contacts::delete),
        )
        .merge(note_routes)
        .route_layer(from_fn_with_state(guard, deadline_middleware))
        .route_layer(from_fn_with_state(
            limiters.api.clone(),
            rate_limit_middleware,
        ))
        .route_layer(from_fn_with_state(state.clone(), protect));

    let router = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(auth_routes)
        .merge(contact_routes)
        .fallback(system::not_found)
        .with_state(state);

    let router = if config.security.enable_headers {
        with_security_headers(router)
    } else {
        router
    };

    router
        .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
        .layer(from_fn(metrics::track_metrics))
        .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}
