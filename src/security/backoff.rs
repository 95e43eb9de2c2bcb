//! Simulated external-service throttling with exponential backoff.
//!
//! Each client (keyed by peer IP) gets a small state machine:
//!
//! ```text
//! Counting ──(count > threshold)──▶ Cooling down ──(now >= next_allowed)──▶ Counting
//!    ▲  │                               │
//!    └──┘ allowed                       └── rejected, counters untouched
//! ```
//!
//! Entering a cooldown waits `base_delay * factor^(count - threshold)`
//! milliseconds (capped), then grows the factor for the next cooldown. The
//! factor used by a rejection is always the value from before that
//! rejection.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::config::BackoffConfig;
use crate::http::response::too_many_requests;
use crate::observability::metrics;
use crate::security::client_ip;

/// Per-client throttling state.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientBackoffState {
    /// Requests seen since the last reset.
    pub request_count: u32,
    /// Epoch millis before which requests are rejected; 0 when not throttled.
    pub next_allowed_ms: u64,
    /// Multiplier for the next cooldown.
    pub backoff_factor: f64,
    /// Epoch millis of the last observed request.
    pub last_seen_ms: u64,
}

impl ClientBackoffState {
    pub fn new(initial_factor: f64) -> Self {
        Self {
            request_count: 0,
            next_allowed_ms: 0,
            backoff_factor: initial_factor,
            last_seen_ms: 0,
        }
    }
}

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Request may proceed; carries the post-increment count.
    Allowed { request_count: u32 },
    /// Request is rejected; retry after this many whole seconds.
    Throttled { retry_after_secs: u64 },
}

/// Storage for client state.
///
/// `update` must run `f` atomically with respect to other updates of the
/// same key.
pub trait BackoffStore: Send + Sync + 'static {
    fn update<R>(
        &self,
        client: IpAddr,
        init: impl FnOnce() -> ClientBackoffState,
        f: impl FnOnce(&mut ClientBackoffState) -> R,
    ) -> R;

    fn get(&self, client: &IpAddr) -> Option<ClientBackoffState>;

    /// Drop entries idle for at least `idle_ms` whose cooldown has passed.
    /// Returns the number of entries removed.
    fn evict_idle(&self, now_ms: u64, idle_ms: u64) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBackoffStore {
    clients: DashMap<IpAddr, ClientBackoffState>,
}

impl InMemoryBackoffStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackoffStore for InMemoryBackoffStore {
    fn update<R>(
        &self,
        client: IpAddr,
        init: impl FnOnce() -> ClientBackoffState,
        f: impl FnOnce(&mut ClientBackoffState) -> R,
    ) -> R {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.clients.entry(client).or_insert_with(init);
        f(entry.value_mut())
    }

    fn get(&self, client: &IpAddr) -> Option<ClientBackoffState> {
        self.clients.get(client).map(|r| r.value().clone())
    }

    fn evict_idle(&self, now_ms: u64, idle_ms: u64) -> usize {
        let before = self.clients.len();
        self.clients.retain(|_, state| {
            let cooling = now_ms < state.next_allowed_ms;
            cooling || now_ms.saturating_sub(state.last_seen_ms) < idle_ms
        });
        before.saturating_sub(self.clients.len())
    }

    fn len(&self) -> usize {
        self.clients.len()
    }
}

/// Cooldown length for a client that just reached `request_count` with the
/// given factor. Zero while the count is within the threshold.
pub fn backoff_delay_ms(config: &BackoffConfig, factor: f64, request_count: u32) -> u64 {
    let overflow = request_count.saturating_sub(config.threshold);
    if overflow == 0 {
        return 0;
    }
    let exponent = i32::try_from(overflow).unwrap_or(i32::MAX);
    let raw = config.base_delay_ms as f64 * factor.powi(exponent);
    raw.min(config.max_delay_ms as f64) as u64
}

/// Whole seconds a client must wait, rounded up.
pub fn wait_secs(delay_ms: u64) -> u64 {
    delay_ms.div_ceil(1000)
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Exponential backoff limiter.
pub struct BackoffLimiter<S: BackoffStore = InMemoryBackoffStore> {
    store: S,
    config: BackoffConfig,
}

impl BackoffLimiter<InMemoryBackoffStore> {
    pub fn new(config: BackoffConfig) -> Self {
        Self::with_store(InMemoryBackoffStore::new(), config)
    }
}

impl<S: BackoffStore> BackoffLimiter<S> {
    pub fn with_store(store: S, config: BackoffConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check a request from `client` at the current time.
    pub fn check(&self, client: IpAddr) -> BackoffDecision {
        self.check_at(client, now_millis())
    }

    /// Check a request from `client` at `now_ms`.
    pub fn check_at(&self, client: IpAddr, now_ms: u64) -> BackoffDecision {
        let config = &self.config;

        self.store.update(
            client,
            || ClientBackoffState::new(config.initial_factor),
            |state| {
                state.last_seen_ms = now_ms;

                if now_ms < state.next_allowed_ms {
                    return BackoffDecision::Throttled {
                        retry_after_secs: wait_secs(state.next_allowed_ms - now_ms),
                    };
                }

                if state.next_allowed_ms != 0 {
                    state.request_count = 0;
                    state.next_allowed_ms = 0;
                }

                state.request_count = state.request_count.saturating_add(1);

                if state.request_count > config.threshold {
                    let delay = backoff_delay_ms(config, state.backoff_factor, state.request_count);
                    state.next_allowed_ms = now_ms.saturating_add(delay);
                    state.backoff_factor =
                        (state.backoff_factor * config.growth).min(config.max_factor);

                    return BackoffDecision::Throttled {
                        retry_after_secs: wait_secs(delay),
                    };
                }

                BackoffDecision::Allowed {
                    request_count: state.request_count,
                }
            },
        )
    }

    /// Remove idle entries using the configured TTL.
    pub fn evict_idle(&self, now_ms: u64) -> usize {
        let removed = self
            .store
            .evict_idle(now_ms, self.config.idle_ttl_secs.saturating_mul(1000));
        metrics::record_backoff_clients(self.store.len());
        removed
    }
}

/// Periodically drop idle client entries until shutdown.
pub async fn run_eviction<S: BackoffStore>(
    limiter: Arc<BackoffLimiter<S>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = limiter.config().eviction_interval_secs;
    if period == 0 {
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(period));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = limiter.evict_idle(now_millis());
                if removed > 0 {
                    tracing::debug!(removed, remaining = limiter.store().len(), "Evicted idle backoff entries");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Middleware stage applying the backoff limiter to the peer address.
pub async fn backoff_middleware(
    State(limiter): State<Arc<BackoffLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = client_ip(&request);

    match limiter.check(client) {
        BackoffDecision::Allowed { request_count } => {
            tracing::trace!(client = %client, request_count, "Backoff check passed");
            next.run(request).await
        }
        BackoffDecision::Throttled { retry_after_secs } => {
            tracing::debug!(client = %client, retry_after_secs, "Throttled by simulated external service");
            metrics::record_rate_limited("external_backoff");
            too_many_requests(
                retry_after_secs,
                format!(
                    "Rate limited by external service. Try again in {retry_after_secs} seconds."
                ),
            )
        }
    }
}
