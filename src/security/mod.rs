//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security response headers on the way out)
//!     → rate_limit.rs (fixed-window per-IP limits)
//!     → backoff.rs (simulated external-service throttling, notes only)
//!     → Pass to handlers
//! ```
//!
//! # Design Decisions
//! - Clients are identified by peer IP from `ConnectInfo`
//! - Limiter state is process-local and sharded per key

pub mod backoff;
pub mod headers;
pub mod rate_limit;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{extract::ConnectInfo, http::Request};

pub use backoff::{backoff_middleware, run_eviction, BackoffDecision, BackoffLimiter, BackoffStore};
pub use headers::with_security_headers;
pub use rate_limit::{rate_limit_middleware, run_purge, RateLimiterState};

/// Peer IP of the connection, or `0.0.0.0` when the server was not started
/// with connect info.
pub fn client_ip<B>(request: &Request<B>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
