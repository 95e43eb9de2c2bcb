//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to a guarded route:
//!     → timeouts.rs (race the handler against the request deadline)
//!     → handler finishes first: its response
//!     → deadline fires first:   503, handler keeps running detached
//! ```

pub mod timeouts;

pub use timeouts::{deadline_middleware, DeadlineError, DeadlineGuard};
