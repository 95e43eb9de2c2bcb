//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env (dotenvy, optional)
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → ApiConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Environment variables win over file values

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, ConfigError};
pub use schema::{
    ApiConfig, AuthConfig, BackoffConfig, DatabaseConfig, Environment, ListenerConfig,
    LogFormat, ObservabilityConfig, RateLimitConfig, SecurityConfig, TimeoutConfig,
};
