//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! rules. Every problem is reported, not just the first one.

use thiserror::Error;

use crate::config::schema::ApiConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: f64,
        value: f64,
    },

    #[error("backoff.max_factor ({max}) is below backoff.initial_factor ({initial})")]
    FactorCapBelowInitial { initial: f64, max: f64 },

    #[error("auth.jwt_secret must be set outside development")]
    MissingJwtSecret,

    #[error("invalid bind address {0:?}")]
    BindAddress(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ApiConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config
        .listener
        .bind_address
        .parse::<std::net::SocketAddr>()
        .is_err()
    {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_ms",
        });
    }

    if config.database.max_connections == 0 {
        errors.push(ValidationError::Zero {
            field: "database.max_connections",
        });
    }

    let rl = &config.rate_limit;
    for (field, value) in [
        ("rate_limit.api_window_ms", rl.api_window_ms),
        ("rate_limit.auth_window_ms", rl.auth_window_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }
    for (field, value) in [
        ("rate_limit.api_max_requests", rl.api_max_requests),
        ("rate_limit.auth_max_requests", rl.auth_max_requests),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    let backoff = &config.backoff;
    if backoff.threshold == 0 {
        errors.push(ValidationError::Zero {
            field: "backoff.threshold",
        });
    }
    if backoff.base_delay_ms == 0 {
        errors.push(ValidationError::Zero {
            field: "backoff.base_delay_ms",
        });
    }
    for (field, value) in [
        ("backoff.initial_factor", backoff.initial_factor),
        ("backoff.growth", backoff.growth),
    ] {
        if !(value >= 1.0) {
            errors.push(ValidationError::TooSmall {
                field,
                min: 1.0,
                value,
            });
        }
    }
    if backoff.max_factor < backoff.initial_factor {
        errors.push(ValidationError::FactorCapBelowInitial {
            initial: backoff.initial_factor,
            max: backoff.max_factor,
        });
    }

    if config.auth.jwt_secret.is_empty() && !config.environment.is_development() {
        errors.push(ValidationError::MissingJwtSecret);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
