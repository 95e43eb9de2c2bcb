//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{ApiConfig, Environment, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the effective configuration: optional file, then environment
/// overrides, then validation of the merged result.
pub fn load(path: Option<&Path>) -> Result<ApiConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ApiConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment-style overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut ApiConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(value) = env("NODE_ENV").or_else(|| env("APP_ENV")) {
        config.environment = Environment::parse(&value).ok_or(ConfigError::Env {
            key: "NODE_ENV",
            value,
        })?;
    }

    if let Some(port) = env("PORT") {
        let port: u16 = parse_var("PORT", port)?;
        let host = env("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(url) = env("DATABASE_URL") {
        config.database.url = url;
    } else if let Some(url) = database_url_from_parts(&env)? {
        config.database.url = url;
    }

    if let Some(secret) = env("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(expire) = env("JWT_EXPIRE") {
        config.auth.token_ttl_secs = parse_duration_secs(&expire).ok_or(ConfigError::Env {
            key: "JWT_EXPIRE",
            value: expire,
        })?;
    }

    if let Some(timeout) = env("REQUEST_TIMEOUT") {
        config.timeouts.request_ms = parse_var("REQUEST_TIMEOUT", timeout)?;
    }

    if let Some(window) = env("RATE_LIMIT_WINDOW_MS") {
        config.rate_limit.api_window_ms = parse_var("RATE_LIMIT_WINDOW_MS", window)?;
    }
    if let Some(max) = env("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.api_max_requests = parse_var("RATE_LIMIT_MAX_REQUESTS", max)?;
    }

    if let Some(level) = env("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = env("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    key: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }
    if let Some(enabled) = env("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse_var("METRICS_ENABLED", enabled)?;
    }

    Ok(())
}

fn database_url_from_parts<F>(env: &F) -> Result<Option<String>, ConfigError>
where
    F: Fn(&'static str) -> Option<String>,
{
    let (Some(user), Some(name)) = (env("DB_USER"), env("DB_NAME")) else {
        return Ok(None);
    };
    let host = env("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port: u16 = match env("DB_PORT") {
        Some(port) => parse_var("DB_PORT", port)?,
        None => 5432,
    };
    let credentials = match env("DB_PASSWORD") {
        Some(password) => format!("{user}:{password}"),
        None => user,
    };

    Ok(Some(format!(
        "postgres://{credentials}@{host}:{port}/{name}"
    )))
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { key, value })
}

/// Parse a lifetime such as `30d`, `12h`, `15m`, `45s` or a bare number of
/// seconds.
pub fn parse_duration_secs(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().ok()?;

    let multiplier = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return None,
    };

    amount.checked_mul(multiplier)
}
