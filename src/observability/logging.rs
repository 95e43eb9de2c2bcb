//! Structured logging.
//!
//! The subscriber reads `RUST_LOG` first and falls back to the configured
//! level for this crate and `tower_http`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Build the default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("contact_notes_api={level},tower_http={level}")
}

/// Install the global tracing subscriber.
///
/// Returns an error when a global subscriber has already been set.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(&config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert_eq!(directive, "contact_notes_api=debug,tower_http=debug");
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
