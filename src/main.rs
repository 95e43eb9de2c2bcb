use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use contact_notes_api::config::{self, ApiConfig};
use contact_notes_api::lifecycle::{wait_for_signal, Shutdown};
use contact_notes_api::observability::{logging, metrics};
use contact_notes_api::{db, error, HttpServer};

#[derive(Debug, Parser)]
#[command(name = "contact-notes-api", version, about = "Contact notes REST API")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is normal outside development.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config: ApiConfig = config::load(cli.config.as_deref())?;
    logging::init_logging(&config.observability)?;
    error::expose_error_details(config.environment.is_development());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "contact-notes-api starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_ms = config.timeouts.request_ms,
        backoff_threshold = config.backoff.threshold,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = db::connect(&config.database).await?;
    if config.database.run_migrations {
        db::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, pool.clone());
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    server_task.await??;
    pool.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
