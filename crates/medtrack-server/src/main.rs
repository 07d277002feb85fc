//! Streaming median tracker - entry point.

use anyhow::Result;
use clap::Parser;
use medtrack_server::config::DEFAULT_CONFIG_PATH;
use medtrack_server::{AppConfig, Application};
use medtrack_telemetry::LogFormat;
use tracing::info;

/// Per-pair running medians over the exchange trade stream.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via MEDTRACK_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before the upstream connects
    medtrack_ws::init_crypto();

    let args = Args::parse();

    // A missing .env is fine
    let dotenv = dotenvy::dotenv();

    // Logging comes up before config is parsed, so the format follows APP_ENV directly
    let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
    medtrack_telemetry::init_logging(LogFormat::for_environment(&environment))?;

    info!("Starting medtrack v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    // CLI arg > MEDTRACK_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("MEDTRACK_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = AppConfig::load(&config_path)?;
    info!(
        environment = %config.environment,
        port = config.gateway.port,
        upstream = %config.feed.ws_url,
        "Configuration loaded"
    );

    let app = Application::new(config).await?;
    app.run().await?;

    Ok(())
}
