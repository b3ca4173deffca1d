//! Price-trigger trading bot - Entry Point
//!
//! Starts in read-only mode. Monitoring begins on the first request to `/`
//! (or at launch with `control.auto_start`); live trading needs `/start`
//! with a valid one-time token.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Price-trigger trading bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRIGGER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // .env is optional
    let dotenv = dotenvy::dotenv();

    trigger_telemetry::init_logging()?;

    info!("Starting trigger bot v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    // CLI arg > TRIGGER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TRIGGER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = trigger_bot::AppConfig::load(&config_path)?;
    info!(
        markets = config.markets.len(),
        rules = config.rules.len(),
        gateway = %config.gateway.base_url,
        "Configuration loaded"
    );

    let app = trigger_bot::Application::new(config)?;
    app.run().await?;

    info!("Trigger bot stopped");
    Ok(())
}
