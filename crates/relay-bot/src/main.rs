//! Signal relay - Entry Point
//!
//! Reads trading instructions as newline-delimited JSON from stdin and
//! executes them on Bybit.

use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;
use tracing::info;

/// Signal relay trade pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config_path = relay_bot::AppConfig::resolve_path(args.config);
    let config = relay_bot::AppConfig::from_file(&config_path)?;

    relay_telemetry::init_logging(&config.telemetry.log_level, config.telemetry.http_verbose)?;

    info!("Starting signal relay v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, "Configuration loaded");

    let credentials = relay_bot::AppConfig::credentials()?;
    let app = relay_bot::Application::new(config, credentials)?;

    app.run(BufReader::new(tokio::io::stdin())).await?;

    info!("Signal relay stopped");
    Ok(())
}
