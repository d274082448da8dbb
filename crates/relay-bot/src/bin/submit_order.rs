//! Submit a single trading instruction through the trade queue.
//!
//! Prices accept locale-formatted text such as `"1 234,56"` or `"1,234.56"`.
//!
//! ```text
//! submit-order --symbol SOLUSDT --direction short --entry 150 --stop 155 --take 140
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use relay_bot::{AppConfig, Application};
use relay_core::{normalize_number, Direction, Price, TradingInstruction};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Side {
    Long,
    Short,
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Direction::Long,
            Side::Short => Direction::Short,
        }
    }
}

/// Send one order to the exchange
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Exchange symbol, e.g. SOLUSDT
    #[arg(long)]
    symbol: String,

    #[arg(long, value_enum)]
    direction: Side,

    #[arg(long)]
    entry: String,

    #[arg(long)]
    stop: String,

    #[arg(long)]
    take: String,

    /// Overrides risk.default_leverage
    #[arg(long)]
    leverage: Option<u32>,

    /// Configuration file path (can also be set via RELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Print the normalized instruction and exit
    #[arg(long)]
    dry_run: bool,
}

fn price(field: &str, text: &str) -> Result<Price> {
    normalize_number(text)
        .map(Price::new)
        .with_context(|| format!("invalid {field} price {text:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut instruction = TradingInstruction::new(
        args.symbol.trim().to_uppercase(),
        args.direction.into(),
        price("entry", &args.entry)?,
        price("stop", &args.stop)?,
        price("take", &args.take)?,
    );
    if let Some(leverage) = args.leverage {
        instruction = instruction.with_leverage(leverage);
    }

    if args.dry_run {
        println!("{instruction}");
        return Ok(());
    }

    let config_path = AppConfig::resolve_path(args.config);
    let config = AppConfig::from_file(&config_path)?;
    relay_telemetry::init_logging(&config.telemetry.log_level, config.telemetry.http_verbose)?;

    let app = Application::new(config, AppConfig::credentials()?)?;
    app.queue().start();
    app.submit(instruction)?;
    app.queue().wait_idle().await;
    app.queue().stop().await;

    let stats = app.queue().stats();
    info!(succeeded = stats.succeeded, failed = stats.failed, "Done");
    if stats.failed > 0 {
        anyhow::bail!("order was not accepted");
    }
    Ok(())
}
