//! Main application orchestration.
//!
//! Wires the Bybit broker into the trade queue and feeds it instructions:
//! - One `CancellationToken` shared by the queue and the broker client
//! - Newline-delimited JSON instructions from any async reader
//! - Ctrl-C or end of input stops the queue

use std::sync::Arc;

use relay_broker::{BybitBroker, Credentials, DynBroker};
use relay_core::TradingInstruction;
use relay_executor::TradeQueue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

/// Parse one NDJSON line into an instruction.
///
/// The symbol is trimmed and upper-cased. Prices must be positive.
pub fn parse_instruction(line: &str) -> AppResult<TradingInstruction> {
    let mut instruction: TradingInstruction = serde_json::from_str(line)
        .map_err(|e| AppError::Instruction(format!("malformed instruction: {e}")))?;

    instruction.symbol = instruction.symbol.trim().to_uppercase();
    if instruction.symbol.is_empty() {
        return Err(AppError::Instruction("empty symbol".to_string()));
    }

    for (name, price) in [
        ("entry", instruction.entry),
        ("stop", instruction.stop),
        ("take", instruction.take),
    ] {
        if !price.is_positive() {
            return Err(AppError::Instruction(format!(
                "{}: {name} must be positive, got {price}",
                instruction.symbol
            )));
        }
    }

    Ok(instruction)
}

/// Main application.
pub struct Application {
    config: AppConfig,
    queue: TradeQueue,
    shutdown: CancellationToken,
}

impl Application {
    /// Application trading through Bybit with `credentials`.
    pub fn new(config: AppConfig, credentials: Credentials) -> AppResult<Self> {
        let shutdown = CancellationToken::new();
        let broker = BybitBroker::connect(&config.exchange, credentials, shutdown.clone())?;
        Ok(Self::with_broker(config, Arc::new(broker), shutdown))
    }

    /// Application over any broker. `shutdown` is cancelled by `stop`.
    pub fn with_broker(config: AppConfig, broker: DynBroker, shutdown: CancellationToken) -> Self {
        let queue = TradeQueue::new(broker, config.execution()).with_shutdown(shutdown.clone());
        Self {
            config,
            queue,
            shutdown,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn queue(&self) -> &TradeQueue {
        &self.queue
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Enqueue one instruction.
    pub fn submit(&self, instruction: TradingInstruction) -> AppResult<()> {
        self.queue.enqueue(instruction)?;
        Ok(())
    }

    /// Start the queue and enqueue every instruction read from `input`.
    ///
    /// Malformed lines are logged and skipped. On end of input the queue is
    /// drained before it is stopped; Ctrl-C stops it right away.
    pub async fn run<R>(self, input: R) -> AppResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        info!(
            env = self.config.exchange.environment(),
            market_entry = self.config.orders.market_entry,
            usdt_per_trade = %self.config.risk.usdt_per_trade,
            default_leverage = self.config.risk.default_leverage,
            "Starting relay"
        );
        self.queue.start();

        let mut lines = input.lines();
        let mut line_no = 0u64;
        let mut read_error = None;

        let interrupted = loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, stopping");
                    break true;
                }
                next = lines.next_line() => match next {
                    Ok(Some(line)) => {
                        line_no += 1;
                        self.ingest(line_no, &line);
                    }
                    Ok(None) => {
                        info!(lines = line_no, "Input closed, draining queue");
                        break false;
                    }
                    Err(e) => {
                        error!(error = %e, "Reading instructions failed");
                        read_error = Some(e);
                        break false;
                    }
                },
            }
        };

        if !interrupted {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Ctrl-C received while draining"),
                _ = self.queue.wait_idle() => {}
            }
        }

        self.queue.stop().await;

        match read_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn ingest(&self, line_no: u64, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }

        match parse_instruction(line) {
            Ok(instruction) => {
                if let Err(e) = self.submit(instruction) {
                    warn!(line_no, error = %e, "Instruction not enqueued");
                }
            }
            Err(e) => warn!(line_no, error = %e, "Skipping input line"),
        }
    }
}
