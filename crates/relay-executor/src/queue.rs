//! Trade execution queue.
//!
//! Producers append instructions with `enqueue`; a single consumer task drains
//! them in FIFO order and runs each through the `InstructionHandler`.
//!
//! # Lifecycle
//!
//! `Idle -> Started -> Stopped`
//! - `start` spawns the consumer; calling it again is a no-op
//! - `stop` cancels the consumer and waits for it and every in-flight handler
//! - `Stopped` is terminal
//!
//! # Backpressure
//!
//! The queue is unbounded. The consumer takes a permit from a semaphore of
//! `max_concurrent` permits before dequeuing, so with the default of one
//! permit the next instruction is not touched until the previous handler
//! has finished.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use relay_broker::DynBroker;
use relay_core::TradingInstruction;
use relay_telemetry::Metrics;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExecutionConfig;
use crate::error::{ExecutorError, ExecutorResult};
use crate::handler::InstructionHandler;

/// Counters since the queue was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Instructions whose handler has finished, either way.
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    finished: Notify,
}

impl Counters {
    fn record(&self, ok: bool) {
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.finished.notify_waiters();
    }

    /// Count instructions that were never dequeued as failed.
    fn discard(&self, dropped: u64) {
        if dropped == 0 {
            return;
        }
        self.failed.fetch_add(dropped, Ordering::Relaxed);
        self.finished.notify_waiters();
        warn!(dropped, "Trade queue stopped with unprocessed instructions");
    }

    fn snapshot(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

enum Lifecycle {
    Idle(mpsc::UnboundedReceiver<TradingInstruction>),
    Started(JoinHandle<()>),
    Stopped,
}

impl Lifecycle {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle(_) => "idle",
            Self::Started(_) => "started",
            Self::Stopped => "stopped",
        }
    }
}

/// Single-consumer FIFO of trading instructions.
pub struct TradeQueue {
    tx: mpsc::UnboundedSender<TradingInstruction>,
    state: Mutex<Lifecycle>,
    handler: Arc<InstructionHandler>,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
}

impl TradeQueue {
    pub fn new(broker: DynBroker, config: ExecutionConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let permits = Arc::new(Semaphore::new(config.permits()));

        Self {
            tx,
            state: Mutex::new(Lifecycle::Idle(rx)),
            handler: Arc::new(InstructionHandler::new(broker, config)),
            permits,
            counters: Arc::new(Counters::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `token` as the stop signal. Share it with the broker client so
    /// in-flight retries end with the queue.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Append an instruction. Never blocks.
    ///
    /// Instructions enqueued before `start` are buffered.
    ///
    /// # Errors
    /// `QueueClosed` once `stop` has been called.
    pub fn enqueue(&self, instruction: TradingInstruction) -> ExecutorResult<()> {
        if matches!(*self.state.lock(), Lifecycle::Stopped) {
            return Err(ExecutorError::QueueClosed);
        }

        info!(
            symbol = %instruction.symbol,
            direction = %instruction.direction,
            entry = %instruction.entry,
            stop = %instruction.stop,
            take = %instruction.take,
            leverage = ?instruction.leverage,
            "Instruction enqueued"
        );

        // Count first: a handler may finish before `send` returns.
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        if self.tx.send(instruction).is_err() {
            self.counters.enqueued.fetch_sub(1, Ordering::Relaxed);
            return Err(ExecutorError::QueueClosed);
        }
        Metrics::instruction_enqueued();
        Ok(())
    }

    /// Spawn the consumer task. Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut state = self.state.lock();
        let rx = match std::mem::replace(&mut *state, Lifecycle::Stopped) {
            Lifecycle::Idle(rx) => rx,
            other => {
                debug!(state = other.name(), "Trade queue start ignored");
                *state = other;
                return;
            }
        };

        let worker = Worker {
            rx,
            handler: Arc::clone(&self.handler),
            permits: Arc::clone(&self.permits),
            counters: Arc::clone(&self.counters),
            shutdown: self.shutdown.clone(),
        };
        *state = Lifecycle::Started(tokio::spawn(worker.run()));

        info!(
            max_concurrent = self.handler.config().permits(),
            "Trade queue started"
        );
    }

    /// Cancel the consumer and wait until it and all in-flight handlers end.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), Lifecycle::Stopped);
        self.shutdown.cancel();

        match previous {
            Lifecycle::Started(worker) => {
                if let Err(e) = worker.await {
                    error!(error = %e, "Trade queue consumer ended abnormally");
                }
                let stats = self.stats();
                info!(
                    enqueued = stats.enqueued,
                    succeeded = stats.succeeded,
                    failed = stats.failed,
                    "Trade queue stopped"
                );
            }
            Lifecycle::Idle(mut rx) => {
                self.counters.discard(drain_unprocessed(&mut rx));
                info!("Trade queue stopped before start");
            }
            Lifecycle::Stopped => debug!("Trade queue already stopped"),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), Lifecycle::Started(_))
    }

    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    /// Wait until every enqueued instruction has been handled.
    ///
    /// Instructions still buffered when the queue stops count as failed, so
    /// this also returns after `stop`.
    pub async fn wait_idle(&self) {
        loop {
            let finished = self.counters.finished.notified();
            let stats = self.stats();
            if stats.completed() >= stats.enqueued {
                return;
            }
            finished.await;
        }
    }
}

impl std::fmt::Debug for TradeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeQueue")
            .field("state", &self.state.lock().name())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

struct Worker {
    rx: mpsc::UnboundedReceiver<TradingInstruction>,
    handler: Arc<InstructionHandler>,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(mut self) {
        let mut handlers = JoinSet::new();

        loop {
            let permit = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    self.on_handler_exit(joined);
                    continue;
                }
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let instruction = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    self.on_handler_exit(joined);
                    continue;
                }
                next = self.rx.recv() => match next {
                    Some(instruction) => instruction,
                    None => break,
                },
            };

            let handler = Arc::clone(&self.handler);
            let counters = Arc::clone(&self.counters);
            handlers.spawn(async move {
                // Held until the handler ends, including on panic.
                let _permit = permit;
                handle_one(&handler, &counters, instruction).await;
            });
        }

        self.counters.discard(drain_unprocessed(&mut self.rx));

        while let Some(joined) = handlers.join_next().await {
            self.on_handler_exit(joined);
        }
    }

    fn on_handler_exit(&self, joined: Result<(), JoinError>) {
        if let Err(e) = joined {
            self.counters.record(false);
            error!(error = %e, "Instruction handler did not complete");
        }
    }
}

fn drain_unprocessed(rx: &mut mpsc::UnboundedReceiver<TradingInstruction>) -> u64 {
    rx.close();
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

async fn handle_one(handler: &InstructionHandler, counters: &Counters, instruction: TradingInstruction) {
    let symbol = instruction.symbol.clone();
    let side = instruction.direction.order_side();

    match handler.execute(&instruction).await {
        Ok(ack) => {
            counters.record(true);
            Metrics::order_accepted(&symbol, side.as_str());
            info!(
                symbol = %symbol,
                %side,
                order_id = %ack.order_id,
                "Order accepted"
            );
        }
        Err(e) => {
            counters.record(false);
            Metrics::instruction_failed(&symbol);
            error!(symbol = %symbol, error = %e, "Instruction failed");
        }
    }
}
