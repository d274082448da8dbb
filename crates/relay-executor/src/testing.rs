//! Recording broker for queue and handler tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use relay_broker::{BoxFuture, Broker, BrokerError, BrokerResult, OrderAck};
use relay_core::{OrderSubmission, Price, Size};
use rust_decimal::Decimal;

pub struct MockBroker {
    tick: Price,
    step: Size,
    placed: Mutex<Vec<OrderSubmission>>,
    leverage: Mutex<Vec<(String, u32)>>,
    isolated: AtomicUsize,
    events: Mutex<Vec<String>>,
    fail_prep: AtomicBool,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    place_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockBroker {
    pub fn new(tick: Decimal, step: Decimal) -> Self {
        Self {
            tick: Price::new(tick),
            step: Size::new(step),
            placed: Mutex::new(Vec::new()),
            leverage: Mutex::new(Vec::new()),
            isolated: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            fail_prep: AtomicBool::new(false),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            place_delay: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Leverage and margin-mode calls fail.
    pub fn fail_account_prep(&self) {
        self.fail_prep.store(true, Ordering::SeqCst);
    }

    /// Instrument lookups for `symbol` fail with `NoInstrument`.
    pub fn fail_symbol(&self, symbol: &str) {
        self.failing.lock().insert(symbol.to_string());
    }

    /// `place_order` for `symbol` panics.
    pub fn panic_on(&self, symbol: &str) {
        self.panicking.lock().insert(symbol.to_string());
    }

    pub fn set_place_delay(&self, delay: Duration) {
        *self.place_delay.lock() = delay;
    }

    pub fn placed(&self) -> Vec<OrderSubmission> {
        self.placed.lock().clone()
    }

    pub fn placed_symbols(&self) -> Vec<String> {
        self.placed.lock().iter().map(|o| o.symbol.clone()).collect()
    }

    pub fn leverage_calls(&self) -> Vec<(String, u32)> {
        self.leverage.lock().clone()
    }

    pub fn isolated_calls(&self) -> usize {
        self.isolated.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Broker for MockBroker {
    fn set_leverage<'a>(&'a self, symbol: &'a str, leverage: u32) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            self.events.lock().push(format!("leverage:{symbol}"));
            self.leverage.lock().push((symbol.to_string(), leverage));
            if self.fail_prep.load(Ordering::SeqCst) {
                return Err(BrokerError::Exchange {
                    code: 110043,
                    message: "leverage not modified".to_string(),
                });
            }
            Ok(())
        })
    }

    fn switch_isolated<'a>(&'a self, _symbol: &'a str) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            self.isolated.fetch_add(1, Ordering::SeqCst);
            if self.fail_prep.load(Ordering::SeqCst) {
                return Err(BrokerError::Transport("connection reset".to_string()));
            }
            Ok(())
        })
    }

    fn quantize_price_qty<'a>(
        &'a self,
        symbol: &'a str,
        price: Option<Price>,
        qty: Size,
    ) -> BoxFuture<'a, BrokerResult<(Option<Price>, Size)>> {
        Box::pin(async move {
            if self.failing.lock().contains(symbol) {
                return Err(BrokerError::NoInstrument(symbol.to_string()));
            }
            let price = price.map(|p| p.quantize(self.tick)).transpose()?;
            Ok((price, qty.quantize(self.step)?))
        })
    }

    fn place_order(&self, order: OrderSubmission) -> BoxFuture<'_, BrokerResult<OrderAck>> {
        Box::pin(async move {
            if self.panicking.lock().contains(&order.symbol) {
                panic!("scripted panic for {}", order.symbol);
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = *self.place_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().push(format!("placed:{}", order.symbol));
            let order_id = format!("order-{}", self.placed.lock().len() + 1);
            self.placed.lock().push(order);

            Ok(OrderAck {
                order_id,
                order_link_id: String::new(),
            })
        })
    }
}
