use crate::execution::{CancelCommand, ExchangeTrade, FeedbackEntry, Keeper, OrderCommand};
use crate::market::{CandleBuffer, QuoteBoard};
use crate::models::{InstrumentKey, OrderStatus, Tick, TransferDirection};
use crate::protocol::MessageType;
use std::collections::HashMap;

/// Everything handlers and strategies may read or drive
///
/// Owned by the dispatch worker and lent out one message at a time. Request helpers
/// allocate the request serial, publish through the exchange adapter and return the
/// serial; they return None when no adapter serves the exchange.
pub struct Context {
    keeper: Keeper,
    candles: CandleBuffer,
    quotes: QuoteBoard,
    traders: HashMap<String, Box<dyn ExchangeTrade>>,
    last_serial: u32,
    feedback_max_checks: u32,
}

impl Context {
    pub fn new(
        traders: Vec<Box<dyn ExchangeTrade>>,
        candles: CandleBuffer,
        feedback_max_checks: u32,
    ) -> Self {
        let traders = traders
            .into_iter()
            .map(|t| (t.exchange().to_string(), t))
            .collect();

        Self {
            keeper: Keeper::new(),
            candles,
            quotes: QuoteBoard::new(),
            traders,
            last_serial: 0,
            feedback_max_checks,
        }
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    pub fn keeper_mut(&mut self) -> &mut Keeper {
        &mut self.keeper
    }

    pub fn candles(&self) -> &CandleBuffer {
        &self.candles
    }

    pub fn candles_mut(&mut self) -> &mut CandleBuffer {
        &mut self.candles
    }

    pub fn quotes(&self) -> &QuoteBoard {
        &self.quotes
    }

    pub fn quotes_mut(&mut self) -> &mut QuoteBoard {
        &mut self.quotes
    }

    pub fn trader(&self, exchange: &str) -> Option<&dyn ExchangeTrade> {
        self.traders.get(exchange).map(|t| t.as_ref())
    }

    pub fn has_trader(&self, exchange: &str) -> bool {
        self.traders.contains_key(exchange)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.traders.keys().map(|k| k.as_str())
    }

    pub fn feedback_max_checks(&self) -> u32 {
        self.feedback_max_checks
    }

    /// Next request serial; never 0, which marks unsolicited messages
    fn next_serial(&mut self) -> u32 {
        self.last_serial = self.last_serial.wrapping_add(1);
        if self.last_serial == 0 {
            self.last_serial = 1;
        }
        self.last_serial
    }

    /// Recompute floating profit of the quoted position via its exchange adapter
    pub fn apply_tick(&mut self, tick: &Tick) {
        let trader = self.traders.get(&tick.key.exchange).map(|t| t.as_ref());
        self.keeper.on_tick(tick, trader);
    }

    /// Place an order on behalf of `strategy`
    ///
    /// Records a feedback entry for the request and marks the instrument's position
    /// stale until the next position query response.
    pub fn place_order(&mut self, strategy: &str, cmd: &OrderCommand) -> Option<u32> {
        if !self.has_trader(&cmd.key.exchange) {
            return None;
        }
        let serial = self.next_serial();
        let trader = self.traders.get(&cmd.key.exchange)?;
        trader.place_order(serial, cmd);

        self.keeper
            .feedback_mut()
            .add(strategy, serial, MessageType::ReqSetOrder, cmd.key.to_string());
        self.keeper.get_or_create_position(&cmd.key).disable();

        tracing::info!(
            strategy,
            instrument = %cmd.key,
            order_type = ?cmd.order_type,
            amount = cmd.amount,
            vol = cmd.vol,
            lever = cmd.lever,
            req_serial = serial,
            "Order placed"
        );
        Some(serial)
    }

    /// Cancel working orders on behalf of `strategy`, tracked as feedback
    pub fn cancel_orders(&mut self, strategy: &str, cmd: &CancelCommand) -> Option<u32> {
        if !self.has_trader(&cmd.key.exchange) {
            return None;
        }
        let serial = self.next_serial();
        let trader = self.traders.get(&cmd.key.exchange)?;
        trader.cancel_orders(serial, cmd);

        self.keeper.feedback_mut().add(
            strategy,
            serial,
            MessageType::ReqCancelOrders,
            cmd.order_ids.join(","),
        );

        tracing::info!(
            strategy,
            instrument = %cmd.key,
            orders = ?cmd.order_ids,
            req_serial = serial,
            "Cancel requested"
        );
        Some(serial)
    }

    pub fn query_account(&mut self, exchange: &str) -> Option<u32> {
        if !self.has_trader(exchange) {
            return None;
        }
        let serial = self.next_serial();
        self.traders.get(exchange)?.query_account(serial);
        Some(serial)
    }

    pub fn query_position(&mut self, key: &InstrumentKey) -> Option<u32> {
        if !self.has_trader(&key.exchange) {
            return None;
        }
        let serial = self.next_serial();
        self.traders.get(&key.exchange)?.query_position(serial, key);
        Some(serial)
    }

    pub fn query_order(&mut self, key: &InstrumentKey, order_id: &str) -> Option<u32> {
        if !self.has_trader(&key.exchange) {
            return None;
        }
        let serial = self.next_serial();
        self.traders
            .get(&key.exchange)?
            .query_order(serial, key, order_id);
        Some(serial)
    }

    pub fn query_orders_by_status(
        &mut self,
        key: &InstrumentKey,
        status: OrderStatus,
    ) -> Option<u32> {
        if !self.has_trader(&key.exchange) {
            return None;
        }
        let serial = self.next_serial();
        self.traders
            .get(&key.exchange)?
            .query_orders_by_status(serial, key, status);
        Some(serial)
    }

    pub fn transfer_money(
        &mut self,
        exchange: &str,
        symbol: &str,
        direction: TransferDirection,
        amount: f64,
    ) -> Option<u32> {
        if !self.has_trader(exchange) {
            return None;
        }
        let serial = self.next_serial();
        self.traders
            .get(exchange)?
            .transfer_money(serial, symbol, direction, amount);
        Some(serial)
    }

    /// Contracts for `vol` coins at `price`, as sized by the exchange adapter
    pub fn contract_amount(&self, exchange: &str, symbol: &str, price: f64, vol: f64) -> Option<i64> {
        self.trader(exchange)?
            .compute_contract_amount(symbol, price, vol)
    }

    /// Age the pending requests of `strategy` and return those still unconfirmed
    pub fn inspect_feedback(&mut self, strategy: &str) -> Vec<FeedbackEntry> {
        let max_checks = self.feedback_max_checks;
        self.keeper.feedback_mut().inspect(strategy, max_checks)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("keeper", &self.keeper)
            .field("exchanges", &self.traders.keys().collect::<Vec<_>>())
            .field("last_serial", &self.last_serial)
            .finish()
    }
}
