// Order execution module
// Exchange capability, authoritative trading-state cache and pending-request bookkeeping
pub mod feedback;
pub mod keeper;
pub mod publisher;

pub use feedback::{Feedback, FeedbackEntry, DEFAULT_MAX_CHECKS};
pub use keeper::Keeper;
pub use publisher::PublishingTrader;

use crate::models::{InstrumentKey, OrderStatus, OrderType, Position, PriceType, Tick, TransferDirection};
use serde::{Deserialize, Serialize};

/// Order placement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCommand {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub order_type: OrderType,
    pub price_type: PriceType,
    pub price: f64,
    pub amount: i64, // contracts
    pub vol: f64,    // coin volume the amount was sized from
    pub lever: i32,
}

/// Cancel one or more working orders of an instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelCommand {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub order_ids: Vec<String>,
}

/// Venue-specific trading capability
///
/// Every request method is fire-and-forget: it publishes and returns at once, and the
/// venue's answer comes back later as an inbound envelope carrying `serial`.
pub trait ExchangeTrade: Send {
    /// Exchange key this adapter serves
    fn exchange(&self) -> &str;

    fn query_account(&self, serial: u32);

    fn query_position(&self, serial: u32, key: &InstrumentKey);

    fn place_order(&self, serial: u32, cmd: &OrderCommand);

    fn query_order(&self, serial: u32, key: &InstrumentKey, order_id: &str);

    fn query_orders_by_status(&self, serial: u32, key: &InstrumentKey, status: OrderStatus);

    fn cancel_orders(&self, serial: u32, cmd: &CancelCommand);

    fn transfer_money(&self, serial: u32, symbol: &str, direction: TransferDirection, amount: f64);

    /// Contracts equivalent to `vol` coins at `price`; None when the symbol is unknown
    /// or the result is not positive
    fn compute_contract_amount(&self, symbol: &str, price: f64, vol: f64) -> Option<i64>;

    /// Recompute floating profit of `position` against the tick's last price
    fn compute_position_profit(&self, position: &mut Position, tick: &Tick);
}
