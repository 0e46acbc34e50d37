use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Render a unix timestamp (seconds) for log lines
pub fn format_ts(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

/// Identity of one tradable contract on one venue
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    pub exchange: String,
    pub symbol: String,
    pub contract_type: String,
}

impl InstrumentKey {
    pub fn new(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        contract_type: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            contract_type: contract_type.into(),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.exchange, self.symbol, self.contract_type)
    }
}

/// Fixed bar duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Min1,
    #[serde(rename = "3m")]
    Min3,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "1d")]
    Day1,
}

impl Timeframe {
    /// Bar duration in seconds
    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::Min1 => 60,
            Timeframe::Min3 => 3 * 60,
            Timeframe::Min5 => 5 * 60,
            Timeframe::Min15 => 15 * 60,
            Timeframe::Min30 => 30 * 60,
            Timeframe::Hour1 => 60 * 60,
            Timeframe::Day1 => 24 * 60 * 60,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Min1 => "1m",
            Timeframe::Min3 => "3m",
            Timeframe::Min5 => "5m",
            Timeframe::Min15 => "15m",
            Timeframe::Min30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Day1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest quote for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub timestamp: u64, // milliseconds

    #[serde(default)]
    pub vol: f64, // volume inside the tick
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,

    #[serde(default)]
    pub day_vol: f64, // rolling 24h
    #[serde(default)]
    pub day_high: f64,
    #[serde(default)]
    pub day_low: f64,

    pub last: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub bid_vol: f64,
    #[serde(default)]
    pub ask_vol: f64,
}

impl Tick {
    /// Tick time in whole seconds
    pub fn timestamp_secs(&self) -> i64 {
        (self.timestamp / 1000) as i64
    }
}

/// Which side took liquidity in a public trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One public trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePrint {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub timestamp: u64, // milliseconds
    pub price: f64,
    pub amount: f64,
    pub side: TradeSide,
}

/// Venue index price for an underlying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    #[serde(flatten)]
    pub key: InstrumentKey,
    pub timestamp: u64, // milliseconds
    pub index: f64,
}

/// OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64, // seconds
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

/// Trading signal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Signal {
    Buy,
    Sell,
    #[default]
    Hold,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Canceled,
    Waiting,
    PartiallyFilled,
    Complete,
    Canceling,
}

impl OrderStatus {
    /// Orders in these states are still working on the book
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Waiting | OrderStatus::PartiallyFilled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Market,
    Limit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    SpotToFuture,
    FutureToSpot,
}

/// Working order as last reported by the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub key: InstrumentKey,
    pub order_id: String,
    pub amount: f64,      // requested contracts
    pub deal_amount: f64, // filled contracts
    pub price: f64,
    pub price_avg: f64,
    pub fee: f64,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub unit_amount: f64, // contract face value
    pub lever: i32,
    pub contract_name: String,
    pub created_at: String,
}

/// One side (long or short) of a futures position
///
/// Venues report the first seven fields; floating profit is computed locally on ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSide {
    pub amount: f64,    // contracts held
    pub available: f64, // contracts that can be closed
    pub bond: f64,      // margin
    pub flat_price: f64,
    pub price_avg: f64,
    pub price_cost: f64, // settlement base price
    pub close_profit: f64,
    pub float_profit: f64,
    pub float_profit_rate: f64,
}

/// Cached position for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub key: InstrumentKey,
    /// False between placing an order and the next position query response
    pub valid: bool,
    pub long: PositionSide,
    pub short: PositionSide,
}

impl PositionSide {
    /// Take the venue-reported fields of `venue`, keeping local floating profit
    pub fn apply_venue(&mut self, venue: &PositionSide) {
        self.amount = venue.amount;
        self.available = venue.available;
        self.bond = venue.bond;
        self.flat_price = venue.flat_price;
        self.price_avg = venue.price_avg;
        self.price_cost = venue.price_cost;
        self.close_profit = venue.close_profit;
    }
}

impl Position {
    pub fn new(key: InstrumentKey) -> Self {
        Self {
            key,
            valid: true,
            long: PositionSide::default(),
            short: PositionSide::default(),
        }
    }

    /// Zero both sides and trust the (empty) snapshot again
    pub fn reset(&mut self) {
        self.valid = true;
        self.long = PositionSide::default();
        self.short = PositionSide::default();
    }

    pub fn disable(&mut self) {
        self.valid = false;
    }

    pub fn is_flat(&self) -> bool {
        self.long.amount <= 0.0 && self.short.amount <= 0.0
    }
}

/// Balance of one currency on one venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub exchange: String,
    pub symbol: String,
    pub balance: f64, // available
    pub rights: f64,  // balance + market value
}

impl Money {
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            balance: 0.0,
            rights: 0.0,
        }
    }
}
