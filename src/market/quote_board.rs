use crate::models::{IndexQuote, InstrumentKey, Tick, TradePrint};
use std::collections::HashMap;

/// Latest tick, trade print and index value seen per instrument
#[derive(Debug, Clone, Default)]
pub struct QuoteBoard {
    ticks: HashMap<InstrumentKey, Tick>,
    trades: HashMap<InstrumentKey, TradePrint>,
    indices: HashMap<InstrumentKey, IndexQuote>,
}

impl QuoteBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the tick unless a newer one is already stored
    pub fn store_tick(&mut self, tick: &Tick) {
        store_latest(&mut self.ticks, &tick.key, tick, |t| t.timestamp);
    }

    pub fn store_trade(&mut self, trade: &TradePrint) {
        store_latest(&mut self.trades, &trade.key, trade, |t| t.timestamp);
    }

    pub fn store_index(&mut self, index: &IndexQuote) {
        store_latest(&mut self.indices, &index.key, index, |i| i.timestamp);
    }

    pub fn last_tick(&self, key: &InstrumentKey) -> Option<&Tick> {
        self.ticks.get(key)
    }

    pub fn last_trade(&self, key: &InstrumentKey) -> Option<&TradePrint> {
        self.trades.get(key)
    }

    pub fn last_index(&self, key: &InstrumentKey) -> Option<&IndexQuote> {
        self.indices.get(key)
    }

    /// Last traded price from the newest tick
    pub fn last_price(&self, key: &InstrumentKey) -> Option<f64> {
        self.ticks.get(key).map(|t| t.last)
    }
}

fn store_latest<T: Clone>(
    map: &mut HashMap<InstrumentKey, T>,
    key: &InstrumentKey,
    value: &T,
    timestamp: impl Fn(&T) -> u64,
) {
    match map.get_mut(key) {
        Some(current) if timestamp(current) > timestamp(value) => {}
        Some(current) => *current = value.clone(),
        None => {
            map.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeSide;

    fn key() -> InstrumentKey {
        InstrumentKey::new("okex", "btc_usd", "quarter")
    }

    fn tick(timestamp: u64, last: f64) -> Tick {
        Tick {
            key: key(),
            timestamp,
            vol: 0.0,
            high: 0.0,
            low: 0.0,
            day_vol: 0.0,
            day_high: 0.0,
            day_low: 0.0,
            last,
            bid: last - 0.5,
            ask: last + 0.5,
            bid_vol: 1.0,
            ask_vol: 1.0,
        }
    }

    #[test]
    fn test_latest_tick_wins() {
        let mut board = QuoteBoard::new();
        board.store_tick(&tick(2000, 6400.0));
        board.store_tick(&tick(1000, 6300.0));
        assert_eq!(board.last_price(&key()), Some(6400.0));

        board.store_tick(&tick(3000, 6500.0));
        assert_eq!(board.last_tick(&key()).unwrap().timestamp, 3000);
    }

    #[test]
    fn test_trade_and_index() {
        let mut board = QuoteBoard::new();
        board.store_trade(&TradePrint {
            key: key(),
            timestamp: 10,
            price: 6401.0,
            amount: 3.0,
            side: TradeSide::Buy,
        });
        board.store_index(&IndexQuote {
            key: key(),
            timestamp: 10,
            index: 6399.5,
        });

        assert_eq!(board.last_trade(&key()).unwrap().price, 6401.0);
        assert_eq!(board.last_index(&key()).unwrap().index, 6399.5);
        assert!(board.last_price(&key()).is_none());
    }
}
