use super::{decode_or_log, Handler};
use crate::engine::Context;
use crate::market::BarUpdate;
use crate::models::{IndexQuote, Tick, TradePrint};
use crate::protocol::{CandleMsg, DepthMsg, Envelope, MessageType};

const NAME: &str = "quote";

/// Market data: latest quotes and the candle/MA engine
#[derive(Debug, Default)]
pub struct QuoteHandler {
    candles: u64,
}

impl QuoteHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candle samples fed to the aggregator so far
    pub fn candles(&self) -> u64 {
        self.candles
    }
}

impl Handler for QuoteHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn handle(&mut self, ctx: &mut Context, envelope: &Envelope) -> bool {
        match envelope.kind() {
            Some(MessageType::Tick) => {
                let Some(tick) = decode_or_log::<Tick>(NAME, envelope) else {
                    return true;
                };
                ctx.quotes_mut().store_tick(&tick);
                // strategies still need the tick
                false
            }
            Some(MessageType::Candle) => {
                let Some(msg) = decode_or_log::<CandleMsg>(NAME, envelope) else {
                    return true;
                };
                self.candles += 1;
                let update = ctx
                    .candles_mut()
                    .add_sample(&msg.key, msg.timeframe, msg.to_candle());
                if update == BarUpdate::Untracked {
                    tracing::debug!(instrument = %msg.key, timeframe = %msg.timeframe, "Untracked timeframe");
                }
                true
            }
            Some(MessageType::Depth) => {
                // accepted, not processed
                decode_or_log::<DepthMsg>(NAME, envelope);
                true
            }
            Some(MessageType::TradePrint) => {
                if let Some(trade) = decode_or_log::<TradePrint>(NAME, envelope) {
                    ctx.quotes_mut().store_trade(&trade);
                }
                true
            }
            Some(MessageType::Index) => {
                if let Some(index) = decode_or_log::<IndexQuote>(NAME, envelope) {
                    ctx.quotes_mut().store_index(&index);
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::CandleBuffer;
    use crate::models::{InstrumentKey, Timeframe};
    use serde_json::json;

    fn ctx() -> Context {
        Context::new(Vec::new(), CandleBuffer::new(&[Timeframe::Min1], 50), 3)
    }

    fn key() -> InstrumentKey {
        InstrumentKey::new("okex", "btc_usd", "quarter")
    }

    fn envelope(kind: MessageType, payload: serde_json::Value) -> Envelope {
        Envelope::encode(kind, 0, "okex", &payload).unwrap()
    }

    fn candle(ts_ms: i64, close: f64) -> serde_json::Value {
        json!({
            "exchange": "okex", "symbol": "btc_usd", "contract_type": "quarter",
            "timeframe": "1m", "timestamp": ts_ms,
            "open": close, "high": close, "low": close, "close": close,
            "volume": 1.0, "amount": 1.0
        })
    }

    #[test]
    fn test_candles_feed_aggregator() {
        let mut ctx = ctx();
        let mut handler = QuoteHandler::new();

        // venues repeat the bar-open time on partial updates
        assert!(handler.handle(&mut ctx, &envelope(MessageType::Candle, candle(60_000, 10.0))));
        assert!(handler.handle(&mut ctx, &envelope(MessageType::Candle, candle(60_000, 11.0))));
        assert_eq!(ctx.candles().bar_count(&key(), Timeframe::Min1), 1);
        assert_eq!(ctx.candles().last_bar(&key(), Timeframe::Min1).unwrap().close, 11.0);

        assert!(handler.handle(&mut ctx, &envelope(MessageType::Candle, candle(120_000, 12.0))));

        assert_eq!(handler.candles(), 3);
        assert_eq!(ctx.candles().bar_count(&key(), Timeframe::Min1), 2);
        assert_eq!(ctx.candles().last_bar(&key(), Timeframe::Min1).unwrap().close, 12.0);
    }

    #[test]
    fn test_tick_stored_and_passed_through() {
        let mut ctx = ctx();
        let tick = json!({
            "exchange": "okex", "symbol": "btc_usd", "contract_type": "quarter",
            "timestamp": 5000, "last": 6400.0
        });
        assert!(!QuoteHandler::new().handle(&mut ctx, &envelope(MessageType::Tick, tick)));
        assert_eq!(ctx.quotes().last_price(&key()), Some(6400.0));
    }

    #[test]
    fn test_trade_and_index_recorded() {
        let mut ctx = ctx();
        let mut handler = QuoteHandler::new();
        let trade = json!({
            "exchange": "okex", "symbol": "btc_usd", "contract_type": "quarter",
            "timestamp": 5000, "price": 6401.0, "amount": 3.0, "side": "buy"
        });
        let index = json!({
            "exchange": "okex", "symbol": "btc_usd", "contract_type": "quarter",
            "timestamp": 5000, "index": 6399.5
        });

        assert!(handler.handle(&mut ctx, &envelope(MessageType::TradePrint, trade)));
        assert!(handler.handle(&mut ctx, &envelope(MessageType::Index, index)));
        assert_eq!(ctx.quotes().last_trade(&key()).unwrap().price, 6401.0);
        assert_eq!(ctx.quotes().last_index(&key()).unwrap().index, 6399.5);
    }

    #[test]
    fn test_malformed_candle_is_handled() {
        let mut ctx = ctx();
        let mut handler = QuoteHandler::new();
        assert!(handler.handle(&mut ctx, &envelope(MessageType::Candle, json!({"close": "x"}))));
        assert_eq!(handler.candles(), 0);
    }

    #[test]
    fn test_responses_pass_through() {
        let mut ctx = ctx();
        assert!(!QuoteHandler::new().handle(&mut ctx, &envelope(MessageType::RspQryPos, json!({}))));
    }
}
