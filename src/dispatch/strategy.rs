use super::{decode_or_log, Handler};
use crate::engine::Context;
use crate::models::Tick;
use crate::protocol::{Envelope, MessageType};
use crate::strategy::StrategyRegistry;

const NAME: &str = "strategy";

/// Last link of the chain: drives every registered strategy on ticks
pub struct StrategyHandler {
    registry: StrategyRegistry,
}

impl StrategyHandler {
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }
}

impl Handler for StrategyHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn start(&mut self, ctx: &mut Context) {
        for strategy in self.registry.iter_mut() {
            strategy.init(ctx);
        }
    }

    /// Ticks are never claimed, so later links would still see them
    fn handle(&mut self, ctx: &mut Context, envelope: &Envelope) -> bool {
        if envelope.kind() != Some(MessageType::Tick) {
            return false;
        }
        let Some(tick) = decode_or_log::<Tick>(NAME, envelope) else {
            return true;
        };

        for strategy in self.registry.iter_mut() {
            if !strategy.check_feedback(ctx) {
                tracing::debug!(strategy = strategy.name(), "Waiting on feedback, tick skipped");
                continue;
            }
            strategy.on_tick(ctx, &tick);
        }
        false
    }

    fn stop(&mut self, ctx: &mut Context) {
        for strategy in self.registry.iter_mut() {
            strategy.release(ctx);
        }
    }
}

impl std::fmt::Debug for StrategyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyHandler")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::CandleBuffer;
    use crate::models::Timeframe;
    use crate::Strategy;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        inits: u32,
        checks: u32,
        ticks: Vec<f64>,
        releases: u32,
    }

    struct Probe {
        ready: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl Strategy for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        fn init(&mut self, _: &mut Context) {
            self.calls.lock().unwrap().inits += 1;
        }
        fn check_feedback(&mut self, _: &mut Context) -> bool {
            self.calls.lock().unwrap().checks += 1;
            self.ready
        }
        fn on_tick(&mut self, _: &mut Context, tick: &Tick) {
            self.calls.lock().unwrap().ticks.push(tick.last);
        }
        fn release(&mut self, _: &mut Context) {
            self.calls.lock().unwrap().releases += 1;
        }
    }

    fn handler(ready: bool) -> (StrategyHandler, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut registry = StrategyRegistry::new();
        registry
            .register(Box::new(Probe { ready, calls: calls.clone() }))
            .unwrap();
        (StrategyHandler::new(registry), calls)
    }

    fn ctx() -> Context {
        Context::new(Vec::new(), CandleBuffer::new(&[Timeframe::Min1], 10), 3)
    }

    fn tick(last: f64) -> Envelope {
        let payload = serde_json::json!({
            "exchange": "okex", "symbol": "btc_usd", "contract_type": "quarter",
            "timestamp": 1000, "last": last
        });
        Envelope::encode(MessageType::Tick, 0, "okex", &payload).unwrap()
    }

    #[test]
    fn test_lifecycle_and_tick_delivery() {
        let (mut handler, calls) = handler(true);
        let mut ctx = ctx();

        handler.start(&mut ctx);
        assert!(!handler.handle(&mut ctx, &tick(1.0)));
        assert!(!handler.handle(&mut ctx, &tick(2.0)));
        handler.stop(&mut ctx);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.inits, 1);
        assert_eq!(calls.checks, 2);
        assert_eq!(calls.ticks, vec![1.0, 2.0]);
        assert_eq!(calls.releases, 1);
    }

    #[test]
    fn test_pending_feedback_skips_tick() {
        let (mut handler, calls) = handler(false);
        let mut ctx = ctx();

        handler.handle(&mut ctx, &tick(1.0));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.checks, 1);
        assert!(calls.ticks.is_empty());
    }

    #[test]
    fn test_other_messages_ignored() {
        let (mut handler, calls) = handler(true);
        let mut ctx = ctx();
        let candle = Envelope::encode(MessageType::Candle, 0, "okex", &serde_json::json!({})).unwrap();

        assert!(!handler.handle(&mut ctx, &candle));
        assert_eq!(calls.lock().unwrap().checks, 0);
        assert_eq!(handler.registry().len(), 1);
    }
}
