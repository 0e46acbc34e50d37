// Engine wiring: context, handler chain and strategy registry
mod context;

pub use context::Context;

use crate::config::Settings;
use crate::dispatch::{Dispatcher, Handler, QuoteHandler, StrategyHandler, TradeHandler};
use crate::error::EngineError;
use crate::execution::ExchangeTrade;
use crate::market::CandleBuffer;
use crate::protocol::Envelope;
use crate::strategy::{Strategy, StrategyRegistry};
use crate::Result;
use std::collections::HashSet;
use tokio::sync::{mpsc, watch};

/// Decision engine assembled from validated settings
///
/// Owns the single execution context; everything that mutates trading state runs on
/// the task that awaits [`Engine::run`].
pub struct Engine {
    context: Context,
    registry: StrategyRegistry,
}

impl Engine {
    /// Validate `settings` and the exchange adapters, then build the context
    ///
    /// # Arguments
    /// * `settings` - Engine settings; every adapter must serve a configured exchange
    /// * `traders` - One adapter per exchange
    pub fn new(settings: &Settings, traders: Vec<Box<dyn ExchangeTrade>>) -> Result<Self> {
        settings.validate()?;

        let mut seen = HashSet::new();
        for trader in &traders {
            let exchange = trader.exchange();
            if settings.exchange(exchange).is_none() {
                return Err(EngineError::UnknownExchange(exchange.to_string()));
            }
            if !seen.insert(exchange.to_string()) {
                return Err(EngineError::InvalidRegistration(format!(
                    "exchange '{}' has more than one trader",
                    exchange
                )));
            }
        }

        let candles = CandleBuffer::new(&settings.timeframes(), settings.ring_capacity);
        let context = Context::new(traders, candles, settings.feedback_max_checks);

        tracing::info!(
            exchanges = ?seen,
            timeframes = ?settings.timeframes(),
            ring_capacity = settings.ring_capacity,
            "Engine assembled"
        );

        Ok(Self {
            context,
            registry: StrategyRegistry::new(),
        })
    }

    pub fn register_strategy(&mut self, strategy: Box<dyn Strategy>) -> Result<()> {
        self.registry.register(strategy)
    }

    pub fn strategies(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Run the dispatch worker on the current task until the inbound queue closes or
    /// `shutdown` turns true
    ///
    /// Returns the final context once every strategy has been released.
    pub async fn run(
        self,
        inbound: mpsc::Receiver<Envelope>,
        shutdown: watch::Receiver<bool>,
    ) -> Context {
        let Engine {
            mut context,
            registry,
        } = self;

        // confirmations reach the Keeper before strategies evaluate
        let handlers: Vec<Box<dyn Handler>> = vec![
            Box::new(TradeHandler::new()),
            Box::new(QuoteHandler::new()),
            Box::new(StrategyHandler::new(registry)),
        ];
        let mut dispatcher = Dispatcher::new(handlers);
        dispatcher.run(&mut context, inbound, shutdown).await;
        context
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("context", &self.context)
            .field("strategies", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PublishingTrader;
    use std::collections::HashMap;

    fn trader(exchange: &str) -> Box<dyn ExchangeTrade> {
        let (tx, _rx) = mpsc::unbounded_channel();
        Box::new(PublishingTrader::new(exchange, HashMap::new(), tx))
    }

    #[test]
    fn test_unknown_exchange_rejected() {
        let err = Engine::new(&Settings::default(), vec![trader("bitfinex")]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownExchange(name) if name == "bitfinex"));
    }

    #[test]
    fn test_duplicate_trader_rejected() {
        let err = Engine::new(&Settings::default(), vec![trader("okex"), trader("okex")]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRegistration(_)));
    }

    #[test]
    fn test_context_built_from_settings() {
        let engine = Engine::new(&Settings::default(), vec![trader("okex")]).unwrap();
        assert!(engine.context().has_trader("okex"));
        assert_eq!(engine.context().candles().timeframes().len(), 3);
        assert_eq!(engine.context().feedback_max_checks(), 3);
        assert!(engine.strategies().is_empty());
    }
}
