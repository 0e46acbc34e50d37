// Trading strategy module
pub mod compose;
pub mod fsm;
pub mod mavg;

pub use compose::EventCompose;
pub use fsm::{Fsm, FsmBuilder, FsmHandler, FsmState, StateId};
pub use mavg::MavgStrategy;

use crate::engine::Context;
use crate::error::EngineError;
use crate::models::Tick;
use crate::Result;

/// Base trait for all trading strategies
///
/// Strategies run on the dispatch worker only and never touch trading state outside
/// the lent `Context`.
pub trait Strategy: Send {
    /// Unique strategy name, also the owner tag of its feedback entries
    fn name(&self) -> &str;

    /// Called once before the first message is dispatched
    fn init(&mut self, ctx: &mut Context);

    /// Inspect outstanding requests; returning false skips `on_tick` for this tick
    fn check_feedback(&mut self, ctx: &mut Context) -> bool;

    fn on_tick(&mut self, ctx: &mut Context, tick: &Tick);

    /// Called once when the worker stops
    fn release(&mut self, _ctx: &mut Context) {}
}

/// Registered strategies in registration order
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy; names must be non-empty and unique
    pub fn register(&mut self, strategy: Box<dyn Strategy>) -> Result<()> {
        let name = strategy.name();
        if name.is_empty() {
            return Err(EngineError::InvalidRegistration(
                "strategy with empty name".to_string(),
            ));
        }
        if self.contains(name) {
            return Err(EngineError::DuplicateStrategy(name.to_string()));
        }

        tracing::info!(strategy = name, "Strategy registered");
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.iter().any(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Strategy>> {
        self.strategies.iter_mut()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
