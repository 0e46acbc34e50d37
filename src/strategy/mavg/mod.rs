// Moving-average crossover strategy
//
// MA7/MA30 of one timeframe drive a three-state machine:
// - normal: open on signals, close on exits
// - defense: close only
// - shutdown: cool down after too many losses
pub mod handlers;
pub mod states;
pub mod stats;

pub use handlers::{classify, MaReading, MaSignalHandler, PositionHandler, SignalThresholds};
pub use states::{DefenseState, MavgData, MavgState, NormalState, ShutdownState};
pub use stats::{SymbolStats, TradeStats};

use crate::config::MavgSettings;
use crate::engine::Context;
use crate::models::{InstrumentKey, Tick};
use crate::strategy::{Fsm, FsmBuilder, Strategy};
use crate::Result;
use std::collections::HashSet;

pub const STRATEGY_NAME: &str = "mavg";

pub struct MavgStrategy {
    exchange: String,
    follows: Vec<InstrumentKey>,
    follow_set: HashSet<InstrumentKey>,
    fsm: Fsm<MavgState, MavgData>,
}

impl MavgStrategy {
    /// Build the strategy for every symbol x contract type of `settings`
    pub fn new(settings: MavgSettings) -> Result<Self> {
        let exchange = settings.exchange.as_str();
        let contract_types = &settings.contract_types;
        let follows: Vec<InstrumentKey> = settings
            .symbols
            .iter()
            .flat_map(|symbol| {
                contract_types
                    .iter()
                    .map(move |ct| InstrumentKey::new(exchange, symbol.as_str(), ct.as_str()))
            })
            .collect();

        let fsm = FsmBuilder::new(STRATEGY_NAME)
            .state(Box::new(NormalState::new()))
            .state(Box::new(DefenseState))
            .state(Box::new(ShutdownState::new()))
            .handler(Box::new(PositionHandler))
            .handler(Box::new(MaSignalHandler::new(&settings)))
            .initial(MavgState::Normal)
            .build(MavgData::new(settings.clone()))?;

        Ok(Self {
            exchange: settings.exchange.clone(),
            follow_set: follows.iter().cloned().collect(),
            follows,
            fsm,
        })
    }

    pub fn state(&self) -> MavgState {
        self.fsm.current()
    }

    pub fn stats(&self) -> &TradeStats {
        &self.fsm.data().stats
    }

    pub fn follows(&self) -> &[InstrumentKey] {
        &self.follows
    }

    /// Refresh the account and every followed position
    fn query_all(&self, ctx: &mut Context) {
        if ctx.query_account(&self.exchange).is_none() {
            tracing::warn!(exchange = %self.exchange, "No trader for strategy exchange");
            return;
        }
        for key in &self.follows {
            ctx.query_position(key);
        }
    }
}

impl Strategy for MavgStrategy {
    fn name(&self) -> &str {
        STRATEGY_NAME
    }

    fn init(&mut self, ctx: &mut Context) {
        tracing::info!(
            exchange = %self.exchange,
            instruments = self.follows.len(),
            state = %self.fsm.current(),
            "mavg strategy started"
        );
        self.query_all(ctx);
    }

    /// Hold off while placed orders are unconfirmed, refreshing positions meanwhile
    fn check_feedback(&mut self, ctx: &mut Context) -> bool {
        let pending = ctx.inspect_feedback(STRATEGY_NAME);
        if pending.is_empty() {
            return true;
        }

        for entry in &pending {
            tracing::info!(
                req_serial = entry.req_serial,
                msg_type = ?entry.msg_type,
                checks = entry.check_count,
                "Request still unconfirmed"
            );
        }
        self.query_all(ctx);
        false
    }

    fn on_tick(&mut self, ctx: &mut Context, tick: &Tick) {
        if !self.follow_set.contains(&tick.key) {
            return;
        }
        self.fsm.data_mut().clock = tick.timestamp_secs();
        self.fsm.call(ctx, tick);
    }

    fn release(&mut self, _ctx: &mut Context) {
        let totals = self.stats().totals();
        tracing::info!(
            opens = totals.opens,
            closes = totals.closes,
            wins = totals.wins,
            losses = totals.losses,
            state = %self.fsm.current(),
            "mavg strategy stopped"
        );
    }
}
