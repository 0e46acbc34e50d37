use super::stats::TradeStats;
use super::STRATEGY_NAME;
use crate::config::MavgSettings;
use crate::engine::Context;
use crate::execution::OrderCommand;
use crate::models::{OrderType, Position, PositionSide, PriceType, Signal, Tick};
use crate::strategy::{EventCompose, FsmState, StateId};
use std::fmt;

/// Behavioural modes of the moving-average strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MavgState {
    /// Opens on signals when flat, closes on exits
    Normal,
    /// Close-only while the balance is too small to open
    Defense,
    /// No orders until the cool-down has passed
    Shutdown,
}

impl StateId for MavgState {
    const ALL: &'static [Self] = &[MavgState::Normal, MavgState::Defense, MavgState::Shutdown];
}

impl fmt::Display for MavgState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MavgState::Normal => "normal",
            MavgState::Defense => "defense",
            MavgState::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// Data shared by every mavg state
#[derive(Debug, Clone)]
pub struct MavgData {
    pub settings: MavgSettings,
    pub stats: TradeStats,
    /// Time of the tick being evaluated, in seconds
    pub clock: i64,
}

impl MavgData {
    pub fn new(settings: MavgSettings) -> Self {
        let stats = TradeStats::new(settings.symbols.iter().cloned(), settings.loss_limit_step);
        Self {
            settings,
            stats,
            clock: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Long,
    Short,
}

impl Side {
    fn of(self, position: &Position) -> &PositionSide {
        match self {
            Side::Long => &position.long,
            Side::Short => &position.short,
        }
    }

    fn open_signal(self) -> Signal {
        match self {
            Side::Long => Signal::Buy,
            Side::Short => Signal::Sell,
        }
    }

    fn close_signal(self) -> Signal {
        match self {
            Side::Long => Signal::Sell,
            Side::Short => Signal::Buy,
        }
    }

    fn open_type(self) -> OrderType {
        match self {
            Side::Long => OrderType::OpenLong,
            Side::Short => OrderType::OpenShort,
        }
    }

    fn close_type(self) -> OrderType {
        match self {
            Side::Long => OrderType::CloseLong,
            Side::Short => OrderType::CloseShort,
        }
    }
}

/// Held side has crossed the stop-loss or take-profit rate
fn exit_reached(side: &PositionSide, settings: &MavgSettings) -> bool {
    side.float_profit_rate <= settings.stop_loss_rate
        || side.float_profit_rate >= settings.take_profit_rate
}

/// Close the whole available amount of `side` at market
fn close_side(ctx: &mut Context, compose: &EventCompose, data: &mut MavgData, side: Side, held: &PositionSide) {
    let amount = held.available.floor() as i64;
    if amount <= 0 {
        return;
    }

    let cmd = OrderCommand {
        key: compose.key.clone(),
        order_type: side.close_type(),
        price_type: PriceType::Market,
        price: 0.0,
        amount,
        vol: 0.0,
        lever: data.settings.lever,
    };
    if ctx.place_order(STRATEGY_NAME, &cmd).is_some() {
        data.stats.record_close(&compose.key.symbol, held.float_profit);
    }
}

/// Open `side` sized from the balance; returns true when an order went out
fn open_side(ctx: &mut Context, tick: &Tick, compose: &EventCompose, data: &mut MavgData, side: Side) -> bool {
    let settings = &data.settings;
    let (price, price_type) = if settings.market_orders {
        (0.0, PriceType::Market)
    } else {
        (tick.last, PriceType::Limit)
    };

    let vol = (compose.balance * settings.step_rate).clamp(settings.min_vol, settings.max_vol);
    let Some(amount) = ctx.contract_amount(&compose.key.exchange, &compose.key.symbol, tick.last, vol) else {
        tracing::debug!(instrument = %compose.key, vol, "Volume too small for one contract");
        return false;
    };

    let cmd = OrderCommand {
        key: compose.key.clone(),
        order_type: side.open_type(),
        price_type,
        price,
        amount,
        vol,
        lever: settings.lever,
    };
    if ctx.place_order(STRATEGY_NAME, &cmd).is_none() {
        return false;
    }
    data.stats.record_open(&compose.key.symbol);
    true
}

/// Valid position snapshot of the compose record
fn valid_position(compose: &EventCompose) -> Option<Position> {
    compose.position.as_ref().filter(|p| p.valid).cloned()
}

/// Trading mode: one position per side, never scaled in
#[derive(Debug, Default)]
pub struct NormalState {
    opens: u32,
}

impl NormalState {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_side(&mut self, ctx: &mut Context, tick: &Tick, compose: &EventCompose, data: &mut MavgData, position: &Position, side: Side) {
        let signal = compose.signal(data.settings.signal_timeframe);
        let held = side.of(position);

        if held.amount <= 0.0 {
            if signal != side.open_signal() {
                return;
            }
            if self.opens >= data.settings.open_limit {
                tracing::info!(instrument = %compose.key, opens = self.opens, "Open limit reached");
                return;
            }
            if open_side(ctx, tick, compose, data, side) {
                self.opens += 1;
            }
            return;
        }

        if exit_reached(held, &data.settings) || signal == side.close_signal() {
            close_side(ctx, compose, data, side, held);
        }
    }
}

impl FsmState<MavgState, MavgData> for NormalState {
    fn id(&self) -> MavgState {
        MavgState::Normal
    }

    fn enter(&mut self, _ctx: &mut Context, _data: &mut MavgData) {
        self.opens = 0;
    }

    fn decide(&mut self, ctx: &mut Context, tick: &Tick, compose: &EventCompose, data: &mut MavgData) -> MavgState {
        if data.stats.over_loss_limit() {
            return MavgState::Shutdown;
        }
        // stale until the pending order's position query comes back
        let Some(position) = valid_position(compose) else {
            return MavgState::Normal;
        };
        if compose.balance < data.settings.min_vol {
            return MavgState::Defense;
        }

        self.handle_side(ctx, tick, compose, data, &position, Side::Long);
        self.handle_side(ctx, tick, compose, data, &position, Side::Short);
        MavgState::Normal
    }
}

/// Close-only mode
#[derive(Debug, Default)]
pub struct DefenseState;

impl FsmState<MavgState, MavgData> for DefenseState {
    fn id(&self) -> MavgState {
        MavgState::Defense
    }

    fn enter(&mut self, _ctx: &mut Context, data: &mut MavgData) {
        tracing::warn!(min_vol = data.settings.min_vol, "Balance below minimum volume, closing only");
    }

    fn decide(&mut self, ctx: &mut Context, _tick: &Tick, compose: &EventCompose, data: &mut MavgData) -> MavgState {
        if data.stats.over_loss_limit() {
            return MavgState::Shutdown;
        }
        let Some(position) = valid_position(compose) else {
            return MavgState::Defense;
        };

        let signal = compose.signal(data.settings.signal_timeframe);
        for side in [Side::Long, Side::Short] {
            let held = side.of(&position);
            if held.amount > 0.0 && (exit_reached(held, &data.settings) || signal == side.close_signal()) {
                close_side(ctx, compose, data, side, held);
            }
        }

        if compose.balance >= data.settings.min_vol {
            return MavgState::Normal;
        }
        MavgState::Defense
    }
}

/// Halt after too many losing trades
#[derive(Debug, Default)]
pub struct ShutdownState {
    since: i64,
    shutdowns: u32,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdowns(&self) -> u32 {
        self.shutdowns
    }
}

impl FsmState<MavgState, MavgData> for ShutdownState {
    fn id(&self) -> MavgState {
        MavgState::Shutdown
    }

    fn enter(&mut self, _ctx: &mut Context, data: &mut MavgData) {
        self.since = data.clock;
        self.shutdowns += 1;
        data.stats.raise_loss_limit();
        tracing::warn!(
            shutdowns = self.shutdowns,
            losses = data.stats.totals().losses,
            next_limit = data.stats.loss_limit(),
            "Loss limit reached, trading halted"
        );
    }

    fn decide(&mut self, _ctx: &mut Context, tick: &Tick, _compose: &EventCompose, data: &mut MavgData) -> MavgState {
        if tick.timestamp_secs() - self.since >= data.settings.cooldown_secs {
            return MavgState::Normal;
        }
        MavgState::Shutdown
    }
}
