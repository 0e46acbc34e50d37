use crate::config::MavgSettings;
use crate::engine::Context;
use crate::indicators::{CrossDirection, MaLine};
use crate::models::{format_ts, Signal, Tick, Timeframe};
use crate::strategy::{EventCompose, FsmHandler};

const EPSILON: f64 = 1e-7;

/// Copies the cached position and the symbol's balance into the compose record
pub struct PositionHandler;

impl FsmHandler for PositionHandler {
    fn name(&self) -> &str {
        "position"
    }

    fn on_tick(&mut self, ctx: &mut Context, tick: &Tick, compose: &mut EventCompose) {
        let keeper = ctx.keeper();
        compose.position = keeper.position(&tick.key).cloned();
        if let Some(money) = keeper.money(&tick.key.exchange, &tick.key.symbol) {
            compose.balance = money.balance;
            compose.rights = money.rights;
        }
    }
}

/// Slope thresholds of the moving-average signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub fast_slope: f64,
    pub slow_slope: f64,
    pub diff_slope: f64,
    pub min_diff: f64,
}

impl From<&MavgSettings> for SignalThresholds {
    fn from(settings: &MavgSettings) -> Self {
        Self {
            fast_slope: settings.fast_slope,
            slow_slope: settings.slow_slope,
            diff_slope: settings.diff_slope,
            min_diff: settings.min_diff,
        }
    }
}

/// Indicator snapshot the signal is derived from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaReading {
    pub fast_slope: f64,
    pub slow_slope: f64,
    pub diff_slope: f64,
    /// Latest |fast - slow|
    pub gap: f64,
    pub last_crossing: Option<CrossDirection>,
}

/// Turn a moving-average reading into a trading signal
///
/// Steep slopes in one direction confirm a trend; with a crossing on record the
/// crossing must agree and the lines must be apart by `min_diff`. Turning points
/// (the fast line against the slow one while the gap is closing) override the trend.
/// Without any crossing, only a widening gap produces a signal.
pub fn classify(reading: &MaReading, limits: &SignalThresholds) -> Signal {
    let MaReading {
        fast_slope: fast,
        slow_slope: slow,
        diff_slope: diff,
        gap,
        last_crossing,
    } = *reading;

    if fast.abs() < EPSILON || slow.abs() < EPSILON || gap.abs() < EPSILON {
        return Signal::Hold;
    }

    let rising = fast >= limits.fast_slope && slow > limits.slow_slope;
    let falling = fast <= -limits.fast_slope && slow < -limits.slow_slope;

    let Some(direction) = last_crossing else {
        if diff <= limits.diff_slope {
            return Signal::Hold;
        }
        if rising {
            return Signal::Buy;
        }
        if falling {
            return Signal::Sell;
        }
        return Signal::Hold;
    };

    let mut signal = Signal::Hold;
    if rising && direction == CrossDirection::BelowToAbove && gap >= limits.min_diff {
        signal = Signal::Buy;
    }
    if falling && direction == CrossDirection::AboveToBelow && gap >= limits.min_diff {
        signal = Signal::Sell;
    }

    let closing = diff < limits.diff_slope;
    if fast < -limits.fast_slope && slow > 0.0 && closing {
        signal = Signal::Sell;
    }
    if fast > limits.fast_slope && slow < 0.0 && closing {
        signal = Signal::Buy;
    }
    signal
}

/// Emits the moving-average signal of one timeframe into the compose record
pub struct MaSignalHandler {
    timeframe: Timeframe,
    slope_bars: u32,
    limits: SignalThresholds,
}

impl MaSignalHandler {
    pub fn new(settings: &MavgSettings) -> Self {
        Self {
            timeframe: settings.signal_timeframe,
            slope_bars: settings.slope_bars,
            limits: SignalThresholds::from(settings),
        }
    }

    fn read(&self, ctx: &Context, compose: &EventCompose) -> Option<MaReading> {
        let graph = ctx.candles().graph(&compose.key, self.timeframe)?;

        // bar time rather than wall time, so replays behave the same
        let ts_end = graph.last_bar_timestamp()?;
        let ts_start = ts_end - i64::from(self.slope_bars) * self.timeframe.duration_secs();

        Some(MaReading {
            fast_slope: graph.slope_in_range(MaLine::Fast, ts_start, ts_end)?,
            slow_slope: graph.slope_in_range(MaLine::Slow, ts_start, ts_end)?,
            diff_slope: graph
                .slope_in_range(MaLine::Diff, ts_start, ts_end)
                .unwrap_or(0.0),
            gap: graph.last_diff_value()?,
            last_crossing: graph.last_crossing().map(|cp| cp.direction),
        })
    }
}

impl FsmHandler for MaSignalHandler {
    fn name(&self) -> &str {
        "ma_signal"
    }

    fn on_tick(&mut self, ctx: &mut Context, _tick: &Tick, compose: &mut EventCompose) {
        let signal = match self.read(ctx, compose) {
            Some(reading) => {
                let signal = classify(&reading, &self.limits);
                if signal != Signal::Hold {
                    let bar_ts = ctx
                        .candles()
                        .graph(&compose.key, self.timeframe)
                        .and_then(|g| g.last_bar_timestamp())
                        .unwrap_or_default();
                    tracing::info!(
                        instrument = %compose.key,
                        timeframe = %self.timeframe,
                        bar = %format_ts(bar_ts),
                        fast_slope = reading.fast_slope,
                        slow_slope = reading.slow_slope,
                        diff_slope = reading.diff_slope,
                        gap = reading.gap,
                        "MA signal {:?}",
                        signal
                    );
                }
                signal
            }
            None => Signal::Hold,
        };
        compose.signals.insert(self.timeframe, signal);
    }
}
