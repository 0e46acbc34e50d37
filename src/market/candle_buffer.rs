use crate::indicators::{calculate_sma, MaGraph, FAST_PERIOD, SLOW_PERIOD};
use crate::models::{format_ts, Candle, InstrumentKey, Timeframe};
use crate::series::Ring;
use std::collections::HashMap;

/// What a sample did to the bar series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarUpdate {
    /// A new bar was appended and the derived lines recomputed
    Appended,
    /// The sample refined the newest bar in place
    Merged,
    /// Older than the newest bar; discarded
    Dropped,
    /// Timeframe not configured for aggregation
    Untracked,
}

#[derive(Debug, Clone)]
struct BarSeries {
    bars: Ring<Candle>,
    graph: MaGraph,
}

impl BarSeries {
    fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            bars: Ring::with_capacity(capacity),
            graph: MaGraph::new(timeframe, capacity),
        }
    }
}

/// In-memory bar buffer for candle data
///
/// Keeps a bounded bar ring and a moving-average graph for each instrument and
/// configured timeframe. Owned by the dispatch worker, so no locking.
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    timeframes: Vec<Timeframe>,
    capacity: usize,
    data: HashMap<(InstrumentKey, Timeframe), BarSeries>,
    dropped_samples: u64,
}

impl CandleBuffer {
    /// Create a new candle buffer
    ///
    /// # Arguments
    /// * `timeframes` - Timeframes to aggregate; samples for others are ignored
    /// * `capacity` - Maximum number of bars (and line points) kept per series
    pub fn new(timeframes: &[Timeframe], capacity: usize) -> Self {
        Self {
            timeframes: timeframes.to_vec(),
            capacity,
            data: HashMap::new(),
            dropped_samples: 0,
        }
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Feed one candle sample
    ///
    /// A sample less than one timeframe after the newest bar replaces that bar; later
    /// samples append a new bar and extend the MA7/MA30 lines.
    pub fn add_sample(
        &mut self,
        key: &InstrumentKey,
        timeframe: Timeframe,
        candle: Candle,
    ) -> BarUpdate {
        if !self.timeframes.contains(&timeframe) {
            return BarUpdate::Untracked;
        }

        let capacity = self.capacity;
        let series = self
            .data
            .entry((key.clone(), timeframe))
            .or_insert_with(|| BarSeries::new(timeframe, capacity));

        if let Some(last) = series.bars.last() {
            let elapsed = candle.timestamp - last.timestamp;
            if elapsed < 0 {
                self.dropped_samples += 1;
                tracing::debug!(
                    instrument = %key,
                    timeframe = %timeframe,
                    time = %format_ts(candle.timestamp),
                    last = %format_ts(last.timestamp),
                    "Dropping out-of-order candle"
                );
                return BarUpdate::Dropped;
            }

            if elapsed < timeframe.duration_secs() {
                series.bars.replace_last(candle);
                series.graph.set_last_bar_timestamp(candle.timestamp);
                return BarUpdate::Merged;
            }
        }

        series.bars.push(candle);
        series.graph.set_last_bar_timestamp(candle.timestamp);

        tracing::debug!(
            instrument = %key,
            timeframe = %timeframe,
            close = candle.close,
            time = %format_ts(candle.timestamp),
            "New bar"
        );

        let closes = || series.bars.iter().rev().map(|c| c.close);
        let fast = calculate_sma(closes(), FAST_PERIOD);
        let slow = calculate_sma(closes(), SLOW_PERIOD);

        if let Some(fast) = fast {
            series.graph.update_fast(fast, candle.timestamp);
            tracing::debug!(instrument = %key, timeframe = %timeframe, ma7 = fast, "New fast MA point");
        }
        if let Some(slow) = slow {
            series.graph.update_slow(slow, candle.timestamp);
            tracing::debug!(instrument = %key, timeframe = %timeframe, ma30 = slow, "New slow MA point");
        }
        if let (Some(fast), Some(slow)) = (fast, slow) {
            series.graph.update_diff((fast - slow).abs(), candle.timestamp);
            series.graph.try_cross_point();
        }

        BarUpdate::Appended
    }

    /// Moving-average graph for an instrument and timeframe
    pub fn graph(&self, key: &InstrumentKey, timeframe: Timeframe) -> Option<&MaGraph> {
        self.data
            .get(&(key.clone(), timeframe))
            .map(|series| &series.graph)
    }

    /// Bars for an instrument and timeframe, oldest first
    pub fn bars(&self, key: &InstrumentKey, timeframe: Timeframe) -> Option<&Ring<Candle>> {
        self.data
            .get(&(key.clone(), timeframe))
            .map(|series| &series.bars)
    }

    pub fn last_bar(&self, key: &InstrumentKey, timeframe: Timeframe) -> Option<&Candle> {
        self.bars(key, timeframe).and_then(|bars| bars.last())
    }

    pub fn bar_count(&self, key: &InstrumentKey, timeframe: Timeframe) -> usize {
        self.bars(key, timeframe).map(|bars| bars.len()).unwrap_or(0)
    }

    /// Out-of-order samples discarded so far
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}
