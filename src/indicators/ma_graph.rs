use super::crossing::{intersect, CrossPoint};
use crate::models::{format_ts, Timeframe};
use crate::series::{Ring, TimePoint};

/// Bars averaged by the fast line
pub const FAST_PERIOD: usize = 7;
/// Bars averaged by the slow line
pub const SLOW_PERIOD: usize = 30;

/// Which derived line a query refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaLine {
    Fast,
    Slow,
    /// |fast - slow|
    Diff,
}

/// Fast, slow and diff moving-average lines of one instrument/timeframe, plus the
/// crossings detected between fast and slow
#[derive(Debug, Clone)]
pub struct MaGraph {
    timeframe: Timeframe,
    fast: Ring<TimePoint>,
    slow: Ring<TimePoint>,
    diff: Ring<TimePoint>,
    crossings: Ring<CrossPoint>,
    last_bar_ts: Option<i64>,
}

impl MaGraph {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            timeframe,
            fast: Ring::with_capacity(capacity),
            slow: Ring::with_capacity(capacity),
            diff: Ring::with_capacity(capacity),
            crossings: Ring::with_capacity(capacity),
            last_bar_ts: None,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn line(&self, line: MaLine) -> &Ring<TimePoint> {
        match line {
            MaLine::Fast => &self.fast,
            MaLine::Slow => &self.slow,
            MaLine::Diff => &self.diff,
        }
    }

    pub fn update_fast(&mut self, value: f64, ts: i64) {
        self.fast.push(TimePoint::new(ts, value));
    }

    pub fn update_slow(&mut self, value: f64, ts: i64) {
        self.slow.push(TimePoint::new(ts, value));
    }

    pub fn update_diff(&mut self, value: f64, ts: i64) {
        self.diff.push(TimePoint::new(ts, value));
    }

    pub(crate) fn set_last_bar_timestamp(&mut self, ts: i64) {
        self.last_bar_ts = Some(ts);
    }

    /// Test the newest fast segment against the newest slow segment and record a crossing
    ///
    /// Needs two points on each line; returns the crossing when one was recorded.
    pub fn try_cross_point(&mut self) -> Option<CrossPoint> {
        let fast_end = *self.fast.nth_from_end(0)?;
        let fast_start = *self.fast.nth_from_end(1)?;
        let slow_end = *self.slow.nth_from_end(0)?;
        let slow_start = *self.slow.nth_from_end(1)?;

        let cp = intersect(fast_start, fast_end, slow_start, slow_end)?;

        tracing::info!(
            timeframe = %self.timeframe,
            value = cp.value,
            time = %format_ts(cp.ts),
            direction = %cp.direction,
            "New crossing"
        );

        self.crossings.push(cp);
        Some(cp)
    }

    /// Slope between two points in value per bar
    ///
    /// Zero when both points share a timestamp.
    pub fn slope_factor(&self, head: &TimePoint, tail: &TimePoint) -> f64 {
        let delta_ts = tail.ts - head.ts;
        if delta_ts == 0 {
            return 0.0;
        }
        let bars = delta_ts as f64 / self.timeframe.duration_secs() as f64;
        (tail.value - head.value) / bars
    }

    /// Slope of `line` between its first and last points inside `[ts_start, ts_end]`
    pub fn slope_in_range(&self, line: MaLine, ts_start: i64, ts_end: i64) -> Option<f64> {
        let (head, tail) = self.line(line).range_endpoints(ts_start, ts_end)?;
        Some(self.slope_factor(head, tail))
    }

    pub fn last_crossing(&self) -> Option<&CrossPoint> {
        self.crossings.last()
    }

    /// Crossings inside `[ts_start, ts_end]`, newest first
    pub fn crossings_in_range(&self, ts_start: i64, ts_end: i64) -> Vec<CrossPoint> {
        if ts_end < ts_start {
            return Vec::new();
        }
        self.crossings
            .iter()
            .rev()
            .take_while(|cp| cp.ts >= ts_start)
            .filter(|cp| cp.ts <= ts_end)
            .copied()
            .collect()
    }

    pub fn last_diff_value(&self) -> Option<f64> {
        self.diff.last().map(|p| p.value)
    }

    /// Timestamp of the newest bar, merged or appended
    pub fn last_bar_timestamp(&self) -> Option<i64> {
        self.last_bar_ts
    }

    pub fn crossing_count(&self) -> usize {
        self.crossings.len()
    }
}
