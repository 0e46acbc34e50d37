use serde::{Deserialize, Serialize};

/// Capacity used when nothing else is configured
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Anything stored in a ring that carries a timestamp (seconds)
pub trait Timestamped {
    fn timestamp(&self) -> i64;
}

/// One sample on a line: (timestamp, value)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub ts: i64,
    pub value: f64,
}

impl TimePoint {
    pub fn new(ts: i64, value: f64) -> Self {
        Self { ts, value }
    }
}

impl Timestamped for TimePoint {
    fn timestamp(&self) -> i64 {
        self.ts
    }
}

impl Timestamped for crate::models::Candle {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

/// Fixed-capacity FIFO ring
///
/// Backed by one arena that grows up to `capacity` and is then overwritten in place,
/// oldest slot first. Callers push in non-decreasing timestamp order; the ring does not
/// check it.
#[derive(Debug, Clone)]
pub struct Ring<T> {
    buf: Vec<T>,
    head: usize, // arena index of the oldest element once full
    capacity: usize,
}

impl<T> Ring<T> {
    /// Create a ring holding at most `capacity` elements (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity.min(1024)),
            head: 0,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append, evicting the oldest element when full
    pub fn push(&mut self, value: T) {
        if self.buf.len() < self.capacity {
            self.buf.push(value);
        } else {
            self.buf[self.head] = value;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    fn slot(&self, logical: usize) -> usize {
        (self.head + logical) % self.buf.len()
    }

    /// Element by logical position, 0 being the oldest
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.buf.len() {
            return None;
        }
        Some(&self.buf[self.slot(index)])
    }

    /// The n-th most recent element, 0 being the newest
    pub fn nth_from_end(&self, n: usize) -> Option<&T> {
        let len = self.buf.len();
        if n >= len {
            return None;
        }
        self.get(len - 1 - n)
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.nth_from_end(0)
    }

    /// Overwrite the newest element; returns false on an empty ring
    pub fn replace_last(&mut self, value: T) -> bool {
        if self.buf.is_empty() {
            return false;
        }
        let idx = self.slot(self.buf.len() - 1);
        self.buf[idx] = value;
        true
    }

    /// Oldest to newest; reverse it for newest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        (0..self.buf.len()).map(move |i| &self.buf[self.slot(i)])
    }
}

impl<T: Timestamped> Ring<T> {
    /// Logical index of the first element whose timestamp does not satisfy `before`
    fn partition(&self, before: impl Fn(i64) -> bool) -> usize {
        let (mut lo, mut hi) = (0, self.buf.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if before(self.buf[self.slot(mid)].timestamp()) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// First and last elements with a timestamp inside `[ts_start, ts_end]`
    ///
    /// Binary search over the time-ordered contents. Returns None unless at least two
    /// elements qualify.
    pub fn range_endpoints(&self, ts_start: i64, ts_end: i64) -> Option<(&T, &T)> {
        if ts_end < ts_start {
            return None;
        }

        let first = self.partition(|ts| ts < ts_start);
        let past_end = self.partition(|ts| ts <= ts_end);
        if past_end < first + 2 {
            return None;
        }
        Some((self.get(first)?, self.get(past_end - 1)?))
    }
}
