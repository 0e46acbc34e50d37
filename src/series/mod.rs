// Bounded time-series storage shared by candles, moving-average lines and crossings
pub mod ring;

pub use ring::{Ring, TimePoint, Timestamped, DEFAULT_CAPACITY};
