// Technical indicators module
// Moving averages and fast/slow crossing detection

pub mod crossing;
pub mod ma_graph;
pub mod moving_average;

pub use crossing::{intersect, CrossDirection, CrossPoint};
pub use ma_graph::{MaGraph, MaLine, FAST_PERIOD, SLOW_PERIOD};
pub use moving_average::calculate_sma;
