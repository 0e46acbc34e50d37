// Market data module
// Candle aggregation per instrument/timeframe and latest quotes
pub mod candle_buffer;
pub mod quote_board;

pub use candle_buffer::{BarUpdate, CandleBuffer};
pub use quote_board::QuoteBoard;
