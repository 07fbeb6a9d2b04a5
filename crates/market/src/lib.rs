pub mod iterator;
pub mod market;

pub use iterator::CandlestickIterator;
pub use market::Market;

pub use candle_feed_core::config::MarketConfig;
pub use candle_feed_core::errors::Error;
pub use candle_feed_core::interval::CandleInterval;
pub use candle_feed_core::model::{Candlestick, MarketSource, MarketType};
