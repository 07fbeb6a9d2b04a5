use std::time::Duration;

use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};

/// Common interface for exchange candlestick providers.
///
/// `request_candlesticks` is a single HTTP round-trip returning at most one
/// page of candles in ascending timestamp order, gap-patched and ready for
/// the iterator's alignment check. Implementations hold an internal mutex so
/// at most one request per exchange is in flight per process; the retry
/// driver calls the same entry point on every attempt.
#[async_trait]
pub trait CandlestickProvider: Send + Sync {
    /// Canonical provider key, uppercase (e.g. `BINANCE`).
    fn name(&self) -> &'static str;

    /// Whether the venue's interval vocabulary covers `interval`.
    ///
    /// Consulted at iterator construction so an unsupported combination is a
    /// hard error up front, not something the freshness gate can mask behind
    /// `NoNewTicksYet` until the first request goes out.
    fn supports_interval(&self, interval: CandleInterval) -> bool;

    /// How long after a candle's close the exchange typically needs before
    /// it will return that candle.
    fn patience(&self) -> Duration {
        Duration::ZERO
    }

    /// Toggle per-request INFO logging.
    fn set_debug(&self, _debug: bool) {}

    async fn request_candlesticks(
        &self,
        market: &MarketSource,
        start_time: i64,
        interval: CandleInterval,
    ) -> Result<Vec<Candlestick>, Error>;
}
