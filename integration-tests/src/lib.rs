//! Shared plumbing for the end-to-end scenarios: a Market wired to a single
//! adapter pointed at a local HTTP double, plus candle assertions.

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use candle_feed::{Market, MarketConfig};
use candle_feed_core::model::Candlestick;
use candle_feed_exchanges_common::CandlestickProvider;

static INIT_TRACING: Once = Once::new();

/// Route `RUST_LOG`-filtered logs to the test output, once per process.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Default config with a single retry attempt and no sleeps, so scenarios
/// can count provider calls exactly.
pub fn single_attempt_config() -> MarketConfig {
    MarketConfig {
        retry_attempts: 1,
        retry_first_sleep: Duration::from_millis(1),
        ..MarketConfig::default()
    }
}

/// A Market whose registry contains exactly the given adapter (registered on
/// top of the defaults, replacing the production endpoint).
pub fn market_with(provider: Arc<dyn CandlestickProvider>, config: MarketConfig) -> Market {
    init_tracing();
    let mut market = Market::with_config(config);
    market.register(provider);
    market
}

/// Assert one candle against `(ts, open, close, low, high)` expectations.
pub fn assert_candle(candle: &Candlestick, ts: i64, open: f64, close: f64, low: f64, high: f64) {
    assert_eq!(candle.timestamp, ts, "timestamp");
    assert_eq!(candle.open, open, "open");
    assert_eq!(candle.close, close, "close");
    assert_eq!(candle.low, low, "low");
    assert_eq!(candle.high, high, "high");
}
