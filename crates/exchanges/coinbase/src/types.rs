use candle_feed_core::model::Candlestick;
use serde::Deserialize;

/// One candle row: `[time, low, high, open, close, volume]`, all numeric.
/// Rows arrive newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseCandleRow(pub i64, pub f64, pub f64, pub f64, pub f64, pub f64);

impl CoinbaseCandleRow {
    pub fn to_candlestick(&self) -> Candlestick {
        Candlestick {
            timestamp: self.0,
            open: self.3,
            high: self.2,
            low: self.1,
            close: self.4,
        }
    }
}

/// Error envelope, e.g. `{"message":"NotFound"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CoinbaseErrorResponse {
    pub message: String,
}
