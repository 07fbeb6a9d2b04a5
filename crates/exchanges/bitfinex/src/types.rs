use candle_feed_core::errors::Error;
use candle_feed_core::model::Candlestick;
use serde::Deserialize;

/// One candle row: `[mts, open, close, high, low, volume]`, all numeric,
/// close before high/low. With `sort=1` rows arrive oldest first.
#[derive(Debug, Clone, Deserialize)]
pub struct BitfinexCandleRow(pub i64, pub f64, pub f64, pub f64, pub f64, pub f64);

impl BitfinexCandleRow {
    pub fn to_candlestick(&self) -> Candlestick {
        Candlestick {
            timestamp: self.0.div_euclid(1000),
            open: self.1,
            close: self.2,
            high: self.3,
            low: self.4,
        }
    }
}

/// Error payloads are arrays too: `["error", code, message]`.
#[derive(Debug, Clone, Deserialize)]
pub struct BitfinexErrorResponse(pub String, pub i64, pub String);

/// A candles body is either rows or an error triple; the triple is tried
/// first because a row never starts with a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BitfinexCandlesBody {
    Error(BitfinexErrorResponse),
    Candles(Vec<BitfinexCandleRow>),
}

impl From<&BitfinexErrorResponse> for Error {
    fn from(error: &BitfinexErrorResponse) -> Self {
        // 10020: invalid request fields, in practice a bad symbol.
        if error.1 == 10020 {
            Error::InvalidMarketPair(error.2.clone())
        } else {
            Error::Exchange {
                provider: "BITFINEX".to_string(),
                code: Some(error.1),
                message: error.2.clone(),
                retryable: true,
            }
        }
    }
}
