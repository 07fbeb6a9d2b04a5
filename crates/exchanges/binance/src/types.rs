use candle_feed_core::errors::Error;
use candle_feed_core::model::Candlestick;
use serde::Deserialize;

/// One kline row, the documented ordered 12-tuple:
/// `[openTimeMs, open, high, low, close, volume, closeTimeMs, quoteVolume,
/// tradeCount, takerBaseVolume, takerQuoteVolume, ignored]`.
/// Deserializing into the tuple enforces both arity and per-position types.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceKline(
    pub i64,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub i64,
    pub String,
    pub i64,
    pub String,
    pub String,
    pub serde_json::Value,
);

impl BinanceKline {
    pub fn to_candlestick(&self) -> Result<Candlestick, Error> {
        // Volume is parsed for shape validation only; it is not surfaced.
        parse_price(&self.5, "volume")?;
        Ok(Candlestick {
            timestamp: self.0.div_euclid(1000),
            open: parse_price(&self.1, "open")?,
            high: parse_price(&self.2, "high")?,
            low: parse_price(&self.3, "low")?,
            close: parse_price(&self.4, "close")?,
        })
    }
}

fn parse_price(raw: &str, field: &str) -> Result<f64, Error> {
    raw.parse::<f64>().map_err(|_| Error::InvalidJSONResponse {
        detail: format!("non-numeric {field} field: {raw}"),
    })
}

/// Error envelope, e.g. `{"code":-1121,"msg":"Invalid symbol."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceErrorResponse {
    pub code: i64,
    pub msg: String,
}
