use candle_feed_core::errors::Error;
use candle_feed_core::model::Candlestick;
use serde::Deserialize;

/// Success envelope: `{"data":{"pair":"BTC/USD","ohlc":[…]}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct BitstampOhlcResponse {
    pub data: BitstampOhlcData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampOhlcData {
    #[serde(default)]
    pub pair: Option<String>,
    pub ohlc: Vec<BitstampOhlcEntry>,
}

/// One candle object. Every numeric field arrives as a string. Rows arrive
/// oldest first.
#[derive(Debug, Clone, Deserialize)]
pub struct BitstampOhlcEntry {
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl BitstampOhlcEntry {
    pub fn to_candlestick(&self) -> Result<Candlestick, Error> {
        let timestamp: i64 = self
            .timestamp
            .parse()
            .map_err(|_| Error::InvalidJSONResponse {
                detail: format!("non-numeric candle timestamp: {}", self.timestamp),
            })?;
        parse_field(&self.volume, "volume")?;
        Ok(Candlestick {
            timestamp,
            open: parse_field(&self.open, "open")?,
            high: parse_field(&self.high, "high")?,
            low: parse_field(&self.low, "low")?,
            close: parse_field(&self.close, "close")?,
        })
    }
}

fn parse_field(raw: &str, field: &str) -> Result<f64, Error> {
    raw.parse::<f64>().map_err(|_| Error::InvalidJSONResponse {
        detail: format!("non-numeric {field} field: {raw}"),
    })
}

/// Error envelope: `{"errors":[{"code":…,"field":…,"message":…}]}`. These are
/// documented as request errors, never transient.
#[derive(Debug, Clone, Deserialize)]
pub struct BitstampErrorResponse {
    pub errors: Vec<BitstampErrorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitstampErrorEntry {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    pub message: String,
}
