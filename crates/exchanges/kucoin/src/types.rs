use candle_feed_core::errors::Error;
use candle_feed_core::model::Candlestick;
use serde::Deserialize;

/// Response envelope: `code` is `"200000"` on success, anything else is an
/// error code rendered as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct KucoinResponse {
    pub code: String,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<KucoinCandleRow>>,
}

/// One candle row: `[ts, open, close, high, low, volume, turnover]`, every
/// field a string and — unlike most venues — close before high/low. Rows
/// arrive newest first.
#[derive(Debug, Clone, Deserialize)]
pub struct KucoinCandleRow(
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
    pub String,
);

impl KucoinCandleRow {
    pub fn to_candlestick(&self) -> Result<Candlestick, Error> {
        let timestamp: i64 = self.0.parse().map_err(|_| Error::InvalidJSONResponse {
            detail: format!("non-numeric candle timestamp: {}", self.0),
        })?;
        parse_field(&self.5, "volume")?;
        Ok(Candlestick {
            timestamp,
            open: parse_field(&self.1, "open")?,
            close: parse_field(&self.2, "close")?,
            high: parse_field(&self.3, "high")?,
            low: parse_field(&self.4, "low")?,
        })
    }
}

fn parse_field(raw: &str, field: &str) -> Result<f64, Error> {
    raw.parse::<f64>().map_err(|_| Error::InvalidJSONResponse {
        detail: format!("non-numeric {field} field: {raw}"),
    })
}
