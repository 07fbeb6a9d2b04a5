use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;
use crate::interval::CandleInterval;

/// OHLC summary of one candle interval.
///
/// `timestamp` is whole seconds UTC and always an exact multiple of the
/// interval the candle belongs to. The all-zero candle is reserved as the
/// cache's empty-slot sentinel and is rejected on insertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Candlestick {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candlestick {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// The empty-slot sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Candlestick::default()
    }

    /// True when any price field is zero; such candles would be
    /// indistinguishable from partially-written sentinel slots.
    pub fn has_zero_value(&self) -> bool {
        self.open == 0.0 || self.high == 0.0 || self.low == 0.0 || self.close == 0.0
    }
}

/// Market category. Only spot/futures coin markets are modeled; anything else
/// fails at parse time with [`Error::InvalidMarketType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketType {
    Coin,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Coin => f.write_str("COIN"),
        }
    }
}

impl FromStr for MarketType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("coin") {
            Ok(MarketType::Coin)
        } else {
            Err(Error::InvalidMarketType(s.to_string()))
        }
    }
}

/// Identifies a market on a specific exchange: `(type, provider, base, quote)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketSource {
    pub market_type: MarketType,
    pub provider: String,
    pub base_asset: String,
    pub quote_asset: String,
}

impl MarketSource {
    pub fn new(
        provider: impl Into<String>,
        base_asset: impl Into<String>,
        quote_asset: impl Into<String>,
    ) -> Self {
        Self {
            market_type: MarketType::Coin,
            provider: provider.into(),
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
        }
    }

    /// Canonical rendering, e.g. `COIN:BINANCE:BTC-USDT`. Used as the cache
    /// key prefix and in log lines.
    pub fn canonical(&self) -> String {
        format!(
            "{}:{}:{}-{}",
            self.market_type,
            self.provider.to_uppercase(),
            self.base_asset.to_uppercase(),
            self.quote_asset.to_uppercase()
        )
    }
}

impl fmt::Display for MarketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Cache key prefix: a canonical market rendering plus the candle interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metric {
    pub name: String,
    pub interval: CandleInterval,
}

impl Metric {
    pub fn new(market: &MarketSource, interval: CandleInterval) -> Self {
        Self {
            name: market.canonical(),
            interval,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.interval)
    }
}
