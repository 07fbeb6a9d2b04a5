use crate::types::{BitfinexCandlesBody, BitfinexCandleRow};
use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};
use candle_feed_core::patch::patch_candlestick_holes;
use candle_feed_exchanges_common::{CandlestickProvider, RestClient, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

pub const BITFINEX_BASE_URL: &str = "https://api-pub.bitfinex.com";

const PAGE_LIMIT: usize = 1000;

/// Bitfinex public-API adapter. The candle set is addressed in the path
/// (`trade:1h:tBTCUSD`) and `sort=1` makes the exchange return ascending
/// batches directly.
pub struct BitfinexAdapter {
    rest: RestClient,
    serializer: Mutex<()>,
}

impl BitfinexAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BITFINEX_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            serializer: Mutex::new(()),
        }
    }

    fn interval_code(&self, interval: CandleInterval) -> Result<&'static str, Error> {
        match interval {
            CandleInterval::Minutes1 => Ok("1m"),
            CandleInterval::Minutes5 => Ok("5m"),
            CandleInterval::Minutes15 => Ok("15m"),
            CandleInterval::Minutes30 => Ok("30m"),
            CandleInterval::Hours1 => Ok("1h"),
            CandleInterval::Hours6 => Ok("6h"),
            CandleInterval::Hours12 => Ok("12h"),
            CandleInterval::Days1 => Ok("1D"),
            CandleInterval::Weeks1 => Ok("7D"),
            CandleInterval::Months1 => Ok("1M"),
            other => Err(Error::UnsupportedCandlestickInterval {
                provider: Some(self.name().to_string()),
                interval: other.to_string(),
            }),
        }
    }

    fn symbol(market: &MarketSource) -> String {
        format!(
            "t{}{}",
            market.base_asset.to_uppercase(),
            market.quote_asset.to_uppercase()
        )
    }
}

impl Default for BitfinexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandlestickProvider for BitfinexAdapter {
    fn name(&self) -> &'static str {
        "BITFINEX"
    }

    fn supports_interval(&self, interval: CandleInterval) -> bool {
        self.interval_code(interval).is_ok()
    }

    fn set_debug(&self, debug: bool) {
        self.rest.set_debug(debug);
    }

    async fn request_candlesticks(
        &self,
        market: &MarketSource,
        start_time: i64,
        interval: CandleInterval,
    ) -> Result<Vec<Candlestick>, Error> {
        let _serialized = self.serializer.lock().await;

        let code = self.interval_code(interval)?;
        let path = format!("/v2/candles/trade:{}:{}/hist", code, Self::symbol(market));
        let query = [
            ("start", (start_time * 1000).to_string()),
            ("sort", "1".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response = self.rest.get(&path, &query).await?;

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit {
                retry_after: response.retry_after,
            });
        }
        if response.status == StatusCode::NOT_FOUND {
            return Err(Error::InvalidMarketPair(market.canonical()));
        }

        let rows = match response.json::<BitfinexCandlesBody>()? {
            BitfinexCandlesBody::Error(error) => return Err(Error::from(&error)),
            BitfinexCandlesBody::Candles(rows) => rows,
        };
        if !response.is_success() {
            return Err(Error::ExecutingRequest {
                detail: format!("unexpected HTTP status {}", response.status),
            });
        }

        let candles: Vec<Candlestick> =
            rows.iter().map(BitfinexCandleRow::to_candlestick).collect();
        if candles.is_empty() {
            return Err(Error::OutOfCandlesticks);
        }

        debug!(market = %market, %interval, count = candles.len(), "fetched bitfinex candles");
        Ok(patch_candlestick_holes(candles, start_time, interval))
    }
}
