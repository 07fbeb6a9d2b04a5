use crate::types::{CoinbaseCandleRow, CoinbaseErrorResponse};
use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};
use candle_feed_core::patch::patch_candlestick_holes;
use candle_feed_core::time::rfc3339;
use candle_feed_exchanges_common::{CandlestickProvider, RestClient, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

pub const COINBASE_BASE_URL: &str = "https://api.exchange.coinbase.com";

// Coinbase caps a candles request at 300 rows, so the window is bounded
// rather than the row count.
const PAGE_LIMIT: i64 = 300;

/// Coinbase Exchange adapter. Start/end are ISO-8601 instants, granularity
/// is in seconds, and rows arrive newest first.
pub struct CoinbaseAdapter {
    rest: RestClient,
    serializer: Mutex<()>,
}

impl CoinbaseAdapter {
    pub fn new() -> Self {
        Self::with_base_url(COINBASE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            serializer: Mutex::new(()),
        }
    }

    fn granularity(&self, interval: CandleInterval) -> Result<i64, Error> {
        match interval {
            CandleInterval::Minutes1 => Ok(60),
            CandleInterval::Minutes5 => Ok(300),
            CandleInterval::Minutes15 => Ok(900),
            CandleInterval::Hours1 => Ok(3600),
            CandleInterval::Hours6 => Ok(21600),
            CandleInterval::Days1 => Ok(86400),
            other => Err(Error::UnsupportedCandlestickInterval {
                provider: Some(self.name().to_string()),
                interval: other.to_string(),
            }),
        }
    }

    fn product(market: &MarketSource) -> String {
        format!(
            "{}-{}",
            market.base_asset.to_uppercase(),
            market.quote_asset.to_uppercase()
        )
    }
}

impl Default for CoinbaseAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandlestickProvider for CoinbaseAdapter {
    fn name(&self) -> &'static str {
        "COINBASE"
    }

    fn supports_interval(&self, interval: CandleInterval) -> bool {
        self.granularity(interval).is_ok()
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

        let granularity = self.granularity(interval)?;
        let path = format!("/products/{}/candles", Self::product(market));
        let query = [
            ("granularity", granularity.to_string()),
            ("start", rfc3339(start_time)),
            ("end", rfc3339(start_time + PAGE_LIMIT * granularity)),
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
        if !response.is_success() {
            let detail = match response.json::<CoinbaseErrorResponse>() {
                Ok(payload) => payload.message,
                Err(_) => format!("unexpected HTTP status {}", response.status),
            };
            return Err(Error::ExecutingRequest { detail });
        }

        let rows: Vec<CoinbaseCandleRow> = response.json()?;
        let mut candles: Vec<Candlestick> =
            rows.iter().map(CoinbaseCandleRow::to_candlestick).collect();
        // Newest first on the wire.
        candles.reverse();
        if candles.is_empty() {
            return Err(Error::OutOfCandlesticks);
        }

        debug!(market = %market, %interval, count = candles.len(), "fetched coinbase candles");
        Ok(patch_candlestick_holes(candles, start_time, interval))
    }
}
