use std::time::Duration;

use crate::types::KucoinResponse;
use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};
use candle_feed_core::patch::patch_candlestick_holes;
use candle_feed_exchanges_common::{CandlestickProvider, RestClient, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

pub const KUCOIN_BASE_URL: &str = "https://api.kucoin.com";

// A request window covers up to 1500 candles.
const PAGE_LIMIT: i64 = 1500;
const INVALID_SYMBOL_CODE: &str = "400100";
// Documented exchange behavior: back off 11 seconds on a 429, regardless of
// whatever Retry-After header is present.
const RATE_LIMIT_RETRY_AFTER: Duration = Duration::from_secs(11);

/// Kucoin spot adapter. Windows are second-based `startAt`/`endAt` params,
/// rows arrive newest first with close before high/low.
pub struct KucoinAdapter {
    rest: RestClient,
    serializer: Mutex<()>,
}

impl KucoinAdapter {
    pub fn new() -> Self {
        Self::with_base_url(KUCOIN_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            serializer: Mutex::new(()),
        }
    }

    fn interval_code(&self, interval: CandleInterval) -> Result<&'static str, Error> {
        match interval {
            CandleInterval::Minutes1 => Ok("1min"),
            CandleInterval::Minutes3 => Ok("3min"),
            CandleInterval::Minutes5 => Ok("5min"),
            CandleInterval::Minutes15 => Ok("15min"),
            CandleInterval::Minutes30 => Ok("30min"),
            CandleInterval::Hours1 => Ok("1hour"),
            CandleInterval::Hours2 => Ok("2hour"),
            CandleInterval::Hours4 => Ok("4hour"),
            CandleInterval::Hours6 => Ok("6hour"),
            CandleInterval::Hours8 => Ok("8hour"),
            CandleInterval::Hours12 => Ok("12hour"),
            CandleInterval::Days1 => Ok("1day"),
            CandleInterval::Weeks1 => Ok("1week"),
            other => Err(Error::UnsupportedCandlestickInterval {
                provider: Some(self.name().to_string()),
                interval: other.to_string(),
            }),
        }
    }

    fn symbol(market: &MarketSource) -> String {
        format!(
            "{}-{}",
            market.base_asset.to_uppercase(),
            market.quote_asset.to_uppercase()
        )
    }
}

impl Default for KucoinAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandlestickProvider for KucoinAdapter {
    fn name(&self) -> &'static str {
        "KUCOIN"
    }

    fn supports_interval(&self, interval: CandleInterval) -> bool {
        self.interval_code(interval).is_ok()
    }

    fn patience(&self) -> Duration {
        Duration::from_secs(1)
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
        let query = [
            ("type", code.to_string()),
            ("symbol", Self::symbol(market)),
            ("startAt", start_time.to_string()),
            (
                "endAt",
                (start_time + PAGE_LIMIT * interval.secs()).to_string(),
            ),
        ];
        let response = self.rest.get("/api/v1/market/candles", &query).await?;

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit {
                retry_after: Some(RATE_LIMIT_RETRY_AFTER),
            });
        }
        if response.status == StatusCode::NOT_FOUND {
            return Err(Error::InvalidMarketPair(market.canonical()));
        }

        let payload: KucoinResponse = response.json()?;
        if payload.code != "200000" {
            if payload.code == INVALID_SYMBOL_CODE {
                return Err(Error::InvalidMarketPair(market.canonical()));
            }
            return Err(Error::Exchange {
                provider: self.name().to_string(),
                code: payload.code.parse().ok(),
                message: payload.msg.unwrap_or_default(),
                retryable: true,
            });
        }

        let rows = payload.data.unwrap_or_default();
        let mut candles = rows
            .iter()
            .map(|row| row.to_candlestick())
            .collect::<Result<Vec<_>, _>>()?;
        // Newest first on the wire.
        candles.reverse();
        if candles.is_empty() {
            return Err(Error::OutOfCandlesticks);
        }

        debug!(market = %market, %interval, count = candles.len(), "fetched kucoin candles");
        Ok(patch_candlestick_holes(candles, start_time, interval))
    }
}
