use crate::types::BybitKlineResponse;
use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};
use candle_feed_core::patch::patch_candlestick_holes;
use candle_feed_exchanges_common::{CandlestickProvider, RestClient, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

pub const BYBIT_BASE_URL: &str = "https://api.bybit.com";

const PAGE_LIMIT: usize = 1000;
// Param/symbol errors in the v5 error taxonomy.
const INVALID_REQUEST_CODES: [i64; 2] = [10001, 10002];

/// Bybit v5 spot kline adapter. The exchange returns rows newest-first, so
/// batches are reversed before patching.
pub struct BybitAdapter {
    rest: RestClient,
    serializer: Mutex<()>,
}

impl BybitAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BYBIT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            serializer: Mutex::new(()),
        }
    }

    fn interval_code(&self, interval: CandleInterval) -> Result<&'static str, Error> {
        match interval {
            CandleInterval::Minutes1 => Ok("1"),
            CandleInterval::Minutes3 => Ok("3"),
            CandleInterval::Minutes5 => Ok("5"),
            CandleInterval::Minutes15 => Ok("15"),
            CandleInterval::Minutes30 => Ok("30"),
            CandleInterval::Hours1 => Ok("60"),
            CandleInterval::Hours2 => Ok("120"),
            CandleInterval::Hours4 => Ok("240"),
            CandleInterval::Hours6 => Ok("360"),
            CandleInterval::Hours12 => Ok("720"),
            CandleInterval::Days1 => Ok("D"),
            CandleInterval::Weeks1 => Ok("W"),
            CandleInterval::Months1 => Ok("M"),
            other => Err(Error::UnsupportedCandlestickInterval {
                provider: Some(self.name().to_string()),
                interval: other.to_string(),
            }),
        }
    }

    fn symbol(market: &MarketSource) -> String {
        format!(
            "{}{}",
            market.base_asset.to_uppercase(),
            market.quote_asset.to_uppercase()
        )
    }
}

impl Default for BybitAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandlestickProvider for BybitAdapter {
    fn name(&self) -> &'static str {
        "BYBIT"
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
        let query = [
            ("category", "spot".to_string()),
            ("symbol", Self::symbol(market)),
            ("interval", code.to_string()),
            ("start", (start_time * 1000).to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response = self.rest.get("/v5/market/kline", &query).await?;

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit {
                retry_after: response.retry_after,
            });
        }
        if response.status == StatusCode::NOT_FOUND {
            return Err(Error::InvalidMarketPair(market.canonical()));
        }
        if !response.is_success() {
            return Err(Error::ExecutingRequest {
                detail: format!("unexpected HTTP status {}", response.status),
            });
        }

        let payload: BybitKlineResponse = response.json()?;
        if payload.ret_code != 0 {
            if INVALID_REQUEST_CODES.contains(&payload.ret_code) {
                return Err(Error::InvalidMarketPair(market.canonical()));
            }
            return Err(Error::Exchange {
                provider: self.name().to_string(),
                code: Some(payload.ret_code),
                message: payload.ret_msg,
                retryable: true,
            });
        }

        let rows = payload.result.map(|result| result.list).unwrap_or_default();
        let mut candles = rows
            .iter()
            .map(|row| row.to_candlestick())
            .collect::<Result<Vec<_>, _>>()?;
        // Newest first on the wire.
        candles.reverse();
        if candles.is_empty() {
            return Err(Error::OutOfCandlesticks);
        }

        debug!(market = %market, %interval, count = candles.len(), "fetched bybit klines");
        Ok(patch_candlestick_holes(candles, start_time, interval))
    }
}
