use std::time::Duration;

use crate::types::{BitstampErrorResponse, BitstampOhlcResponse};
use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};
use candle_feed_core::normalize::round_up_to_interval;
use candle_feed_core::patch::patch_candlestick_holes;
use candle_feed_exchanges_common::{CandlestickProvider, RestClient, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

pub const BITSTAMP_BASE_URL: &str = "https://www.bitstamp.net";

const PAGE_LIMIT: usize = 1000;

/// Bitstamp adapter. The exchange rounds a mid-interval `start` toward the
/// past, which would hand back candles earlier than requested; the request
/// start is therefore snapped up to the next step boundary first. Pruning in
/// the iterator tolerates the residual drift the exchange occasionally shows
/// anyway.
pub struct BitstampAdapter {
    rest: RestClient,
    serializer: Mutex<()>,
}

impl BitstampAdapter {
    pub fn new() -> Self {
        Self::with_base_url(BITSTAMP_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            serializer: Mutex::new(()),
        }
    }

    /// The `step` query parameter is the interval in seconds, from the
    /// exchange's closed list.
    fn step(&self, interval: CandleInterval) -> Result<i64, Error> {
        match interval {
            CandleInterval::Minutes1
            | CandleInterval::Minutes3
            | CandleInterval::Minutes5
            | CandleInterval::Minutes15
            | CandleInterval::Minutes30
            | CandleInterval::Hours1
            | CandleInterval::Hours2
            | CandleInterval::Hours4
            | CandleInterval::Hours6
            | CandleInterval::Hours12
            | CandleInterval::Days1
            | CandleInterval::Days3 => Ok(interval.secs()),
            other => Err(Error::UnsupportedCandlestickInterval {
                provider: Some(self.name().to_string()),
                interval: other.to_string(),
            }),
        }
    }

    fn pair(market: &MarketSource) -> String {
        format!(
            "{}{}",
            market.base_asset.to_lowercase(),
            market.quote_asset.to_lowercase()
        )
    }
}

impl Default for BitstampAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandlestickProvider for BitstampAdapter {
    fn name(&self) -> &'static str {
        "BITSTAMP"
    }

    fn supports_interval(&self, interval: CandleInterval) -> bool {
        self.step(interval).is_ok()
    }

    fn patience(&self) -> Duration {
        Duration::from_secs(60)
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

        let step = self.step(interval)?;
        let snapped_start = round_up_to_interval(start_time, step);
        let path = format!("/api/v2/ohlc/{}/", Self::pair(market));
        let query = [
            ("step", step.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
            ("start", snapped_start.to_string()),
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
        if let Ok(errors) = response.json::<BitstampErrorResponse>() {
            let message = errors
                .errors
                .iter()
                .map(|entry| entry.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Exchange {
                provider: self.name().to_string(),
                code: None,
                message,
                retryable: false,
            });
        }
        if !response.is_success() {
            return Err(Error::ExecutingRequest {
                detail: format!("unexpected HTTP status {}", response.status),
            });
        }

        let payload: BitstampOhlcResponse = response.json()?;
        let candles = payload
            .data
            .ohlc
            .iter()
            .map(|entry| entry.to_candlestick())
            .collect::<Result<Vec<_>, _>>()?;
        if candles.is_empty() {
            return Err(Error::OutOfCandlesticks);
        }

        debug!(market = %market, %interval, count = candles.len(), "fetched bitstamp ohlc");
        Ok(patch_candlestick_holes(candles, start_time, interval))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn market() -> MarketSource {
        MarketSource::new("BITSTAMP", "BTC", "USD")
    }

    fn entry(ts: i64, open: f64, high: f64, low: f64, close: f64) -> serde_json::Value {
        json!({
            "timestamp": ts.to_string(),
            "open": open.to_string(),
            "high": high.to_string(),
            "low": low.to_string(),
            "close": close.to_string(),
            "volume": "187.31"
        })
    }

    #[tokio::test]
    async fn snaps_the_start_up_to_the_next_boundary() {
        let server = MockServer::start().await;
        // Request start is mid-hour; the adapter must ask for the next
        // boundary, not the raw second.
        Mock::given(method("GET"))
            .and(path("/api/v2/ohlc/btcusd/"))
            .and(query_param("step", "3600"))
            .and(query_param("limit", "1000"))
            .and(query_param("start", "1657382400"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "pair": "BTC/USD",
                    "ohlc": [entry(1657382400, 21539.82, 21703.55, 21530.39, 21691.03)]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = BitstampAdapter::with_base_url(server.uri());
        let candles = adapter
            .request_candlesticks(&market(), 1657378801, CandleInterval::Hours1)
            .await
            .unwrap();
        assert_eq!(candles[0].timestamp, 1657382400);
    }

    #[tokio::test]
    async fn boundary_start_is_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ohlc/btcusd/"))
            .and(query_param("start", "1657378800"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "pair": "BTC/USD",
                    "ohlc": [entry(1657378800, 21591.07, 21643.8, 21530.0, 21535.85)]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = BitstampAdapter::with_base_url(server.uri());
        let candles = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap();
        assert_eq!(candles[0].open, 21591.07);
    }

    #[tokio::test]
    async fn http_404_is_an_invalid_market_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let adapter = BitstampAdapter::with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert_eq!(err, Error::InvalidMarketPair("COIN:BITSTAMP:BTC-USD".into()));
    }

    #[tokio::test]
    async fn documented_errors_are_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": [{"code": "API0021", "field": "step", "message": "Invalid step."}]
            })))
            .mount(&server)
            .await;

        let adapter = BitstampAdapter::with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Invalid step."));
    }

    #[tokio::test]
    async fn weekly_interval_is_unsupported() {
        let adapter = BitstampAdapter::with_base_url("http://unused.invalid");
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Weeks1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedCandlestickInterval { .. }));
    }

    #[test]
    fn patience_is_one_minute() {
        let adapter = BitstampAdapter::new();
        assert_eq!(adapter.patience(), Duration::from_secs(60));
    }
}
