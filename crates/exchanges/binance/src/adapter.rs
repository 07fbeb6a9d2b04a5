use crate::types::{BinanceErrorResponse, BinanceKline};
use async_trait::async_trait;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource};
use candle_feed_core::patch::patch_candlestick_holes;
use candle_feed_exchanges_common::{CandlestickProvider, RestClient, StatusCode};
use tokio::sync::Mutex;
use tracing::debug;

pub const BINANCE_SPOT_BASE_URL: &str = "https://api.binance.com";
pub const BINANCE_USDM_FUTURES_BASE_URL: &str = "https://fapi.binance.com";

const PAGE_LIMIT: usize = 1000;
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Binance kline adapter, serving both the spot and the USDM futures API.
/// The two share everything except the base URL, the klines path, and the
/// provider identity.
pub struct BinanceAdapter {
    rest: RestClient,
    futures: bool,
    serializer: Mutex<()>,
}

impl BinanceAdapter {
    pub fn spot() -> Self {
        Self::spot_with_base_url(BINANCE_SPOT_BASE_URL)
    }

    pub fn spot_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            futures: false,
            serializer: Mutex::new(()),
        }
    }

    pub fn usdm_futures() -> Self {
        Self::usdm_futures_with_base_url(BINANCE_USDM_FUTURES_BASE_URL)
    }

    pub fn usdm_futures_with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            rest: RestClient::new(base_url),
            futures: true,
            serializer: Mutex::new(()),
        }
    }

    fn klines_path(&self) -> &'static str {
        if self.futures {
            "/fapi/v1/klines"
        } else {
            "/api/v3/klines"
        }
    }

    /// Binance supports the full interval vocabulary, with codes matching
    /// the canonical renderings.
    fn interval_code(interval: CandleInterval) -> &'static str {
        match interval {
            CandleInterval::Minutes1 => "1m",
            CandleInterval::Minutes3 => "3m",
            CandleInterval::Minutes5 => "5m",
            CandleInterval::Minutes15 => "15m",
            CandleInterval::Minutes30 => "30m",
            CandleInterval::Hours1 => "1h",
            CandleInterval::Hours2 => "2h",
            CandleInterval::Hours4 => "4h",
            CandleInterval::Hours6 => "6h",
            CandleInterval::Hours8 => "8h",
            CandleInterval::Hours12 => "12h",
            CandleInterval::Days1 => "1d",
            CandleInterval::Days3 => "3d",
            CandleInterval::Weeks1 => "1w",
            CandleInterval::Months1 => "1M",
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

#[async_trait]
impl CandlestickProvider for BinanceAdapter {
    fn name(&self) -> &'static str {
        if self.futures {
            "BINANCEUSDMFUTURES"
        } else {
            "BINANCE"
        }
    }

    // The kline API accepts the full interval vocabulary.
    fn supports_interval(&self, _interval: CandleInterval) -> bool {
        true
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

        let query = [
            ("symbol", Self::symbol(market)),
            ("interval", Self::interval_code(interval).to_string()),
            ("startTime", (start_time * 1000).to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response = self.rest.get(self.klines_path(), &query).await?;

        if response.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit {
                retry_after: response.retry_after,
            });
        }
        if response.status == StatusCode::NOT_FOUND {
            return Err(Error::InvalidMarketPair(market.canonical()));
        }
        if !response.is_success() {
            if let Ok(payload) = response.json::<BinanceErrorResponse>() {
                if payload.code == INVALID_SYMBOL_CODE {
                    return Err(Error::InvalidMarketPair(market.canonical()));
                }
                return Err(Error::Exchange {
                    provider: self.name().to_string(),
                    code: Some(payload.code),
                    message: payload.msg,
                    retryable: true,
                });
            }
            return Err(Error::ExecutingRequest {
                detail: format!("unexpected HTTP status {}", response.status),
            });
        }

        let rows: Vec<BinanceKline> = response.json()?;
        let candles = rows
            .iter()
            .map(BinanceKline::to_candlestick)
            .collect::<Result<Vec<_>, _>>()?;
        if candles.is_empty() {
            return Err(Error::OutOfCandlesticks);
        }

        debug!(market = %market, %interval, count = candles.len(), "fetched binance klines");
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
        MarketSource::new("BINANCE", "BTC", "USDT")
    }

    fn kline(ts: i64, open: f64, high: f64, low: f64, close: f64) -> serde_json::Value {
        json!([
            ts * 1000,
            open.to_string(),
            high.to_string(),
            low.to_string(),
            close.to_string(),
            "1500.2",
            ts * 1000 + 3_599_999,
            "32000000.5",
            12345,
            "700.1",
            "15000000.2",
            "0"
        ])
    }

    #[tokio::test]
    async fn requests_klines_with_millisecond_start() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .and(query_param("symbol", "BTCUSDT"))
            .and(query_param("interval", "1h"))
            .and(query_param("startTime", "1657378800000"))
            .and(query_param("limit", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                kline(1657378800, 21585.1, 21639.8, 21524.5, 21538.7),
                kline(1657382400, 21538.6, 21717.0, 21523.2, 21683.5),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let candles = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 1657378800);
        assert_eq!(candles[0].open, 21585.1);
        assert_eq!(candles[1].timestamp, 1657382400);
    }

    #[tokio::test]
    async fn futures_adapter_uses_the_fapi_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/klines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([kline(
                1657378800,
                21585.1,
                21639.8,
                21524.5,
                21538.7
            )])))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::usdm_futures_with_base_url(server.uri());
        assert_eq!(adapter.name(), "BINANCEUSDMFUTURES");
        let candles = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap();
        assert_eq!(candles.len(), 1);
    }

    #[tokio::test]
    async fn invalid_symbol_code_maps_to_invalid_market_pair() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})),
            )
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert_eq!(err, Error::InvalidMarketPair("COIN:BINANCE:BTC-USDT".into()));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unknown_error_code_is_retryable_and_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"code": -1003, "msg": "Too much weight."})),
            )
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.provider_code(), Some(-1003));
    }

    #[tokio::test]
    async fn rate_limit_propagates_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert_eq!(
            err.retry_after(),
            Some(std::time::Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn empty_payload_is_out_of_candlesticks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert_eq!(err, Error::OutOfCandlesticks);
    }

    #[tokio::test]
    async fn malformed_rows_are_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[1657378800000i64, "x"]])))
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let err = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidJSONResponse { .. }));
    }

    #[tokio::test]
    async fn interior_holes_are_patched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                kline(1657378800, 21585.1, 21639.8, 21524.5, 21538.7),
                kline(1657386000, 21683.5, 22000.0, 21660.0, 21872.4),
            ])))
            .mount(&server)
            .await;

        let adapter = BinanceAdapter::spot_with_base_url(server.uri());
        let candles = adapter
            .request_candlesticks(&market(), 1657378800, CandleInterval::Hours1)
            .await
            .unwrap();

        assert_eq!(
            candles.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![1657378800, 1657382400, 1657386000]
        );
        // The filler clones the preceding candle.
        assert_eq!(candles[1].close, 21538.7);
    }
}
