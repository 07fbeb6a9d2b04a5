use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use candle_feed_core::errors::Error;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over `reqwest::Client` shared by every adapter: 10-second
/// request timeout, injectable base URL (tests point it at a local double),
/// and transport-level error classification. Status- and payload-level
/// classification stays in the adapters, whose error vocabularies differ.
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    debug: AtomicBool,
}

/// Raw outcome of one HTTP round-trip.
#[derive(Debug)]
pub struct RestResponse {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build the HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            debug: AtomicBool::new(false),
        }
    }

    pub fn set_debug(&self, debug: bool) {
        self.debug.store(debug, Ordering::Relaxed);
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Issue a GET and hand back status, Retry-After, and the raw body.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<RestResponse, Error> {
        let url = Url::parse(&self.base_url)
            .and_then(|base| base.join(path))
            .map_err(|err| Error::ExecutingRequest {
                detail: format!("invalid request URL: {err}"),
            })?;

        if self.debug() {
            info!(%url, "requesting candlesticks");
        } else {
            debug!(%url, "requesting candlesticks");
        }

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| Error::ExecutingRequest {
                detail: err.to_string(),
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .bytes()
            .await
            .map_err(|err| Error::BrokenBodyResponse {
                detail: err.to_string(),
            })?
            .to_vec();

        Ok(RestResponse {
            status,
            retry_after,
            body,
        })
    }
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body, mapping any mismatch to `InvalidJSONResponse`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|err| Error::InvalidJSONResponse {
            detail: err.to_string(),
        })
    }
}
