use std::time::Duration;

use thiserror::Error;

// thiserror binds fields by reference inside the generated `Display`.
fn ts(secs: &i64) -> String {
    crate::time::rfc3339(*secs)
}

/// Canonical error taxonomy surfaced to iterator callers.
///
/// Every variant answers two questions the retry driver asks: is the failure
/// worth retrying, and did the exchange dictate how long to wait. Variants are
/// `Clone` so an iterator can hand the same terminal error back on repeated
/// polls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid market type: {0} (only COIN is supported)")]
    InvalidMarketType(String),

    #[error("unsupported candlestick provider: {0}")]
    UnsupportedCandlestickProvider(String),

    #[error("unsupported candlestick interval {interval}{}", .provider.as_deref().map(|p| format!(" for provider {p}")).unwrap_or_default())]
    UnsupportedCandlestickInterval {
        provider: Option<String>,
        interval: String,
    },

    #[error("invalid market pair: {0}")]
    InvalidMarketPair(String),

    #[error("rate limited by the exchange")]
    RateLimit { retry_after: Option<Duration> },

    #[error("error executing request: {detail}")]
    ExecutingRequest { detail: String },

    #[error("broken body in exchange response: {detail}")]
    BrokenBodyResponse { detail: String },

    #[error("invalid JSON in exchange response: {detail}")]
    InvalidJSONResponse { detail: String },

    #[error("exchange {provider} returned an error payload{}: {message}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
    Exchange {
        provider: String,
        code: Option<i64>,
        message: String,
        retryable: bool,
    },

    #[error("exchange ran out of candlesticks")]
    OutOfCandlesticks,

    #[error("no new ticks yet: the next candlestick has not closed long enough ago")]
    NoNewTicksYet,

    #[error("exchange returned no ticks at or after the requested start time")]
    ExchangeReturnedNoTicks,

    #[error("exchange returned out-of-sync tick: expected first timestamp {}, got {}", ts(.expected_ts), ts(.actual_ts))]
    ExchangeReturnedOutOfSyncTick { expected_ts: i64, actual_ts: i64 },

    #[error("cache miss")]
    CacheMiss,

    #[error("cache is not configured for the {0} candlestick interval")]
    CacheNotConfiguredForCandlestickInterval(String),

    #[error("received non-subsequent candlestick: expected timestamp {}, got {}", ts(.expected_ts), ts(.actual_ts))]
    ReceivedNonSubsequentCandlestick { expected_ts: i64, actual_ts: i64 },

    #[error("received candlestick with a zero value at {}", ts(.timestamp))]
    ReceivedCandlestickWithZeroValue { timestamp: i64 },

    #[error("timestamp {} must be a multiple of the {interval} candlestick interval", ts(.timestamp))]
    TimestampMustBeMultipleOfCandlestickInterval { timestamp: i64, interval: String },
}

impl Error {
    /// Whether the retry driver should attempt the request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimit { .. }
            | Error::ExecutingRequest { .. }
            | Error::BrokenBodyResponse { .. }
            | Error::InvalidJSONResponse { .. }
            | Error::OutOfCandlesticks => true,
            Error::Exchange { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Exchange-dictated wait, honored by the retry driver instead of backoff.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Provider-side numeric error code, when one was preserved.
    pub fn provider_code(&self) -> Option<i64> {
        match self {
            Error::Exchange { code, .. } => *code,
            _ => None,
        }
    }
}
