use std::collections::VecDeque;
use std::sync::Arc;

use candle_feed_cache::CandlestickCache;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, MarketSource, Metric};
use candle_feed_core::normalize::normalize_timestamp;
use candle_feed_core::time;
use candle_feed_exchanges_common::{request_with_retries, CandlestickProvider, RetryConfig};
use chrono::{DateTime, Utc};
use tracing::warn;

type TimeNowFn = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Lazy pull iterator over a `(market, start, interval)` request.
///
/// Each `next()` yields exactly the candle after the previous one: strictly
/// increasing timestamps, spaced by exactly one interval, starting at the
/// normalized start time. Behind that contract it buffers one exchange
/// batch, consults the shared cache first, refuses to ask the exchange for a
/// candle that cannot have closed yet, and repairs whatever paging and
/// ordering quirks the provider exhibits.
///
/// Not safe for concurrent `next()` calls; treat an iterator as an owned,
/// single-threaded object.
pub struct CandlestickIterator {
    market: MarketSource,
    interval: CandleInterval,
    metric: Metric,
    provider: Arc<dyn CandlestickProvider>,
    cache: CandlestickCache,
    retry: RetryConfig,
    debug: bool,
    time_now: TimeNowFn,
    start_time: DateTime<Utc>,
    start_from_next: bool,
    last_ts: i64,
    buffer: VecDeque<Candlestick>,
    last_error: Option<Error>,
    has_started: bool,
}

impl std::fmt::Debug for CandlestickIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandlestickIterator")
            .field("market", &self.market)
            .field("interval", &self.interval)
            .field("metric", &self.metric)
            .field("debug", &self.debug)
            .field("start_time", &self.start_time)
            .field("start_from_next", &self.start_from_next)
            .field("last_ts", &self.last_ts)
            .field("buffer", &self.buffer)
            .field("last_error", &self.last_error)
            .field("has_started", &self.has_started)
            .finish()
    }
}

impl CandlestickIterator {
    pub(crate) fn new(
        market: MarketSource,
        interval: CandleInterval,
        start_time: DateTime<Utc>,
        provider: Arc<dyn CandlestickProvider>,
        cache: CandlestickCache,
        retry: RetryConfig,
        debug: bool,
    ) -> Self {
        let metric = Metric::new(&market, interval);
        let mut iterator = Self {
            market,
            interval,
            metric,
            provider,
            cache,
            retry,
            debug,
            time_now: Box::new(time::now),
            start_time,
            start_from_next: false,
            last_ts: 0,
            buffer: VecDeque::new(),
            last_error: None,
            has_started: false,
        };
        iterator.reset_position();
        iterator
    }

    /// Resume from the candle after `start_time` instead of the one at it.
    ///
    /// Only valid before the first `next()`; the iterator's position is
    /// derived from the flag at construction order, so flipping it mid-stream
    /// would silently rewind or skip.
    ///
    /// # Panics
    ///
    /// Panics if called after the first `next()`.
    pub fn set_start_from_next(&mut self, start_from_next: bool) {
        if self.has_started {
            panic!("set_start_from_next must be called before the first next()");
        }
        self.start_from_next = start_from_next;
        self.reset_position();
    }

    /// Replace the clock, for deterministic freshness-gate tests.
    pub fn set_time_now_fn(&mut self, f: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) {
        self.time_now = Box::new(f);
    }

    /// Timestamp the next successful `next()` will yield.
    pub fn next_timestamp(&self) -> i64 {
        self.last_ts + self.interval.secs()
    }

    /// The error that terminated the last `scan`, if any.
    pub fn error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Yield the next candlestick.
    pub async fn next(&mut self) -> Result<Candlestick, Error> {
        self.has_started = true;
        let next_ts = self.next_timestamp();

        if self.buffer.is_empty() {
            if let Ok(run) = self.cache.get(&self.metric, next_ts) {
                self.buffer = run.into();
            }
        }
        if let Some(head) = self.buffer.pop_front() {
            return Ok(self.emit(head));
        }

        // Freshness gate: the candle at next_ts closes at next_ts + interval,
        // and the exchange needs `patience` beyond that to publish it. Asking
        // earlier is a guaranteed miss, so don't.
        let now = (self.time_now)().timestamp();
        let patience = self.provider.patience().as_secs() as i64;
        if next_ts > now - patience - self.interval.secs() {
            return Err(self.fail(Error::NoNewTicksYet));
        }

        let provider = Arc::clone(&self.provider);
        let market = self.market.clone();
        let interval = self.interval;
        let result = request_with_retries(
            || {
                let provider = Arc::clone(&provider);
                let market = market.clone();
                async move {
                    provider
                        .request_candlesticks(&market, next_ts, interval)
                        .await
                }
            },
            &self.retry,
            self.debug,
        )
        .await;
        let mut candles = match result {
            Ok(candles) => candles,
            Err(err) => return Err(self.fail(err)),
        };

        // Bitstamp-style past rounding can still hand back earlier candles.
        candles.retain(|candle| candle.timestamp >= next_ts);
        if candles.is_empty() {
            return Err(self.fail(Error::ExchangeReturnedNoTicks));
        }
        if candles[0].timestamp != next_ts {
            return Err(self.fail(Error::ExchangeReturnedOutOfSyncTick {
                expected_ts: next_ts,
                actual_ts: candles[0].timestamp,
            }));
        }

        match self.cache.put(&self.metric, &candles) {
            Ok(()) | Err(Error::CacheNotConfiguredForCandlestickInterval(_)) => {}
            Err(err) => {
                warn!(metric = %self.metric, error = %err, "failed to cache candlestick batch")
            }
        }

        let head = candles.remove(0);
        self.buffer = candles.into();
        Ok(self.emit(head))
    }

    /// `scan`-style convenience: write the next candle into `out` and return
    /// whether one was produced. On `false`, the cause is in [`Self::error`].
    pub async fn scan(&mut self, out: &mut Candlestick) -> bool {
        match self.next().await {
            Ok(candle) => {
                *out = candle;
                true
            }
            Err(_) => false,
        }
    }

    fn emit(&mut self, candle: Candlestick) -> Candlestick {
        self.last_ts = candle.timestamp;
        self.last_error = None;
        candle
    }

    fn fail(&mut self, err: Error) -> Error {
        self.last_error = Some(err.clone());
        err
    }

    fn reset_position(&mut self) {
        let first_ts = normalize_timestamp(self.start_time, self.interval, self.start_from_next);
        self.last_ts = first_ts - self.interval.secs();
    }
}
