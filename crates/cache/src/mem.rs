use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::{Candlestick, Metric};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Number of candle slots per cache bucket. A bucket covers an absolute time
/// range of `BUCKET_SIZE * interval` seconds.
pub const BUCKET_SIZE: usize = 500;

type Bucket = Box<[Candlestick; BUCKET_SIZE]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    metric: String,
    bucket_start: i64,
}

/// Process-wide candlestick cache, shared by every iterator a `Market` hands
/// out. Cheap to clone; clones share storage.
///
/// Candles live in sparse 500-slot buckets keyed by `(metric, bucket start)`.
/// An unwritten slot holds the zero candle, which is why candles with any
/// zero price field are rejected on insertion. Buckets are the unit of LRU
/// eviction, with a separate capacity per configured interval; intervals
/// without a configured capacity are not cached at all.
#[derive(Clone)]
pub struct CandlestickCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    intervals: HashMap<CandleInterval, IntervalCache>,
    hits: DashMap<Metric, u64>,
    misses: DashMap<Metric, u64>,
}

struct IntervalCache {
    capacity: usize,
    state: Mutex<IntervalState>,
}

#[derive(Default)]
struct IntervalState {
    buckets: HashMap<BucketKey, Bucket>,
    // Least-recently-used bucket at the front.
    lru: VecDeque<BucketKey>,
}

/// Hit/miss totals and per-interval bucket counts.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub buckets: HashMap<CandleInterval, usize>,
}

impl CandlestickCache {
    /// Build a cache with the given per-interval capacities, in buckets.
    pub fn new(cache_sizes: &HashMap<CandleInterval, usize>) -> Self {
        let intervals = cache_sizes
            .iter()
            .map(|(interval, capacity)| {
                (
                    *interval,
                    IntervalCache {
                        capacity: (*capacity).max(1),
                        state: Mutex::new(IntervalState::default()),
                    },
                )
            })
            .collect();
        Self {
            inner: Arc::new(CacheInner {
                intervals,
                hits: DashMap::new(),
                misses: DashMap::new(),
            }),
        }
    }

    /// Insert a batch of candlesticks.
    ///
    /// The batch must be strictly ascending with exact interval spacing,
    /// contain no zero price fields, and start on an interval boundary.
    /// Batches that straddle a bucket boundary spill into the next bucket
    /// naturally.
    pub fn put(&self, metric: &Metric, candles: &[Candlestick]) -> Result<(), Error> {
        let Some(first) = candles.first() else {
            return Ok(());
        };
        let interval_cache = self.interval_cache(metric.interval)?;
        let secs = metric.interval.secs();

        for pair in candles.windows(2) {
            if pair[1].timestamp != pair[0].timestamp + secs {
                return Err(Error::ReceivedNonSubsequentCandlestick {
                    expected_ts: pair[0].timestamp + secs,
                    actual_ts: pair[1].timestamp,
                });
            }
        }
        for candle in candles {
            if candle.has_zero_value() {
                return Err(Error::ReceivedCandlestickWithZeroValue {
                    timestamp: candle.timestamp,
                });
            }
        }
        if first.timestamp.rem_euclid(secs) != 0 {
            return Err(Error::TimestampMustBeMultipleOfCandlestickInterval {
                timestamp: first.timestamp,
                interval: metric.interval.to_string(),
            });
        }

        let span = secs * BUCKET_SIZE as i64;
        let mut state = interval_cache
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for candle in candles {
            let bucket_start = candle.timestamp.div_euclid(span) * span;
            let index = ((candle.timestamp - bucket_start) / secs) as usize;
            let key = BucketKey {
                metric: metric.name.clone(),
                bucket_start,
            };
            let bucket = state.bucket_mut(&key, interval_cache.capacity);
            bucket[index] = *candle;
        }
        debug!(metric = %metric, count = candles.len(), "cached candlestick batch");
        Ok(())
    }

    /// Longest contiguous run of cached candles starting exactly at
    /// `start_time`, bounded by the first empty slot or the bucket edge.
    pub fn get(&self, metric: &Metric, start_time: i64) -> Result<Vec<Candlestick>, Error> {
        let interval_cache = self.interval_cache(metric.interval)?;
        let secs = metric.interval.secs();
        if start_time.rem_euclid(secs) != 0 {
            return Err(Error::TimestampMustBeMultipleOfCandlestickInterval {
                timestamp: start_time,
                interval: metric.interval.to_string(),
            });
        }

        let span = secs * BUCKET_SIZE as i64;
        let bucket_start = start_time.div_euclid(span) * span;
        let index = ((start_time - bucket_start) / secs) as usize;
        let key = BucketKey {
            metric: metric.name.clone(),
            bucket_start,
        };

        let mut state = interval_cache
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let run: Option<Vec<Candlestick>> = match state.buckets.get(&key) {
            Some(bucket) if !bucket[index].is_zero() => Some(
                bucket[index..]
                    .iter()
                    .take_while(|candle| !candle.is_zero())
                    .copied()
                    .collect(),
            ),
            _ => None,
        };
        match run {
            Some(run) => {
                state.touch(&key);
                drop(state);
                self.record_hit(metric);
                Ok(run)
            }
            None => {
                drop(state);
                self.record_miss(metric);
                Err(Error::CacheMiss)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let buckets = self
            .inner
            .intervals
            .iter()
            .map(|(interval, cache)| {
                let state = cache
                    .state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                (*interval, state.buckets.len())
            })
            .collect();
        CacheStats {
            hits: self.inner.hits.iter().map(|entry| *entry.value()).sum(),
            misses: self.inner.misses.iter().map(|entry| *entry.value()).sum(),
            buckets,
        }
    }

    fn interval_cache(&self, interval: CandleInterval) -> Result<&IntervalCache, Error> {
        self.inner
            .intervals
            .get(&interval)
            .ok_or_else(|| Error::CacheNotConfiguredForCandlestickInterval(interval.to_string()))
    }

    fn record_hit(&self, metric: &Metric) {
        *self.inner.hits.entry(metric.clone()).or_insert(0) += 1;
    }

    fn record_miss(&self, metric: &Metric) {
        *self.inner.misses.entry(metric.clone()).or_insert(0) += 1;
    }
}

impl IntervalState {
    /// Fetch or create the bucket for `key`, evicting the least recently
    /// used bucket when at capacity.
    fn bucket_mut(&mut self, key: &BucketKey, capacity: usize) -> &mut Bucket {
        if !self.buckets.contains_key(key) {
            while self.buckets.len() >= capacity {
                match self.lru.pop_front() {
                    Some(victim) => {
                        debug!(
                            metric = %victim.metric,
                            bucket_start = victim.bucket_start,
                            "evicting cache bucket"
                        );
                        self.buckets.remove(&victim);
                    }
                    None => break,
                }
            }
            self.buckets
                .insert(key.clone(), Box::new([Candlestick::default(); BUCKET_SIZE]));
        }
        self.touch(key);
        self.buckets
            .get_mut(key)
            .expect("bucket was just inserted or already present")
    }

    fn touch(&mut self, key: &BucketKey) {
        self.lru.retain(|k| k != key);
        self.lru.push_back(key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_feed_core::model::MarketSource;

    fn metric(interval: CandleInterval) -> Metric {
        let market = MarketSource::new("BINANCE", "BTC", "USDT");
        Metric::new(&market, interval)
    }

    fn candle(ts: i64, price: f64) -> Candlestick {
        Candlestick::new(ts, price, price + 1.0, price - 1.0, price + 0.5)
    }

    fn minute_cache(capacity: usize) -> CandlestickCache {
        CandlestickCache::new(&HashMap::from([(CandleInterval::Minutes1, capacity)]))
    }

    #[test]
    fn put_then_get_returns_the_run() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        let batch = vec![candle(60, 10.0), candle(120, 11.0), candle(180, 12.0)];

        cache.put(&metric, &batch).unwrap();
        let run = cache.get(&metric, 60).unwrap();
        assert_eq!(run, batch);

        // Starting mid-run returns the suffix.
        let run = cache.get(&metric, 120).unwrap();
        assert_eq!(run, batch[1..]);
    }

    #[test]
    fn get_stops_at_the_first_empty_slot() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        cache
            .put(&metric, &[candle(60, 10.0), candle(120, 11.0)])
            .unwrap();
        cache.put(&metric, &[candle(240, 13.0)]).unwrap();

        let run = cache.get(&metric, 60).unwrap();
        assert_eq!(run.len(), 2);
    }

    #[test]
    fn miss_on_absent_bucket_and_empty_slot() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        assert_eq!(cache.get(&metric, 60), Err(Error::CacheMiss));

        cache.put(&metric, &[candle(60, 10.0)]).unwrap();
        assert_eq!(cache.get(&metric, 120), Err(Error::CacheMiss));

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn rejects_zero_values() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        let mut bad = candle(120, 11.0);
        bad.low = 0.0;
        let err = cache.put(&metric, &[candle(60, 10.0), bad]).unwrap_err();
        assert_eq!(
            err,
            Error::ReceivedCandlestickWithZeroValue { timestamp: 120 }
        );
    }

    #[test]
    fn rejects_non_subsequent_batches() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        let err = cache
            .put(&metric, &[candle(60, 10.0), candle(240, 11.0)])
            .unwrap_err();
        assert_eq!(
            err,
            Error::ReceivedNonSubsequentCandlestick {
                expected_ts: 120,
                actual_ts: 240
            }
        );
    }

    #[test]
    fn rejects_misaligned_first_timestamp() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        let err = cache.put(&metric, &[candle(90, 10.0)]).unwrap_err();
        assert!(matches!(
            err,
            Error::TimestampMustBeMultipleOfCandlestickInterval { timestamp: 90, .. }
        ));
    }

    #[test]
    fn unconfigured_interval_is_reported() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Hours1);
        let err = cache.put(&metric, &[candle(3600, 10.0)]).unwrap_err();
        assert_eq!(
            err,
            Error::CacheNotConfiguredForCandlestickInterval("1h".to_string())
        );
    }

    #[test]
    fn runs_do_not_cross_the_bucket_boundary() {
        let cache = minute_cache(10);
        let metric = metric(CandleInterval::Minutes1);
        // Two candles either side of the 500-slot boundary.
        let boundary = 60 * BUCKET_SIZE as i64;
        cache
            .put(
                &metric,
                &[candle(boundary - 60, 10.0), candle(boundary, 11.0)],
            )
            .unwrap();

        let run = cache.get(&metric, boundary - 60).unwrap();
        assert_eq!(run.len(), 1);
        let run = cache.get(&metric, boundary).unwrap();
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn lru_evicts_the_coldest_bucket() {
        let cache = minute_cache(2);
        let metric = metric(CandleInterval::Minutes1);
        let span = 60 * BUCKET_SIZE as i64;
        cache.put(&metric, &[candle(60, 1.0)]).unwrap();
        cache.put(&metric, &[candle(span + 60, 2.0)]).unwrap();

        // Touch the first bucket so the second becomes the LRU victim.
        cache.get(&metric, 60).unwrap();
        cache.put(&metric, &[candle(2 * span + 60, 3.0)]).unwrap();

        assert!(cache.get(&metric, 60).is_ok());
        assert_eq!(cache.get(&metric, span + 60), Err(Error::CacheMiss));
        assert!(cache.get(&metric, 2 * span + 60).is_ok());
    }

    #[test]
    fn stats_count_buckets_per_interval() {
        let cache = CandlestickCache::new(&HashMap::from([
            (CandleInterval::Minutes1, 10),
            (CandleInterval::Hours1, 10),
        ]));
        let minute_metric = metric(CandleInterval::Minutes1);
        cache.put(&minute_metric, &[candle(60, 10.0)]).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.buckets[&CandleInterval::Minutes1], 1);
        assert_eq!(stats.buckets[&CandleInterval::Hours1], 0);
    }
}
