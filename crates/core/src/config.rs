use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::interval::CandleInterval;

/// Process-level knobs for a `Market`: per-interval cache capacities (in
/// buckets), retry strategy, and the debug flag that promotes per-request
/// logging to INFO.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// LRU capacity per interval, in 500-slot buckets. Intervals absent from
    /// the map are simply uncached.
    pub cache_sizes: HashMap<CandleInterval, usize>,
    pub retry_attempts: u32,
    pub retry_first_sleep: Duration,
    pub retry_multiplier: f64,
    pub debug: bool,
}

impl MarketConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var("CANDLE_FEED_DEBUG") {
            config.debug = value.parse().unwrap_or(false);
        }
        if let Ok(value) = env::var("CANDLE_FEED_RETRY_ATTEMPTS") {
            config.retry_attempts = value.parse().unwrap_or(config.retry_attempts);
        }
        config
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            cache_sizes: HashMap::from([
                (CandleInterval::Minutes1, 10_000),
                (CandleInterval::Hours1, 1_000),
                (CandleInterval::Days1, 1_000),
            ]),
            retry_attempts: 3,
            retry_first_sleep: Duration::from_secs(1),
            retry_multiplier: 2.0,
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_sizes_match_documented_knobs() {
        let config = MarketConfig::default();
        assert_eq!(config.cache_sizes[&CandleInterval::Minutes1], 10_000);
        assert_eq!(config.cache_sizes[&CandleInterval::Hours1], 1_000);
        assert_eq!(config.cache_sizes[&CandleInterval::Days1], 1_000);
        assert!(!config.cache_sizes.contains_key(&CandleInterval::Months1));
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_first_sleep, Duration::from_secs(1));
    }
}
