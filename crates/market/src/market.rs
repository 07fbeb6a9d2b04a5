use std::collections::HashMap;
use std::sync::Arc;

use candle_feed_binance::BinanceAdapter;
use candle_feed_bitfinex::BitfinexAdapter;
use candle_feed_bitstamp::BitstampAdapter;
use candle_feed_bybit::BybitAdapter;
use candle_feed_cache::{CacheStats, CandlestickCache};
use candle_feed_coinbase::CoinbaseAdapter;
use candle_feed_core::config::MarketConfig;
use candle_feed_core::errors::Error;
use candle_feed_core::interval::CandleInterval;
use candle_feed_core::model::MarketSource;
use candle_feed_exchanges_common::{CandlestickProvider, RetryConfig};
use candle_feed_kucoin::KucoinAdapter;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::iterator::CandlestickIterator;

/// Registry of candlestick providers plus the shared cache.
///
/// One `Market` lives for the process. Iterators it hands out share the
/// cache and the per-provider adapters, so requests to one exchange are
/// serialized process-wide while different exchanges proceed in parallel.
pub struct Market {
    providers: HashMap<String, Arc<dyn CandlestickProvider>>,
    cache: CandlestickCache,
    config: MarketConfig,
}

impl Market {
    pub fn new() -> Self {
        Self::with_config(MarketConfig::default())
    }

    pub fn with_config(config: MarketConfig) -> Self {
        let mut market = Self {
            providers: HashMap::new(),
            cache: CandlestickCache::new(&config.cache_sizes),
            config,
        };
        market.register(Arc::new(BinanceAdapter::spot()));
        market.register(Arc::new(BinanceAdapter::usdm_futures()));
        market.register(Arc::new(BitfinexAdapter::new()));
        market.register(Arc::new(BitstampAdapter::new()));
        market.register(Arc::new(BybitAdapter::new()));
        market.register(Arc::new(CoinbaseAdapter::new()));
        market.register(Arc::new(KucoinAdapter::new()));
        market
    }

    /// Register (or replace) a provider under its canonical name. Tests use
    /// this to point adapters at local HTTP doubles.
    pub fn register(&mut self, provider: Arc<dyn CandlestickProvider>) {
        provider.set_debug(self.config.debug);
        self.providers
            .insert(provider.name().to_uppercase(), provider);
    }

    /// Canonical names of every registered provider, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Build a lazy iterator over `(market, start_time, interval)`.
    ///
    /// The provider is matched case-insensitively against the registry;
    /// unknown providers and intervals outside the provider's vocabulary
    /// fail here rather than on the first `next()`. The interval check must
    /// happen now: the freshness gate runs before any request, so a
    /// too-recent start would otherwise keep reporting `NoNewTicksYet` for a
    /// combination that can never succeed.
    pub fn candlestick_iterator(
        &self,
        market: MarketSource,
        start_time: DateTime<Utc>,
        interval: CandleInterval,
    ) -> Result<CandlestickIterator, Error> {
        let provider = self
            .providers
            .get(&market.provider.to_uppercase())
            .cloned()
            .ok_or_else(|| Error::UnsupportedCandlestickProvider(market.provider.clone()))?;
        if !provider.supports_interval(interval) {
            return Err(Error::UnsupportedCandlestickInterval {
                provider: Some(provider.name().to_string()),
                interval: interval.to_string(),
            });
        }

        if self.config.debug {
            info!(market = %market, %interval, %start_time, "building candlestick iterator");
        }

        Ok(CandlestickIterator::new(
            market,
            interval,
            start_time,
            provider,
            self.cache.clone(),
            RetryConfig {
                attempts: self.config.retry_attempts,
                first_sleep: self.config.retry_first_sleep,
                multiplier: self.config.retry_multiplier,
            },
            self.config.debug,
        ))
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}
