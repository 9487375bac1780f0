//! Caching layer for market data to reduce provider calls
//!
//! Values are cached as JSON so one cache type serves every endpoint.
//! Only `Ok(Some(_))` results are stored: an error or an empty answer is
//! retried on the next request.

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::api::{
    CompanyInfo, Financials, MarketDataProvider, NewsItem, PriceBar, Quote, ThrottledDataProvider,
};
use crate::config::AnalysisConfig;
use crate::error::Result;

/// Cache key for market data requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Stock symbol
    pub symbol: String,
    /// Provider endpoint
    pub endpoint: &'static str,
    /// Extra parameters, e.g. "6mo/1d" for history
    pub params: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(symbol: &str, endpoint: &'static str, params: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            endpoint,
            params: params.into(),
        }
    }
}

/// Thread-safe cache for market data
#[derive(Clone)]
pub struct StockCache {
    cache: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl StockCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or run `fetcher`, caching only present values
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(value) = self.get(&key).await {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    debug!(symbol = %key.symbol, endpoint = key.endpoint, "cache hit");
                    return Ok(Some(hit));
                }
                Err(e) => debug!(error = %e, "discarding undecodable cache entry"),
            }
        }

        debug!(symbol = %key.symbol, endpoint = key.endpoint, "cache miss");
        let fetched = fetcher().await?;
        if let Some(value) = &fetched {
            self.insert(key, serde_json::to_value(value)?).await;
        }
        Ok(fetched)
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Multi-tiered cache system for different data types
#[derive(Clone)]
pub struct CacheManager {
    /// Quotes and price history, short TTL
    pub realtime: StockCache,
    /// Company info and financials, long TTL
    pub fundamental: StockCache,
    /// News, medium TTL
    pub news: StockCache,
}

impl CacheManager {
    /// Create a new cache manager with specified TTLs
    pub fn new(realtime_ttl: Duration, fundamental_ttl: Duration, news_ttl: Duration) -> Self {
        Self {
            realtime: StockCache::new(realtime_ttl),
            fundamental: StockCache::new(fundamental_ttl),
            news: StockCache::new(news_ttl),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.cache_ttl_realtime,
            config.cache_ttl_fundamental,
            config.cache_ttl_news,
        )
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.realtime.clear().await;
        self.fundamental.clear().await;
        self.news.clear().await;
    }
}

/// A [`MarketDataProvider`] with a TTL cache in front
pub struct CachedDataProvider<P> {
    inner: P,
    caches: CacheManager,
}

impl<P: MarketDataProvider> CachedDataProvider<P> {
    pub fn new(inner: P, caches: CacheManager) -> Self {
        Self { inner, caches }
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for CachedDataProvider<P> {
    async fn get_info(&self, symbol: &str) -> Result<Option<CompanyInfo>> {
        self.caches
            .fundamental
            .get_or_fetch(CacheKey::new(symbol, "info", ""), || {
                self.inner.get_info(symbol)
            })
            .await
    }

    async fn get_financials(&self, symbol: &str) -> Result<Option<Financials>> {
        self.caches
            .fundamental
            .get_or_fetch(CacheKey::new(symbol, "financials", ""), || {
                self.inner.get_financials(symbol)
            })
            .await
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        self.caches
            .realtime
            .get_or_fetch(CacheKey::new(symbol, "quote", ""), || {
                self.inner.get_quote(symbol)
            })
            .await
    }

    async fn get_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<Vec<PriceBar>>> {
        let key = CacheKey::new(symbol, "history", format!("{period}/{interval}"));
        self.caches
            .realtime
            .get_or_fetch(key, || self.inner.get_history(symbol, period, interval))
            .await
    }

    async fn get_news(&self, symbol: &str) -> Result<Option<Vec<NewsItem>>> {
        self.caches
            .news
            .get_or_fetch(CacheKey::new(symbol, "news", ""), || {
                self.inner.get_news(symbol)
            })
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Provider stack for `config`: the TTL cache in front, and the outbound
/// throttle behind it when `data_rate_per_sec` is set, so cache hits never wait
pub fn layered_provider<P>(inner: P, config: &AnalysisConfig) -> Arc<dyn MarketDataProvider>
where
    P: MarketDataProvider + 'static,
{
    let caches = CacheManager::from_config(config);
    match config.data_rate_per_sec {
        Some(rate) => {
            debug!(provider = inner.name(), rate = rate.get(), "throttling market data calls");
            Arc::new(CachedDataProvider::new(
                ThrottledDataProvider::new(inner, rate),
                caches,
            ))
        }
        None => Arc::new(CachedDataProvider::new(inner, caches)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DataError;
    use std::num::NonZeroU32;
    use tokio_test::assert_err;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls; answers `None` for "EMPTY", errors for "FAIL"
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn answer<T>(&self, symbol: &str, value: T) -> Result<Option<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "EMPTY" => Ok(None),
                "FAIL" => Err(DataError::ApiError("boom".to_string())),
                _ => Ok(Some(value)),
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for CountingProvider {
        async fn get_info(&self, symbol: &str) -> Result<Option<CompanyInfo>> {
            self.answer(
                symbol,
                CompanyInfo {
                    symbol: symbol.to_string(),
                    ..CompanyInfo::default()
                },
            )
        }

        async fn get_financials(&self, symbol: &str) -> Result<Option<Financials>> {
            self.answer(symbol, Financials::default())
        }

        async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
            self.answer(
                symbol,
                Quote {
                    symbol: symbol.to_string(),
                    price: 150.0,
                    change_percent: None,
                    volume: None,
                    timestamp: chrono::Utc::now(),
                },
            )
        }

        async fn get_history(
            &self,
            symbol: &str,
            _period: &str,
            _interval: &str,
        ) -> Result<Option<Vec<PriceBar>>> {
            self.answer(symbol, Vec::new())
        }

        async fn get_news(&self, symbol: &str) -> Result<Option<Vec<NewsItem>>> {
            self.answer(symbol, Vec::new())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn cached() -> CachedDataProvider<CountingProvider> {
        CachedDataProvider::new(
            CountingProvider::default(),
            CacheManager::new(
                Duration::from_secs(60),
                Duration::from_secs(3600),
                Duration::from_secs(300),
            ),
        )
    }

    #[test]
    fn test_cache_key_normalizes_symbol() {
        let key = CacheKey::new("aapl", "history", "6mo/1d");
        assert_eq!(key.symbol, "AAPL");
        assert_eq!(key, CacheKey::new("AAPL", "history", "6mo/1d"));
        assert_ne!(key, CacheKey::new("AAPL", "history", "1y/1d"));
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let provider = cached();
        let first = provider.get_quote("AAPL").await.unwrap().unwrap();
        let second = provider.get_quote("aapl").await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.caches().realtime.len().await, 1);
    }

    #[tokio::test]
    async fn test_errors_and_empty_answers_are_not_cached() {
        let provider = cached();
        assert_err!(provider.get_info("FAIL").await);
        assert_err!(provider.get_info("FAIL").await);
        assert_eq!(provider.get_info("EMPTY").await.unwrap(), None);
        assert_eq!(provider.get_info("EMPTY").await.unwrap(), None);

        assert_eq!(provider.inner.calls.load(Ordering::SeqCst), 4);
        assert!(provider.caches().fundamental.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let provider = cached();
        provider.get_info("AAPL").await.unwrap();
        provider.get_news("AAPL").await.unwrap();
        assert_eq!(provider.caches().news.len().await, 1);

        provider.caches().clear_all().await;
        assert!(provider.caches().fundamental.is_empty().await);
        assert!(provider.caches().news.is_empty().await);
    }

    #[tokio::test]
    async fn test_layered_provider_throttles_misses_only() {
        let config = AnalysisConfig::builder()
            .data_rate_per_sec(NonZeroU32::new(2).unwrap())
            .build()
            .unwrap();
        let provider = layered_provider(CountingProvider::default(), &config);
        assert_eq!(provider.name(), "counting");

        let started = std::time::Instant::now();
        provider.get_quote("AAPL").await.unwrap();
        provider.get_quote("MSFT").await.unwrap();
        // Burst spent; the third miss waits for the next slot
        provider.get_quote("NVDA").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(400));

        let hit = std::time::Instant::now();
        provider.get_quote("AAPL").await.unwrap();
        assert!(hit.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_layered_provider_without_rate_is_cached() {
        let provider = layered_provider(CountingProvider::default(), &AnalysisConfig::default());
        let first = provider.get_info("AAPL").await.unwrap();
        assert_eq!(provider.get_info("AAPL").await.unwrap(), first);
        assert_eq!(provider.name(), "counting");
    }
}
