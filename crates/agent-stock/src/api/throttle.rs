//! Outbound rate limiting for data providers
//!
//! Unlike the upstream token bucket, a data provider's quota is something we
//! wait for rather than fail on: each call waits until the limiter admits it.

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::{CompanyInfo, Financials, MarketDataProvider, NewsItem, PriceBar, Quote};
use crate::error::Result;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Wraps a provider so it never exceeds `per_second` calls per second
pub struct ThrottledDataProvider<P> {
    inner: P,
    rate_limiter: SharedRateLimiter,
}

impl<P: MarketDataProvider> ThrottledDataProvider<P> {
    pub fn new(inner: P, per_second: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second);
        Self {
            inner,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for ThrottledDataProvider<P> {
    async fn get_info(&self, symbol: &str) -> Result<Option<CompanyInfo>> {
        self.rate_limiter.until_ready().await;
        self.inner.get_info(symbol).await
    }

    async fn get_financials(&self, symbol: &str) -> Result<Option<Financials>> {
        self.rate_limiter.until_ready().await;
        self.inner.get_financials(symbol).await
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        self.rate_limiter.until_ready().await;
        self.inner.get_quote(symbol).await
    }

    async fn get_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<Vec<PriceBar>>> {
        self.rate_limiter.until_ready().await;
        self.inner.get_history(symbol, period, interval).await
    }

    async fn get_news(&self, symbol: &str) -> Result<Option<Vec<NewsItem>>> {
        self.rate_limiter.until_ready().await;
        self.inner.get_news(symbol).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{StaticDataProvider, SymbolData};

    #[tokio::test]
    async fn test_throttled_provider_delegates() {
        let data = SymbolData {
            info: Some(CompanyInfo {
                symbol: "AAPL".to_string(),
                name: Some("Apple Inc.".to_string()),
                ..CompanyInfo::default()
            }),
            ..SymbolData::default()
        };
        let provider = ThrottledDataProvider::new(
            StaticDataProvider::new().with_symbol("AAPL", data),
            NonZeroU32::new(50).unwrap(),
        );

        let info = provider.get_info("AAPL").await.unwrap().unwrap();
        assert_eq!(info.name.as_deref(), Some("Apple Inc."));
        assert_eq!(provider.get_quote("AAPL").await.unwrap(), None);
        assert_eq!(provider.name(), "static");
    }
}
