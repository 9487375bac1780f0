//! In-memory market data
//!
//! Serves recorded data loaded from JSON. Endpoints listed in a symbol's
//! `fail` set return an error, which lets a fixture reproduce a flaky
//! provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::{CompanyInfo, Financials, MarketDataProvider, NewsItem, PriceBar, Quote};
use crate::error::{DataError, Result};

/// Everything known about one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolData {
    pub info: Option<CompanyInfo>,
    pub financials: Option<Financials>,
    pub quote: Option<Quote>,
    pub history: Option<Vec<PriceBar>>,
    pub news: Option<Vec<NewsItem>>,
    /// Endpoints that fail: "info", "financials", "quote", "history", "news"
    pub fail: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticDataProvider {
    symbols: HashMap<String, SymbolData>,
}

impl StaticDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"AAPL": {...}, "MSFT": {...}}`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, SymbolData> = serde_json::from_str(json)?;
        Ok(Self {
            symbols: raw
                .into_iter()
                .map(|(symbol, data)| (symbol.to_uppercase(), data))
                .collect(),
        })
    }

    pub fn with_symbol(mut self, symbol: &str, data: SymbolData) -> Self {
        self.symbols.insert(symbol.to_uppercase(), data);
        self
    }

    fn lookup<T: Clone>(
        &self,
        symbol: &str,
        endpoint: &str,
        field: impl FnOnce(&SymbolData) -> &Option<T>,
    ) -> Result<Option<T>> {
        let Some(data) = self.symbols.get(&symbol.to_uppercase()) else {
            return Ok(None);
        };
        if data.fail.contains(endpoint) {
            return Err(DataError::ApiError(format!(
                "{endpoint} unavailable for {symbol}"
            )));
        }
        Ok(field(data).clone())
    }
}

#[async_trait]
impl MarketDataProvider for StaticDataProvider {
    async fn get_info(&self, symbol: &str) -> Result<Option<CompanyInfo>> {
        self.lookup(symbol, "info", |d| &d.info)
    }

    async fn get_financials(&self, symbol: &str) -> Result<Option<Financials>> {
        self.lookup(symbol, "financials", |d| &d.financials)
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        self.lookup(symbol, "quote", |d| &d.quote)
    }

    async fn get_history(
        &self,
        symbol: &str,
        _period: &str,
        _interval: &str,
    ) -> Result<Option<Vec<PriceBar>>> {
        self.lookup(symbol, "history", |d| &d.history)
    }

    async fn get_news(&self, symbol: &str) -> Result<Option<Vec<NewsItem>>> {
        self.lookup(symbol, "news", |d| &d.news)
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "aapl": {
            "info": {"symbol": "AAPL", "name": "Apple Inc.", "sector": "Technology"},
            "news": [{"title": "Apple unveils new chip"}],
            "fail": ["quote"]
        }
    }"#;

    #[tokio::test]
    async fn test_from_json_and_lookup() {
        let provider = StaticDataProvider::from_json(FIXTURE).unwrap();

        let info = provider.get_info("AAPL").await.unwrap().unwrap();
        assert_eq!(info.sector.as_deref(), Some("Technology"));

        let news = provider.get_news("aapl").await.unwrap().unwrap();
        assert_eq!(news[0].title, "Apple unveils new chip");

        assert_eq!(provider.get_financials("AAPL").await.unwrap(), None);
        assert!(matches!(
            provider.get_quote("AAPL").await,
            Err(DataError::ApiError(_))
        ));
        assert_eq!(provider.get_info("MSFT").await.unwrap(), None);
    }

    #[test]
    fn test_invalid_fixture() {
        assert!(matches!(
            StaticDataProvider::from_json("[1, 2]"),
            Err(DataError::JsonError(_))
        ));
    }
}
