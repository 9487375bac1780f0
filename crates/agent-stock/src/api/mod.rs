//! Market data collaborators
//!
//! Agents read market data through [`MarketDataProvider`]. Each call returns
//! `Ok(None)` when the provider simply has nothing for the symbol and `Err`
//! when the call itself failed; agent tasks treat both as a missing input.

pub mod fixture;
pub mod throttle;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use fixture::{StaticDataProvider, SymbolData};
pub use throttle::ThrottledDataProvider;

/// Company profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub description: Option<String>,
}

/// Latest reported financial statement figures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Financials {
    pub symbol: String,
    /// e.g. "FY2024" or "2025Q2"
    pub fiscal_period: Option<String>,
    pub revenue: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub net_income: Option<f64>,
    pub eps: Option<f64>,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

/// Real-time quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsItem {
    pub title: String,
    pub source: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Capability interface for market data
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn get_info(&self, symbol: &str) -> Result<Option<CompanyInfo>>;

    async fn get_financials(&self, symbol: &str) -> Result<Option<Financials>>;

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>>;

    /// Price history, e.g. `period = "6mo"`, `interval = "1d"`
    async fn get_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Option<Vec<PriceBar>>>;

    async fn get_news(&self, symbol: &str) -> Result<Option<Vec<NewsItem>>>;

    /// Provider name, used in logs
    fn name(&self) -> &str;
}
