//! Stock analysis agents
//!
//! This crate provides the analytical perspectives the orchestrator fans out
//! over. It includes:
//!
//! - The market data capability interface, an in-memory provider, a
//!   throttling wrapper and a TTL cache wrapper
//! - Technical indicators computed locally (RSI, SMA, EMA, MACD, Bollinger Bands)
//! - Bilingual (English/Chinese) prompts and the JSON output contract
//! - A best-effort extractor that recovers JSON from free-form model text
//! - [`AgentTask`]: one guarded attempt of one analyst, with every failure
//!   captured into its [`AgentResult`](agent_core::AgentResult)
//! - [`SynthesisTask`]: the fan-in call producing the final report
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_core::{AgentKind, AnalysisRequest};
//! use agent_stock::{AgentTask, AnalysisConfig, TaskContext};
//! use std::sync::Arc;
//!
//! let ctx = TaskContext::new(
//!     AnalysisRequest::new("AAPL"),
//!     Arc::new(AnalysisConfig::default()),
//!     data_provider,
//!     runtime.executor(),
//! );
//! let result = AgentTask::new(AgentKind::Technical).run(&ctx).await;
//! ```

pub mod agents;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod prompts;

// Re-export main types for convenience
pub use agents::{
    AgentTask, Analyst, FundamentalAnalyst, NewsAnalyst, SentimentAnalyst, SynthesisInput,
    SynthesisTask, TaskContext, TechnicalAnalyst,
};
pub use api::{MarketDataProvider, StaticDataProvider, ThrottledDataProvider};
pub use cache::{CacheManager, CachedDataProvider, StockCache, layered_provider};
pub use config::{AnalysisConfig, EffectiveOptions};
pub use error::{DataError, Result};
pub use extract::{ExtractionError, extract};
