//! Market sentiment agent

use agent_core::{AgentKind, AnalysisDetails, SentimentDetails};
use async_trait::async_trait;
use serde::Serialize;

use super::news::latest;
use super::{Analyst, TaskContext, gather};
use crate::api::{PriceBar, Quote};
use crate::prompts::UserPrompt;

/// Agent that reads investor mood from price, volume and headlines
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyst;

pub struct SentimentInputs {
    pub quote: Option<Quote>,
    pub momentum: Option<Momentum>,
    pub headlines: Option<Vec<String>>,
}

/// Short-horizon price and volume behaviour
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Momentum {
    pub change_5d_pct: Option<f64>,
    pub change_20d_pct: Option<f64>,
    pub latest_volume: u64,
    pub avg_volume_20d: f64,
    /// Latest volume relative to the 20-bar average
    pub volume_ratio: Option<f64>,
}

impl Momentum {
    /// `None` for fewer than two bars
    pub fn from_bars(bars: &[PriceBar]) -> Option<Self> {
        let last = bars.last()?;
        if bars.len() < 2 {
            return None;
        }
        let change_over = |n: usize| {
            let base = bars.len().checked_sub(n + 1).map(|i| bars[i].close)?;
            (base != 0.0).then(|| round2((last.close - base) / base * 100.0))
        };

        let window = &bars[bars.len().saturating_sub(20)..];
        let avg_volume_20d =
            window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64;

        Some(Self {
            change_5d_pct: change_over(5),
            change_20d_pct: change_over(20),
            latest_volume: last.volume,
            avg_volume_20d: avg_volume_20d.round(),
            volume_ratio: (avg_volume_20d > 0.0)
                .then(|| round2(last.volume as f64 / avg_volume_20d)),
        })
    }
}

#[async_trait]
impl Analyst for SentimentAnalyst {
    const KIND: AgentKind = AgentKind::Sentiment;
    type Inputs = SentimentInputs;
    type Details = SentimentDetails;

    async fn prepare_data(&self, ctx: &TaskContext) -> SentimentInputs {
        let symbol = ctx.symbol();
        let config = &ctx.config;
        let (quote, history, news) = tokio::join!(
            gather(symbol, "quote", ctx.data.get_quote(symbol)),
            gather(
                symbol,
                "history",
                ctx.data
                    .get_history(symbol, &config.history_period, &config.history_interval)
            ),
            gather(symbol, "news", ctx.data.get_news(symbol)),
        );

        SentimentInputs {
            quote,
            momentum: history.as_deref().and_then(Momentum::from_bars),
            headlines: news
                .map(|items| {
                    latest(items, config.max_news_items)
                        .into_iter()
                        .map(|item| item.title)
                        .collect::<Vec<_>>()
                })
                .filter(|titles| !titles.is_empty()),
        }
    }

    fn describe(&self, inputs: &SentimentInputs, prompt: UserPrompt) -> UserPrompt {
        prompt
            .section("Latest quote", inputs.quote.as_ref())
            .section("Price momentum", inputs.momentum.as_ref())
            .section("Recent headlines", inputs.headlines.as_ref())
    }

    fn into_details(details: SentimentDetails) -> AnalysisDetails {
        AnalysisDetails::Sentiment(details)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(close: f64, volume: u64) -> PriceBar {
        PriceBar {
            timestamp: Utc::now(),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    #[test]
    fn test_momentum_from_bars() {
        let mut bars: Vec<PriceBar> = (0..6).map(|_| bar(100.0, 1_000)).collect();
        bars.push(bar(110.0, 4_000));

        let momentum = Momentum::from_bars(&bars).unwrap();
        assert_eq!(momentum.change_5d_pct, Some(10.0));
        // Not enough bars for a 20-day change
        assert_eq!(momentum.change_20d_pct, None);
        assert_eq!(momentum.latest_volume, 4_000);
        assert_eq!(momentum.avg_volume_20d, 1_429.0);
        assert_eq!(momentum.volume_ratio, Some(2.8));
    }

    #[test]
    fn test_momentum_needs_two_bars() {
        assert_eq!(Momentum::from_bars(&[]), None);
        assert_eq!(Momentum::from_bars(&[bar(1.0, 1)]), None);
    }
}
