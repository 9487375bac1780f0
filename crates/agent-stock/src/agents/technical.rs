//! Technical analysis agent
//!
//! Indicators are computed locally from price history with the `ta` crate so
//! the model interprets numbers instead of estimating them.

use agent_core::{AgentKind, AnalysisDetails, TechnicalDetails};
use async_trait::async_trait;
use serde::Serialize;
use ta::Next;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage,
};
use tracing::warn;

use super::{Analyst, TaskContext, gather};
use crate::api::{PriceBar, Quote};
use crate::error::{DataError, Result};
use crate::prompts::UserPrompt;

/// Fewest bars needed for the 20-period indicators
const MIN_BARS: usize = 20;

/// Agent specialized in price action and indicators
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalAnalyst;

pub struct TechnicalInputs {
    pub quote: Option<Quote>,
    pub indicators: Option<TechnicalSnapshot>,
}

/// Indicator values at the most recent bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalSnapshot {
    pub bars: usize,
    pub last_close: f64,
    /// Change over the whole window, in percent
    pub period_change_pct: f64,
    pub rsi_14: f64,
    pub rsi_signal: &'static str,
    pub sma_20: f64,
    /// Absent when history is shorter than 50 bars
    pub sma_50: Option<f64>,
    pub ema_12: f64,
    pub ema_26: f64,
    pub macd: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
    /// Highest high and lowest low over the last 20 bars
    pub recent_high: f64,
    pub recent_low: f64,
    pub recent_closes: Vec<f64>,
}

#[async_trait]
impl Analyst for TechnicalAnalyst {
    const KIND: AgentKind = AgentKind::Technical;
    type Inputs = TechnicalInputs;
    type Details = TechnicalDetails;

    async fn prepare_data(&self, ctx: &TaskContext) -> TechnicalInputs {
        let symbol = ctx.symbol();
        let config = &ctx.config;
        let (quote, history) = tokio::join!(
            gather(symbol, "quote", ctx.data.get_quote(symbol)),
            gather(
                symbol,
                "history",
                ctx.data
                    .get_history(symbol, &config.history_period, &config.history_interval)
            ),
        );

        let indicators = history.and_then(|bars| match compute_indicators(&bars) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(symbol, error = %e, "indicators unavailable");
                None
            }
        });
        TechnicalInputs { quote, indicators }
    }

    fn describe(&self, inputs: &TechnicalInputs, prompt: UserPrompt) -> UserPrompt {
        prompt
            .section("Latest quote", inputs.quote.as_ref())
            .section("Technical indicators", inputs.indicators.as_ref())
    }

    fn into_details(details: TechnicalDetails) -> AnalysisDetails {
        AnalysisDetails::Technical(details)
    }
}

/// Compute the indicator snapshot for a price series, oldest bar first
pub fn compute_indicators(bars: &[PriceBar]) -> Result<TechnicalSnapshot> {
    if bars.len() < MIN_BARS {
        return Err(DataError::DataUnavailable {
            symbol: String::new(),
            reason: format!("need at least {MIN_BARS} bars, got {}", bars.len()),
        });
    }

    let mut rsi = RelativeStrengthIndex::new(14).map_err(indicator_err)?;
    let mut sma_20 = SimpleMovingAverage::new(20).map_err(indicator_err)?;
    let mut sma_50 = SimpleMovingAverage::new(50).map_err(indicator_err)?;
    let mut ema_12 = ExponentialMovingAverage::new(12).map_err(indicator_err)?;
    let mut ema_26 = ExponentialMovingAverage::new(26).map_err(indicator_err)?;
    let mut bollinger = BollingerBands::new(20, 2.0).map_err(indicator_err)?;

    let (mut last_rsi, mut last_sma_20, mut last_sma_50) = (0.0, 0.0, 0.0);
    let (mut last_ema_12, mut last_ema_26) = (0.0, 0.0);
    let mut last_bands = None;
    for bar in bars {
        last_rsi = rsi.next(bar.close);
        last_sma_20 = sma_20.next(bar.close);
        last_sma_50 = sma_50.next(bar.close);
        last_ema_12 = ema_12.next(bar.close);
        last_ema_26 = ema_26.next(bar.close);
        last_bands = Some(bollinger.next(bar.close));
    }
    let bands = last_bands.ok_or_else(|| DataError::IndicatorError("empty series".to_string()))?;

    let first_close = bars[0].close;
    let last_close = bars[bars.len() - 1].close;
    let recent = &bars[bars.len() - MIN_BARS..];
    let recent_high = recent.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let recent_low = recent.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let period_change_pct = if first_close == 0.0 {
        0.0
    } else {
        (last_close - first_close) / first_close * 100.0
    };

    Ok(TechnicalSnapshot {
        bars: bars.len(),
        last_close,
        period_change_pct: round2(period_change_pct),
        rsi_14: round2(last_rsi),
        rsi_signal: interpret_rsi(last_rsi),
        sma_20: round2(last_sma_20),
        sma_50: (bars.len() >= 50).then(|| round2(last_sma_50)),
        ema_12: round2(last_ema_12),
        ema_26: round2(last_ema_26),
        macd: round2(last_ema_12 - last_ema_26),
        bollinger_upper: round2(bands.upper),
        bollinger_middle: round2(bands.average),
        bollinger_lower: round2(bands.lower),
        recent_high,
        recent_low,
        recent_closes: bars[bars.len().saturating_sub(10)..]
            .iter()
            .map(|b| b.close)
            .collect(),
    })
}

fn indicator_err(e: impl std::fmt::Display) -> DataError {
    DataError::IndicatorError(e.to_string())
}

fn interpret_rsi(rsi: f64) -> &'static str {
    if rsi > 70.0 {
        "overbought"
    } else if rsi < 30.0 {
        "oversold"
    } else {
        "neutral"
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn series(closes: impl IntoIterator<Item = f64>) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        closes
            .into_iter()
            .enumerate()
            .map(|(i, close)| PriceBar {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000,
            })
            .collect()
    }

    #[test]
    fn test_rising_series() {
        let bars = series((1..=60).map(f64::from));
        let snapshot = compute_indicators(&bars).unwrap();

        assert_eq!(snapshot.bars, 60);
        assert_eq!(snapshot.last_close, 60.0);
        assert_eq!(snapshot.sma_20, 50.5);
        assert_eq!(snapshot.sma_50, Some(35.5));
        assert!(snapshot.rsi_14 > 70.0);
        assert_eq!(snapshot.rsi_signal, "overbought");
        assert!(snapshot.macd > 0.0);
        assert_eq!(snapshot.recent_high, 61.0);
        assert_eq!(snapshot.recent_low, 40.0);
        assert_eq!(snapshot.recent_closes.len(), 10);
    }

    #[test]
    fn test_short_history_is_unavailable() {
        let bars = series((1..=10).map(f64::from));
        assert!(matches!(
            compute_indicators(&bars),
            Err(DataError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_sma_50_needs_fifty_bars() {
        let bars = series(std::iter::repeat_n(100.0, 30));
        let snapshot = compute_indicators(&bars).unwrap();
        assert_eq!(snapshot.sma_50, None);
        assert_eq!(snapshot.period_change_pct, 0.0);
        assert_eq!(snapshot.rsi_signal, "neutral");
    }
}
