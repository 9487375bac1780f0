//! Agent kinds and the per-agent result envelope

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{AgentError, Error};
use crate::payload::AnalysisPayload;

/// The closed set of analytical perspectives
///
/// Used as a mapping key, never as ownership. The derived ordering is the
/// canonical iteration order wherever results are compared pairwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Fundamental,
    Technical,
    Sentiment,
    News,
}

impl AgentKind {
    /// Every kind, in canonical order
    pub const ALL: [AgentKind; 4] = [
        AgentKind::Fundamental,
        AgentKind::Technical,
        AgentKind::Sentiment,
        AgentKind::News,
    ];

    /// Node name used by the workflow graph and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental",
            Self::Technical => "technical",
            Self::Sentiment => "sentiment",
            Self::News => "news",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fundamental" | "fundamentals" => Ok(Self::Fundamental),
            "technical" | "technicals" => Ok(Self::Technical),
            "sentiment" => Ok(Self::Sentiment),
            "news" => Ok(Self::News),
            other => Err(Error::InvalidRequest(format!("unknown agent kind '{other}'"))),
        }
    }
}

/// Investment action recommended by an agent or by consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
    /// "Cannot recommend" - not a position on the buy/sell axis
    Avoid,
}

impl Action {
    /// Position on the StrongSell(-2) .. StrongBuy(+2) axis; `None` for Avoid
    pub fn ordinal(&self) -> Option<i8> {
        match self {
            Self::StrongSell => Some(-2),
            Self::Sell => Some(-1),
            Self::Hold => Some(0),
            Self::Buy => Some(1),
            Self::StrongBuy => Some(2),
            Self::Avoid => None,
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::StrongBuy | Self::Buy)
    }

    /// Sell side of the axis; Avoid counts as bearish for conflict detection
    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::Sell | Self::StrongSell | Self::Avoid)
    }

    /// True when the two actions sit on opposite sides of the buy/sell axis
    pub fn opposes(&self, other: &Action) -> bool {
        (self.is_bullish() && other.is_bearish()) || (self.is_bearish() && other.is_bullish())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBuy => "strong_buy",
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
            Self::StrongSell => "strong_sell",
            Self::Avoid => "avoid",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    /// Lenient: models write "Strong Buy", "STRONG_BUY", "strong-buy", "买入"...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "strongbuy" | "强烈买入" => Ok(Self::StrongBuy),
            "buy" | "accumulate" | "overweight" | "买入" => Ok(Self::Buy),
            "hold" | "neutral" | "持有" => Ok(Self::Hold),
            "sell" | "reduce" | "underweight" | "卖出" => Ok(Self::Sell),
            "strongsell" | "强烈卖出" => Ok(Self::StrongSell),
            "avoid" | "回避" => Ok(Self::Avoid),
            _ => Err(Error::InvalidRequest(format!("unknown action '{s}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// How much an agent trusts its own analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Vote weight used by the weighted consensus score
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
        }
    }

    /// Bucket a numeric score in `[0, 1]` (or a percentage) into a level
    pub fn from_score(score: f64) -> Self {
        let score = if score > 1.0 { score / 100.0 } else { score };
        if score < 0.4 {
            Self::Low
        } else if score < 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl FromStr for Confidence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "低" => Ok(Self::Low),
            "medium" | "moderate" | "mid" | "中" => Ok(Self::Medium),
            "high" | "高" => Ok(Self::High),
            other => other
                .trim_end_matches('%')
                .parse::<f64>()
                .map(Self::from_score)
                .map_err(|_| Error::InvalidRequest(format!("unknown confidence '{s}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => s.parse().map_err(serde::de::Error::custom),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Self::from_score)
                .ok_or_else(|| serde::de::Error::custom("confidence is not a finite number")),
            other => Err(serde::de::Error::custom(format!(
                "expected confidence string or number, got {other}"
            ))),
        }
    }
}

/// The structured part of a successful agent result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub payload: AnalysisPayload,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

/// Either a structured analysis or a captured failure, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentOutcome {
    Success(AgentAnalysis),
    Failure { error: AgentError },
}

/// Outcome of one agent node, owned by the workflow state once reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub kind: AgentKind,
    pub outcome: AgentOutcome,
    /// Wall time of the final attempt, from rate-limit acquire to parsed output
    pub latency_ms: u64,
    /// Number of attempts the graph spent on this node
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

impl AgentResult {
    /// Create a successful result
    pub fn success(
        kind: AgentKind,
        payload: AnalysisPayload,
        confidence: Confidence,
        action: Option<Action>,
        latency_ms: u64,
    ) -> Self {
        Self {
            kind,
            outcome: AgentOutcome::Success(AgentAnalysis {
                payload,
                confidence,
                action,
            }),
            latency_ms,
            attempts: 1,
        }
    }

    /// Create a failed result
    pub fn failure(kind: AgentKind, error: AgentError, latency_ms: u64) -> Self {
        Self {
            kind,
            outcome: AgentOutcome::Failure { error },
            latency_ms,
            attempts: 1,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AgentOutcome::Success(_))
    }

    pub fn analysis(&self) -> Option<&AgentAnalysis> {
        match &self.outcome {
            AgentOutcome::Success(analysis) => Some(analysis),
            AgentOutcome::Failure { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&AnalysisPayload> {
        self.analysis().map(|a| &a.payload)
    }

    pub fn confidence(&self) -> Option<Confidence> {
        self.analysis().map(|a| a.confidence)
    }

    pub fn action(&self) -> Option<Action> {
        self.analysis().and_then(|a| a.action)
    }

    pub fn error(&self) -> Option<&AgentError> {
        match &self.outcome {
            AgentOutcome::Failure { error } => Some(error),
            AgentOutcome::Success(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::payload::{AnalysisDetails, FundamentalDetails};

    fn payload() -> AnalysisPayload {
        AnalysisPayload::new(
            "solid balance sheet",
            AnalysisDetails::Fundamental(FundamentalDetails::default()),
        )
    }

    #[test]
    fn test_action_parsing_is_lenient() {
        assert_eq!("Strong Buy".parse::<Action>().unwrap(), Action::StrongBuy);
        assert_eq!("STRONG_SELL".parse::<Action>().unwrap(), Action::StrongSell);
        assert_eq!("strong-buy".parse::<Action>().unwrap(), Action::StrongBuy);
        assert_eq!("持有".parse::<Action>().unwrap(), Action::Hold);
        assert!("moon".parse::<Action>().is_err());
    }

    #[test]
    fn test_action_axis() {
        assert!(Action::Buy.opposes(&Action::Sell));
        assert!(Action::StrongBuy.opposes(&Action::Avoid));
        assert!(!Action::Hold.opposes(&Action::StrongSell));
        assert!(!Action::Buy.opposes(&Action::StrongBuy));
        assert_eq!(Action::Avoid.ordinal(), None);
        assert!(Action::StrongSell.ordinal() < Action::Hold.ordinal());
    }

    #[test]
    fn test_confidence_from_string_or_number() {
        let c: Confidence = serde_json::from_str("\"HIGH\"").unwrap();
        assert_eq!(c, Confidence::High);
        let c: Confidence = serde_json::from_str("0.55").unwrap();
        assert_eq!(c, Confidence::Medium);
        let c: Confidence = serde_json::from_str("\"25%\"").unwrap();
        assert_eq!(c, Confidence::Low);
        assert!(serde_json::from_str::<Confidence>("true").is_err());
    }

    #[test]
    fn test_agent_kind_round_trip_names() {
        for kind in AgentKind::ALL {
            assert_eq!(kind.as_str().parse::<AgentKind>().unwrap(), kind);
        }
        assert!("macro".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_result_invariant_accessors() {
        let ok = AgentResult::success(
            AgentKind::Fundamental,
            payload(),
            Confidence::High,
            Some(Action::Buy),
            120,
        );
        assert!(ok.is_success());
        assert_eq!(ok.action(), Some(Action::Buy));
        assert_eq!(ok.confidence(), Some(Confidence::High));
        assert!(ok.error().is_none());

        let failed = AgentResult::failure(AgentKind::News, AgentError::timeout("60s elapsed"), 60_000);
        assert!(!failed.is_success());
        assert!(failed.payload().is_none());
        assert!(failed.confidence().is_none());
        assert_eq!(failed.error().map(|e| e.kind), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let failed = AgentResult::failure(AgentKind::News, AgentError::rate_limited("denied"), 3)
            .with_attempts(2);
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["kind"], "news");
        assert_eq!(json["outcome"]["status"], "failure");
        assert_eq!(json["outcome"]["error"]["kind"], "rate_limited");
        assert_eq!(json["attempts"], 2);
    }
}
