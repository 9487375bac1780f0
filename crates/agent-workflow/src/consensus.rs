//! Conflict and consensus analysis
//!
//! [`analyze`] is a pure function over the result map. Results are keyed by
//! [`AgentKind`] in a `BTreeMap`, so pairs are always visited in canonical
//! order and the output cannot depend on the order results arrived in.

use agent_core::{
    Action, AgentAnalysis, AgentKind, AgentResult, Confidence, ConflictDimension, ConflictRecord,
    SentimentLabel, Trend, Valuation,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Output of [`analyze`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub conflicts: Vec<ConflictRecord>,
    pub consensus_action: Option<Action>,
    pub low_confidence: BTreeSet<AgentKind>,
    /// Confidence-weighted mean action ordinal in `[-2, 2]`
    pub weighted_score: Option<f64>,
}

pub fn analyze(results: &BTreeMap<AgentKind, AgentResult>) -> ConsensusReport {
    let successes: Vec<(AgentKind, &AgentAnalysis)> = results
        .iter()
        .filter_map(|(&kind, result)| result.analysis().map(|a| (kind, a)))
        .collect();

    let low_confidence = successes
        .iter()
        .filter(|(_, a)| a.confidence == Confidence::Low)
        .map(|(kind, _)| *kind)
        .collect();

    let mut conflicts = action_conflicts(&successes);
    conflicts.extend(dimension_conflicts(&successes));

    ConsensusReport {
        conflicts,
        consensus_action: majority_action(&successes),
        low_confidence,
        weighted_score: weighted_score(&successes),
    }
}

fn action_conflicts(successes: &[(AgentKind, &AgentAnalysis)]) -> Vec<ConflictRecord> {
    let mut conflicts = Vec::new();
    for (i, (kind_a, a)) in successes.iter().enumerate() {
        for (kind_b, b) in &successes[i + 1..] {
            let (Some(action_a), Some(action_b)) = (a.action, b.action) else {
                continue;
            };
            if action_a.opposes(&action_b) {
                conflicts.push(ConflictRecord::new(
                    *kind_a,
                    *kind_b,
                    ConflictDimension::Action,
                    format!("{kind_a} recommends {action_a} while {kind_b} recommends {action_b}"),
                ));
            }
        }
    }
    conflicts
}

fn dimension_conflicts(successes: &[(AgentKind, &AgentAnalysis)]) -> Vec<ConflictRecord> {
    let find = |kind: AgentKind| {
        successes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, a)| &a.payload)
    };
    let valuation = find(AgentKind::Fundamental).and_then(|p| p.valuation());
    let trend = find(AgentKind::Technical).and_then(|p| p.trend());
    let mood = find(AgentKind::Sentiment).and_then(|p| p.sentiment());
    let news = find(AgentKind::News).and_then(|p| p.sentiment());

    let mut conflicts = Vec::new();

    if let (Some(valuation), Some(trend)) = (valuation, trend) {
        let clash = matches!(
            (valuation, trend),
            (Valuation::Undervalued, Trend::Bearish) | (Valuation::Overvalued, Trend::Bullish)
        );
        if clash {
            conflicts.push(ConflictRecord::new(
                AgentKind::Fundamental,
                AgentKind::Technical,
                ConflictDimension::Valuation,
                format!("fundamentals look {valuation:?} but the price trend is {trend:?}")
                    .to_lowercase(),
            ));
        }
    }

    if let (Some(trend), Some(mood)) = (trend, mood) {
        let clash = matches!(
            (trend, mood),
            (Trend::Bullish, SentimentLabel::Negative) | (Trend::Bearish, SentimentLabel::Positive)
        );
        if clash {
            conflicts.push(ConflictRecord::new(
                AgentKind::Technical,
                AgentKind::Sentiment,
                ConflictDimension::Trend,
                format!("price trend is {trend:?} but market sentiment is {mood:?}")
                    .to_lowercase(),
            ));
        }
    }

    if let (Some(mood), Some(news)) = (mood, news) {
        let clash = matches!(
            (mood, news),
            (SentimentLabel::Positive, SentimentLabel::Negative)
                | (SentimentLabel::Negative, SentimentLabel::Positive)
        );
        if clash {
            conflicts.push(ConflictRecord::new(
                AgentKind::Sentiment,
                AgentKind::News,
                ConflictDimension::Sentiment,
                format!("market sentiment is {mood:?} but news flow is {news:?}").to_lowercase(),
            ));
        }
    }

    conflicts
}

/// Majority vote with Avoid as a veto
///
/// Avoid wins whenever any agent issues it, unless bullish votes form a
/// strict majority of all votes. Otherwise the most frequent action wins;
/// ties go to the action closest to Hold, and a tie straddling Hold at equal
/// distance (Buy against Sell) resolves to Hold itself.
fn majority_action(successes: &[(AgentKind, &AgentAnalysis)]) -> Option<Action> {
    let votes: Vec<Action> = successes.iter().filter_map(|(_, a)| a.action).collect();
    if votes.is_empty() {
        return None;
    }

    let avoid = votes.iter().filter(|a| **a == Action::Avoid).count();
    let bullish = votes.iter().filter(|a| a.is_bullish()).count();
    if avoid > 0 && bullish * 2 <= votes.len() {
        return Some(Action::Avoid);
    }

    let mut tally: BTreeMap<i8, usize> = BTreeMap::new();
    for ordinal in votes.iter().filter_map(Action::ordinal) {
        *tally.entry(ordinal).or_default() += 1;
    }
    let top = tally.values().copied().max()?;
    let leaders: Vec<i8> = tally
        .into_iter()
        .filter(|&(_, count)| count == top)
        .map(|(ordinal, _)| ordinal)
        .collect();

    let closest = leaders.iter().map(|o| o.unsigned_abs()).min()?;
    let mut nearest = leaders.iter().filter(|o| o.unsigned_abs() == closest);
    let winner = match (nearest.next(), nearest.next()) {
        (Some(&only), None) => only,
        // Equidistant on both sides of Hold
        _ => 0,
    };
    Some(from_ordinal(winner))
}

fn from_ordinal(ordinal: i8) -> Action {
    match ordinal {
        i8::MIN..=-2 => Action::StrongSell,
        -1 => Action::Sell,
        0 => Action::Hold,
        1 => Action::Buy,
        2..=i8::MAX => Action::StrongBuy,
    }
}

fn weighted_score(successes: &[(AgentKind, &AgentAnalysis)]) -> Option<f64> {
    let (sum, weights) = successes
        .iter()
        .filter_map(|(_, a)| {
            let ordinal = a.action?.ordinal()?;
            Some((f64::from(ordinal), a.confidence.weight()))
        })
        .fold((0.0, 0.0), |(sum, weights), (ordinal, weight)| {
            (sum + ordinal * weight, weights + weight)
        });
    (weights > 0.0).then(|| sum / weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{
        AgentError, AnalysisDetails, AnalysisPayload, FundamentalDetails, NewsDetails,
        SentimentDetails, TechnicalDetails,
    };

    fn details(kind: AgentKind) -> AnalysisDetails {
        match kind {
            AgentKind::Fundamental => AnalysisDetails::Fundamental(FundamentalDetails::default()),
            AgentKind::Technical => AnalysisDetails::Technical(TechnicalDetails::default()),
            AgentKind::Sentiment => AnalysisDetails::Sentiment(SentimentDetails::default()),
            AgentKind::News => AnalysisDetails::News(NewsDetails::default()),
        }
    }

    fn voted(kind: AgentKind, action: Action, confidence: Confidence) -> AgentResult {
        AgentResult::success(
            kind,
            AnalysisPayload::new("summary", details(kind)),
            confidence,
            Some(action),
            1,
        )
    }

    fn with_details(kind: AgentKind, details: AnalysisDetails) -> AgentResult {
        AgentResult::success(
            kind,
            AnalysisPayload::new("summary", details),
            Confidence::Medium,
            None,
            1,
        )
    }

    fn map(results: Vec<AgentResult>) -> BTreeMap<AgentKind, AgentResult> {
        results.into_iter().map(|r| (r.kind, r)).collect()
    }

    fn consensus(actions: &[(AgentKind, Action)]) -> Option<Action> {
        analyze(&map(
            actions
                .iter()
                .map(|&(k, a)| voted(k, a, Confidence::Medium))
                .collect(),
        ))
        .consensus_action
    }

    #[test]
    fn test_conflict_symmetry() {
        let forward = analyze(&map(vec![
            voted(AgentKind::Fundamental, Action::Buy, Confidence::High),
            voted(AgentKind::Technical, Action::Sell, Confidence::Medium),
        ]));
        let backward = analyze(&map(vec![
            voted(AgentKind::Technical, Action::Sell, Confidence::Medium),
            voted(AgentKind::Fundamental, Action::Buy, Confidence::High),
        ]));

        assert_eq!(forward, backward);
        assert_eq!(forward.conflicts.len(), 1);
        let conflict = &forward.conflicts[0];
        assert_eq!(conflict.agent_a, AgentKind::Fundamental);
        assert_eq!(conflict.agent_b, AgentKind::Technical);
        assert_eq!(conflict.dimension, ConflictDimension::Action);
    }

    #[test]
    fn test_four_agent_mix() {
        let report = analyze(&map(vec![
            voted(AgentKind::Fundamental, Action::Buy, Confidence::High),
            voted(AgentKind::Technical, Action::Sell, Confidence::Medium),
            AgentResult::failure(AgentKind::Sentiment, AgentError::timeout("60s"), 60_000),
            voted(AgentKind::News, Action::Hold, Confidence::Low),
        ]));

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.low_confidence, BTreeSet::from([AgentKind::News]));
        assert_eq!(report.consensus_action, Some(Action::Hold));
        // (1*3 + -1*2 + 0*1) / 6
        let score = report.weighted_score.unwrap();
        assert!((score - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_hold_never_conflicts() {
        let report = analyze(&map(vec![
            voted(AgentKind::Fundamental, Action::Hold, Confidence::High),
            voted(AgentKind::Technical, Action::StrongSell, Confidence::High),
            voted(AgentKind::News, Action::StrongBuy, Confidence::High),
        ]));
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].agent_a, AgentKind::Technical);
        assert_eq!(report.conflicts[0].agent_b, AgentKind::News);
    }

    #[test]
    fn test_majority_and_ties() {
        use AgentKind::*;
        assert_eq!(
            consensus(&[(Fundamental, Action::Buy), (Technical, Action::Buy), (News, Action::Sell)]),
            Some(Action::Buy)
        );
        // Closer to Hold wins the tie
        assert_eq!(
            consensus(&[(Fundamental, Action::StrongBuy), (Technical, Action::Buy)]),
            Some(Action::Buy)
        );
        // Buy against Sell settles on Hold
        assert_eq!(
            consensus(&[(Fundamental, Action::Buy), (Technical, Action::Sell)]),
            Some(Action::Hold)
        );
        assert_eq!(consensus(&[]), None);
    }

    #[test]
    fn test_avoid_veto() {
        use AgentKind::*;
        assert_eq!(
            consensus(&[(Fundamental, Action::Avoid), (Technical, Action::Buy)]),
            Some(Action::Avoid)
        );
        assert_eq!(
            consensus(&[(Fundamental, Action::Avoid), (Technical, Action::Hold), (News, Action::Hold)]),
            Some(Action::Avoid)
        );
        // A bullish majority overrides the veto
        assert_eq!(
            consensus(&[
                (Fundamental, Action::Avoid),
                (Technical, Action::Buy),
                (News, Action::Buy)
            ]),
            Some(Action::Buy)
        );
    }

    #[test]
    fn test_avoid_excluded_from_weighted_score() {
        let report = analyze(&map(vec![
            voted(AgentKind::Fundamental, Action::Avoid, Confidence::High),
        ]));
        assert_eq!(report.consensus_action, Some(Action::Avoid));
        assert_eq!(report.weighted_score, None);
    }

    #[test]
    fn test_no_successes() {
        let report = analyze(&map(vec![AgentResult::failure(
            AgentKind::News,
            AgentError::upstream("502"),
            5,
        )]));
        assert_eq!(report, ConsensusReport::default());
    }

    #[test]
    fn test_dimension_conflicts_are_independent() {
        let report = analyze(&map(vec![
            with_details(
                AgentKind::Fundamental,
                AnalysisDetails::Fundamental(FundamentalDetails {
                    valuation: Some(Valuation::Undervalued),
                    ..Default::default()
                }),
            ),
            with_details(
                AgentKind::Technical,
                AnalysisDetails::Technical(TechnicalDetails {
                    trend: Some(Trend::Bearish),
                    ..Default::default()
                }),
            ),
            with_details(
                AgentKind::Sentiment,
                AnalysisDetails::Sentiment(SentimentDetails {
                    overall: Some(SentimentLabel::Positive),
                    ..Default::default()
                }),
            ),
            with_details(
                AgentKind::News,
                AnalysisDetails::News(NewsDetails {
                    sentiment: Some(SentimentLabel::Negative),
                    ..Default::default()
                }),
            ),
        ]));

        let dimensions: Vec<_> = report.conflicts.iter().map(|c| c.dimension).collect();
        assert_eq!(
            dimensions,
            vec![
                ConflictDimension::Valuation,
                ConflictDimension::Trend,
                ConflictDimension::Sentiment
            ]
        );
        assert_eq!(
            report.conflicts[0].description,
            "fundamentals look undervalued but the price trend is bearish"
        );
        // No actions, no vote
        assert_eq!(report.consensus_action, None);
    }
}
