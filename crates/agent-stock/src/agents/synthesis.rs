//! Synthesis: the fan-in call that turns agent results into one report
//!
//! Synthesis goes through the same guarded executor as the analysts, so it
//! is rate limited, circuit broken and timed out the same way. Unlike an
//! analyst it returns `Err` on failure: the orchestrator turns that into a
//! failed run.

use agent_core::{
    Action, AgentError, AgentKind, AgentOutcome, AgentResult, Confidence, ConflictRecord,
    SynthesisResult,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use tokio::time::Instant;
use tracing::{info, warn};

use super::TaskContext;
use crate::extract::extract;
use crate::prompts::{UserPrompt, synthesis_contract, synthesis_prompt};

const PURPOSE: &str = "synthesis";

/// What the synthesis step sees
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub results: &'a BTreeMap<AgentKind, AgentResult>,
    pub conflicts: &'a [ConflictRecord],
    pub consensus: Option<Action>,
    pub weighted_score: Option<f64>,
    pub low_confidence: &'a BTreeSet<AgentKind>,
}

/// The JSON block closing the report
#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    action: Option<Action>,
    confidence: Confidence,
    #[serde(default)]
    key_risks: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisTask;

impl SynthesisTask {
    /// Run the synthesis call and wait for the whole report
    pub async fn run(
        &self,
        ctx: &TaskContext,
        input: SynthesisInput<'_>,
    ) -> Result<SynthesisResult, AgentError> {
        let request = build_request(ctx, &input);
        let started = Instant::now();
        let response = ctx.executor.complete(&ctx.call_spec(), request).await;
        finish(ctx, &input, started, response.map(|r| r.message.content))
    }

    /// Like [`run`](Self::run), handing each content delta to `on_delta` as it arrives
    pub async fn run_streaming(
        &self,
        ctx: &TaskContext,
        input: SynthesisInput<'_>,
        on_delta: &mut (dyn FnMut(&str) + Send),
    ) -> Result<SynthesisResult, AgentError> {
        let request = build_request(ctx, &input);
        let started = Instant::now();
        let response = ctx
            .executor
            .complete_stream(&ctx.call_spec(), request, on_delta)
            .await;
        finish(ctx, &input, started, response.map(|r| r.message.content))
    }
}

fn build_request(ctx: &TaskContext, input: &SynthesisInput<'_>) -> agent_llm::CompletionRequest {
    let language = ctx.request.language;
    let message = UserPrompt::synthesis(&ctx.request)
        .text("Specialist analyses", &render_results(input.results))
        .text("Conflicts", &render_conflicts(input.conflicts))
        .text("Consensus", &render_consensus(input))
        .text("Output format", &synthesis_contract(language))
        .finish();
    ctx.completion(
        PURPOSE,
        synthesis_prompt(language),
        message,
        ctx.config.synthesis_max_tokens,
    )
}

fn finish(
    ctx: &TaskContext,
    input: &SynthesisInput<'_>,
    started: Instant,
    response: Result<String, agent_runtime::CallError>,
) -> Result<SynthesisResult, AgentError> {
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let text = response.map_err(|e| {
        let error = AgentError::from(e);
        warn!(symbol = %ctx.request.symbol, error = %error, "synthesis call failed");
        error
    })?;

    let verdict: Verdict = extract(&text).map_err(|e| {
        warn!(symbol = %ctx.request.symbol, error = %e, "synthesis reply unparseable");
        AgentError::malformed_output(format!("synthesis reply: {e}")).with_detail(text.clone())
    })?;

    let agents_used: Vec<AgentKind> = input
        .results
        .values()
        .filter(|r| r.is_success())
        .map(|r| r.kind)
        .collect();
    info!(
        symbol = %ctx.request.symbol,
        action = ?verdict.action,
        confidence = ?verdict.confidence,
        agents = agents_used.len(),
        latency_ms,
        "synthesis completed"
    );

    Ok(SynthesisResult {
        report: report_body(&text),
        action: verdict.action,
        confidence: verdict.confidence,
        key_risks: verdict.key_risks,
        agents_used,
        latency_ms,
    })
}

/// The markdown report without its closing JSON block
fn report_body(text: &str) -> String {
    let body = match text.rfind("```json") {
        Some(pos) => &text[..pos],
        None => text,
    };
    body.trim().to_string()
}

fn render_results(results: &BTreeMap<AgentKind, AgentResult>) -> String {
    let mut out = String::new();
    for result in results.values() {
        match &result.outcome {
            AgentOutcome::Success(analysis) => {
                let action = analysis.action.map_or("none", |a| a.as_str());
                let _ = writeln!(
                    out,
                    "### {} (action: {action}, confidence: {:?})",
                    result.kind, analysis.confidence
                );
                let _ = writeln!(out, "{}", analysis.payload.summary);
                for point in &analysis.payload.key_points {
                    let _ = writeln!(out, "- {point}");
                }
                if !analysis.payload.missing_data.is_empty() {
                    let _ = writeln!(
                        out,
                        "Missing data: {}",
                        analysis.payload.missing_data.join(", ")
                    );
                }
                if let Ok(details) = serde_json::to_string(&analysis.payload.details) {
                    let _ = writeln!(out, "Details: {details}");
                }
            }
            AgentOutcome::Failure { error } => {
                let _ = writeln!(out, "### {} (FAILED: {})", result.kind, error.kind);
                let _ = writeln!(out, "{}", error.message);
            }
        }
        out.push('\n');
    }
    out
}

fn render_conflicts(conflicts: &[ConflictRecord]) -> String {
    if conflicts.is_empty() {
        return "None detected.".to_string();
    }
    conflicts
        .iter()
        .map(|c| {
            format!(
                "- {} vs {} on {:?}: {}",
                c.agent_a, c.agent_b, c.dimension, c.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_consensus(input: &SynthesisInput<'_>) -> String {
    let mut out = match input.consensus {
        Some(action) => format!("Majority action: {action}"),
        None => "Majority action: none".to_string(),
    };
    if let Some(score) = input.weighted_score {
        let _ = write!(out, "\nConfidence-weighted score (-2 sell .. +2 buy): {score:.2}");
    }
    if !input.low_confidence.is_empty() {
        let names: Vec<&str> = input.low_confidence.iter().map(AgentKind::as_str).collect();
        let _ = write!(out, "\nLow-confidence agents: {}", names.join(", "));
    }
    out
}
