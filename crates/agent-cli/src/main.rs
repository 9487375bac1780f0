//! Command-line driver for the analysis orchestrator
//!
//! Runs the orchestrator offline: upstream replies come from a recorded
//! responses file and market data from a JSON fixture. Results are printed
//! to stdout as JSON; logs go to stderr.

mod fixture;

use agent_core::{AgentKind, AnalysisRequest, ClarificationAnswer, Language, RunOptions};
use agent_runtime::AgentRuntime;
use agent_stock::{AnalysisConfig, StaticDataProvider, layered_provider};
use agent_utils::{AppConfig, LogFormat, init_tracing_with};
use agent_workflow::{Orchestrator, RetryPolicy, WorkflowEvent, WorkflowGraph, WorkflowStatus};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::fixture::{FixtureProvider, LogUsageRecorder};

#[derive(Parser, Debug)]
#[command(name = "agent-cli")]
#[command(about = "Offline driver for the multi-agent stock analysis orchestrator", long_about = None)]
struct Cli {
    /// Log format: pretty, compact or json (defaults to LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full workflow and print the final state
    Run {
        #[command(flatten)]
        target: Target,
        /// Answer a clarification request, as `agent=text`; repeatable
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<ClarificationAnswer>,
    },
    /// Run one agent outside the graph and print its result
    Single {
        /// fundamental, technical, sentiment or news
        agent: AgentKind,
        #[command(flatten)]
        target: Target,
    },
    /// Run the full workflow and print events as JSON lines
    Stream {
        #[command(flatten)]
        target: Target,
    },
    /// Print the workflow graph in Graphviz dot format
    Graph {
        /// Comma-separated agents (defaults to all)
        #[arg(long, value_delimiter = ',')]
        agents: Vec<AgentKind>,
    },
}

#[derive(Args, Debug)]
struct Target {
    /// Ticker symbol, e.g. AAPL or 600519
    symbol: String,

    /// Recorded upstream replies, keyed by purpose
    #[arg(long, short = 'r')]
    responses: PathBuf,

    /// Market data fixture, keyed by symbol
    #[arg(long, short = 'd')]
    market_data: Option<PathBuf>,

    #[arg(long)]
    market: Option<String>,

    /// Comma-separated agents (defaults to ANALYSIS_AGENTS or all)
    #[arg(long, value_delimiter = ',')]
    agents: Vec<AgentKind>,

    /// en or zh
    #[arg(long)]
    language: Option<Language>,

    #[arg(long)]
    deadline_ms: Option<u64>,

    #[arg(long)]
    task_timeout_ms: Option<u64>,

    /// Attempts per agent, including the first
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Market data calls per second (defaults to ANALYSIS_DATA_RATE_PER_SEC)
    #[arg(long)]
    data_rate: Option<NonZeroU32>,
}

fn parse_answer(raw: &str) -> Result<ClarificationAnswer, String> {
    let (agent, answer) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected agent=text, got '{raw}'"))?;
    let agent = agent.parse::<AgentKind>().map_err(|e| e.to_string())?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(format!("empty answer for {agent}"));
    }
    Ok(ClarificationAnswer {
        agent,
        answer: answer.to_string(),
    })
}

impl Target {
    fn orchestrator(&self, mut config: AnalysisConfig) -> anyhow::Result<Orchestrator> {
        if self.data_rate.is_some() {
            config.data_rate_per_sec = self.data_rate;
        }

        let market_data = match &self.market_data {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading market data from {}", path.display()))?;
                StaticDataProvider::from_json(&json).context("invalid market data fixture")?
            }
            None => StaticDataProvider::new(),
        };
        let data = layered_provider(market_data, &config);

        let runtime = AgentRuntime::builder()
            .provider(Arc::new(FixtureProvider::from_file(&self.responses)?))
            .usage_recorder(Arc::new(LogUsageRecorder))
            .build()?;

        let retry = if self.attempts > 1 {
            RetryPolicy::new(
                self.attempts,
                Duration::from_millis(500),
                Duration::from_secs(5),
                2.0,
            )
        } else {
            RetryPolicy::no_retry()
        };

        Ok(Orchestrator::builder()
            .config(config)
            .data_provider(data)
            .runtime(&runtime)
            .retry_policy(retry)
            .build()?)
    }

    fn request(&self, orchestrator: &Orchestrator) -> AnalysisRequest {
        let mut request = orchestrator.request(&self.symbol).with_options(RunOptions {
            global_deadline_ms: self.deadline_ms,
            per_task_timeout_ms: self.task_timeout_ms,
            ..RunOptions::default()
        });
        if let Some(market) = &self.market {
            request = request.with_market(market);
        }
        if let Some(language) = self.language {
            request = request.with_language(language);
        }
        if !self.agents.is_empty() {
            request = request.with_agents(self.agents.iter().copied());
        }
        request
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let app = AppConfig::from_env()?;
    init_tracing_with(cli.log_format.unwrap_or(app.log_format));

    let config = AnalysisConfig::from_env()?;
    info!(app = %app.app_name, environment = %app.environment, model = %config.model, "starting");

    match cli.command {
        Commands::Run { target, answers } => {
            let orchestrator = target.orchestrator(config)?;
            let mut state = orchestrator.run(target.request(&orchestrator)).await?;
            if state.status == WorkflowStatus::AwaitingClarification && !answers.is_empty() {
                state = orchestrator.resume(state, answers).await?;
            }
            print_json(&state)?;
        }
        Commands::Single { agent, target } => {
            let orchestrator = target.orchestrator(config)?;
            let result = orchestrator
                .run_single(agent, target.request(&orchestrator))
                .await?;
            print_json(&result)?;
        }
        Commands::Stream { target } => {
            let orchestrator = target.orchestrator(config)?;
            let mut events = orchestrator.stream(target.request(&orchestrator))?;
            while let Some(event) = events.next().await {
                println!("{}", serde_json::to_string(&event)?);
                if matches!(event, WorkflowEvent::Done { .. }) {
                    break;
                }
            }
        }
        Commands::Graph { agents } => {
            let agents = if agents.is_empty() {
                config.default_agents.clone()
            } else {
                agents.into_iter().collect()
            };
            println!("{}", WorkflowGraph::new(&agents).to_dot());
        }
    }

    Ok(())
}
