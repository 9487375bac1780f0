//! Fundamental analysis agent

use agent_core::{AgentKind, AnalysisDetails, FundamentalDetails};
use async_trait::async_trait;

use super::{Analyst, TaskContext, gather};
use crate::api::{CompanyInfo, Financials, Quote};
use crate::prompts::UserPrompt;

/// Agent specialized in valuation and financial health
#[derive(Debug, Clone, Copy, Default)]
pub struct FundamentalAnalyst;

pub struct FundamentalInputs {
    pub info: Option<CompanyInfo>,
    pub financials: Option<Financials>,
    pub quote: Option<Quote>,
}

#[async_trait]
impl Analyst for FundamentalAnalyst {
    const KIND: AgentKind = AgentKind::Fundamental;
    type Inputs = FundamentalInputs;
    type Details = FundamentalDetails;

    async fn prepare_data(&self, ctx: &TaskContext) -> FundamentalInputs {
        let symbol = ctx.symbol();
        let (info, financials, quote) = tokio::join!(
            gather(symbol, "info", ctx.data.get_info(symbol)),
            gather(symbol, "financials", ctx.data.get_financials(symbol)),
            gather(symbol, "quote", ctx.data.get_quote(symbol)),
        );
        FundamentalInputs {
            info,
            financials,
            quote,
        }
    }

    fn describe(&self, inputs: &FundamentalInputs, prompt: UserPrompt) -> UserPrompt {
        prompt
            .section("Company profile", inputs.info.as_ref())
            .section("Financials", inputs.financials.as_ref())
            .section("Latest quote", inputs.quote.as_ref())
    }

    fn into_details(details: FundamentalDetails) -> AnalysisDetails {
        AnalysisDetails::Fundamental(details)
    }
}
