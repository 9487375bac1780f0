//! News analysis agent

use agent_core::{AgentKind, AnalysisDetails, NewsDetails};
use async_trait::async_trait;

use super::{Analyst, TaskContext, gather};
use crate::api::{CompanyInfo, NewsItem};
use crate::prompts::UserPrompt;

/// Agent specialized in news flow and event impact
#[derive(Debug, Clone, Copy, Default)]
pub struct NewsAnalyst;

pub struct NewsInputs {
    pub info: Option<CompanyInfo>,
    /// Newest first, capped at the configured item count
    pub news: Option<Vec<NewsItem>>,
}

#[async_trait]
impl Analyst for NewsAnalyst {
    const KIND: AgentKind = AgentKind::News;
    type Inputs = NewsInputs;
    type Details = NewsDetails;

    async fn prepare_data(&self, ctx: &TaskContext) -> NewsInputs {
        let symbol = ctx.symbol();
        let (info, news) = tokio::join!(
            gather(symbol, "info", ctx.data.get_info(symbol)),
            gather(symbol, "news", ctx.data.get_news(symbol)),
        );
        NewsInputs {
            info,
            news: news
                .map(|items| latest(items, ctx.config.max_news_items))
                .filter(|items| !items.is_empty()),
        }
    }

    fn describe(&self, inputs: &NewsInputs, prompt: UserPrompt) -> UserPrompt {
        prompt
            .section("Company profile", inputs.info.as_ref())
            .section("Recent news", inputs.news.as_ref())
    }

    fn into_details(details: NewsDetails) -> AnalysisDetails {
        AnalysisDetails::News(details)
    }
}

/// Newest `limit` items; undated items sort last
pub(crate) fn latest(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(title: &str, day: Option<u32>) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            published_at: day.map(|d| Utc.with_ymd_and_hms(2025, 3, d, 12, 0, 0).unwrap()),
            ..NewsItem::default()
        }
    }

    #[test]
    fn test_latest_sorts_newest_first_and_caps() {
        let items = vec![item("old", Some(1)), item("undated", None), item("new", Some(9))];
        let picked = latest(items, 2);
        let titles: Vec<_> = picked.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "old"]);
    }
}
