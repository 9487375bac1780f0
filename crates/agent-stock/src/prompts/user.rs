//! User message construction
//!
//! Every analyst sends the same shape of message: a header naming the
//! symbol, one section per input (or an explicit "unavailable" marker), any
//! caller clarifications, and the JSON output contract.

use agent_core::{AgentKind, AnalysisRequest, Language};
use serde::Serialize;

const UNAVAILABLE_EN: &str = "(unavailable)";
const UNAVAILABLE_ZH: &str = "(数据不可用)";

const ENVELOPE: &str = r#""action": "strong_buy" | "buy" | "hold" | "sell" | "strong_sell" | "avoid",
  "confidence": "low" | "medium" | "high",
  "summary": string,
  "key_points": [string],
  "missing_data": [string],
  "clarification_question": string | null"#;

/// Kind-specific fields the model must add to the envelope
fn detail_fields(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Fundamental => {
            r#""valuation": "undervalued" | "fair" | "overvalued",
  "metrics": { "<name>": number | string }"#
        }
        AgentKind::Technical => {
            r#""trend": "bullish" | "neutral" | "bearish",
  "support": number | null,
  "resistance": number | null,
  "indicators": { "<name>": number | string }"#
        }
        AgentKind::Sentiment => {
            r#""overall": "positive" | "neutral" | "negative",
  "score": number between -1 and 1,
  "breakdown": { "<source>": number }"#
        }
        AgentKind::News => {
            r#""sentiment": "positive" | "neutral" | "negative",
  "items": [{ "title": string, "impact": "positive" | "neutral" | "negative", "source": string | null }]"#
        }
    }
}

/// The JSON object an analyst must answer with
pub fn output_contract(kind: AgentKind, language: Language) -> String {
    let lead = match language {
        Language::English => "Respond with a single JSON object and nothing else:",
        Language::Chinese => "只回复一个 JSON 对象,不要输出其他内容:",
    };
    format!("{lead}\n{{\n  {ENVELOPE},\n  {}\n}}", detail_fields(kind))
}

const SYNTHESIS_VERDICT: &str = r#"```json
{ "action": "strong_buy" | "buy" | "hold" | "sell" | "strong_sell" | "avoid", "confidence": "low" | "medium" | "high", "key_risks": [string] }
```"#;

/// Closing instruction for the synthesis report
pub fn synthesis_contract(language: Language) -> String {
    let lead = match language {
        Language::English => "End the report with a fenced JSON block and nothing after it:",
        Language::Chinese => "在报告末尾附上一个 JSON 代码块,之后不要再输出任何内容:",
    };
    format!("{lead}\n{SYNTHESIS_VERDICT}")
}

/// Builder for an analyst's user message
#[derive(Debug, Clone)]
pub struct UserPrompt {
    language: Language,
    body: String,
    missing: Vec<String>,
}

impl UserPrompt {
    pub fn new(kind: AgentKind, request: &AnalysisRequest) -> Self {
        let mut body = match request.language {
            Language::English => format!("Perform a {kind} analysis of {}", request.symbol),
            Language::Chinese => format!("请对 {} 进行{}分析", request.symbol, kind_label_zh(kind)),
        };
        if let Some(market) = &request.market {
            body.push_str(&format!(" ({market})"));
        }
        body.push_str(".\n");
        Self {
            language: request.language,
            body,
            missing: Vec::new(),
        }
    }

    /// Header for the synthesis step
    pub fn synthesis(request: &AnalysisRequest) -> Self {
        let body = match request.language {
            Language::English => format!(
                "Combine the specialist analyses below into one investment report for {}.\n",
                request.symbol
            ),
            Language::Chinese => {
                format!("请将以下各项专业分析整合为一份关于 {} 的投资报告。\n", request.symbol)
            }
        };
        Self {
            language: request.language,
            body,
            missing: Vec::new(),
        }
    }

    /// Add a data section rendered as pretty JSON, or the unavailable marker
    pub fn section<T: Serialize>(mut self, title: &str, data: Option<&T>) -> Self {
        let rendered = match data.and_then(|d| serde_json::to_string_pretty(d).ok()) {
            Some(rendered) => rendered,
            None => {
                self.missing.push(title.to_string());
                self.unavailable().to_string()
            }
        };
        self.body.push_str(&format!("\n## {title}\n{rendered}\n"));
        self
    }

    /// Titles of the sections that had no data
    pub fn missing_inputs(&self) -> &[String] {
        &self.missing
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Add a free-text section
    pub fn text(mut self, title: &str, text: &str) -> Self {
        self.body.push_str(&format!("\n## {title}\n{text}\n"));
        self
    }

    /// Add the caller's clarification answers for `kind`, if any
    pub fn clarifications(mut self, kind: AgentKind, request: &AnalysisRequest) -> Self {
        let answers: Vec<&str> = request.answers_for(kind).collect();
        if answers.is_empty() {
            return self;
        }
        let title = match self.language {
            Language::English => "Clarifications from the user",
            Language::Chinese => "用户补充说明",
        };
        self.body.push_str(&format!("\n## {title}\n"));
        for answer in answers {
            self.body.push_str(&format!("- {answer}\n"));
        }
        self
    }

    /// Append the output contract and finish
    pub fn build(mut self, kind: AgentKind) -> String {
        self.body.push('\n');
        self.body.push_str(&output_contract(kind, self.language));
        self.body
    }

    /// Finish without a JSON contract
    pub fn finish(self) -> String {
        self.body
    }

    fn unavailable(&self) -> &'static str {
        match self.language {
            Language::English => UNAVAILABLE_EN,
            Language::Chinese => UNAVAILABLE_ZH,
        }
    }
}

fn kind_label_zh(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Fundamental => "基本面",
        AgentKind::Technical => "技术面",
        AgentKind::Sentiment => "市场情绪",
        AgentKind::News => "新闻",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::ClarificationAnswer;

    #[test]
    fn test_prompt_marks_missing_inputs() {
        let request = AnalysisRequest::new("AAPL").with_market("US");
        let prompt = UserPrompt::new(AgentKind::Fundamental, &request)
            .section("Company", Some(&serde_json::json!({"name": "Apple"})))
            .section::<serde_json::Value>("Financials", None);
        assert_eq!(prompt.missing_inputs(), ["Financials".to_string()]);
        let prompt = prompt.build(AgentKind::Fundamental);

        assert!(prompt.starts_with("Perform a fundamental analysis of AAPL (US)."));
        assert!(prompt.contains("\"name\": \"Apple\""));
        assert!(prompt.contains("## Financials\n(unavailable)"));
        assert!(prompt.contains("\"valuation\""));
    }

    #[test]
    fn test_prompt_includes_clarifications_in_chinese() {
        let request = AnalysisRequest::new("600519")
            .with_language(Language::Chinese)
            .with_clarification(ClarificationAnswer {
                agent: AgentKind::News,
                answer: "上交所 A 股".to_string(),
            });
        let prompt = UserPrompt::new(AgentKind::News, &request)
            .clarifications(AgentKind::News, &request)
            .build(AgentKind::News);

        assert!(prompt.contains("新闻分析"));
        assert!(prompt.contains("## 用户补充说明\n- 上交所 A 股"));
        assert!(prompt.contains("只回复一个 JSON 对象"));
    }
}
