//! Configuration for stock analysis runs

use agent_core::{AgentKind, AnalysisRequest, Error, Language, Result};
use agent_utils::config::{EnvLookup, env_list, env_parse, env_string, process_env};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::time::Duration;

/// Configuration for stock analysis runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Model used for agent and synthesis calls
    pub model: String,

    /// Upstream id keying the token bucket and circuit breaker
    pub upstream_id: String,

    /// Max tokens per agent completion
    pub max_tokens: usize,

    /// Max tokens for the synthesis report
    pub synthesis_max_tokens: usize,

    /// Sampling temperature
    pub temperature: f32,

    /// Bound on each upstream call
    pub per_task_timeout: Duration,

    /// Bound on the whole fan-out phase
    pub global_deadline: Duration,

    /// Language used when the request does not set one
    pub default_language: Language,

    /// Agents run when the request does not name any
    pub default_agents: BTreeSet<AgentKind>,

    /// Price history window handed to the technical analyst
    pub history_period: String,
    pub history_interval: String,

    /// Cap on news items put into a prompt
    pub max_news_items: usize,

    /// Cache TTL for real-time data (quotes, prices)
    pub cache_ttl_realtime: Duration,

    /// Cache TTL for fundamental data
    pub cache_ttl_fundamental: Duration,

    /// Cache TTL for news data
    pub cache_ttl_news: Duration,

    /// Outbound market data calls per second; unthrottled when `None`
    #[serde(default)]
    pub data_rate_per_sec: Option<NonZeroU32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            upstream_id: "default".to_string(),
            max_tokens: 2048,
            synthesis_max_tokens: 4096,
            temperature: 0.3,
            per_task_timeout: Duration::from_secs(60),
            global_deadline: Duration::from_secs(90),
            default_language: Language::English,
            default_agents: AgentKind::ALL.into_iter().collect(),
            history_period: "6mo".to_string(),
            history_interval: "1d".to_string(),
            max_news_items: 20,
            cache_ttl_realtime: Duration::from_secs(60),     // 1 minute
            cache_ttl_fundamental: Duration::from_secs(3600), // 1 hour
            cache_ttl_news: Duration::from_secs(300),        // 5 minutes
            data_rate_per_sec: None,
        }
    }
}

/// Settings for one run after applying the request's overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveOptions {
    pub model: String,
    pub upstream_id: String,
    pub per_task_timeout: Duration,
    pub global_deadline: Duration,
}

impl AnalysisConfig {
    /// Create a new configuration builder
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Load from the process environment on top of the defaults
    ///
    /// Recognized keys: `ANALYSIS_MODEL`, `ANALYSIS_UPSTREAM`,
    /// `ANALYSIS_GLOBAL_DEADLINE_MS`, `ANALYSIS_PER_TASK_TIMEOUT_MS`,
    /// `ANALYSIS_LANGUAGE`, `ANALYSIS_AGENTS` (comma-separated),
    /// `ANALYSIS_DATA_RATE_PER_SEC`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Result<Self> {
        let mut config = Self::default();
        let invalid = |e: agent_utils::ConfigError| Error::Configuration(e.to_string());

        if let Some(model) = env_string(lookup, "ANALYSIS_MODEL") {
            config.model = model;
        }
        if let Some(upstream) = env_string(lookup, "ANALYSIS_UPSTREAM") {
            config.upstream_id = upstream;
        }
        if let Some(ms) = env_parse::<u64>(lookup, "ANALYSIS_GLOBAL_DEADLINE_MS").map_err(invalid)? {
            config.global_deadline = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>(lookup, "ANALYSIS_PER_TASK_TIMEOUT_MS").map_err(invalid)? {
            config.per_task_timeout = Duration::from_millis(ms);
        }
        if let Some(language) = env_string(lookup, "ANALYSIS_LANGUAGE") {
            config.default_language = language
                .parse()
                .map_err(|e: Error| Error::Configuration(e.to_string()))?;
        }
        if let Some(agents) = env_list(lookup, "ANALYSIS_AGENTS") {
            config.default_agents = agents
                .iter()
                .map(|a| a.parse::<AgentKind>())
                .collect::<Result<_>>()
                .map_err(|e| Error::Configuration(e.to_string()))?;
        }

        if let Some(rate) = env_parse::<NonZeroU32>(lookup, "ANALYSIS_DATA_RATE_PER_SEC").map_err(invalid)? {
            config.data_rate_per_sec = Some(rate);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("model must not be empty".to_string()));
        }
        if self.upstream_id.trim().is_empty() {
            return Err(Error::Configuration(
                "upstream_id must not be empty".to_string(),
            ));
        }
        if self.per_task_timeout.is_zero() || self.global_deadline.is_zero() {
            return Err(Error::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.default_agents.is_empty() {
            return Err(Error::Configuration(
                "default_agents must name at least one agent".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Configuration(format!(
                "temperature {} outside [0, 2]",
                self.temperature
            )));
        }
        Ok(())
    }

    /// Apply a request's overrides
    pub fn effective(&self, request: &AnalysisRequest) -> EffectiveOptions {
        let options = &request.options;
        EffectiveOptions {
            model: options.model.clone().unwrap_or_else(|| self.model.clone()),
            upstream_id: options
                .upstream_id
                .clone()
                .unwrap_or_else(|| self.upstream_id.clone()),
            per_task_timeout: options
                .per_task_timeout_ms
                .map_or(self.per_task_timeout, Duration::from_millis),
            global_deadline: options
                .global_deadline_ms
                .map_or(self.global_deadline, Duration::from_millis),
        }
    }
}

/// Builder for AnalysisConfig
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    model: Option<String>,
    upstream_id: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    per_task_timeout: Option<Duration>,
    global_deadline: Option<Duration>,
    default_language: Option<Language>,
    default_agents: Option<BTreeSet<AgentKind>>,
    cache_ttl_realtime: Option<Duration>,
    cache_ttl_fundamental: Option<Duration>,
    cache_ttl_news: Option<Duration>,
    data_rate_per_sec: Option<NonZeroU32>,
}

impl AnalysisConfigBuilder {
    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the upstream id
    pub fn upstream_id(mut self, upstream: impl Into<String>) -> Self {
        self.upstream_id = Some(upstream.into());
        self
    }

    /// Set max tokens per agent call
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the per-task timeout
    pub fn per_task_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout = Some(timeout);
        self
    }

    /// Set the global deadline
    pub fn global_deadline(mut self, deadline: Duration) -> Self {
        self.global_deadline = Some(deadline);
        self
    }

    /// Set the default language
    pub fn default_language(mut self, language: Language) -> Self {
        self.default_language = Some(language);
        self
    }

    /// Set the default agent set
    pub fn default_agents(mut self, agents: impl IntoIterator<Item = AgentKind>) -> Self {
        self.default_agents = Some(agents.into_iter().collect());
        self
    }

    /// Set cache TTL for real-time data
    pub fn cache_ttl_realtime(mut self, duration: Duration) -> Self {
        self.cache_ttl_realtime = Some(duration);
        self
    }

    /// Set cache TTL for fundamental data
    pub fn cache_ttl_fundamental(mut self, duration: Duration) -> Self {
        self.cache_ttl_fundamental = Some(duration);
        self
    }

    /// Set cache TTL for news data
    pub fn cache_ttl_news(mut self, duration: Duration) -> Self {
        self.cache_ttl_news = Some(duration);
        self
    }

    /// Cap outbound market data calls per second
    pub fn data_rate_per_sec(mut self, rate: NonZeroU32) -> Self {
        self.data_rate_per_sec = Some(rate);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AnalysisConfig> {
        let defaults = AnalysisConfig::default();

        let config = AnalysisConfig {
            model: self.model.unwrap_or(defaults.model),
            upstream_id: self.upstream_id.unwrap_or(defaults.upstream_id),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            per_task_timeout: self.per_task_timeout.unwrap_or(defaults.per_task_timeout),
            global_deadline: self.global_deadline.unwrap_or(defaults.global_deadline),
            default_language: self.default_language.unwrap_or(defaults.default_language),
            default_agents: self.default_agents.unwrap_or(defaults.default_agents),
            cache_ttl_realtime: self.cache_ttl_realtime.unwrap_or(defaults.cache_ttl_realtime),
            cache_ttl_fundamental: self
                .cache_ttl_fundamental
                .unwrap_or(defaults.cache_ttl_fundamental),
            cache_ttl_news: self.cache_ttl_news.unwrap_or(defaults.cache_ttl_news),
            data_rate_per_sec: self.data_rate_per_sec,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::RunOptions;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.per_task_timeout, Duration::from_secs(60));
        assert_eq!(config.global_deadline, Duration::from_secs(90));
        assert_eq!(config.default_agents.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = AnalysisConfig::builder()
            .model("gpt-4o")
            .per_task_timeout(Duration::from_secs(30))
            .default_agents([AgentKind::Technical])
            .build()
            .unwrap();

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.per_task_timeout, Duration::from_secs(30));
        assert_eq!(config.default_agents.len(), 1);
        assert_eq!(config.max_news_items, 20);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        assert!(
            AnalysisConfig::builder()
                .global_deadline(Duration::ZERO)
                .build()
                .is_err()
        );
        assert!(AnalysisConfig::builder().default_agents(Vec::new()).build().is_err());
        assert!(AnalysisConfig::builder().temperature(3.5).build().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars = env(&[
            ("ANALYSIS_MODEL", "qwen-max"),
            ("ANALYSIS_GLOBAL_DEADLINE_MS", "45000"),
            ("ANALYSIS_LANGUAGE", "zh"),
            ("ANALYSIS_AGENTS", "technical,news"),
        ]);
        let lookup = |key: &str| vars.get(key).cloned();
        let config = AnalysisConfig::from_lookup(&lookup).unwrap();

        assert_eq!(config.model, "qwen-max");
        assert_eq!(config.global_deadline, Duration::from_millis(45_000));
        assert_eq!(config.per_task_timeout, Duration::from_secs(60));
        assert_eq!(config.default_language, Language::Chinese);
        assert_eq!(
            config.default_agents,
            BTreeSet::from([AgentKind::Technical, AgentKind::News])
        );
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let vars = env(&[("ANALYSIS_AGENTS", "technical,astrology")]);
        let lookup = |key: &str| vars.get(key).cloned();
        assert!(matches!(
            AnalysisConfig::from_lookup(&lookup),
            Err(Error::Configuration(_))
        ));

        let vars = env(&[("ANALYSIS_PER_TASK_TIMEOUT_MS", "soon")]);
        let lookup = |key: &str| vars.get(key).cloned();
        assert!(AnalysisConfig::from_lookup(&lookup).is_err());

        let vars = env(&[("ANALYSIS_DATA_RATE_PER_SEC", "0")]);
        let lookup = |key: &str| vars.get(key).cloned();
        assert!(AnalysisConfig::from_lookup(&lookup).is_err());
    }

    #[test]
    fn test_data_rate() {
        assert_eq!(AnalysisConfig::default().data_rate_per_sec, None);

        let vars = env(&[("ANALYSIS_DATA_RATE_PER_SEC", "5")]);
        let lookup = |key: &str| vars.get(key).cloned();
        let config = AnalysisConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.data_rate_per_sec, NonZeroU32::new(5));

        let config = AnalysisConfig::builder()
            .data_rate_per_sec(NonZeroU32::MIN)
            .build()
            .unwrap();
        assert_eq!(config.data_rate_per_sec, NonZeroU32::new(1));
    }

    #[test]
    fn test_effective_applies_overrides() {
        let config = AnalysisConfig::default();
        let request = AnalysisRequest::new("AAPL").with_options(RunOptions {
            per_task_timeout_ms: Some(5_000),
            upstream_id: Some("backup".to_string()),
            ..RunOptions::default()
        });

        let effective = config.effective(&request);
        assert_eq!(effective.per_task_timeout, Duration::from_secs(5));
        assert_eq!(effective.global_deadline, Duration::from_secs(90));
        assert_eq!(effective.upstream_id, "backup");
        assert_eq!(effective.model, config.model);
    }
}
