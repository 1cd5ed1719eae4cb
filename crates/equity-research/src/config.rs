//! Configuration for the research pipeline

use crate::error::{ResearchError, Result};
use research_utils::{env_parse, env_var};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// How the ticker is pulled out of the request text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Regex over uppercase tokens, no external calls
    Pattern,
    /// Ask the reasoning service
    #[default]
    Reasoning,
}

impl FromStr for ExtractionMode {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pattern" | "regex" => Ok(Self::Pattern),
            "reasoning" | "llm" => Ok(Self::Reasoning),
            other => Err(ResearchError::ConfigError(format!(
                "unknown extractor '{other}', expected 'pattern' or 'reasoning'"
            ))),
        }
    }
}

/// News search backends, listed in preference order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsToolKind {
    /// Tavily web search
    Tavily,
    /// FMP stock news feed
    Fmp,
}

impl FromStr for NewsToolKind {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tavily" => Ok(Self::Tavily),
            "fmp" => Ok(Self::Fmp),
            other => Err(ResearchError::ConfigError(format!(
                "unknown news tool '{other}', expected 'tavily' or 'fmp'"
            ))),
        }
    }
}

/// Parse a comma-separated tool list, keeping order and dropping repeats
pub fn parse_news_tools(raw: &str) -> Result<Vec<NewsToolKind>> {
    let mut tools = Vec::new();
    for part in raw.split(',').filter(|p| !p.trim().is_empty()) {
        let kind = part.parse::<NewsToolKind>()?;
        if !tools.contains(&kind) {
            tools.push(kind);
        }
    }
    Ok(tools)
}

/// Configuration for a research run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Model used for every reasoning call
    pub model: String,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Sampling temperature
    pub temperature: f32,

    /// Deadline for each data fetch and tool call
    pub fetch_timeout: Duration,

    /// Deadline for each reasoning call
    pub reasoning_timeout: Duration,

    /// Outer deadline for one analysis branch
    pub branch_timeout: Duration,

    /// Round-trip bound of the news tool loop
    pub max_tool_round_trips: usize,

    /// Tool calls executed per round trip
    pub max_tool_calls_per_round: usize,

    /// Days of daily price history fetched for the technical analysis
    pub history_days: u32,

    /// Days of news the search tools look back by default
    pub news_lookback_days: u32,

    /// Articles requested per search
    pub news_max_results: usize,

    /// Ticker extraction strategy
    pub extraction: ExtractionMode,

    /// News tools in preference order
    pub news_tools: Vec<NewsToolKind>,

    /// Financial Modeling Prep API key
    #[serde(skip_serializing)]
    pub fmp_api_key: Option<String>,

    /// Tavily API key
    #[serde(skip_serializing)]
    pub tavily_api_key: Option<String>,

    /// Request budget for the FMP key
    pub fmp_requests_per_minute: u32,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 2048,
            temperature: 0.0,
            fetch_timeout: Duration::from_secs(10),
            reasoning_timeout: Duration::from_secs(60),
            branch_timeout: Duration::from_secs(180),
            max_tool_round_trips: research_runtime::tool_loop::DEFAULT_MAX_ROUND_TRIPS,
            max_tool_calls_per_round: 4,
            history_days: 90,
            news_lookback_days: 14,
            news_max_results: 5,
            extraction: ExtractionMode::Reasoning,
            news_tools: vec![NewsToolKind::Tavily, NewsToolKind::Fmp],
            fmp_api_key: None,
            tavily_api_key: None,
            fmp_requests_per_minute: 300,
        }
    }
}

impl ResearchConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(model) = env_var("RESEARCH_MODEL") {
            config.model = model;
        }
        if let Some(v) = env_parse("RESEARCH_MAX_TOKENS")? {
            config.max_tokens = v;
        }
        if let Some(v) = env_parse("RESEARCH_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(secs) = env_parse("RESEARCH_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("RESEARCH_REASONING_TIMEOUT_SECS")? {
            config.reasoning_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("RESEARCH_BRANCH_TIMEOUT_SECS")? {
            config.branch_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = env_parse("RESEARCH_MAX_TOOL_ROUND_TRIPS")? {
            config.max_tool_round_trips = v;
        }
        if let Some(v) = env_parse("RESEARCH_HISTORY_DAYS")? {
            config.history_days = v;
        }
        if let Some(v) = env_parse("RESEARCH_NEWS_LOOKBACK_DAYS")? {
            config.news_lookback_days = v;
        }
        if let Some(mode) = env_parse("RESEARCH_EXTRACTOR")? {
            config.extraction = mode;
        }
        if let Some(raw) = env_var("RESEARCH_NEWS_TOOLS") {
            config.news_tools = parse_news_tools(&raw)?;
        }
        if let Some(v) = env_parse("FMP_REQUESTS_PER_MINUTE")? {
            config.fmp_requests_per_minute = v;
        }
        config.fmp_api_key = env_var("FMP_API_KEY");
        config.tavily_api_key = env_var("TAVILY_API_KEY");

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ResearchError::ConfigError("model must not be empty".to_string()));
        }
        if self.max_tool_round_trips == 0 {
            return Err(ResearchError::ConfigError(
                "max_tool_round_trips must be at least 1".to_string(),
            ));
        }
        if self.max_tool_calls_per_round == 0 {
            return Err(ResearchError::ConfigError(
                "max_tool_calls_per_round must be at least 1".to_string(),
            ));
        }
        if self.history_days == 0 || self.news_lookback_days == 0 {
            return Err(ResearchError::ConfigError(
                "look-back windows must be at least one day".to_string(),
            ));
        }
        if self.fmp_requests_per_minute == 0 {
            return Err(ResearchError::ConfigError(
                "fmp_requests_per_minute must be greater than 0".to_string(),
            ));
        }
        if [self.fetch_timeout, self.reasoning_timeout, self.branch_timeout]
            .iter()
            .any(Duration::is_zero)
        {
            return Err(ResearchError::ConfigError("timeouts must be non-zero".to_string()));
        }
        if self.news_tools.is_empty() {
            return Err(ResearchError::ConfigError(
                "at least one news tool must be configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for the news tool loop
    pub fn loop_config(&self, system_prompt: &str) -> research_runtime::LoopConfig {
        research_runtime::LoopConfig {
            max_round_trips: self.max_tool_round_trips,
            max_calls_per_round: self.max_tool_calls_per_round,
            model: self.model.clone(),
            system_prompt: Some(system_prompt.to_string()),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            reasoning_timeout: self.reasoning_timeout,
            tool_timeout: self.fetch_timeout,
        }
    }
}

/// Builder for ResearchConfig
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    config: Option<ResearchConfig>,
}

impl ResearchConfigBuilder {
    fn config(&mut self) -> &mut ResearchConfig {
        self.config.get_or_insert_with(ResearchConfig::default)
    }

    /// Start from an existing configuration
    pub fn base(mut self, config: ResearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config().model = model.into();
        self
    }

    /// Set the per-fetch deadline
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config().fetch_timeout = timeout;
        self
    }

    /// Set the per-reasoning-call deadline
    pub fn reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.config().reasoning_timeout = timeout;
        self
    }

    /// Set the per-branch deadline
    pub fn branch_timeout(mut self, timeout: Duration) -> Self {
        self.config().branch_timeout = timeout;
        self
    }

    /// Set the news loop round-trip bound
    pub fn max_tool_round_trips(mut self, max: usize) -> Self {
        self.config().max_tool_round_trips = max;
        self
    }

    /// Set the price history window
    pub fn history_days(mut self, days: u32) -> Self {
        self.config().history_days = days;
        self
    }

    /// Set the ticker extraction strategy
    pub fn extraction(mut self, mode: ExtractionMode) -> Self {
        self.config().extraction = mode;
        self
    }

    /// Set the news tools in preference order
    pub fn news_tools(mut self, tools: Vec<NewsToolKind>) -> Self {
        self.config().news_tools = tools;
        self
    }

    /// Set the FMP API key
    pub fn fmp_api_key(mut self, key: impl Into<String>) -> Self {
        self.config().fmp_api_key = Some(key.into());
        self
    }

    /// Set the Tavily API key
    pub fn tavily_api_key(mut self, key: impl Into<String>) -> Self {
        self.config().tavily_api_key = Some(key.into());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ResearchConfig> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tool_round_trips, 4);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.news_tools, vec![NewsToolKind::Tavily, NewsToolKind::Fmp]);
    }

    #[test]
    fn test_builder() {
        let config = ResearchConfig::builder()
            .model("gpt-4o")
            .max_tool_round_trips(2)
            .extraction(ExtractionMode::Pattern)
            .news_tools(vec![NewsToolKind::Fmp])
            .build()
            .unwrap();

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_tool_round_trips, 2);
        assert_eq!(config.extraction, ExtractionMode::Pattern);

        let loop_config = config.loop_config("system");
        assert_eq!(loop_config.max_round_trips, 2);
        assert_eq!(loop_config.tool_timeout, config.fetch_timeout);
        assert_eq!(loop_config.max_tool_calls(), 8);
    }

    #[test]
    fn test_validation() {
        assert!(ResearchConfig::builder().max_tool_round_trips(0).build().is_err());
        assert!(ResearchConfig::builder().news_tools(vec![]).build().is_err());
        assert!(ResearchConfig::builder().fetch_timeout(Duration::ZERO).build().is_err());
        assert!(ResearchConfig::builder().model("  ").build().is_err());
    }

    #[test]
    fn test_parse_news_tools() {
        assert_eq!(
            parse_news_tools("fmp, tavily,fmp").unwrap(),
            vec![NewsToolKind::Fmp, NewsToolKind::Tavily]
        );
        assert!(parse_news_tools("google").is_err());
        assert_eq!("Regex".parse::<ExtractionMode>().unwrap(), ExtractionMode::Pattern);
    }

    #[test]
    fn test_api_keys_not_serialized() {
        let config = ResearchConfig::builder().fmp_api_key("secret").build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
