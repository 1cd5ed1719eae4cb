//! User message templates

use super::render;
use crate::error::Result;
use minijinja::context;
use research_core::Ticker;
use serde::Serialize;

const FUNDAMENTAL_TEMPLATE: &str = "Analyze the following fundamental data for {{ ticker }} and provide your assessment:

{{ data }}

Please provide your analysis in the exact JSON format specified in the system message.";

const TECHNICAL_TEMPLATE: &str = "Analyze the following technical data for {{ ticker }} and provide your trading recommendation:

{{ data }}

Please provide your analysis in the exact JSON format specified in the system message.";

const NEWS_TEMPLATE: &str = "Analyze the latest news for {{ ticker }}.

Available news tools, in order of preference:
{% for tool in tools %}{{ loop.index }}. {{ tool }}
{% endfor %}
Search the last {{ lookback_days }} days (up to {{ max_results }} articles per search), then give your assessment \
in the exact JSON format specified in the system message.";

const SYNTHESIS_TEMPLATE: &str = "Ticker: {{ ticker }}

Fundamental analysis report (status: {{ fundamental_status }}):
{{ fundamental }}

Technical analysis report (status: {{ technical_status }}):
{{ technical }}

News analysis report (status: {{ news_status }}):
{{ news }}

Signal digest:
{{ digest }}

Based on the reports above, provide your comprehensive investment recommendation in the exact JSON format \
specified in the system message.";

fn pretty(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Fundamental analyst request
pub fn fundamental_prompt(ticker: &Ticker, data: &impl Serialize) -> Result<String> {
    render(FUNDAMENTAL_TEMPLATE, context! { ticker => ticker.as_str(), data => pretty(data) })
}

/// Technical analyst request
pub fn technical_prompt(ticker: &Ticker, data: &impl Serialize) -> Result<String> {
    render(TECHNICAL_TEMPLATE, context! { ticker => ticker.as_str(), data => pretty(data) })
}

/// News analyst request listing the tools in preference order
pub fn news_prompt(
    ticker: &Ticker,
    tools: &[&str],
    lookback_days: u32,
    max_results: usize,
) -> Result<String> {
    render(
        NEWS_TEMPLATE,
        context! {
            ticker => ticker.as_str(),
            tools => tools,
            lookback_days => lookback_days,
            max_results => max_results,
        },
    )
}

/// One input to the synthesis prompt
pub struct SynthesisInput<'a, T: Serialize> {
    /// Report status as shown to the analyst
    pub status: &'a str,
    /// Report body
    pub report: &'a T,
}

/// Synthesizer request
pub fn synthesis_prompt<F, T, N, D>(
    ticker: &Ticker,
    fundamental: SynthesisInput<'_, F>,
    technical: SynthesisInput<'_, T>,
    news: SynthesisInput<'_, N>,
    digest: &D,
) -> Result<String>
where
    F: Serialize,
    T: Serialize,
    N: Serialize,
    D: Serialize,
{
    render(
        SYNTHESIS_TEMPLATE,
        context! {
            ticker => ticker.as_str(),
            fundamental_status => fundamental.status,
            fundamental => pretty(fundamental.report),
            technical_status => technical.status,
            technical => pretty(technical.report),
            news_status => news.status,
            news => pretty(news.report),
            digest => pretty(digest),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_news_prompt_lists_tools_in_order() {
        let ticker = Ticker::parse("TSLA").unwrap();
        let prompt = news_prompt(&ticker, &["tavily_news_search", "fmp_stock_news"], 14, 5).unwrap();

        let first = prompt.find("1. tavily_news_search").unwrap();
        let second = prompt.find("2. fmp_stock_news").unwrap();
        assert!(first < second);
        assert!(prompt.contains("last 14 days"));
    }

    #[test]
    fn test_fundamental_prompt_embeds_data() {
        let ticker = Ticker::parse("AAPL").unwrap();
        let prompt = fundamental_prompt(&ticker, &json!({"ratios": [{"peRatio": 28.1}]})).unwrap();
        assert!(prompt.starts_with("Analyze the following fundamental data for AAPL"));
        assert!(prompt.contains("\"peRatio\": 28.1"));
    }

    #[test]
    fn test_synthesis_prompt() {
        let ticker = Ticker::parse("AAPL").unwrap();
        let prompt = synthesis_prompt(
            &ticker,
            SynthesisInput { status: "ok", report: &json!({"a": 1}) },
            SynthesisInput { status: "failed", report: &json!(null) },
            SynthesisInput { status: "degraded", report: &json!({"c": 3}) },
            &json!({"weightedScore": 0.2}),
        )
        .unwrap();
        assert!(prompt.contains("Technical analysis report (status: failed)"));
        assert!(prompt.contains("weightedScore"));
    }
}
