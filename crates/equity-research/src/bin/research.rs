//! Equity research CLI
//!
//! Runs one research request and prints the final report as JSON.
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//! export FMP_API_KEY="..."
//! export TAVILY_API_KEY="..."
//!
//! cargo run --bin research -p equity-research -- "analyze AAPL"
//! ```
//!
//! Exits with status 2 when the request names no valid ticker.

use anyhow::Context;
use clap::Parser;
use equity_research::config::parse_news_tools;
use equity_research::market::NewsSearch;
use equity_research::{
    DataSources, ExtractionMode, FmpClient, NewsToolKind, Orchestrator, ResearchConfig,
    TavilyClient,
};
use research_llm::providers::OpenAIProvider;
use research_utils::{LogFormat, init_tracing, load_dotenv};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "research", version, about = "Fundamental, technical and news research for one stock")]
struct Args {
    /// Free-text request naming a ticker, e.g. "analyze AAPL"
    request: String,

    /// How the ticker is pulled out of the request
    #[arg(long, value_name = "pattern|reasoning")]
    extractor: Option<ExtractionMode>,

    /// Bound on news tool-loop round trips
    #[arg(long, value_name = "N")]
    max_tool_round_trips: Option<usize>,

    /// News search tools in preference order
    #[arg(long, value_name = "tavily,fmp")]
    news_tools: Option<String>,

    /// Log output format
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Print the whole request outcome (trace and state) instead of the report
    #[arg(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    load_dotenv();
    init_tracing(args.log_format)?;

    let config = configure(&args)?;
    info!(model = %config.model, tools = ?config.news_tools, "Configuration loaded");

    let service = Arc::new(OpenAIProvider::from_env().context("reasoning service is not configured")?);
    let fmp = Arc::new(FmpClient::from_env(config.fmp_requests_per_minute)?);

    let mut news: Vec<(NewsToolKind, Arc<dyn NewsSearch>)> = Vec::new();
    for kind in &config.news_tools {
        let backend: Arc<dyn NewsSearch> = match kind {
            NewsToolKind::Fmp => fmp.clone(),
            NewsToolKind::Tavily => match TavilyClient::from_env() {
                Ok(tavily) => Arc::new(tavily),
                Err(e) => {
                    warn!(error = %e, "Tavily unavailable, continuing without it");
                    continue;
                }
            },
        };
        news.push((*kind, backend));
    }

    let orchestrator = Orchestrator::from_config(
        &config,
        service,
        DataSources {
            prices: fmp.clone(),
            fundamentals: fmp,
            news,
        },
    )?;

    let outcome = orchestrator.run(&args.request).await;
    if let Some(rejection) = &outcome.rejection {
        eprintln!("Request rejected: {rejection}");
        return Ok(ExitCode::from(2));
    }

    let output = if args.full {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string_pretty(&outcome.report)?
    };
    println!("{output}");
    Ok(ExitCode::SUCCESS)
}

/// Environment configuration with command-line overrides applied
fn configure(args: &Args) -> anyhow::Result<ResearchConfig> {
    let mut builder = ResearchConfig::builder().base(ResearchConfig::from_env()?);
    if let Some(mode) = args.extractor {
        builder = builder.extraction(mode);
    }
    if let Some(max) = args.max_tool_round_trips {
        builder = builder.max_tool_round_trips(max);
    }
    if let Some(raw) = &args.news_tools {
        builder = builder.news_tools(parse_news_tools(raw)?);
    }
    Ok(builder.build()?)
}
