use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peerfolio_core::domain::portfolio::{PortfolioRequest, RiskLevel};
use peerfolio_core::engine::PortfolioEngine;
use peerfolio_core::llm::{anthropic::AnthropicClient, RationaleClient};
use peerfolio_core::marketdata::{HttpJsonMarketData, MarketDataClient};

#[derive(Debug, Parser)]
#[command(name = "peerfolio")]
struct Args {
    /// Target company ticker symbol (e.g. AAPL).
    #[arg(long)]
    ticker: String,

    /// Investment amount in whole currency units (1,000-1,000,000).
    #[arg(long, default_value_t = 10_000.0)]
    amount: f64,

    /// Risk tolerance: low, medium, or high.
    #[arg(long, default_value = "medium")]
    risk: String,

    /// Skip the sector ETF line in the allocation.
    #[arg(long)]
    no_etfs: bool,

    /// Maximum number of holdings (3-5). Echoed in the request; strategies
    /// use their documented fixed tiers.
    #[arg(long, default_value_t = 5)]
    max_holdings: u32,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = peerfolio_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let risk_level: RiskLevel = args.risk.parse()?;

    let request = PortfolioRequest {
        ticker: args.ticker,
        investment_amount: args.amount,
        risk_level,
        include_etfs: !args.no_etfs,
        max_holdings: args.max_holdings,
    };
    request.validate()?;

    let market: Arc<dyn MarketDataClient> = Arc::new(
        HttpJsonMarketData::from_settings(&settings)
            .context("market data provider is required")?,
    );

    let rationale: Option<Arc<dyn RationaleClient>> =
        match AnthropicClient::from_settings(&settings) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "rationale generation disabled; template fallback only");
                None
            }
        };

    let engine = PortfolioEngine::new(market, rationale);

    match engine.generate(&request).await {
        Ok(report) => {
            let json = if args.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
            Ok(())
        }
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(ticker = %request.ticker, error = %err, "portfolio generation failed");
            Err(err)
        }
    }
}

fn init_sentry(settings: &peerfolio_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
