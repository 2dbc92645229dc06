use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peerfolio_core::domain::portfolio::{PortfolioReport, PortfolioRequest};
use peerfolio_core::engine::PortfolioEngine;
use peerfolio_core::llm::{anthropic::AnthropicClient, RationaleClient};
use peerfolio_core::marketdata::{HttpJsonMarketData, MarketDataClient};
use peerfolio_core::scoring;

const SERVICE_NAME: &str = "peerfolio-api";
const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

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

    let market: Option<Arc<dyn MarketDataClient>> =
        match HttpJsonMarketData::from_settings(&settings) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                sentry_anyhow::capture_anyhow(&e);
                tracing::error!(error = %e, "market data not configured; starting API in degraded mode");
                None
            }
        };

    let rationale: Option<Arc<dyn RationaleClient>> =
        match AnthropicClient::from_settings(&settings) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "rationale generation disabled; template fallback only");
                None
            }
        };

    let llm_configured = rationale.is_some();
    let engine = market
        .clone()
        .map(|m| Arc::new(PortfolioEngine::new(m, rationale)));

    let state = AppState {
        market,
        engine,
        llm_configured,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api", get(api_info))
        .route("/health", get(health_check))
        .route("/api/v1/portfolio/generate", post(generate_portfolio))
        .route("/api/v1/portfolio/compare", get(compare_risk_levels))
        .route("/api/v1/scores/:ticker", get(get_ticker_score))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    market: Option<Arc<dyn MarketDataClient>>,
    engine: Option<Arc<PortfolioEngine>>,
    llm_configured: bool,
}

#[derive(Debug, Serialize)]
struct ApiInfo {
    service: &'static str,
    status: &'static str,
    version: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

async fn api_info() -> Json<ApiInfo> {
    Json(ApiInfo {
        service: SERVICE_NAME,
        status: "healthy",
        version: SERVICE_VERSION,
        timestamp: chrono::Utc::now(),
    })
}

#[derive(Debug, Serialize)]
struct HealthChecks {
    api: &'static str,
    market_data: &'static str,
    llm: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    checks: HealthChecks,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.engine.is_some() {
            "healthy"
        } else {
            "degraded"
        },
        checks: HealthChecks {
            api: "ok",
            market_data: if state.market.is_some() {
                "ok"
            } else {
                "not_configured"
            },
            llm: if state.llm_configured { "ok" } else { "missing_key" },
        },
    })
}

async fn generate_portfolio(
    State(state): State<AppState>,
    Json(request): Json<PortfolioRequest>,
) -> Result<Json<PortfolioReport>, StatusCode> {
    let Some(engine) = &state.engine else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    if let Err(e) = request.validate() {
        tracing::warn!(error = %e, "rejected portfolio request");
        return Err(StatusCode::BAD_REQUEST);
    }

    let report = engine.generate(&request).await.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(ticker = %request.ticker, error = %e, "portfolio generation failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct TickerScore {
    ticker: String,
    company_name: String,
    sector: String,
    earnings_quality_score: f64,
    market_cap: String,
}

async fn get_ticker_score(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<TickerScore>, StatusCode> {
    let Some(market) = &state.market else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let ticker = ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let record = market.fetch_record(&ticker).await;
    let score = scoring::quality_score(&record);

    Ok(Json(TickerScore {
        ticker: record.ticker,
        company_name: record.company_name,
        sector: record.sector,
        earnings_quality_score: score,
        market_cap: record.market_cap_formatted,
    }))
}

async fn compare_risk_levels() -> StatusCode {
    // Cross-risk comparison is not offered yet.
    StatusCode::NOT_IMPLEMENTED
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
