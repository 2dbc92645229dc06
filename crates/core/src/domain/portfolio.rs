use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk tolerance selecting which allocation strategy runs.
///
/// Exhaustive on purpose: invalid values are rejected at the request boundary
/// (serde or `FromStr`), so the strategy selector never needs a default arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => anyhow::bail!("risk level must be low|medium|high (got {other:?})"),
        }
    }
}

/// Normalized fundamentals for one ticker, as returned by the market-data
/// collaborator. Missing numeric fields are zero. `score` is attached by the
/// engine after scoring and stays `None` for ETFs/index instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub ticker: String,
    pub company_name: String,
    #[serde(default = "unknown_sector")]
    pub sector: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub market_cap: f64,
    #[serde(default = "na_market_cap")]
    pub market_cap_formatted: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub pe_ratio: f64,
    #[serde(default)]
    pub profit_margin: f64,
    #[serde(default)]
    pub debt_to_equity: f64,
    #[serde(default)]
    pub revenue_growth: f64,
    #[serde(default)]
    pub earnings_growth: f64,
    #[serde(default)]
    pub score: Option<f64>,
}

fn unknown_sector() -> String {
    "Unknown".to_string()
}

fn na_market_cap() -> String {
    "N/A".to_string()
}

/// (ticker, quality score) pair ranked before entering a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub ticker: String,
    pub score: f64,
}

/// One line of a strategy's output: a weight fraction in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedAllocation {
    pub ticker: String,
    pub weight: f64,
}

/// One row of the final report. Percent and amount are truncated integers;
/// the displayed amounts can undershoot the nominal total by up to one
/// currency unit per holding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattedHolding {
    pub ticker: String,
    pub company_name: String,
    pub allocation_percent: i64,
    pub allocation_amount: i64,
    pub sector: String,
    pub earnings_quality_score: Option<f64>,
    pub market_cap: String,
    pub rationale: String,
}

/// Allocation percent summed per sector, in first-occurrence order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorWeight {
    pub sector: String,
    pub percent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_holdings: usize,
    pub average_earnings_quality: f64,
    pub risk_profile: RiskLevel,
    pub expected_volatility: String,
    pub sector_concentration: Vec<SectorWeight>,
    pub key_insights: Vec<String>,
}

/// Incoming generation request. Amount and max_holdings ranges are enforced by
/// [`PortfolioRequest::validate`] at the API/CLI boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRequest {
    pub ticker: String,
    pub investment_amount: f64,
    pub risk_level: RiskLevel,
    #[serde(default = "default_include_etfs")]
    pub include_etfs: bool,
    #[serde(default = "default_max_holdings")]
    pub max_holdings: u32,
}

fn default_include_etfs() -> bool {
    true
}

fn default_max_holdings() -> u32 {
    5
}

pub const MIN_INVESTMENT_AMOUNT: f64 = 1_000.0;
pub const MAX_INVESTMENT_AMOUNT: f64 = 1_000_000.0;
pub const MIN_MAX_HOLDINGS: u32 = 3;
pub const MAX_MAX_HOLDINGS: u32 = 5;

impl PortfolioRequest {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.ticker.trim().is_empty(),
            "ticker must be non-empty"
        );
        anyhow::ensure!(
            (MIN_INVESTMENT_AMOUNT..=MAX_INVESTMENT_AMOUNT).contains(&self.investment_amount),
            "investment amount must be between {MIN_INVESTMENT_AMOUNT} and {MAX_INVESTMENT_AMOUNT} (got {})",
            self.investment_amount
        );
        anyhow::ensure!(
            (MIN_MAX_HOLDINGS..=MAX_MAX_HOLDINGS).contains(&self.max_holdings),
            "max holdings must be between {MIN_MAX_HOLDINGS} and {MAX_MAX_HOLDINGS} (got {})",
            self.max_holdings
        );
        Ok(())
    }

    /// Canonicalized ticker used for all lookups.
    pub fn normalized_ticker(&self) -> String {
        self.ticker.trim().to_ascii_uppercase()
    }
}

/// Echo of the request carried in the report header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEcho {
    pub ticker: String,
    pub ticker_name: String,
    pub investment_amount: f64,
    pub risk_level: RiskLevel,
    pub analysis_date: NaiveDate,
}

/// Top-level output of one generation run. Built once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub request: RequestEcho,
    pub allocation: Vec<FormattedHolding>,
    pub summary: PortfolioSummary,
    pub rationale: String,
    pub risk_disclosure: String,
    pub data_sources: Vec<String>,
}

pub const RISK_DISCLOSURE: &str = "Past performance does not guarantee future results. \
All investments carry risk of loss. This allocation is for informational purposes only \
and does not constitute financial advice.";

pub fn data_source_labels() -> Vec<String> {
    vec![
        "Market data provider (fundamentals)".to_string(),
        "Fundamental analysis (quality scores)".to_string(),
        "Anthropic Claude (rationale generation)".to_string(),
    ]
}
