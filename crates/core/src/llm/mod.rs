pub mod anthropic;
pub mod error;
pub mod json;

use crate::domain::contract::PortfolioRationale;
use crate::domain::portfolio::{FormattedHolding, FundamentalsRecord, RiskLevel};

/// Everything the narrative collaborator needs to explain one allocation.
#[derive(Debug, Clone)]
pub struct RationaleInput {
    pub target_ticker: String,
    pub target: FundamentalsRecord,
    pub holdings: Vec<FormattedHolding>,
    pub risk_level: RiskLevel,
    pub investment_amount: f64,
}

#[derive(Debug, Clone)]
pub enum Provider {
    Anthropic,
}

/// Narrative collaborator seam. Failures here are caught by the engine and
/// downgraded to the deterministic template path; they never abort a run.
#[async_trait::async_trait]
pub trait RationaleClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_rationale(&self, input: RationaleInput)
        -> anyhow::Result<PortfolioRationale>;
}
