use crate::allocation::format::format_allocation;
use crate::allocation::strategies;
use crate::domain::portfolio::{
    data_source_labels, FormattedHolding, FundamentalsRecord, PortfolioReport, PortfolioRequest,
    RequestEcho, RiskLevel, ScoredCandidate, RISK_DISCLOSURE,
};
use crate::llm::{RationaleClient, RationaleInput};
use crate::marketdata::MarketDataClient;
use crate::scoring;
use crate::summary;
use std::collections::HashMap;
use std::sync::Arc;

/// Target plus up to this many sector peers enter scoring.
const PEER_DISCOVERY_LIMIT: usize = 8;

const GENERIC_HOLDING_RATIONALE: &str = "Diversification component";

/// Sequences one allocation run: fetch target, discover and score peers, run
/// the risk-selected strategy, format, narrate, summarize. Stateless across
/// requests; every run builds fresh records.
pub struct PortfolioEngine {
    market: Arc<dyn MarketDataClient>,
    rationale: Option<Arc<dyn RationaleClient>>,
}

impl PortfolioEngine {
    /// `rationale: None` runs permanently on the template path (e.g. no API
    /// key configured); the report is still complete.
    pub fn new(
        market: Arc<dyn MarketDataClient>,
        rationale: Option<Arc<dyn RationaleClient>>,
    ) -> Self {
        Self { market, rationale }
    }

    pub async fn generate(&self, request: &PortfolioRequest) -> anyhow::Result<PortfolioReport> {
        request.validate()?;
        let ticker = request.normalized_ticker();

        tracing::info!(%ticker, risk = %request.risk_level, "generating portfolio");

        let mut target = self.market.fetch_record(&ticker).await;
        let target_score = scoring::quality_score(&target);
        target.score = Some(target_score);

        let peer_tickers = self.market.find_peers(&ticker, PEER_DISCOVERY_LIMIT).await;
        tracing::debug!(%ticker, sector = %target.sector, peers = peer_tickers.len(), "peer discovery done");

        let mut records: HashMap<String, FundamentalsRecord> = HashMap::new();
        let mut candidates = vec![ScoredCandidate {
            ticker: ticker.clone(),
            score: target_score,
        }];
        records.insert(ticker.clone(), target.clone());

        for peer in peer_tickers {
            if peer == ticker {
                continue;
            }
            let mut record = self.market.fetch_record(&peer).await;
            let score = scoring::quality_score(&record);
            record.score = Some(score);
            candidates.push(ScoredCandidate {
                ticker: peer.clone(),
                score,
            });
            records.insert(peer, record);
        }

        // Stable sort: ties keep target-first / discovery order.
        strategies::rank(&mut candidates);

        let etf_ticker = request
            .include_etfs
            .then(|| self.market.sector_etf(&target.sector));

        let allocations = match request.risk_level {
            RiskLevel::Low => strategies::conservative(&candidates, etf_ticker.as_deref()),
            RiskLevel::Medium => strategies::quality_weighted(&candidates, etf_ticker.as_deref()),
            RiskLevel::High => {
                strategies::concentrated(&candidates, &ticker, etf_ticker.as_deref())
            }
        };

        if let Some(etf) = &etf_ticker {
            let mut record = self.market.fetch_record(etf).await;
            // Index instruments are never scored.
            record.score = None;
            record.market_cap_formatted = "ETF".to_string();
            records.insert(etf.clone(), record);
        }

        let mut holdings = format_allocation(&allocations, request.investment_amount, &records);

        let overall = self
            .attach_rationales(&ticker, &target, &mut holdings, request)
            .await;

        let summary = summary::summarize(&holdings, request.risk_level);

        Ok(PortfolioReport {
            request: RequestEcho {
                ticker,
                ticker_name: target.company_name.clone(),
                investment_amount: request.investment_amount,
                risk_level: request.risk_level,
                analysis_date: chrono::Utc::now().date_naive(),
            },
            allocation: holdings,
            summary,
            rationale: overall,
            risk_disclosure: RISK_DISCLOSURE.to_string(),
            data_sources: data_source_labels(),
        })
    }

    /// Fills per-holding rationale strings and returns the overall text. Any
    /// failure from the narrative collaborator is absorbed here and replaced
    /// by the deterministic template; it never propagates.
    async fn attach_rationales(
        &self,
        ticker: &str,
        target: &FundamentalsRecord,
        holdings: &mut [FormattedHolding],
        request: &PortfolioRequest,
    ) -> String {
        let llm_result = match &self.rationale {
            Some(client) => {
                client
                    .generate_rationale(RationaleInput {
                        target_ticker: ticker.to_string(),
                        target: target.clone(),
                        holdings: holdings.to_vec(),
                        risk_level: request.risk_level,
                        investment_amount: request.investment_amount,
                    })
                    .await
            }
            None => Err(anyhow::anyhow!("no rationale client configured")),
        };

        match llm_result {
            Ok(rationale) => {
                for holding in holdings.iter_mut() {
                    holding.rationale = rationale
                        .holdings
                        .get(&holding.ticker)
                        .cloned()
                        .unwrap_or_else(|| GENERIC_HOLDING_RATIONALE.to_string());
                }
                rationale.overall
            }
            Err(err) => {
                tracing::warn!(%ticker, error = %err, "rationale generation failed; using template");
                for holding in holdings.iter_mut() {
                    holding.rationale =
                        format!("{} - {} exposure", holding.company_name, holding.sector);
                }
                template_rationale(ticker, holdings, request.risk_level)
            }
        }
    }
}

/// Deterministic fallback for the overall rationale. Unlike the summary
/// average, this one counts unscored ETF lines as zero, matching the
/// template's portfolio-wide framing.
pub fn template_rationale(
    target_ticker: &str,
    holdings: &[FormattedHolding],
    risk_level: RiskLevel,
) -> String {
    let avg_score = holdings
        .iter()
        .map(|h| h.earnings_quality_score.unwrap_or(0.0))
        .sum::<f64>()
        / holdings.len().max(1) as f64;

    let risk_desc = match risk_level {
        RiskLevel::Low => "conservative, ETF-heavy",
        RiskLevel::Medium => "balanced quality-weighted",
        RiskLevel::High => "concentrated high-conviction",
    };
    let health = if avg_score > 3.5 { "strong" } else { "moderate" };

    format!(
        "This {risk_desc} portfolio is centered on {target_ticker} with diversification \
across {} holdings. The average quality score of {avg_score:.1}/5.0 indicates {health} \
fundamental health across the portfolio. The allocation strategy prioritizes \
{risk_level} risk tolerance while maintaining exposure to the target sector and \
related industries.",
        holdings.len()
    )
}
