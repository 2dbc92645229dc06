use crate::domain::portfolio::{FormattedHolding, PortfolioSummary, RiskLevel, SectorWeight};

/// Largest-position percent above which a concentration warning is emitted.
const CONCENTRATION_WARNING_PERCENT: i64 = 35;

pub fn volatility_label(risk_level: RiskLevel) -> &'static str {
    match risk_level {
        RiskLevel::Low => "Low (10-15% annual)",
        RiskLevel::Medium => "Medium (15-25% annual)",
        RiskLevel::High => "High (25%+ annual)",
    }
}

/// Mean of the non-null quality scores, unrounded. Holdings without a score
/// (ETFs) are excluded from both numerator and denominator; the denominator
/// is floored at 1 so a scoreless portfolio averages 0.
pub fn average_quality(holdings: &[FormattedHolding]) -> f64 {
    let scored: Vec<f64> = holdings
        .iter()
        .filter_map(|h| h.earnings_quality_score)
        .collect();
    scored.iter().sum::<f64>() / scored.len().max(1) as f64
}

/// Sums allocation percent per sector, keeping first-occurrence order.
pub fn sector_concentration(holdings: &[FormattedHolding]) -> Vec<SectorWeight> {
    let mut entries: Vec<SectorWeight> = Vec::new();
    for holding in holdings {
        match entries.iter_mut().find(|e| e.sector == holding.sector) {
            Some(entry) => entry.percent += holding.allocation_percent,
            None => entries.push(SectorWeight {
                sector: holding.sector.clone(),
                percent: holding.allocation_percent,
            }),
        }
    }
    entries
}

/// Threshold-rule commentary on quality, diversification, and concentration.
/// Deterministic for a given set of holdings.
pub fn key_insights(holdings: &[FormattedHolding], avg_score: f64) -> Vec<String> {
    let mut insights = Vec::new();

    if avg_score >= 4.0 {
        insights.push(format!(
            "Strong average quality score of {avg_score:.1}/5 suggests robust fundamentals"
        ));
    } else if avg_score >= 3.0 {
        insights.push(format!(
            "Moderate quality score of {avg_score:.1}/5 indicates balanced risk-return profile"
        ));
    } else {
        insights.push(format!(
            "Below-average quality score of {avg_score:.1}/5 suggests higher risk exposure"
        ));
    }

    let holdings_count = holdings.len();
    if holdings_count >= 5 {
        insights.push(format!(
            "Well-diversified across {holdings_count} holdings reduces single-stock risk"
        ));
    } else {
        insights.push(format!(
            "Concentrated {holdings_count}-holding portfolio emphasizes conviction over diversification"
        ));
    }

    // Ties resolve to the earliest holding, which holds the larger strategy slot.
    let top = holdings.iter().reduce(|best, h| {
        if h.allocation_percent > best.allocation_percent {
            h
        } else {
            best
        }
    });
    if let Some(top) = top {
        if top.allocation_percent > CONCENTRATION_WARNING_PERCENT {
            insights.push(format!(
                "Largest position {} at {}% indicates high conviction",
                top.ticker, top.allocation_percent
            ));
        }
    }

    insights
}

pub fn summarize(holdings: &[FormattedHolding], risk_level: RiskLevel) -> PortfolioSummary {
    // Insight thresholds see the raw mean; only the reported field is rounded.
    let avg_score = average_quality(holdings);
    PortfolioSummary {
        total_holdings: holdings.len(),
        average_earnings_quality: (avg_score * 10.0).round() / 10.0,
        risk_profile: risk_level,
        expected_volatility: volatility_label(risk_level).to_string(),
        sector_concentration: sector_concentration(holdings),
        key_insights: key_insights(holdings, avg_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(ticker: &str, sector: &str, percent: i64, score: Option<f64>) -> FormattedHolding {
        FormattedHolding {
            ticker: ticker.to_string(),
            company_name: format!("{ticker} Inc."),
            allocation_percent: percent,
            allocation_amount: percent * 100,
            sector: sector.to_string(),
            earnings_quality_score: score,
            market_cap: "N/A".to_string(),
            rationale: String::new(),
        }
    }

    #[test]
    fn average_skips_unscored_holdings() {
        let holdings = vec![
            holding("XLK", "Technology", 40, None),
            holding("AAPL", "Technology", 30, Some(4.0)),
            holding("JPM", "Financial Services", 30, Some(3.0)),
        ];
        assert_eq!(average_quality(&holdings), 3.5);
    }

    #[test]
    fn average_is_zero_when_nothing_is_scored() {
        let holdings = vec![holding("SPY", "Unknown", 100, None)];
        assert_eq!(average_quality(&holdings), 0.0);
        assert_eq!(average_quality(&[]), 0.0);
    }

    #[test]
    fn concentration_sums_by_sector_in_first_occurrence_order() {
        let holdings = vec![
            holding("XLK", "Technology", 40, None),
            holding("JPM", "Financial Services", 25, Some(3.5)),
            holding("AAPL", "Technology", 20, Some(4.0)),
            holding("GS", "Financial Services", 15, Some(3.2)),
        ];
        let entries = sector_concentration(&holdings);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sector, "Technology");
        assert_eq!(entries[0].percent, 60);
        assert_eq!(entries[1].sector, "Financial Services");
        assert_eq!(entries[1].percent, 40);

        // No double counting or dropping: sector totals equal holding totals.
        let holdings_total: i64 = holdings.iter().map(|h| h.allocation_percent).sum();
        let sector_total: i64 = entries.iter().map(|e| e.percent).sum();
        assert_eq!(holdings_total, sector_total);
    }

    #[test]
    fn insights_flag_quality_bands() {
        let strong = vec![holding("A", "Technology", 50, Some(4.5))];
        let first = &key_insights(&strong, 4.5)[0];
        assert!(first.starts_with("Strong average quality score of 4.5/5"));

        let moderate = vec![holding("A", "Technology", 50, Some(3.2))];
        assert!(key_insights(&moderate, 3.2)[0].starts_with("Moderate quality score"));

        let weak = vec![holding("A", "Technology", 50, Some(2.0))];
        assert!(key_insights(&weak, 2.0)[0].starts_with("Below-average quality score"));
    }

    #[test]
    fn insights_flag_diversification_and_concentration() {
        let concentrated = vec![
            holding("A", "Technology", 40, Some(4.0)),
            holding("B", "Technology", 30, Some(3.5)),
            holding("C", "Technology", 20, Some(3.0)),
            holding("D", "Technology", 10, Some(2.5)),
        ];
        let insights = key_insights(&concentrated, 3.3);
        assert_eq!(insights.len(), 3);
        assert!(insights[1].contains("Concentrated 4-holding portfolio"));
        assert!(insights[2].contains("Largest position A at 40%"));

        let diversified: Vec<_> = (0..5)
            .map(|i| holding(&format!("T{i}"), "Technology", 20, Some(3.5)))
            .collect();
        let insights = key_insights(&diversified, 3.5);
        assert_eq!(insights.len(), 2);
        assert!(insights[1].contains("Well-diversified across 5 holdings"));
    }

    #[test]
    fn concentration_warning_names_first_of_tied_positions() {
        let holdings = vec![
            holding("A", "Technology", 40, Some(4.0)),
            holding("B", "Technology", 40, Some(3.5)),
            holding("C", "Technology", 20, Some(3.0)),
        ];
        let insights = key_insights(&holdings, 3.5);
        assert!(insights[2].contains("Largest position A at 40%"));
    }

    #[test]
    fn quality_band_uses_the_unrounded_mean() {
        // Mean of 3.966... displays as 4.0 but stays below the strong band.
        let holdings = vec![
            holding("A", "Technology", 40, Some(3.9)),
            holding("B", "Technology", 30, Some(4.0)),
            holding("C", "Technology", 30, Some(4.0)),
        ];
        let summary = summarize(&holdings, RiskLevel::Medium);
        assert_eq!(summary.average_earnings_quality, 4.0);
        assert!(summary.key_insights[0].starts_with("Moderate quality score of 4.0/5"));
    }

    #[test]
    fn summarize_assembles_all_fields() {
        let holdings = vec![
            holding("XLK", "Technology", 40, None),
            holding("AAPL", "Technology", 15, Some(4.0)),
            holding("MSFT", "Technology", 15, Some(4.0)),
            holding("GOOGL", "Technology", 15, Some(3.8)),
            holding("META", "Technology", 15, Some(3.8)),
        ];
        let summary = summarize(&holdings, RiskLevel::Low);
        assert_eq!(summary.total_holdings, 5);
        assert_eq!(summary.average_earnings_quality, 3.9);
        assert_eq!(summary.risk_profile, RiskLevel::Low);
        assert_eq!(summary.expected_volatility, "Low (10-15% annual)");
        assert_eq!(summary.sector_concentration.len(), 1);
        assert_eq!(summary.key_insights.len(), 3);
    }
}
