use crate::domain::portfolio::{FormattedHolding, FundamentalsRecord, WeightedAllocation};
use std::collections::HashMap;

/// Converts strategy weights into report rows with currency amounts.
///
/// Percent and amount are truncated, not rounded, so the displayed amounts can
/// fall short of the nominal investment by up to one unit per holding. Tickers
/// without a record get degraded display fields (name = ticker, sector
/// "Unknown", market cap "N/A"). Rationale strings start empty and are filled
/// in after narrative generation.
pub fn format_allocation(
    allocations: &[WeightedAllocation],
    investment_amount: f64,
    records: &HashMap<String, FundamentalsRecord>,
) -> Vec<FormattedHolding> {
    allocations
        .iter()
        .map(|allocation| {
            let record = records.get(&allocation.ticker);
            FormattedHolding {
                ticker: allocation.ticker.clone(),
                company_name: record
                    .map(|r| r.company_name.clone())
                    .unwrap_or_else(|| allocation.ticker.clone()),
                allocation_percent: (allocation.weight * 100.0) as i64,
                allocation_amount: (investment_amount * allocation.weight) as i64,
                sector: record
                    .map(|r| r.sector.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                earnings_quality_score: record.and_then(|r| r.score),
                market_cap: record
                    .map(|r| r.market_cap_formatted.clone())
                    .unwrap_or_else(|| "N/A".to_string()),
                rationale: String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ticker: &str, name: &str, sector: &str, score: f64) -> FundamentalsRecord {
        FundamentalsRecord {
            ticker: ticker.to_string(),
            company_name: name.to_string(),
            sector: sector.to_string(),
            industry: String::new(),
            market_cap: 1.0e12,
            market_cap_formatted: "$1.0T".to_string(),
            price: 100.0,
            pe_ratio: 20.0,
            profit_margin: 0.2,
            debt_to_equity: 40.0,
            revenue_growth: 0.1,
            earnings_growth: 0.1,
            score: Some(score),
        }
    }

    #[test]
    fn truncates_percent_and_amount() {
        let records = HashMap::from([(
            "AAPL".to_string(),
            record("AAPL", "Apple Inc.", "Technology", 4.2),
        )]);
        let allocations = vec![WeightedAllocation {
            ticker: "AAPL".to_string(),
            weight: 0.3333333,
        }];

        let rows = format_allocation(&allocations, 9_999.0, &records);
        assert_eq!(rows.len(), 1);
        // 33.33333% truncates to 33; 3332.99... truncates to 3332.
        assert_eq!(rows[0].allocation_percent, 33);
        assert_eq!(rows[0].allocation_amount, 3332);
        assert_eq!(rows[0].company_name, "Apple Inc.");
        assert_eq!(rows[0].earnings_quality_score, Some(4.2));
        assert!(rows[0].rationale.is_empty());
    }

    #[test]
    fn amount_never_exceeds_investment() {
        let records = HashMap::new();
        let allocations = vec![WeightedAllocation {
            ticker: "SPY".to_string(),
            weight: 1.0,
        }];
        let rows = format_allocation(&allocations, 250_000.0, &records);
        assert!(rows[0].allocation_amount <= 250_000);
        assert_eq!(rows[0].allocation_percent, 100);
    }

    #[test]
    fn missing_record_degrades_display_fields() {
        let rows = format_allocation(
            &[WeightedAllocation {
                ticker: "ZZZZ".to_string(),
                weight: 0.5,
            }],
            10_000.0,
            &HashMap::new(),
        );
        assert_eq!(rows[0].company_name, "ZZZZ");
        assert_eq!(rows[0].sector, "Unknown");
        assert_eq!(rows[0].market_cap, "N/A");
        assert_eq!(rows[0].earnings_quality_score, None);
    }

    #[test]
    fn preserves_allocation_order() {
        let allocations = vec![
            WeightedAllocation {
                ticker: "B".to_string(),
                weight: 0.6,
            },
            WeightedAllocation {
                ticker: "A".to_string(),
                weight: 0.4,
            },
        ];
        let rows = format_allocation(&allocations, 10_000.0, &HashMap::new());
        assert_eq!(rows[0].ticker, "B");
        assert_eq!(rows[1].ticker, "A");
    }
}
