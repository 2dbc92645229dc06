pub mod provider;
pub mod sectors;

pub use provider::HttpJsonMarketData;

use crate::domain::portfolio::FundamentalsRecord;

/// Market-data collaborator seam. Implementations absorb lookup failures:
/// `fetch_record` always produces a record and `find_peers` always produces a
/// list, degraded as needed, so per-ticker data problems never abort a run.
#[async_trait::async_trait]
pub trait MarketDataClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fundamentals for one ticker; a degraded "Unknown" record on failure.
    async fn fetch_record(&self, ticker: &str) -> FundamentalsRecord;

    /// Ordered peer tickers for the target, at most `limit`.
    async fn find_peers(&self, ticker: &str, limit: usize) -> Vec<String>;

    /// Sector ETF ticker, defaulting to a broad-market symbol.
    fn sector_etf(&self, sector: &str) -> String {
        sectors::sector_etf(sector).to_string()
    }
}

/// Record returned when a ticker cannot be resolved: display fields echo the
/// ticker and every metric is zero, which scores as neutral-ish downstream.
pub fn degraded_record(ticker: &str) -> FundamentalsRecord {
    FundamentalsRecord {
        ticker: ticker.to_string(),
        company_name: ticker.to_string(),
        sector: "Unknown".to_string(),
        industry: "Unknown".to_string(),
        market_cap: 0.0,
        market_cap_formatted: "N/A".to_string(),
        price: 0.0,
        pe_ratio: 0.0,
        profit_margin: 0.0,
        debt_to_equity: 0.0,
        revenue_growth: 0.0,
        earnings_growth: 0.0,
        score: None,
    }
}

pub fn format_market_cap(market_cap: f64) -> String {
    if market_cap >= 1.0e12 {
        format!("${:.1}T", market_cap / 1.0e12)
    } else if market_cap >= 1.0e9 {
        format!("${:.1}B", market_cap / 1.0e9)
    } else if market_cap >= 1.0e6 {
        format!("${:.1}M", market_cap / 1.0e6)
    } else {
        format!("${market_cap:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_market_cap_by_magnitude() {
        assert_eq!(format_market_cap(3.21e12), "$3.2T");
        assert_eq!(format_market_cap(45.6e9), "$45.6B");
        assert_eq!(format_market_cap(750.0e6), "$750.0M");
        assert_eq!(format_market_cap(12_345.0), "$12345");
        assert_eq!(format_market_cap(0.0), "$0");
    }

    #[test]
    fn degraded_record_is_neutral() {
        let record = degraded_record("ZZZZ");
        assert_eq!(record.company_name, "ZZZZ");
        assert_eq!(record.sector, "Unknown");
        assert_eq!(record.market_cap_formatted, "N/A");
        assert_eq!(record.score, None);
    }
}
