//! Curated peer groups and sector ETF mappings.
//!
//! Peer discovery is taxonomy-driven rather than screened: each sector maps to
//! a fixed list of large-cap names, with a special-case group for fintechs
//! whose sector classification is unhelpfully broad.

const TECHNOLOGY: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "META", "NVDA", "AMD", "INTC", "AVGO", "ORCL", "CRM",
];
const FINANCIAL_SERVICES: &[&str] = &["JPM", "BAC", "WFC", "GS", "MS", "C", "SCHW", "BLK"];
const COMMUNICATION_SERVICES: &[&str] = &["GOOGL", "META", "DIS", "NFLX", "CMCSA", "T", "VZ"];
const CONSUMER_CYCLICAL: &[&str] = &["AMZN", "TSLA", "HD", "NKE", "MCD", "SBUX", "TGT"];
const HEALTHCARE: &[&str] = &["JNJ", "UNH", "PFE", "ABBV", "TMO", "MRK", "ABT", "DHR"];
const CONSUMER_DEFENSIVE: &[&str] = &["PG", "KO", "PEP", "WMT", "COST", "PM", "MO"];
const INDUSTRIALS: &[&str] = &["BA", "HON", "UPS", "CAT", "GE", "MMM", "LMT"];
const ENERGY: &[&str] = &["XOM", "CVX", "COP", "SLB", "EOG", "MPC"];
const REAL_ESTATE: &[&str] = &["AMT", "PLD", "CCI", "EQIX", "PSA", "SPG"];
const UTILITIES: &[&str] = &["NEE", "DUK", "SO", "D", "AEP"];
const BASIC_MATERIALS: &[&str] = &["LIN", "APD", "ECL", "DD", "NEM"];

const FINTECH: &[&str] = &["HOOD", "COIN", "SOFI", "SQ", "PYPL", "AFRM"];
const FINTECH_TRADITIONAL: &[&str] = &["SCHW", "MS", "GS"];

/// Large-cap fallback when the sector is unrecognized.
const LARGE_CAP_FALLBACK: &[&str] = &["SPY", "QQQ", "AAPL", "MSFT", "GOOGL"];

/// Minimal index pair returned when the target lookup itself fails.
const LOOKUP_FAILURE_PEERS: &[&str] = &["SPY", "QQQ"];

pub fn lookup_failure_peers() -> Vec<String> {
    LOOKUP_FAILURE_PEERS.iter().map(|t| t.to_string()).collect()
}

/// Broad-market default when no sector ETF is known.
pub const DEFAULT_ETF: &str = "SPY";

fn sector_group(sector: &str) -> Option<&'static [&'static str]> {
    match sector {
        "Technology" => Some(TECHNOLOGY),
        "Financial Services" => Some(FINANCIAL_SERVICES),
        "Communication Services" => Some(COMMUNICATION_SERVICES),
        "Consumer Cyclical" => Some(CONSUMER_CYCLICAL),
        "Healthcare" => Some(HEALTHCARE),
        "Consumer Defensive" => Some(CONSUMER_DEFENSIVE),
        "Industrials" => Some(INDUSTRIALS),
        "Energy" => Some(ENERGY),
        "Real Estate" => Some(REAL_ESTATE),
        "Utilities" => Some(UTILITIES),
        "Basic Materials" => Some(BASIC_MATERIALS),
        _ => None,
    }
}

/// Returns up to `limit` peer tickers for `ticker` in `sector`, excluding the
/// ticker itself. Fintechs get their own cross-sector group padded with
/// traditional brokers; unknown sectors fall back to a large-cap list.
pub fn peers_for(ticker: &str, sector: &str, limit: usize) -> Vec<String> {
    if FINTECH.contains(&ticker) {
        let mut peers: Vec<String> = FINTECH
            .iter()
            .filter(|t| **t != ticker)
            .map(|t| t.to_string())
            .collect();
        peers.extend(FINTECH_TRADITIONAL.iter().map(|t| t.to_string()));
        peers.truncate(limit);
        return peers;
    }

    let group = sector_group(sector).unwrap_or(LARGE_CAP_FALLBACK);
    group
        .iter()
        .filter(|t| **t != ticker)
        .take(limit)
        .map(|t| t.to_string())
        .collect()
}

pub fn sector_etf(sector: &str) -> &'static str {
    match sector {
        "Technology" => "XLK",
        "Financial Services" => "XLF",
        "Healthcare" => "XLV",
        "Energy" => "XLE",
        "Consumer Cyclical" => "XLY",
        "Consumer Defensive" => "XLP",
        "Industrials" => "XLI",
        "Real Estate" => "XLRE",
        "Utilities" => "XLU",
        "Basic Materials" => "XLB",
        "Communication Services" => "XLC",
        _ => DEFAULT_ETF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_the_ticker_itself() {
        let peers = peers_for("AAPL", "Technology", 8);
        assert_eq!(peers.len(), 8);
        assert!(!peers.contains(&"AAPL".to_string()));
        assert_eq!(peers[0], "MSFT");
    }

    #[test]
    fn respects_the_limit() {
        let peers = peers_for("XOM", "Energy", 3);
        assert_eq!(peers, ["CVX", "COP", "SLB"]);
    }

    #[test]
    fn fintech_group_overrides_sector() {
        let peers = peers_for("HOOD", "Financial Services", 10);
        assert!(peers.contains(&"COIN".to_string()));
        assert!(peers.contains(&"SCHW".to_string()));
        assert!(!peers.contains(&"HOOD".to_string()));
        assert_eq!(peers.len(), 8);
    }

    #[test]
    fn unknown_sector_falls_back_to_large_caps() {
        let peers = peers_for("ZZZZ", "Unknown", 5);
        assert_eq!(peers, ["SPY", "QQQ", "AAPL", "MSFT", "GOOGL"]);
    }

    #[test]
    fn sector_etf_mapping() {
        assert_eq!(sector_etf("Technology"), "XLK");
        assert_eq!(sector_etf("Financial Services"), "XLF");
        assert_eq!(sector_etf("Communication Services"), "XLC");
        assert_eq!(sector_etf("Unknown"), DEFAULT_ETF);
    }
}
