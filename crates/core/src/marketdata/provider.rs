use crate::config::Settings;
use crate::domain::portfolio::FundamentalsRecord;
use crate::marketdata::{degraded_record, format_market_cap, sectors, MarketDataClient};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PATH: &str = "/v1/fundamentals";
const DEFAULT_RETRIES: u32 = 3;

/// Fundamentals over a JSON-over-HTTP provider.
///
/// Expects `GET {base_url}{path}?ticker=XYZ` to return a flat fundamentals
/// object. Field normalization is lenient: any missing metric deserializes to
/// zero so a sparse provider payload still yields a usable record.
#[derive(Debug, Clone)]
pub struct HttpJsonMarketData {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    path: String,
    retries: u32,
}

/// Raw provider payload before normalization into a [`FundamentalsRecord`].
#[derive(Debug, Clone, Deserialize)]
struct FundamentalsPayload {
    ticker: Option<String>,
    #[serde(alias = "long_name", alias = "short_name")]
    company_name: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    #[serde(default)]
    market_cap: f64,
    #[serde(default, alias = "current_price", alias = "regular_market_price")]
    price: f64,
    #[serde(default, alias = "trailing_pe")]
    pe_ratio: f64,
    #[serde(default, alias = "profit_margins")]
    profit_margin: f64,
    #[serde(default)]
    debt_to_equity: f64,
    #[serde(default)]
    revenue_growth: f64,
    #[serde(default)]
    earnings_growth: f64,
}

impl FundamentalsPayload {
    fn into_record(self, requested_ticker: &str) -> FundamentalsRecord {
        let ticker = self
            .ticker
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| requested_ticker.to_string());
        let market_cap_formatted = if self.market_cap > 0.0 {
            format_market_cap(self.market_cap)
        } else {
            "N/A".to_string()
        };
        FundamentalsRecord {
            company_name: self
                .company_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| ticker.clone()),
            sector: self.sector.unwrap_or_else(|| "Unknown".to_string()),
            industry: self.industry.unwrap_or_else(|| "Unknown".to_string()),
            market_cap: self.market_cap,
            market_cap_formatted,
            price: self.price,
            pe_ratio: self.pe_ratio,
            profit_margin: self.profit_margin,
            debt_to_equity: self.debt_to_equity,
            revenue_growth: self.revenue_growth,
            earnings_growth: self.earnings_growth,
            score: None,
            ticker,
        }
    }
}

impl HttpJsonMarketData {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_market_data_base_url()?.to_string();
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let path = std::env::var("MARKET_DATA_FUNDAMENTALS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            path,
            retries,
        })
    }

    fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn fetch_once(&self, ticker: &str) -> Result<FundamentalsRecord> {
        let url = self.url();
        let headers = self.headers()?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .query(&[("ticker", ticker)])
            .send()
            .await
            .context("market data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market data response")?;

        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let payload = serde_json::from_str::<FundamentalsPayload>(&text)
            .with_context(|| format!("market data response is not a fundamentals object: {text}"))?;
        Ok(payload.into_record(ticker))
    }

    /// Bounded retry with exponential backoff, then give up with the error.
    async fn fetch_with_retries(&self, ticker: &str) -> Result<FundamentalsRecord> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(ticker).await {
                Ok(record) => return Ok(record),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(ticker, attempt, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataClient for HttpJsonMarketData {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_record(&self, ticker: &str) -> FundamentalsRecord {
        match self.fetch_with_retries(ticker).await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(ticker, error = %err, "ticker unresolvable; using degraded record");
                degraded_record(ticker)
            }
        }
    }

    async fn find_peers(&self, ticker: &str, limit: usize) -> Vec<String> {
        // Sector comes from the target's own record; the curated groups do
        // the rest.
        peers_from_lookup(self.fetch_with_retries(ticker).await, ticker, limit)
    }
}

/// A resolvable target is matched against the curated groups; an unresolvable
/// one gets the fixed index pair.
fn peers_from_lookup(
    lookup: Result<FundamentalsRecord>,
    ticker: &str,
    limit: usize,
) -> Vec<String> {
    match lookup {
        Ok(record) => sectors::peers_for(ticker, &record.sector, limit),
        Err(err) => {
            tracing::warn!(ticker, error = %err, "peer lookup failed; using index fallback");
            sectors::lookup_failure_peers()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_payload_into_record() {
        let v = json!({
            "ticker": "AAPL",
            "company_name": "Apple Inc.",
            "sector": "Technology",
            "industry": "Consumer Electronics",
            "market_cap": 3.0e12,
            "price": 190.0,
            "pe_ratio": 29.5,
            "profit_margin": 0.25,
            "debt_to_equity": 170.0,
            "revenue_growth": 0.02,
            "earnings_growth": 0.05
        });

        let payload: FundamentalsPayload = serde_json::from_value(v).unwrap();
        let record = payload.into_record("AAPL");
        assert_eq!(record.company_name, "Apple Inc.");
        assert_eq!(record.sector, "Technology");
        assert_eq!(record.market_cap_formatted, "$3.0T");
        assert_eq!(record.score, None);
    }

    #[test]
    fn sparse_payload_defaults_metrics_to_zero() {
        let v = json!({"ticker": "XYZ"});
        let payload: FundamentalsPayload = serde_json::from_value(v).unwrap();
        let record = payload.into_record("XYZ");
        assert_eq!(record.company_name, "XYZ");
        assert_eq!(record.sector, "Unknown");
        assert_eq!(record.market_cap_formatted, "N/A");
        assert_eq!(record.pe_ratio, 0.0);
    }

    #[test]
    fn missing_ticker_falls_back_to_requested() {
        let payload: FundamentalsPayload = serde_json::from_value(json!({})).unwrap();
        let record = payload.into_record("TSLA");
        assert_eq!(record.ticker, "TSLA");
    }

    #[test]
    fn resolved_lookup_uses_the_sector_group() {
        let mut record = degraded_record("AAPL");
        record.sector = "Technology".to_string();
        let peers = peers_from_lookup(Ok(record), "AAPL", 3);
        assert_eq!(peers, ["MSFT", "GOOGL", "META"]);
    }

    #[test]
    fn failed_lookup_yields_the_index_pair() {
        let peers = peers_from_lookup(Err(anyhow::anyhow!("connection refused")), "AAPL", 8);
        assert_eq!(peers, ["SPY", "QQQ"]);
    }
}
