use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validated rationale text for a generated portfolio.
///
/// `holdings` maps ticker to a one-sentence per-holding explanation. The
/// mapping may be partial; the engine substitutes a generic description for
/// tickers the model skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioRationale {
    pub overall: String,
    pub holdings: BTreeMap<String, String>,
}

/// Raw structured output from the LLM, before validation. Treated as an
/// untrusted partial mapping: `holdings` defaults to empty when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmPortfolioRationale {
    pub overall: String,
    #[serde(default)]
    pub holdings: BTreeMap<String, String>,
}

impl LlmPortfolioRationale {
    pub fn validate_and_into_rationale(self) -> anyhow::Result<PortfolioRationale> {
        let overall = self.overall.trim().to_string();
        ensure!(!overall.is_empty(), "overall rationale must be non-empty");

        // Normalize keys to uppercase tickers; drop empty explanations rather
        // than failing the whole response.
        let mut holdings = BTreeMap::new();
        for (ticker, text) in self.holdings {
            let ticker = ticker.trim().to_ascii_uppercase();
            let text = text.trim().to_string();
            if ticker.is_empty() || text.is_empty() {
                continue;
            }
            holdings.insert(ticker, text);
        }

        Ok(PortfolioRationale { overall, holdings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_and_normalizes_tickers() {
        let raw = LlmPortfolioRationale {
            overall: "  A balanced portfolio.  ".to_string(),
            holdings: BTreeMap::from([
                (" aapl ".to_string(), "Core position.".to_string()),
                ("MSFT".to_string(), "   ".to_string()),
            ]),
        };

        let rationale = raw.validate_and_into_rationale().unwrap();
        assert_eq!(rationale.overall, "A balanced portfolio.");
        assert_eq!(
            rationale.holdings.get("AAPL").map(String::as_str),
            Some("Core position.")
        );
        // Empty explanations are dropped, not fatal.
        assert!(!rationale.holdings.contains_key("MSFT"));
    }

    #[test]
    fn rejects_empty_overall() {
        let raw = LlmPortfolioRationale {
            overall: "   ".to_string(),
            holdings: BTreeMap::new(),
        };
        assert!(raw.validate_and_into_rationale().is_err());
    }

    #[test]
    fn missing_holdings_key_deserializes_to_empty_map() {
        let raw: LlmPortfolioRationale =
            serde_json::from_str(r#"{"overall":"Quality-weighted mix."}"#).unwrap();
        let rationale = raw.validate_and_into_rationale().unwrap();
        assert!(rationale.holdings.is_empty());
    }
}
