use crate::domain::contract::{LlmPortfolioRationale, PortfolioRationale};
use anyhow::Context;

/// Best-effort extraction of a JSON object from model text output: strips
/// markdown fences, otherwise slices from the first '{' to the last '}'.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let mut inner = trimmed;
        if let Some(after_first) = inner.splitn(2, '\n').nth(1) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse_rationale(text: &str) -> anyhow::Result<PortfolioRationale> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let parsed = serde_json::from_str::<LlmPortfolioRationale>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON for rationale schema: {json_str}"))?;
    parsed.validate_and_into_rationale()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"overall\":\"x\"}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "Here you go: {\"overall\":\"x\"} hope that helps";
        assert_eq!(extract_json(s), Some("{\"overall\":\"x\"}".to_string()));
    }

    #[test]
    fn parse_rationale_accepts_valid_json() {
        let text = json!({
            "overall": "A conservative sector mix.",
            "holdings": {"XLK": "Diversification anchor.", "AAPL": "Core quality name."}
        })
        .to_string();

        let rationale = parse_rationale(&text).unwrap();
        assert_eq!(rationale.overall, "A conservative sector mix.");
        assert_eq!(rationale.holdings.len(), 2);
    }

    #[test]
    fn parse_rationale_tolerates_missing_holdings() {
        let rationale = parse_rationale(r#"{"overall": "Balanced."}"#).unwrap();
        assert!(rationale.holdings.is_empty());
    }

    #[test]
    fn parse_rationale_rejects_prose() {
        assert!(parse_rationale("I'd suggest mostly tech stocks.").is_err());
    }

    #[test]
    fn parse_rationale_rejects_empty_overall() {
        assert!(parse_rationale(r#"{"overall": ""}"#).is_err());
    }
}
