use crate::config::Settings;
use crate::domain::contract::{LlmPortfolioRationale, PortfolioRationale};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json;
use crate::llm::{Provider, RationaleClient, RationaleInput};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOOL_NAME_EMIT_RATIONALE: &str = "emit_rationale";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    async fn create_message(
        &self,
        req: CreateMessageRequest,
    ) -> anyhow::Result<(serde_json::Value, CreateMessageResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Anthropic,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Anthropic response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone())
            .context("failed to decode Anthropic response into CreateMessageResponse")?;
        Ok((raw_json, parsed))
    }

    fn tools() -> Vec<Tool> {
        // Minimal JSON schema for the rationale contract. Holdings is an open
        // ticker-to-sentence map; partial coverage is tolerated downstream.
        let schema = serde_json::json!({
            "type": "object",
            "additionalProperties": false,
            "required": ["overall", "holdings"],
            "properties": {
                "overall": {"type": "string"},
                "holdings": {
                    "type": "object",
                    "additionalProperties": {"type": "string"}
                }
            }
        });

        vec![Tool {
            name: TOOL_NAME_EMIT_RATIONALE,
            description: "Emit the portfolio rationale as structured JSON",
            input_schema: schema,
        }]
    }

    fn tool_choice() -> ToolChoice {
        ToolChoice::Tool {
            name: TOOL_NAME_EMIT_RATIONALE,
        }
    }

    fn system_prompt() -> String {
        [
            "You are a financial analyst explaining a rule-based portfolio allocation.",
            "Return ONLY valid JSON. Do not wrap in markdown. Do not include any extra keys.",
            "No trailing commas. No comments. Use double quotes for all JSON strings.",
            "Output schema:",
            "{",
            "  \"overall\": \"3-4 sentence explanation of the allocation\",",
            "  \"holdings\": {",
            "    \"TICKER\": \"1 sentence on this holding's role\"",
            "  }",
            "}",
            "Rules:",
            "- overall must explain why these companies were selected, how the mix fits the",
            "  stated risk tolerance, and reference the quality scores",
            "- holdings must have one entry per ticker in the allocation, keyed by ticker",
            "- Do not invent tickers that are not in the allocation",
            "- Do not give personalized financial advice or price targets",
        ]
        .join("\n")
    }

    fn user_prompt(input: &RationaleInput) -> String {
        let allocation_summary = input
            .holdings
            .iter()
            .map(|h| {
                format!(
                    "- {} ({}): {}%, Sector: {}, Quality Score: {}",
                    h.ticker,
                    h.company_name,
                    h.allocation_percent,
                    h.sector,
                    h.earnings_quality_score
                        .map(|s| format!("{s:.1}"))
                        .unwrap_or_else(|| "n/a (ETF)".to_string()),
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "TARGET: {} ({})\nAMOUNT: ${:.0}\nRISK LEVEL: {}\n\nALLOCATION:\n{}",
            input.target_ticker,
            input.target.company_name,
            input.investment_amount,
            input.risk_level,
            allocation_summary,
        )
    }

    fn repair_prompt(previous_output: &str) -> String {
        let schema = [
            "{",
            "  \"overall\": \"...\",",
            "  \"holdings\": {",
            "    \"TICKER\": \"...\"",
            "  }",
            "}",
        ]
        .join("\n");

        format!(
            "Your previous message was NOT valid JSON.\n\n\
TASK: Output ONLY a single JSON object that exactly matches the schema.\n\
- Do NOT include any markdown, prose, or code fences.\n\
- Do NOT include trailing commas or comments.\n\
- Use double quotes for all JSON strings.\n\
- overall MUST be a non-empty string.\n\
- holdings values MUST be strings keyed by ticker.\n\n\
SCHEMA:\n{schema}\n\n\
INVALID OUTPUT (for reference only; DO NOT copy verbatim):\n{previous_output}"
        )
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            match block {
                ContentBlock::Text { text } => {
                    if !out.is_empty() {
                        out.push('\n');
                    }
                    out.push_str(text);
                }
                ContentBlock::ToolUse { .. } => {
                    // Tool output is handled by `response_tool_rationale`.
                    continue;
                }
                ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {}
                ContentBlock::Unknown => {}
            }
        }
        out
    }

    fn response_tool_rationale(
        res: &CreateMessageResponse,
    ) -> anyhow::Result<Option<LlmPortfolioRationale>> {
        for block in &res.content {
            if let ContentBlock::ToolUse { name, input, .. } = block {
                if name == TOOL_NAME_EMIT_RATIONALE {
                    let parsed = serde_json::from_value::<LlmPortfolioRationale>(input.clone())
                        .context("failed to decode tool_use.input into LlmPortfolioRationale")?;
                    return Ok(Some(parsed));
                }
            }
        }
        Ok(None)
    }

    async fn try_parse_with_repairs(
        &self,
        initial_text: String,
        initial_raw_json: serde_json::Value,
    ) -> anyhow::Result<PortfolioRationale> {
        match json::parse_rationale(&initial_text) {
            Ok(rationale) => Ok(rationale),
            Err(first_err) => {
                let mut last_err = first_err;
                let mut last_text = initial_text;
                let mut last_raw_json = initial_raw_json;

                // Repair attempts: 2
                for attempt in 1..=2u32 {
                    let repair_req = CreateMessageRequest {
                        model: self.model.clone(),
                        max_tokens: self.max_tokens,
                        system: Some(Self::system_prompt()),
                        messages: vec![Message {
                            role: "user",
                            content: Self::repair_prompt(&last_text),
                        }],
                        tools: Some(Self::tools()),
                        tool_choice: Some(Self::tool_choice()),
                    };

                    let (repair_raw_json, repair_res) = self.create_message(repair_req).await?;
                    if let Some(raw) = Self::response_tool_rationale(&repair_res)? {
                        return raw.validate_and_into_rationale();
                    }
                    let repair_text = Self::response_text(&repair_res);
                    match json::parse_rationale(&repair_text) {
                        Ok(rationale) => return Ok(rationale),
                        Err(err) => {
                            last_err = err;
                            last_text = repair_text;
                            last_raw_json = repair_raw_json;
                            tracing::warn!(
                                attempt,
                                error = %last_err,
                                "LLM output still invalid after repair attempt"
                            );
                        }
                    }
                }

                Err(LlmDiagnosticsError {
                    provider: Provider::Anthropic,
                    stage: "parse_after_repair",
                    detail: format!("final_error={last_err}"),
                    raw_output: Some(last_text),
                    raw_response_json: Some(last_raw_json),
                }
                .into())
            }
        }
    }
}

#[async_trait::async_trait]
impl RationaleClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_rationale(
        &self,
        input: RationaleInput,
    ) -> anyhow::Result<PortfolioRationale> {
        let make_req = |max_tokens: u32| CreateMessageRequest {
            model: self.model.clone(),
            max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: Self::user_prompt(&input),
            }],
            tools: Some(Self::tools()),
            tool_choice: Some(Self::tool_choice()),
        };

        let (mut raw_json, mut res) = self.create_message(make_req(self.max_tokens)).await?;

        // If the model hit max_tokens, retry once with a higher ceiling.
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            let bumped = self.max_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                target_ticker = %input.target_ticker,
                from = self.max_tokens,
                to = bumped,
                "Anthropic stop_reason=max_tokens; retrying once with higher max_tokens"
            );
            let (rj, r) = self.create_message(make_req(bumped)).await?;
            raw_json = rj;
            res = r;
        }

        // Tool output path.
        if let Some(raw) = Self::response_tool_rationale(&res)? {
            return raw.validate_and_into_rationale();
        }

        // Fallback to text (should be rare).
        let text = Self::response_text(&res);
        self.try_parse_with_repairs(text, raw_json).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
        #[serde(default)]
        signature: String,
    },

    #[serde(rename = "redacted_thinking")]
    RedactedThinking {
        #[serde(default)]
        data: String,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tool_use_rationale_input() {
        let tool_input = json!({
            "overall": "A conservative allocation anchored by the sector ETF.",
            "holdings": {
                "XLK": "Broad sector exposure.",
                "AAPL": "Highest quality score in the peer group."
            }
        });

        let res = CreateMessageResponse {
            content: vec![ContentBlock::ToolUse {
                id: "toolu_1".to_string(),
                name: TOOL_NAME_EMIT_RATIONALE.to_string(),
                input: tool_input,
            }],
            stop_reason: None,
        };

        let raw = AnthropicClient::response_tool_rationale(&res).unwrap().unwrap();
        let rationale = raw.validate_and_into_rationale().unwrap();
        assert!(rationale.overall.starts_with("A conservative"));
        assert_eq!(rationale.holdings.len(), 2);
    }

    #[test]
    fn response_text_joins_text_blocks_only() {
        let res = CreateMessageResponse {
            content: vec![
                ContentBlock::Text {
                    text: "{\"overall\":".to_string(),
                },
                ContentBlock::Unknown,
                ContentBlock::Text {
                    text: "\"x\"}".to_string(),
                },
            ],
            stop_reason: None,
        };
        assert_eq!(AnthropicClient::response_text(&res), "{\"overall\":\n\"x\"}");
    }

    #[test]
    fn user_prompt_lists_every_holding() {
        let input = RationaleInput {
            target_ticker: "AAPL".to_string(),
            target: crate::marketdata::degraded_record("AAPL"),
            holdings: vec![crate::domain::portfolio::FormattedHolding {
                ticker: "XLK".to_string(),
                company_name: "Technology Select Sector SPDR".to_string(),
                allocation_percent: 40,
                allocation_amount: 4000,
                sector: "Technology".to_string(),
                earnings_quality_score: None,
                market_cap: "ETF".to_string(),
                rationale: String::new(),
            }],
            risk_level: crate::domain::portfolio::RiskLevel::Low,
            investment_amount: 10_000.0,
        };

        let prompt = AnthropicClient::user_prompt(&input);
        assert!(prompt.contains("TARGET: AAPL"));
        assert!(prompt.contains("RISK LEVEL: low"));
        assert!(prompt.contains("- XLK (Technology Select Sector SPDR): 40%"));
        assert!(prompt.contains("n/a (ETF)"));
    }
}
