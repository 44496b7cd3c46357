use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::provider::{GenerateOutput, GenerateRequest, GenerateResponse, ModelProvider, Usage};

const API_VERSION: &str = "2023-06-01";

/// Generation-only provider — Anthropic has no public embedding endpoint, so
/// `embed` is left at the trait default (`EmbedUnsupported`).
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        let body = build_request_body(&self.model, req);
        let url = format!("{}/v1/messages", self.base_url);

        debug!(model = %self.model, "sending generate request to Anthropic");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(5.0);
            return Err(GatewayError::RateLimited {
                retry_after_seconds: retry,
            });
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Anthropic API error");
            return Err(GatewayError::Api {
                provider: "anthropic".to_string(),
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

fn build_request_body(model: &str, req: &GenerateRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = if let Some(ref raw) = req.raw_turns {
        raw.clone()
    } else {
        vec![serde_json::json!({ "role": "user", "content": req.prompt })]
    };

    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": req.max_output_tokens,
        "temperature": req.temperature,
        "messages": messages,
        "stream": false,
    });

    if let Some(ref system) = req.system_instruction {
        body["system"] = serde_json::Value::String(system.clone());
    }

    if !req.tools.is_empty() {
        let tools: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        body["tools"] = serde_json::Value::Array(tools);
    }

    if let Some(budget) = req.thinking_budget {
        body["thinking"] = serde_json::json!({
            "type": "enabled",
            "budget_tokens": budget,
        });
    }

    body
}

fn parse_response(resp: ApiResponse) -> GenerateResponse {
    use crate::provider::ToolCall;

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in resp.content {
        match block {
            ContentBlock::Text { text } => text_parts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                tool_calls.push(ToolCall { id, name, input });
            }
            ContentBlock::Unknown => {}
        }
    }

    let usage = Usage {
        prompt_tokens: resp.usage.input_tokens,
        output_tokens: resp.usage.output_tokens,
    };
    let stop_reason = resp.stop_reason.unwrap_or_default();

    let output = if !tool_calls.is_empty() {
        GenerateOutput::ToolCall(tool_calls)
    } else {
        GenerateOutput::Text(text_parts.join(""))
    };

    GenerateResponse {
        output,
        usage,
        stop_reason,
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}
