use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::provider::{EmbedResponse, GenerateRequest, ModelProvider, ToolCall};
use crate::rate_limit::{estimate_tokens, TokenBucket};
use crate::repair::repair_json;

/// Bounded tool-call loop turn budget (§4.2: max 10 turns).
const MAX_TOOL_TURNS: usize = 10;

/// Invoked by the tool-call loop to service a model-requested tool call.
/// Implementors return the tool's result content, to be fed back as the
/// next turn's `tool_result` block.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, call: &ToolCall) -> Value;
}

/// The two capabilities a caller can ask of the gateway: `generate` and
/// `embed`. Wraps a single [`ModelProvider`] plus the process-wide rate
/// limiter and schema/tool-loop machinery that sit in front of it.
pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    rate_limiter: TokenBucket,
}

/// Outcome of a `generate` call once schema enforcement (if any) is applied.
#[derive(Debug, Clone)]
pub enum GenerateResult {
    Text(String),
    Structured(Value),
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn ModelProvider>, max_tokens_per_minute: u64) -> Self {
        Self {
            provider,
            rate_limiter: TokenBucket::new(max_tokens_per_minute),
        }
    }

    fn estimate_cost(req: &GenerateRequest) -> u64 {
        let mut text = req.prompt.clone();
        if let Some(ref turns) = req.raw_turns {
            text = turns.iter().map(|v| v.to_string()).collect::<String>();
        }
        estimate_tokens(&text) + req.max_output_tokens as u64
    }

    fn admit(&self, estimated: u64) -> Result<()> {
        if self.rate_limiter.can_use(estimated) {
            Ok(())
        } else {
            Err(GatewayError::RateLimited {
                retry_after_seconds: self.rate_limiter.time_until_available(estimated),
            })
        }
    }

    /// Single-turn (no tools) generation, with structured-output enforcement
    /// and one repair pass when `req.response_schema` is set.
    pub async fn generate(&self, req: GenerateRequest) -> Result<GenerateResult> {
        let estimated = Self::estimate_cost(&req);
        self.admit(estimated)?;

        let has_schema = req.response_schema.is_some();
        let response = self.provider.generate(&req).await?;
        self.rate_limiter.record_usage(response.usage.total() as u64);

        match response.output {
            crate::provider::GenerateOutput::Text(text) => {
                if has_schema {
                    match repair_json(&text) {
                        Some(v) => Ok(GenerateResult::Structured(v)),
                        None => Err(GatewayError::BadModelOutput(
                            "response did not validate against the requested schema".to_string(),
                        )),
                    }
                } else {
                    Ok(GenerateResult::Text(text))
                }
            }
            crate::provider::GenerateOutput::Structured(v) => Ok(GenerateResult::Structured(v)),
            crate::provider::GenerateOutput::ToolCall(_) => Err(GatewayError::BadModelOutput(
                "provider returned a tool call for a request with no tools".to_string(),
            )),
        }
    }

    /// Multi-turn tool-call loop: drives the conversation until the model
    /// returns a final payload or `MAX_TOOL_TURNS` is exhausted.
    pub async fn generate_with_tools(
        &self,
        mut req: GenerateRequest,
        handler: &dyn ToolHandler,
    ) -> Result<GenerateResult> {
        let mut turns: Vec<Value> = req
            .raw_turns
            .clone()
            .unwrap_or_else(|| vec![serde_json::json!({ "role": "user", "content": req.prompt })]);

        let has_schema = req.response_schema.is_some();

        for turn in 0..MAX_TOOL_TURNS {
            req.raw_turns = Some(turns.clone());
            let estimated = Self::estimate_cost(&req);
            self.admit(estimated)?;

            let response = self.provider.generate(&req).await?;
            self.rate_limiter.record_usage(response.usage.total() as u64);

            match response.output {
                crate::provider::GenerateOutput::ToolCall(calls) => {
                    info!(turn, calls = calls.len(), "model requested tool calls");
                    turns.push(assistant_tool_use_turn(&calls));
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let content = handler.call(call).await;
                        results.push(serde_json::json!({
                            "type": "tool_result",
                            "tool_use_id": call.id,
                            "content": content,
                        }));
                    }
                    turns.push(serde_json::json!({ "role": "user", "content": results }));
                }
                crate::provider::GenerateOutput::Text(text) => {
                    return if has_schema {
                        match repair_json(&text) {
                            Some(v) => Ok(GenerateResult::Structured(v)),
                            None => Err(GatewayError::BadModelOutput(
                                "tool loop's final answer did not validate".to_string(),
                            )),
                        }
                    } else {
                        Ok(GenerateResult::Text(text))
                    };
                }
                crate::provider::GenerateOutput::Structured(v) => {
                    return Ok(GenerateResult::Structured(v));
                }
            }
        }

        warn!(max_turns = MAX_TOOL_TURNS, "tool loop exhausted");
        Err(GatewayError::ToolLoopExhausted(MAX_TOOL_TURNS))
    }

    pub async fn embed(&self, texts: &[String]) -> Result<EmbedResponse> {
        self.provider.embed(texts).await
    }
}

fn assistant_tool_use_turn(calls: &[ToolCall]) -> Value {
    let blocks: Vec<Value> = calls
        .iter()
        .map(|c| {
            serde_json::json!({
                "type": "tool_use",
                "id": c.id,
                "name": c.name,
                "input": c.input,
            })
        })
        .collect();
    serde_json::json!({ "role": "assistant", "content": blocks })
}
