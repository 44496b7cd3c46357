use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// A tool made available to the model during a `generate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A tool invocation the model asked the caller to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Token accounting returned alongside a generation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.output_tokens
    }
}

/// Request to the generation capability. Opaque text in, tagged variant out.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
    /// When set, the provider must emit JSON validating against this schema.
    pub response_schema: Option<Value>,
    pub tools: Vec<ToolSpec>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub thinking_budget: Option<u32>,
    /// Raw turn history for multi-turn tool loops. When set, overrides `prompt`.
    pub raw_turns: Option<Vec<Value>>,
}

impl GenerateRequest {
    pub fn simple(prompt: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            prompt: prompt.into(),
            response_schema: None,
            tools: Vec::new(),
            temperature: 0.7,
            max_output_tokens: 4096,
            thinking_budget: None,
            raw_turns: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// The model's reply: plain text, schema-validated structured output, or a
/// tool call the caller must service. A tagged variant, not subclassing.
#[derive(Debug, Clone)]
pub enum GenerateOutput {
    Text(String),
    Structured(Value),
    ToolCall(Vec<ToolCall>),
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub output: GenerateOutput,
    pub usage: Usage,
    pub stop_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vectors: Vec<Vec<f32>>,
    pub model_dim: usize,
}

/// Uniform interface to a remote generation/embedding provider.
///
/// A provider need not support both capabilities — e.g. a pure chat model
/// can implement `generate` and leave `embed` at its default (unsupported).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Raw single-turn (or continued multi-turn, via `raw_turns`) call to the
    /// provider. Callers needing schema enforcement or a tool loop should go
    /// through [`crate::gateway::ModelGateway`] rather than calling this directly.
    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse>;

    async fn embed(&self, _texts: &[String]) -> Result<EmbedResponse> {
        Err(GatewayError::EmbedUnsupported(self.name().to_string()))
    }
}
