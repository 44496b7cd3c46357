use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};
use crate::provider::{
    EmbedResponse, GenerateOutput, GenerateRequest, GenerateResponse, ModelProvider, Usage,
};

const EMBED_BATCH_CAP: usize = 100;
const EMBED_TRUNCATE_CHARS: usize = 8_000;

/// Generation + embedding provider speaking the Gemini REST API —
/// the only provider in this gateway that implements both capabilities,
/// since it is the one the archive's embedding index is built against.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    generation_model: String,
    embedding_model: String,
    embedding_dim: usize,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        generation_model: String,
        embedding_model: String,
        embedding_dim: usize,
        base_url: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            generation_model,
            embedding_model,
            embedding_dim,
        }
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse> {
        let body = build_request_body(req);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.generation_model, self.api_key
        );

        debug!(model = %self.generation_model, "sending generate request to Gemini");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let status = resp.status().as_u16();
        if status == 429 {
            return Err(GatewayError::RateLimited {
                retry_after_seconds: 5.0,
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Gemini generateContent error");
            return Err(GatewayError::Api {
                provider: "gemini".to_string(),
                status,
                message: text,
            });
        }

        let api_resp: GenerateApiResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        parse_generate_response(api_resp)
    }

    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse> {
        if texts.is_empty() {
            return Ok(EmbedResponse {
                vectors: Vec::new(),
                model_dim: self.embedding_dim,
            });
        }
        if texts.len() > EMBED_BATCH_CAP {
            return Err(GatewayError::BadModelOutput(format!(
                "batch size {} exceeds provider cap {EMBED_BATCH_CAP}",
                texts.len()
            )));
        }

        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                let truncated: String = t.chars().take(EMBED_TRUNCATE_CHARS).collect();
                serde_json::json!({
                    "model": format!("models/{}", self.embedding_model),
                    "content": { "parts": [{ "text": truncated }] },
                })
            })
            .collect();

        let url = format!(
            "{}/models/{}:batchEmbedContents?key={}",
            self.base_url, self.embedding_model, self.api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "requests": requests }))
            .send()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                provider: "gemini".to_string(),
                status,
                message: text,
            });
        }

        let api_resp: EmbedApiResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::TransientNetwork(e.to_string()))?;

        let vectors = api_resp
            .embeddings
            .into_iter()
            .map(|e| e.values)
            .collect();

        Ok(EmbedResponse {
            vectors,
            model_dim: self.embedding_dim,
        })
    }
}

fn build_request_body(req: &GenerateRequest) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = if let Some(ref raw) = req.raw_turns {
        raw.clone()
    } else {
        vec![serde_json::json!({
            "role": "user",
            "parts": [{ "text": req.prompt }],
        })]
    };

    let mut generation_config = serde_json::json!({
        "temperature": req.temperature,
        "maxOutputTokens": req.max_output_tokens,
    });
    if req.response_schema.is_some() {
        generation_config["responseMimeType"] = serde_json::json!("application/json");
    }
    if let Some(budget) = req.thinking_budget {
        generation_config["thinkingConfig"] = serde_json::json!({ "thinkingBudget": budget });
    }

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": generation_config,
    });

    if let Some(ref system) = req.system_instruction {
        body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": system }] });
    }

    if !req.tools.is_empty() {
        let declarations: Vec<serde_json::Value> = req
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                })
            })
            .collect();
        body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
    }

    body
}

fn parse_generate_response(resp: GenerateApiResponse) -> Result<GenerateResponse> {
    use crate::provider::ToolCall;

    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::BadModelOutput("no candidates in response".to_string()))?;

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for (i, part) in candidate.content.parts.into_iter().enumerate() {
        if let Some(text) = part.text {
            text_parts.push(text);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                id: format!("call_{i}"),
                name: call.name,
                input: call.args,
            });
        }
    }

    let usage = resp
        .usage_metadata
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or_default();

    let output = if !tool_calls.is_empty() {
        GenerateOutput::ToolCall(tool_calls)
    } else {
        GenerateOutput::Text(text_parts.join(""))
    };

    Ok(GenerateResponse {
        output,
        usage,
        stop_reason: candidate.finish_reason.unwrap_or_default(),
    })
}

#[derive(Deserialize)]
struct GenerateApiResponse {
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
    #[serde(rename = "functionCall")]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
struct EmbedApiResponse {
    embeddings: Vec<EmbedValues>,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}
