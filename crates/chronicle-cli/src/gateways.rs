use std::sync::Arc;

use chronicle_core::config::ChronicleConfig;
use chronicle_gateway::anthropic::AnthropicProvider;
use chronicle_gateway::gemini::GeminiProvider;
use chronicle_gateway::{GatewayError, ModelGateway, ModelProvider};

/// The two `ModelGateway` instances the CLI needs: one built against whatever
/// provider `models.generation_provider` names, for discussion analysis and
/// topic classification; one always built against Gemini, the only provider
/// in this gateway implementing `embed` (§4.2, §4.7).
pub struct Gateways {
    pub generation: ModelGateway,
    pub embedding: ModelGateway,
}

pub fn build(config: &ChronicleConfig) -> anyhow::Result<Gateways> {
    let generation_provider: Arc<dyn ModelProvider> = match config.models.generation_provider.as_str() {
        "anthropic" => {
            let key = config
                .models
                .anthropic_api_key
                .clone()
                .ok_or_else(|| GatewayError::ConfigMissing("anthropic".to_string()))?;
            Arc::new(AnthropicProvider::new(key, config.models.model_generation_id.clone(), None))
        }
        "gemini" => Arc::new(gemini_provider(config)?),
        other => anyhow::bail!("unknown generation provider: {other}"),
    };

    let generation = ModelGateway::new(generation_provider, config.models.rate_limit_tokens_per_minute);
    let embedding = ModelGateway::new(Arc::new(gemini_provider(config)?), config.models.rate_limit_tokens_per_minute);

    Ok(Gateways { generation, embedding })
}

fn gemini_provider(config: &ChronicleConfig) -> anyhow::Result<GeminiProvider> {
    let key = config
        .models
        .gemini_api_key
        .clone()
        .ok_or_else(|| GatewayError::ConfigMissing("gemini".to_string()))?;
    Ok(GeminiProvider::new(
        key,
        config.models.model_generation_id.clone(),
        config.models.model_embedding_id.clone(),
        config.models.model_dim,
        None,
    ))
}
