use thiserror::Error;

/// Errors surfaced by the model gateway.
///
/// Maps directly onto the error kinds the core is required to expose:
/// `RATE_LIMITED`, `BAD_MODEL_OUTPUT`, `TOOL_LOOP_EXHAUSTED`, `TRANSIENT_NETWORK`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: f64 },

    #[error("model output did not parse or validate: {0}")]
    BadModelOutput(String),

    #[error("tool loop exhausted after {0} turns without a final answer")]
    ToolLoopExhausted(usize),

    #[error("no credentials configured for provider {0}")]
    ConfigMissing(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("provider {provider} returned HTTP {status}: {message}")]
    Api {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("provider {0} does not support embeddings")]
    EmbedUnsupported(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RateLimited { .. } => "RATE_LIMITED",
            GatewayError::BadModelOutput(_) => "BAD_MODEL_OUTPUT",
            GatewayError::ToolLoopExhausted(_) => "TOOL_LOOP_EXHAUSTED",
            GatewayError::ConfigMissing(_) => "CONFIG_MISSING",
            GatewayError::TransientNetwork(_) => "TRANSIENT_NETWORK",
            GatewayError::Api { .. } => "TRANSIENT_NETWORK",
            GatewayError::EmbedUnsupported(_) => "BAD_MODEL_OUTPUT",
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
