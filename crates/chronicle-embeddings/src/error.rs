use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingsError {
    #[error(transparent)]
    Store(#[from] chronicle_store::StoreError),

    #[error(transparent)]
    Gateway(#[from] chronicle_gateway::GatewayError),
}

impl From<EmbeddingsError> for chronicle_core::CoreError {
    fn from(e: EmbeddingsError) -> Self {
        match e {
            EmbeddingsError::Store(e) => e.into(),
            EmbeddingsError::Gateway(e) => match e {
                chronicle_gateway::GatewayError::RateLimited { retry_after_seconds } => {
                    chronicle_core::CoreError::RateLimited { retry_after_seconds }
                }
                chronicle_gateway::GatewayError::BadModelOutput(m) => chronicle_core::CoreError::BadModelOutput(m),
                chronicle_gateway::GatewayError::ConfigMissing(m) => chronicle_core::CoreError::ConfigMissing(m),
                other => chronicle_core::CoreError::TransientNetwork(other.to_string()),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingsError>;
