use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopicsError {
    #[error(transparent)]
    Store(#[from] chronicle_store::StoreError),

    #[error(transparent)]
    Gateway(#[from] chronicle_gateway::GatewayError),
}

impl From<TopicsError> for chronicle_core::CoreError {
    fn from(e: TopicsError) -> Self {
        match e {
            TopicsError::Store(e) => e.into(),
            TopicsError::Gateway(e) => match e {
                chronicle_gateway::GatewayError::RateLimited { retry_after_seconds } => {
                    chronicle_core::CoreError::RateLimited { retry_after_seconds }
                }
                chronicle_gateway::GatewayError::BadModelOutput(m) => chronicle_core::CoreError::BadModelOutput(m),
                chronicle_gateway::GatewayError::ToolLoopExhausted(n) => {
                    chronicle_core::CoreError::ToolLoopExhausted(n)
                }
                chronicle_gateway::GatewayError::ConfigMissing(m) => chronicle_core::CoreError::ConfigMissing(m),
                other => chronicle_core::CoreError::TransientNetwork(other.to_string()),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, TopicsError>;
