pub mod anthropic;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod provider;
pub mod rate_limit;
mod repair;

pub use error::{GatewayError, Result};
pub use gateway::{GenerateResult, ModelGateway, ToolHandler};
pub use provider::{
    EmbedResponse, GenerateOutput, GenerateRequest, GenerateResponse, ModelProvider, ToolCall,
    ToolSpec, Usage,
};
