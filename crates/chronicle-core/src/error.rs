use thiserror::Error;

/// Top-level error kinds shared across every component of the core.
///
/// Each variant maps to one of the named error kinds the core is required
/// to expose at its boundary (§7): `RATE_LIMITED`, `BAD_MODEL_OUTPUT`,
/// `TOOL_LOOP_EXHAUSTED`, `CONFLICT`, `CONFIG_MISSING`, `STORE_ERROR`,
/// `TRANSIENT_NETWORK`. `NOT_FOUND`/`FORBIDDEN` are produced by the outer
/// layer, not by the core, and have no variant here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: f64 },

    #[error("model output did not parse or validate: {0}")]
    BadModelOutput(String),

    #[error("tool loop exhausted after {0} turns")]
    ToolLoopExhausted(usize),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::RateLimited { .. } => "RATE_LIMITED",
            CoreError::BadModelOutput(_) => "BAD_MODEL_OUTPUT",
            CoreError::ToolLoopExhausted(_) => "TOOL_LOOP_EXHAUSTED",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::ConfigMissing(_) => "CONFIG_MISSING",
            CoreError::Store(_) => "STORE_ERROR",
            CoreError::TransientNetwork(_) => "TRANSIENT_NETWORK",
            CoreError::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        CoreError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
