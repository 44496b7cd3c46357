use thiserror::Error;

/// Errors produced by the run controller.
#[derive(Debug, Error)]
pub enum RunsError {
    #[error("a run of this kind is already active: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] chronicle_store::StoreError),
}

impl RunsError {
    pub fn code(&self) -> &'static str {
        match self {
            RunsError::Conflict(_) => "CONFLICT",
            RunsError::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<RunsError> for chronicle_core::CoreError {
    fn from(e: RunsError) -> Self {
        match e {
            RunsError::Conflict(msg) => chronicle_core::CoreError::Conflict(msg),
            RunsError::Store(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RunsError>;
