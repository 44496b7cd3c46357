use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for chronicle_core::CoreError {
    fn from(e: StoreError) -> Self {
        chronicle_core::CoreError::Store(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
