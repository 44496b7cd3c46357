pub mod content;
pub mod error;
pub mod indexer;

pub use error::{EmbeddingsError, Result};
pub use indexer::{embed_entity, reindex, EmbedStatus, KindProgress, ReindexTracker};
