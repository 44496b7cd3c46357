pub mod error;
pub mod searcher;
pub mod types;

pub use error::{Result, SearchError};
pub use searcher::search;
pub use types::{PagedResults, ScoredItem, SearchRequest, SearchResponse};
