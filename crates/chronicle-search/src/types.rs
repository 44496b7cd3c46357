use chronicle_core::types::SearchScope;
use chronicle_store::types::{Discussion, Message, Person, Topic};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub scope: SearchScope,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, scope: SearchScope) -> Self {
        Self { query: query.into(), scope, page: 1, page_size: 20 }
    }
}

/// An entity row paired with its fused relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredItem<T> {
    pub item: T,
    pub score: f64,
}

/// One page of a sorted candidate set, plus the total candidate count
/// (pre-pagination) so callers can render "N of M" and compute page count.
#[derive(Debug, Clone, Serialize)]
pub struct PagedResults<T> {
    pub items: Vec<ScoredItem<T>>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    pub messages: Option<PagedResults<Message>>,
    pub discussions: Option<PagedResults<Discussion>>,
    pub people: Option<PagedResults<Person>>,
    pub topics: Option<PagedResults<Topic>>,
}
