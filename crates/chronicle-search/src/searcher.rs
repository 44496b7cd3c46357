use std::collections::HashMap;

use chronicle_core::types::{DiscussionId, EntityKind, MessageId, PersonId, SearchScope, TopicId};
use chronicle_gateway::ModelGateway;
use chronicle_store::types::Discussion;
use chronicle_store::ArchiveStore;
use tracing::warn;

use crate::error::{Result, SearchError};
use crate::types::{PagedResults, ScoredItem, SearchRequest, SearchResponse};

/// Minimum cosine similarity for a vector match to be considered at all
/// (§4.8).
const VECTOR_THRESHOLD: f64 = 0.3;
/// Candidate cap per kind before keyword fusion and pagination (§4.8).
const VECTOR_CANDIDATE_LIMIT: usize = 500;
/// How many person matches feed the discussion fallback (§4.8).
const PERSON_FALLBACK_LIMIT: usize = 20;
/// Discount applied to a person match's score when injected as a discussion
/// candidate (§4.8).
const PERSON_FALLBACK_WEIGHT: f64 = 0.85;
/// Keyword search result cap per kind, bounding how many candidates can
/// receive a non-zero keyword score.
const KEYWORD_LIMIT: usize = 500;

/// Run a hybrid (semantic + keyword) search across the scoped entity kinds
/// and return one hydrated, paginated result set per kind (§4.8).
///
/// The query is embedded once and reused for every kind. Vector candidates
/// come from brute-force kNN over [`chronicle_store::ArchiveStore::knn_embeddings`];
/// discussions additionally pick up candidates transitively through
/// matching people (person-through-discussion fallback). Keyword scoring is
/// computed only over that candidate set, then fused with the semantic
/// score; anything below [`VECTOR_THRESHOLD`] after fusion is dropped.
pub async fn search(store: &ArchiveStore, gateway: &ModelGateway, req: &SearchRequest) -> Result<SearchResponse> {
    let embed = gateway.embed(std::slice::from_ref(&req.query)).await?;
    let query_vec = embed.vectors.into_iter().next().ok_or(SearchError::EmptyEmbedding)?;

    let wants = |kind: EntityKind| match req.scope {
        SearchScope::All => true,
        SearchScope::Messages => kind == EntityKind::Message,
        SearchScope::Discussions => kind == EntityKind::Discussion,
        SearchScope::People => kind == EntityKind::Person,
        SearchScope::Topics => kind == EntityKind::Topic,
    };

    let mut response = SearchResponse::default();

    if wants(EntityKind::Message) {
        let candidates = semantic_candidates(store, EntityKind::Message, &query_vec)?;
        let keyword = store
            .search_messages_keyword(&req.query, KEYWORD_LIMIT)?
            .into_iter()
            .map(|(id, score)| (id.as_i64(), score))
            .collect::<HashMap<_, _>>();
        let fused = fuse(candidates, &keyword);
        response.messages = Some(hydrate(fused, req, |id| store.get_message(MessageId(id)).map_err(SearchError::from))?);
    }

    if wants(EntityKind::Person) {
        let candidates = semantic_candidates(store, EntityKind::Person, &query_vec)?;
        let keyword = store
            .search_people_by_substring(&req.query, KEYWORD_LIMIT)?
            .into_iter()
            .map(|(person, score)| (person.id.as_i64(), score))
            .collect::<HashMap<_, _>>();
        let fused = fuse(candidates, &keyword);
        response.people = Some(hydrate(fused, req, |id| store.get_person(PersonId(id)).map_err(SearchError::from))?);
    }

    if wants(EntityKind::Topic) {
        let candidates = semantic_candidates(store, EntityKind::Topic, &query_vec)?;
        let keyword = store
            .search_topics_keyword(&req.query, KEYWORD_LIMIT)?
            .into_iter()
            .map(|(id, score)| (id.as_i64(), score))
            .collect::<HashMap<_, _>>();
        let fused = fuse(candidates, &keyword);
        response.topics = Some(hydrate(fused, req, |id| store.get_topic(TopicId(id)).map_err(SearchError::from))?);
    }

    if wants(EntityKind::Discussion) {
        let mut candidates = semantic_candidates(store, EntityKind::Discussion, &query_vec)?;
        person_through_discussion_fallback(store, &query_vec, &mut candidates)?;

        let keyword = discussion_keyword_scores(store, &req.query, &candidates)?;
        let fused = fuse(candidates, &keyword);
        response.discussions =
            Some(hydrate(fused, req, |id| store.get_discussion(DiscussionId(id)).map_err(SearchError::from))?);
    }

    Ok(response)
}

fn semantic_candidates(store: &ArchiveStore, kind: EntityKind, query: &[f32]) -> Result<Vec<(i64, f64)>> {
    Ok(store.knn_embeddings(kind, query, VECTOR_THRESHOLD, VECTOR_CANDIDATE_LIMIT)?)
}

/// Discussions reached through a matching person are injected as additional
/// candidates, scored at the person's semantic score times
/// [`PERSON_FALLBACK_WEIGHT`]. This only flows person -> discussion, never
/// the reverse — an asymmetry the scope is deliberately narrow about (§9).
fn person_through_discussion_fallback(
    store: &ArchiveStore,
    query: &[f32],
    candidates: &mut Vec<(i64, f64)>,
) -> Result<()> {
    let person_matches = store.knn_embeddings(EntityKind::Person, query, VECTOR_THRESHOLD, PERSON_FALLBACK_LIMIT)?;
    let mut by_id: HashMap<i64, f64> = candidates.iter().copied().collect();

    for (person_id, person_score) in person_matches {
        let fallback_score = person_score * PERSON_FALLBACK_WEIGHT;
        for discussion_id in store.discussions_for_person(PersonId(person_id))? {
            let entry = by_id.entry(discussion_id.as_i64()).or_insert(0.0);
            if fallback_score > *entry {
                *entry = fallback_score;
            }
        }
    }

    *candidates = by_id.into_iter().collect();
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(VECTOR_CANDIDATE_LIMIT);
    Ok(())
}

/// Keyword score per discussion candidate: title match scores 1.0, summary
/// match 0.7, a participant display-name match 0.8 — the maximum of those
/// that apply (§4.8).
fn discussion_keyword_scores(
    store: &ArchiveStore,
    query: &str,
    candidates: &[(i64, f64)],
) -> Result<HashMap<i64, f64>> {
    let needle = query.to_lowercase();
    let mut out = HashMap::new();
    for (id, _) in candidates {
        let Some(discussion) = store.get_discussion(DiscussionId(*id))? else {
            continue;
        };
        let score = discussion_keyword_score(store, &discussion, &needle)?;
        if score > 0.0 {
            out.insert(*id, score);
        }
    }
    Ok(out)
}

fn discussion_keyword_score(store: &ArchiveStore, discussion: &Discussion, needle_lower: &str) -> Result<f64> {
    if discussion.title.to_lowercase().contains(needle_lower) {
        return Ok(1.0);
    }
    if discussion
        .summary
        .as_deref()
        .map(|s| s.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
    {
        return Ok(0.7);
    }
    let names = store.discussion_participant_names(discussion.id)?;
    if names.iter().any(|n| n.to_lowercase().contains(needle_lower)) {
        return Ok(0.8);
    }
    Ok(0.0)
}

/// Fuse semantic and keyword scores per id: `0.5*semantic + 0.5*keyword`
/// when a keyword score exists, otherwise pure semantic. Anything below
/// [`VECTOR_THRESHOLD`] after fusion is dropped (§4.8).
fn fuse(semantic: Vec<(i64, f64)>, keyword: &HashMap<i64, f64>) -> Vec<(i64, f64)> {
    let mut fused: Vec<(i64, f64)> = semantic
        .into_iter()
        .map(|(id, semantic_score)| {
            let final_score = match keyword.get(&id) {
                Some(&keyword_score) if keyword_score > 0.0 => 0.5 * semantic_score + 0.5 * keyword_score,
                _ => semantic_score,
            };
            (id, final_score)
        })
        .filter(|(_, score)| *score >= VECTOR_THRESHOLD)
        .collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

/// Paginate the fused, sorted candidate list and hydrate each id into its
/// full row, preserving score order.
fn hydrate<T>(
    fused: Vec<(i64, f64)>,
    req: &SearchRequest,
    fetch: impl Fn(i64) -> Result<Option<T>>,
) -> Result<PagedResults<T>> {
    let total = fused.len();
    let page = req.page.max(1);
    let start = (page - 1) * req.page_size;
    let end = (start + req.page_size).min(total);

    let mut items = Vec::new();
    if start < total {
        for (id, score) in &fused[start..end] {
            match fetch(*id)? {
                Some(item) => items.push(ScoredItem { item, score: *score }),
                None => warn!(id, "search candidate vanished before hydration"),
            }
        }
    }

    Ok(PagedResults { items, total, page, page_size: req.page_size })
}
