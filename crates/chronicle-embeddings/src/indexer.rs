use std::collections::HashMap;
use std::sync::Mutex;

use chronicle_core::types::EntityKind;
use chronicle_gateway::{EmbedResponse, ModelGateway};
use chronicle_store::ArchiveStore;
use tracing::{info, warn};

use crate::content;
use crate::error::Result;

/// Gemini's batch cap (§4.7: "batches of ≤100 (provider cap)").
const REINDEX_BATCH_SIZE: usize = 100;
/// §6: `inter_batch_delay_ms=100`.
const INTER_BATCH_DELAY_MS: u64 = 100;

const ALL_KINDS: [EntityKind; 4] = [
    EntityKind::Message,
    EntityKind::Discussion,
    EntityKind::Person,
    EntityKind::Topic,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedStatus {
    Embedded,
    Unchanged,
    NotFound,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KindProgress {
    pub total: usize,
    pub completed: usize,
}

/// Process-local progress record for a bulk reindex, queried by
/// `GetReindexStatus` while a reindex is in flight.
#[derive(Default)]
pub struct ReindexTracker {
    state: Mutex<HashMap<EntityKind, KindProgress>>,
}

impl ReindexTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self, kinds: &[EntityKind]) {
        let mut state = self.state.lock().unwrap();
        state.clear();
        for kind in kinds {
            state.insert(*kind, KindProgress::default());
        }
    }

    pub fn set_total(&self, kind: EntityKind, total: usize) {
        self.state.lock().unwrap().entry(kind).or_default().total = total;
    }

    pub fn add_completed(&self, kind: EntityKind, n: usize) {
        self.state.lock().unwrap().entry(kind).or_default().completed += n;
    }

    pub fn snapshot(&self) -> HashMap<EntityKind, KindProgress> {
        self.state.lock().unwrap().clone()
    }
}

/// Embed a single entity, skipping the upstream call if its content hash is
/// unchanged since the last embed (§4.7 "Single-entity embed").
pub async fn embed_entity(
    store: &ArchiveStore,
    gateway: &ModelGateway,
    kind: EntityKind,
    id: i64,
) -> Result<EmbedStatus> {
    let Some(text) = content_for(store, kind, id)? else {
        return Ok(EmbedStatus::NotFound);
    };
    let hash = content::content_hash(&text);
    if store.content_hash_for(kind, id)?.as_deref() == Some(hash.as_str()) {
        return Ok(EmbedStatus::Unchanged);
    }
    let response = gateway.embed(&[text]).await.map_err(crate::error::EmbeddingsError::Gateway)?;
    let Some(vector) = response.vectors.into_iter().next() else {
        return Ok(EmbedStatus::NotFound);
    };
    store.upsert_embedding(kind, id, &hash, &vector)?;
    Ok(EmbedStatus::Embedded)
}

/// Re-embed every entity of the given kinds (or all four when `scope` is
/// `None`), unconditionally — a reindex always re-calls the provider even
/// when content is unchanged, unlike [`embed_entity`].
pub async fn reindex(
    store: &ArchiveStore,
    gateway: &ModelGateway,
    tracker: &ReindexTracker,
    scope: Option<EntityKind>,
) -> Result<()> {
    let kinds: Vec<EntityKind> = match scope {
        Some(k) => vec![k],
        None => ALL_KINDS.to_vec(),
    };
    tracker.reset(&kinds);

    for kind in kinds {
        reindex_kind(store, gateway, tracker, kind).await?;
    }
    Ok(())
}

async fn reindex_kind(
    store: &ArchiveStore,
    gateway: &ModelGateway,
    tracker: &ReindexTracker,
    kind: EntityKind,
) -> Result<()> {
    let mut after_id: i64 = 0;
    loop {
        let entries = fetch_page(store, kind, after_id, REINDEX_BATCH_SIZE)?;
        if entries.is_empty() {
            break;
        }
        after_id = entries.last().map(|(id, _)| *id).unwrap_or(after_id);

        let prepared: Vec<(i64, String)> = entries
            .into_iter()
            .filter_map(|(id, text)| text.map(|t| (id, t)))
            .collect();
        tracker.set_total(kind, tracker.snapshot().get(&kind).map(|p| p.total).unwrap_or(0) + prepared.len());

        if !prepared.is_empty() {
            let texts: Vec<String> = prepared.iter().map(|(_, t)| t.clone()).collect();
            let EmbedResponse { vectors, .. } =
                gateway.embed(&texts).await.map_err(crate::error::EmbeddingsError::Gateway)?;
            if vectors.len() != prepared.len() {
                warn!(kind = %kind, "embedding batch returned a different count than requested");
            }
            for ((id, text), vector) in prepared.iter().zip(vectors) {
                let hash = content::content_hash(text);
                store.upsert_embedding(kind, *id, &hash, &vector)?;
            }
        }
        tracker.add_completed(kind, prepared.len());
        info!(kind = %kind, after_id, "reindex batch committed");

        tokio::time::sleep(std::time::Duration::from_millis(INTER_BATCH_DELAY_MS)).await;
    }
    Ok(())
}

fn content_for(store: &ArchiveStore, kind: EntityKind, id: i64) -> Result<Option<String>> {
    Ok(match kind {
        EntityKind::Message => store
            .get_message(chronicle_core::types::MessageId(id))?
            .and_then(|m| m.content)
            .and_then(|c| content::prepare_message_content(&c)),
        EntityKind::Discussion => store
            .get_discussion(chronicle_core::types::DiscussionId(id))?
            .map(|d| content::prepare_discussion_content(&d.title, d.summary.as_deref())),
        EntityKind::Person => store
            .get_person(chronicle_core::types::PersonId(id))?
            .and_then(|p| content::prepare_person_content(p.display_name.as_deref(), p.ai_summary.as_deref())),
        EntityKind::Topic => store
            .get_topic(chronicle_core::types::TopicId(id))?
            .map(|t| content::prepare_topic_content(&t.name, t.description.as_deref())),
    })
}

fn fetch_page(
    store: &ArchiveStore,
    kind: EntityKind,
    after_id: i64,
    limit: usize,
) -> Result<Vec<(i64, Option<String>)>> {
    Ok(match kind {
        EntityKind::Message => store
            .list_messages_after_for_reindex(after_id, limit)?
            .into_iter()
            .map(|m| (m.id.as_i64(), m.content.and_then(|c| content::prepare_message_content(&c))))
            .collect(),
        EntityKind::Discussion => store
            .list_discussions_after(after_id, limit)?
            .into_iter()
            .map(|d| (d.id.as_i64(), Some(content::prepare_discussion_content(&d.title, d.summary.as_deref()))))
            .collect(),
        EntityKind::Person => store
            .list_people_after(after_id, limit)?
            .into_iter()
            .map(|p| {
                (
                    p.id.as_i64(),
                    content::prepare_person_content(p.display_name.as_deref(), p.ai_summary.as_deref()),
                )
            })
            .collect(),
        EntityKind::Topic => store
            .list_topics_after(after_id, limit)?
            .into_iter()
            .map(|t| (t.id.as_i64(), Some(content::prepare_topic_content(&t.name, t.description.as_deref()))))
            .collect(),
    })
}
