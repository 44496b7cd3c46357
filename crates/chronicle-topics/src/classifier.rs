use chronicle_core::types::RoomId;
use chronicle_gateway::{GenerateRequest, GenerateResult, ModelGateway};
use chronicle_store::ArchiveStore;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct TopicDef {
    name: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct Assignment {
    discussion_id: i64,
    topic_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    topics: Vec<TopicDef>,
    assignments: Vec<Assignment>,
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "topics": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"}
                    },
                    "required": ["name", "description"]
                }
            },
            "assignments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "discussion_id": {"type": "integer"},
                        "topic_names": {"type": "array", "items": {"type": "string"}}
                    },
                    "required": ["discussion_id", "topic_names"]
                }
            }
        },
        "required": ["topics", "assignments"]
    })
}

/// Result of one classification pass, for the caller to decide whether to
/// schedule re-embedding of newly created topics (§4.6: "schedule C7 to
/// embed newly created topics").
pub struct ClassificationOutcome {
    pub topics_created: Vec<chronicle_core::types::TopicId>,
    pub discussions_classified: usize,
    pub topics_deleted: u64,
}

/// Run one topic-classification pass over every discussion in `room_id`
/// (§4.6). Single-shot: one model call covers the whole room's taxonomy.
pub async fn classify_topics(
    store: &ArchiveStore,
    gateway: &ModelGateway,
    room_id: RoomId,
) -> Result<ClassificationOutcome> {
    let discussions = store.discussions_for_room(room_id, 10_000)?;
    if discussions.is_empty() {
        return Ok(ClassificationOutcome {
            topics_created: Vec::new(),
            discussions_classified: 0,
            topics_deleted: 0,
        });
    }

    let existing_topics = store.list_topics(room_id)?;

    let discussions_payload: Vec<_> = discussions
        .iter()
        .map(|d| json!({"id": d.id.as_i64(), "title": d.title, "summary": d.summary.clone().unwrap_or_default()}))
        .collect();
    let topics_payload: Vec<_> = existing_topics
        .iter()
        .map(|t| json!({"name": t.name, "description": t.description.clone().unwrap_or_default()}))
        .collect();

    let prompt = format!(
        "EXISTING TOPICS (reuse if appropriate, modify descriptions, or create new ones):\n{}\n\nDISCUSSIONS TO CLASSIFY:\n{}\n\nCreate 5-10 topic categories that best organize this content. Each discussion should belong to 1-3 topics.",
        serde_json::to_string_pretty(&topics_payload).unwrap_or_default(),
        serde_json::to_string_pretty(&discussions_payload).unwrap_or_default(),
    );

    let req = GenerateRequest::simple(prompt).with_schema(response_schema());
    let result = gateway.generate(req).await.map_err(crate::error::TopicsError::Gateway)?;

    let value = match result {
        GenerateResult::Structured(v) => v,
        GenerateResult::Text(_) => {
            return Err(crate::error::TopicsError::Gateway(
                chronicle_gateway::GatewayError::BadModelOutput(
                    "expected structured topic-classification output".into(),
                ),
            ))
        }
    };
    let response: ClassificationResponse = serde_json::from_value(value).map_err(|e| {
        crate::error::TopicsError::Gateway(chronicle_gateway::GatewayError::BadModelOutput(e.to_string()))
    })?;

    // Clear all discussion-topic links for the room before re-linking (§4.6).
    store.clear_discussion_topic_links_for_room(room_id)?;

    let mut name_to_id = std::collections::HashMap::new();
    let mut topics_created = Vec::new();
    for def in &response.topics {
        let already_existed = existing_topics
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&def.name));
        let id = store.upsert_topic(room_id, &def.name, Some(&def.description))?;
        if !already_existed {
            topics_created.push(id);
        }
        name_to_id.insert(def.name.to_lowercase(), id);
    }

    let mut classified = 0usize;
    for assignment in &response.assignments {
        let discussion_id = chronicle_core::types::DiscussionId(assignment.discussion_id);
        let mut topic_ids = Vec::new();
        for name in &assignment.topic_names {
            match name_to_id.get(&name.to_lowercase()) {
                Some(id) => topic_ids.push(*id),
                None => warn!(discussion_id = assignment.discussion_id, %name, "unresolved topic name in assignment"),
            }
        }
        if !topic_ids.is_empty() {
            store.link_discussion_topics(discussion_id, &topic_ids)?;
            classified += 1;
        }
    }

    let deleted = store.delete_orphan_topics(room_id)?;

    Ok(ClassificationOutcome {
        topics_created,
        discussions_classified: classified,
        topics_deleted: deleted,
    })
}
