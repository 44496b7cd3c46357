use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chronicle_core::types::{
    AnalysisRunId, DiscussionId, EmbeddingId, EntityKind, MessageId, MessageType, PersonId,
    RoomId, RunMode, RunStatus, TopicId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub external_user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub external_profile_url: Option<String>,
    pub external_name: Option<String>,
    pub notes: Option<String>,
    pub ai_summary: Option<String>,
    pub ai_summary_generated_at: Option<DateTime<Utc>>,
    pub ai_summary_message_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub external_room_id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub external_event_id: String,
    pub room_id: Option<RoomId>,
    pub sender_id: Option<PersonId>,
    pub content: Option<String>,
    pub reply_to_message_id: Option<MessageId>,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomMember {
    pub room_id: RoomId,
    pub person_id: PersonId,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: AnalysisRunId,
    pub room_id: RoomId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub windows_processed: i64,
    pub total_windows: Option<i64>,
    pub discussions_found: i64,
    pub tokens_used: i64,
    pub error: Option<String>,
    pub mode: RunMode,
    pub start_message_id: Option<MessageId>,
    pub end_message_id: Option<MessageId>,
    pub context_start_message_id: Option<MessageId>,
    pub new_messages_count: i64,
    pub context_messages_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub room_id: RoomId,
    pub analysis_run_id: Option<AnalysisRunId>,
    pub title: String,
    pub summary: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub message_count: i64,
    pub participant_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionMessage {
    pub discussion_id: DiscussionId,
    pub message_id: MessageId,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub room_id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionTopic {
    pub discussion_id: DiscussionId,
    pub topic_id: TopicId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub id: EmbeddingId,
    pub entity_type: EntityKind,
    pub entity_id: i64,
    pub content_hash: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A row joined with its cosine similarity against a query vector.
#[derive(Debug, Clone)]
pub struct EmbeddingMatch {
    pub entity_id: i64,
    pub score: f64,
}

/// Cursor for range-scanning messages within a room.
#[derive(Debug, Clone, Copy)]
pub struct MessageCursor {
    pub after_id: Option<MessageId>,
    pub limit: usize,
}
