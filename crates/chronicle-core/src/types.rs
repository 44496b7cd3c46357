use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares an integer-backed id newtype with the `Display`/`From<i64>`/
/// `as_i64` boilerplate every entity id in the archive needs.
///
/// Kept as plain integers rather than UUIDs (arena+index style, per the
/// design notes): no pointer cycles, no weak references, cheap to compare
/// and to use as SQLite primary keys.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

id_type!(PersonId);
id_type!(RoomId);
id_type!(MessageId);
id_type!(AnalysisRunId);
id_type!(DiscussionId);
id_type!(TopicId);
id_type!(EmbeddingId);

/// Message kind as stored in the archive. Stored as TEXT; manual
/// `Display`/`FromStr` since there is no serde-sqlite bridge for enums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
    Sticker,
    System,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::File => "file",
            MessageType::Sticker => "sticker",
            MessageType::System => "system",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "video" => Ok(MessageType::Video),
            "audio" => Ok(MessageType::Audio),
            "file" => Ok(MessageType::File),
            "sticker" => Ok(MessageType::Sticker),
            "system" => Ok(MessageType::System),
            other => Err(format!("unknown message_type: {other}")),
        }
    }
}

/// `AnalysisRun.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Stale,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stale => "stale",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "stale" => Ok(RunStatus::Stale),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// `AnalysisRun.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Full,
    Incremental,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Full => "full",
            RunMode::Incremental => "incremental",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(RunMode::Full),
            "incremental" => Ok(RunMode::Incremental),
            other => Err(format!("unknown run mode: {other}")),
        }
    }
}

/// `Embedding.entity_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Message,
    Discussion,
    Person,
    Topic,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Message => "message",
            EntityKind::Discussion => "discussion",
            EntityKind::Person => "person",
            EntityKind::Topic => "topic",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(EntityKind::Message),
            "discussion" => Ok(EntityKind::Discussion),
            "person" => Ok(EntityKind::Person),
            "topic" => Ok(EntityKind::Topic),
            other => Err(format!("unknown entity_type: {other}")),
        }
    }
}

/// Search request scope — `all` plus one entry per [`EntityKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    All,
    Messages,
    Discussions,
    People,
    Topics,
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SearchScope::All => "all",
            SearchScope::Messages => "messages",
            SearchScope::Discussions => "discussions",
            SearchScope::People => "people",
            SearchScope::Topics => "topics",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SearchScope::All),
            "messages" => Ok(SearchScope::Messages),
            "discussions" => Ok(SearchScope::Discussions),
            "people" => Ok(SearchScope::People),
            "topics" => Ok(SearchScope::Topics),
            other => Err(format!("unknown search scope: {other}")),
        }
    }
}
