use chronicle_core::types::RoomId;

/// The three kinds of long-running job the controller single-flights.
/// Analysis is single-flighted per room; classification and reindex are
/// single-flighted globally (§5: "one global topic-classification run and
/// one global reindex may be active at once").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Analysis(RoomId),
    TopicClassification,
    Reindex,
}

impl JobKind {
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::Analysis(_) => "analysis",
            JobKind::TopicClassification => "topic_classification",
            JobKind::Reindex => "reindex",
        }
    }
}

/// Outcome of a status read that also performs stale detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No run recorded, or the last run reached a terminal state.
    Idle,
    /// A run is recorded `running` and the in-memory flag confirms it.
    Running,
    /// A run is recorded `running` but the in-memory flag is not set and
    /// more than [`STALE_AFTER_SECS`] have elapsed since it started — the
    /// record has just been rewritten to `failed`.
    WasStale,
}

/// §4.9: "now − started_at > 2 minutes".
pub const STALE_AFTER_SECS: i64 = 120;
