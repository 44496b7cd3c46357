use std::collections::HashMap;

use chrono::{DateTime, Utc};
use chronicle_core::types::{DiscussionId, MessageId};

/// `windows_since_active >= DORMANCY_THRESHOLD` marks a discussion dormant
/// until a new message revives it (§4.4).
pub const DORMANCY_THRESHOLD: u32 = 5;
/// A discussion stops accepting new messages once it reaches this size; the
/// assignment is logged and dropped instead (§4.4).
pub const MAX_MESSAGES_PER_DISCUSSION: usize = 500;
/// How recently a discussion must have been active, relative to the
/// incremental cut point, to be rebuilt during catch-up (§4.5).
pub const CATCH_UP_GRACE_HOURS: i64 = 48;
pub const MAX_RECENT_PARTICIPANTS: usize = 5;

/// One discussion the analyzer is currently tracking in memory. Mirrors the
/// persisted row plus the bookkeeping the model prompt needs each window.
#[derive(Debug, Clone)]
pub struct ActiveDiscussion {
    pub durable_id: DiscussionId,
    pub title: String,
    pub message_ids: Vec<MessageId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub ended: bool,
    pub last_active_window: usize,
    pub dormant: bool,
    pub topic_keywords: Vec<String>,
    /// Most-recently-active first, capped at [`MAX_RECENT_PARTICIPANTS`].
    pub recent_participants: Vec<String>,
}

impl ActiveDiscussion {
    pub fn windows_since_active(&self, current_window: usize) -> usize {
        current_window.saturating_sub(self.last_active_window)
    }

    fn push_participant(&mut self, name: String) {
        self.recent_participants.retain(|p| p != &name);
        self.recent_participants.insert(0, name);
        self.recent_participants.truncate(MAX_RECENT_PARTICIPANTS);
    }
}

/// All analyzer bookkeeping for one run, owned exclusively by the worker
/// driving that run — no cross-task sharing beyond the `inspect_discussion`
/// tool handler, which borrows it for the run's duration (§4.4).
#[derive(Debug, Default)]
pub struct AnalyzerState {
    pub active_discussions: HashMap<DiscussionId, ActiveDiscussion>,
    pub temp_id_to_db_id: HashMap<String, DiscussionId>,
    pub current_window: usize,
}

impl AnalyzerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_temp_id(&mut self, temp_id: String, id: DiscussionId) {
        self.temp_id_to_db_id.insert(temp_id, id);
    }

    pub fn resolve_temp_id(&self, temp_id: &str) -> Option<DiscussionId> {
        self.temp_id_to_db_id.get(temp_id).copied()
    }

    /// Record that `id` received a message assignment this window: clears
    /// dormancy and bumps `last_active_window` to the current window.
    pub fn mark_active(&mut self, id: DiscussionId, sender: Option<String>) {
        let current_window = self.current_window;
        if let Some(disc) = self.active_discussions.get_mut(&id) {
            disc.last_active_window = current_window;
            disc.dormant = false;
            if let Some(name) = sender {
                disc.push_participant(name);
            }
        }
    }

    /// Apply the dormancy rule to every non-ended discussion after a
    /// window's assignments have all been applied (§4.4).
    pub fn update_dormancy(&mut self) {
        let current_window = self.current_window;
        for disc in self.active_discussions.values_mut() {
            if disc.ended {
                continue;
            }
            disc.dormant = disc.windows_since_active(current_window) as u32 >= DORMANCY_THRESHOLD;
        }
    }

    /// Discussions eligible to appear in the next window's prompt: not
    /// ended and not dormant (§4.4, §4.5 step 1). A dormant discussion is
    /// still tracked in `active_discussions` and can be revived by a later
    /// assignment via `mark_active`; it's only hidden from the prompt.
    pub fn open_discussions(&self) -> impl Iterator<Item = &ActiveDiscussion> {
        self.active_discussions.values().filter(|d| !d.ended && !d.dormant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disc(last_active_window: usize) -> ActiveDiscussion {
        ActiveDiscussion {
            durable_id: DiscussionId(1),
            title: "t".into(),
            message_ids: vec![],
            started_at: Utc::now(),
            ended_at: Utc::now(),
            ended: false,
            last_active_window,
            dormant: false,
            topic_keywords: vec![],
            recent_participants: vec![],
        }
    }

    #[test]
    fn dormancy_fires_at_threshold() {
        let mut state = AnalyzerState::new();
        state.current_window = DORMANCY_THRESHOLD as usize;
        state.active_discussions.insert(DiscussionId(1), disc(0));
        state.update_dormancy();
        assert!(state.active_discussions[&DiscussionId(1)].dormant);
    }

    #[test]
    fn dormancy_does_not_fire_below_threshold() {
        let mut state = AnalyzerState::new();
        state.current_window = DORMANCY_THRESHOLD as usize - 1;
        state.active_discussions.insert(DiscussionId(1), disc(0));
        state.update_dormancy();
        assert!(!state.active_discussions[&DiscussionId(1)].dormant);
    }

    #[test]
    fn marking_active_revives_a_dormant_discussion() {
        let mut state = AnalyzerState::new();
        state.current_window = 10;
        let mut d = disc(0);
        d.dormant = true;
        state.active_discussions.insert(DiscussionId(1), d);
        state.mark_active(DiscussionId(1), Some("Ada".into()));
        let d = &state.active_discussions[&DiscussionId(1)];
        assert!(!d.dormant);
        assert_eq!(d.last_active_window, 10);
        assert_eq!(d.recent_participants, vec!["Ada".to_string()]);
    }

    #[test]
    fn recent_participants_stays_capped_and_deduplicated() {
        let mut d = disc(0);
        for name in ["Ada", "Bo", "Cy", "Dee", "Eve", "Ada", "Fox"] {
            d.push_participant(name.to_string());
        }
        assert_eq!(d.recent_participants.len(), MAX_RECENT_PARTICIPANTS);
        assert_eq!(d.recent_participants[0], "Fox");
        assert_eq!(d.recent_participants.iter().filter(|p| *p == "Ada").count(), 1);
    }

    #[test]
    fn temp_id_round_trips() {
        let mut state = AnalyzerState::new();
        state.register_temp_id("t1".into(), DiscussionId(42));
        assert_eq!(state.resolve_temp_id("t1"), Some(DiscussionId(42)));
        assert_eq!(state.resolve_temp_id("missing"), None);
    }
}
