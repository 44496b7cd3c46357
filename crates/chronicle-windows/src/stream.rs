use chronicle_core::types::{MessageId, RoomId};
use chronicle_store::types::{Message, MessageCursor};
use chronicle_store::ArchiveStore;

use crate::types::{Window, WindowConfig, WindowPhase};

const FETCH_PAGE: usize = 1000;

/// A lazy, finite sequence of windows over one room's eligible messages
/// (§4.3). Built once per analysis run; `windows()` yields windows in
/// order without re-querying the store.
pub struct WindowStream {
    config: WindowConfig,
    /// `(phase, ordered eligible messages for that phase)`.
    phases: Vec<(WindowPhase, Vec<Message>)>,
}

/// Everything the analyzer needs to know about how this run was planned,
/// independent of the windows themselves.
#[derive(Debug, Clone)]
pub struct RunCutPoint {
    pub start_message_id: Option<MessageId>,
    pub end_message_id: Option<MessageId>,
    pub context_start_message_id: Option<MessageId>,
}

impl WindowStream {
    /// Full-mode plan: every eligible message in the room.
    pub fn full(store: &ArchiveStore, room_id: RoomId, config: WindowConfig) -> chronicle_store::Result<Self> {
        let messages = fetch_all_eligible(store, room_id)?;
        Ok(Self {
            config,
            phases: vec![(WindowPhase::New, messages)],
        })
    }

    /// Incremental-mode plan. Falls back to full mode (via `full_fallback`)
    /// when no prior completed run with a non-null `end_message_id` exists
    /// for the room.
    pub fn incremental(
        store: &ArchiveStore,
        room_id: RoomId,
        config: WindowConfig,
        context_windows: usize,
    ) -> chronicle_store::Result<IncrementalPlan> {
        let Some(prior) = store.most_recent_completed_run(room_id)? else {
            return Ok(IncrementalPlan::FellBackToFull(Self::full(store, room_id, config)?));
        };
        let Some(cut) = prior.end_message_id else {
            return Ok(IncrementalPlan::FellBackToFull(Self::full(store, room_id, config)?));
        };

        let context_limit = context_windows * config.window_size;
        let context = store.messages_ending_at(room_id, cut, context_limit)?;
        let new_messages = fetch_all_after(store, room_id, cut)?;

        let cut_point = RunCutPoint {
            start_message_id: new_messages.first().map(|m| m.id),
            end_message_id: new_messages.last().map(|m| m.id).or(Some(cut)),
            context_start_message_id: context.first().map(|m| m.id),
        };

        Ok(IncrementalPlan::Planned {
            stream: Self {
                config,
                phases: vec![(WindowPhase::Context, context), (WindowPhase::New, new_messages)],
            },
            cut_point,
        })
    }

    pub fn total_windows(&self) -> usize {
        self.phases
            .iter()
            .map(|(_, msgs)| self.config.window_count(msgs.len()))
            .sum()
    }

    /// Yield every window across all phases, in order.
    pub fn windows(&self) -> Vec<Window> {
        let mut out = Vec::with_capacity(self.total_windows());
        let mut global_index = 0;
        for (phase, msgs) in &self.phases {
            let count = self.config.window_count(msgs.len());
            for i in 0..count {
                let (start, end) = self.config.bounds(i, msgs.len());
                out.push(Window {
                    phase: *phase,
                    window_index: global_index,
                    messages: msgs[start..end].to_vec(),
                });
                global_index += 1;
            }
        }
        out
    }
}

pub enum IncrementalPlan {
    Planned { stream: WindowStream, cut_point: RunCutPoint },
    FellBackToFull(WindowStream),
}

fn fetch_all_eligible(store: &ArchiveStore, room_id: RoomId) -> chronicle_store::Result<Vec<Message>> {
    let mut out = Vec::new();
    let mut after = None;
    loop {
        let page = store.scan_room_messages(room_id, MessageCursor { after_id: after, limit: FETCH_PAGE })?;
        if page.is_empty() {
            break;
        }
        after = page.last().map(|m| m.id);
        let exhausted = page.len() < FETCH_PAGE;
        out.extend(page);
        if exhausted {
            break;
        }
    }
    Ok(out)
}

fn fetch_all_after(store: &ArchiveStore, room_id: RoomId, cut: MessageId) -> chronicle_store::Result<Vec<Message>> {
    let mut out = Vec::new();
    let mut cursor = cut;
    loop {
        let page = store.messages_after(room_id, cursor, FETCH_PAGE)?;
        if page.is_empty() {
            break;
        }
        cursor = page.last().map(|m| m.id).unwrap_or(cursor);
        let exhausted = page.len() < FETCH_PAGE;
        out.extend(page);
        if exhausted {
            break;
        }
    }
    Ok(out)
}
