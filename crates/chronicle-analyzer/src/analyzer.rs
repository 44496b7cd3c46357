use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use chronicle_core::types::{AnalysisRunId, DiscussionId, MessageId, PersonId, RoomId, RunMode};
use chronicle_gateway::{GenerateRequest, GenerateResult, ModelGateway, ToolCall, ToolHandler, ToolSpec};
use chronicle_store::types::Message;
use chronicle_store::ArchiveStore;
use chronicle_windows::{IncrementalPlan, RunCutPoint, WindowStream};
use chronicle_windows::types::{Window, WindowConfig, WindowPhase};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{AnalyzerError, Result};
use crate::keywords::extract_keywords;
use crate::state::{ActiveDiscussion, AnalyzerState, CATCH_UP_GRACE_HOURS, MAX_MESSAGES_PER_DISCUSSION, MAX_RECENT_PARTICIPANTS};
use crate::summary::generate_summaries;

/// §4.5: "rebuilds its state from non-ended discussions ... within the last
/// `CONTEXT_WINDOWS` windows of context".
const CONTEXT_WINDOWS: usize = 4;

/// A fully planned run: the window stream plus whatever the incremental
/// planner decided about the cut point (`None` for full mode, or when no
/// prior run forced a fallback to full).
pub struct Plan {
    pub stream: WindowStream,
    pub mode: RunMode,
    pub cut_point: Option<RunCutPoint>,
}

impl Plan {
    pub fn total_windows(&self) -> usize {
        self.stream.total_windows()
    }

    /// Whether this plan has any message to actually classify. `false` for
    /// an incremental plan whose new phase is empty — `WindowConfig::window_count`
    /// still yields one (empty) window in that case, but there is nothing
    /// for the model to see (§8: "incremental analysis on a corpus with
    /// zero new messages is a no-op").
    pub fn has_new_messages(&self) -> bool {
        self.stream
            .windows()
            .iter()
            .any(|w| w.phase == WindowPhase::New && !w.messages.is_empty())
    }

    /// `(start_message_id, end_message_id, context_start_message_id)` for
    /// the run record — what [`chronicle_runs::RunController::start_analysis`]
    /// needs before a run id exists, and what the final [`AnalysisOutcome`]
    /// reports.
    pub fn bounds(&self) -> (Option<MessageId>, Option<MessageId>, Option<MessageId>) {
        match &self.cut_point {
            Some(cut) => (cut.start_message_id, cut.end_message_id, cut.context_start_message_id),
            None => {
                let windows = self.stream.windows();
                let start = windows.first().and_then(|w| w.start_message_id());
                let end = windows.last().and_then(|w| w.end_message_id());
                (start, end, None)
            }
        }
    }
}

/// Plan a run's windows for the requested mode, falling back to full when
/// incremental has no prior completed run to cut from (§4.3).
pub fn plan_windows(
    store: &ArchiveStore,
    room_id: RoomId,
    window_config: WindowConfig,
    requested_mode: RunMode,
) -> Result<Plan> {
    match requested_mode {
        RunMode::Full => Ok(Plan {
            stream: WindowStream::full(store, room_id, window_config).map_err(AnalyzerError::Store)?,
            mode: RunMode::Full,
            cut_point: None,
        }),
        RunMode::Incremental => {
            match WindowStream::incremental(store, room_id, window_config, CONTEXT_WINDOWS)
                .map_err(AnalyzerError::Store)?
            {
                IncrementalPlan::Planned { stream, cut_point } => {
                    Ok(Plan { stream, mode: RunMode::Incremental, cut_point: Some(cut_point) })
                }
                IncrementalPlan::FellBackToFull(stream) => Ok(Plan { stream, mode: RunMode::Full, cut_point: None }),
            }
        }
    }
}

/// What a completed run reports back to the caller (§4.5 Termination).
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub discussions_found: i64,
    pub total_tokens: i64,
    pub windows_processed: i64,
    pub mode: RunMode,
    pub start_message_id: Option<MessageId>,
    pub end_message_id: Option<MessageId>,
    pub context_start_message_id: Option<MessageId>,
    /// Discussions created or extended by this run — the caller re-embeds
    /// each of these (C7) once this returns (§2: analysis "on completion
    /// generates summaries and triggers C7 for the affected discussions").
    pub touched_discussions: Vec<DiscussionId>,
}

/// Drive one analysis run to completion: rebuild state for incremental
/// catch-up, process every window in order, then regenerate summaries for
/// every discussion touched along the way.
///
/// The caller owns the [`chronicle_runs::RunController`] lifecycle — it
/// should have already called `start_analysis` (using [`Plan::bounds`] and
/// [`Plan::total_windows`]) to obtain `run_id`, and is responsible for
/// `finish_analysis` once this returns.
pub async fn analyze(
    store: &ArchiveStore,
    gateway: &ModelGateway,
    run_id: AnalysisRunId,
    room_id: RoomId,
    plan: &Plan,
) -> Result<AnalysisOutcome> {
    let windows = plan.stream.windows();
    let state = Mutex::new(AnalyzerState::new());

    if let Some(cut_point) = &plan.cut_point {
        let context_windows: Vec<&Window> = windows.iter().filter(|w| w.phase == WindowPhase::Context).collect();
        rebuild_from_catch_up(store, &mut state.lock().unwrap(), room_id, cut_point, &context_windows)?;
    }

    let mut total_tokens: i64 = 0;
    let mut windows_processed: i64 = 0;
    let mut touched: HashSet<DiscussionId> = HashSet::new();

    for window in &windows {
        state.lock().unwrap().current_window = window.window_index;

        if window.phase == WindowPhase::Context {
            // Read-only: the context phase only re-derives dormancy, it
            // never calls the model or writes (§4.3, §4.5).
            state.lock().unwrap().update_dormancy();
            continue;
        }

        if window.messages.is_empty() {
            // An incremental run with no new messages still yields exactly
            // one (empty) New-phase window; nothing to classify, so skip
            // the model call rather than spending a turn on nothing (§8).
            continue;
        }

        let (window_tokens, parsed) = run_window(store, gateway, &state, window).await?;
        total_tokens += window_tokens;

        {
            let mut s = state.lock().unwrap();
            apply_window_response(store, &mut s, room_id, run_id, window, parsed, &mut touched)?;
        }
        windows_processed += 1;

        let discussions_open = state.lock().unwrap().active_discussions.values().filter(|d| !d.ended).count() as i64;
        store
            .update_run_progress(run_id, windows_processed, discussions_open, window_tokens)
            .map_err(AnalyzerError::Store)?;
    }

    generate_summaries(store, gateway, &touched).await;

    let (start_message_id, end_message_id, context_start_message_id) = plan.bounds();
    Ok(AnalysisOutcome {
        discussions_found: touched.len() as i64,
        total_tokens,
        windows_processed,
        mode: plan.mode,
        start_message_id,
        end_message_id,
        context_start_message_id,
        touched_discussions: touched.into_iter().collect(),
    })
}

/// Rebuild in-memory state for discussions still plausibly open as of the
/// incremental cut: anything whose last known activity falls within
/// [`CATCH_UP_GRACE_HOURS`] of the cut message's timestamp. Each is given a
/// synthetic `existing_<id>` temp-id so the model can still refer to it by
/// name in its very first turn, before any durable id has been echoed back.
fn rebuild_from_catch_up(
    store: &ArchiveStore,
    state: &mut AnalyzerState,
    room_id: RoomId,
    cut_point: &RunCutPoint,
    context_windows: &[&Window],
) -> Result<()> {
    let Some(cut_id) = cut_point.end_message_id else {
        return Ok(());
    };
    let Some(cut_message) = store.get_message(cut_id).map_err(AnalyzerError::Store)? else {
        return Ok(());
    };
    let grace_start = cut_message.timestamp - Duration::hours(CATCH_UP_GRACE_HOURS);

    for discussion in store.discussions_for_room(room_id, 10_000).map_err(AnalyzerError::Store)? {
        if discussion.ended_at < grace_start {
            continue;
        }

        let message_ids = store.message_ids_for_discussion(discussion.id).map_err(AnalyzerError::Store)?;
        let message_id_set: HashSet<MessageId> = message_ids.iter().copied().collect();
        let last_active_window = context_windows
            .iter()
            .filter(|w| w.messages.iter().any(|m| message_id_set.contains(&m.id)))
            .map(|w| w.window_index)
            .max()
            .unwrap_or(0);

        let participants = store
            .discussion_participant_names(discussion.id)
            .map_err(AnalyzerError::Store)?
            .into_iter()
            .take(MAX_RECENT_PARTICIPANTS)
            .collect();
        let first_message_content = message_ids
            .first()
            .and_then(|id| store.get_message(*id).ok().flatten())
            .and_then(|m| m.content);
        let keywords = extract_keywords(&discussion.title, first_message_content.as_deref().unwrap_or(""));

        state.active_discussions.insert(
            discussion.id,
            ActiveDiscussion {
                durable_id: discussion.id,
                title: discussion.title.clone(),
                message_ids,
                started_at: discussion.started_at,
                ended_at: discussion.ended_at,
                ended: false,
                last_active_window,
                dormant: false,
                topic_keywords: keywords,
                recent_participants: participants,
            },
        );
        state.register_temp_id(format!("existing_{}", discussion.id.as_i64()), discussion.id);
    }
    Ok(())
}

async fn run_window(
    store: &ArchiveStore,
    gateway: &ModelGateway,
    state: &Mutex<AnalyzerState>,
    window: &Window,
) -> Result<(i64, WindowResponse)> {
    let prompt = compose_prompt(&state.lock().unwrap(), window);
    let input_tokens = chronicle_gateway::rate_limit::estimate_tokens(&prompt) as i64;

    let req = GenerateRequest::simple(prompt)
        .with_schema(response_schema())
        .with_tools(vec![inspect_discussion_tool()]);
    let handler = InspectHandler { store, state };
    let result = gateway.generate_with_tools(req, &handler).await.map_err(AnalyzerError::Gateway)?;

    let value = match result {
        GenerateResult::Structured(v) => v,
        GenerateResult::Text(_) => {
            return Err(AnalyzerError::Gateway(chronicle_gateway::GatewayError::BadModelOutput(
                "expected structured window classification output".into(),
            )))
        }
    };
    let output_tokens = chronicle_gateway::rate_limit::estimate_tokens(&value.to_string()) as i64;
    let parsed: WindowResponse = serde_json::from_value(value)
        .map_err(|e| AnalyzerError::Gateway(chronicle_gateway::GatewayError::BadModelOutput(e.to_string())))?;

    Ok((input_tokens + output_tokens, parsed))
}

fn compose_prompt(state: &AnalyzerState, window: &Window) -> String {
    let active: Vec<Value> = state
        .open_discussions()
        .map(|d| {
            json!({
                "id": d.durable_id.as_i64(),
                "title": d.title,
                "keywords": d.topic_keywords,
                "recent_participants": d.recent_participants,
                "windows_since_active": d.windows_since_active(state.current_window),
                "dormant": d.dormant,
            })
        })
        .collect();

    let messages: Vec<Value> = window
        .messages
        .iter()
        .map(|m| {
            json!({
                "id": m.id.as_i64(),
                "timestamp": m.timestamp.to_rfc3339(),
                "sender": m.sender_id.map(|p| p.as_i64()),
                "content": m.content.as_deref().unwrap_or(""),
                "replying_to": m.reply_to_message_id.map(|r| r.as_i64()),
            })
        })
        .collect();

    format!(
        "You are tracking ongoing discussions in a group chat. Given the currently open \
         discussions and a new batch of messages, assign each message to an existing \
         discussion by its id, to a discussion you are declaring in this same batch by its \
         temp_id, or start a brand-new discussion (invent a temp_id and give it a title). \
         Use the inspect_discussion tool if an existing discussion's recent history isn't \
         enough context to decide. Mark any discussion that has clearly wrapped up as ended.\n\n\
         OPEN DISCUSSIONS:\n{}\n\nMESSAGES:\n{}",
        serde_json::to_string_pretty(&active).unwrap_or_default(),
        serde_json::to_string_pretty(&messages).unwrap_or_default(),
    )
}

fn inspect_discussion_tool() -> ToolSpec {
    ToolSpec {
        name: "inspect_discussion".to_string(),
        description: "Fetch the full tracked message history of an already-open discussion by its id."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "discussion_id": {
                    "type": "integer",
                    "description": "Durable id of a discussion listed in OPEN DISCUSSIONS."
                }
            },
            "required": ["discussion_id"]
        }),
    }
}

fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "classifications": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "message_id": {"type": "integer"},
                        "assignments": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "discussion_id": {"oneOf": [{"type": "integer"}, {"type": "string"}]},
                                    "title": {"type": "string"},
                                    "confidence": {"type": "number"}
                                },
                                "required": ["discussion_id", "confidence"]
                            }
                        }
                    },
                    "required": ["message_id", "assignments"]
                }
            },
            "discussions_ended": {"type": "array", "items": {"type": "integer"}},
            "new_discussions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "temp_id": {"type": "string"},
                        "title": {"type": "string"}
                    },
                    "required": ["temp_id", "title"]
                }
            }
        },
        "required": ["classifications", "discussions_ended", "new_discussions"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DiscussionRef {
    Id(i64),
    TempId(String),
}

#[derive(Debug, Deserialize)]
struct Assignment {
    discussion_id: DiscussionRef,
    #[serde(default)]
    title: Option<String>,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct MessageClassification {
    message_id: i64,
    #[serde(default)]
    assignments: Vec<Assignment>,
}

#[derive(Debug, Deserialize)]
struct NewDiscussionDecl {
    temp_id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct WindowResponse {
    classifications: Vec<MessageClassification>,
    #[serde(default)]
    discussions_ended: Vec<i64>,
    #[serde(default)]
    new_discussions: Vec<NewDiscussionDecl>,
}

/// Apply one window's classification response to both the in-memory state
/// and the store, in the order the Discussion Analyzer demands: create
/// declared discussions first (so assignments can reference their temp_ids
/// the same turn), then classify messages, then close out endings (§4.5).
fn apply_window_response(
    store: &ArchiveStore,
    state: &mut AnalyzerState,
    room_id: RoomId,
    run_id: AnalysisRunId,
    window: &Window,
    response: WindowResponse,
    touched: &mut HashSet<DiscussionId>,
) -> Result<()> {
    for decl in &response.new_discussions {
        if state.resolve_temp_id(&decl.temp_id).is_some() {
            continue;
        }
        let seed = first_message_for_temp_id(window, &response.classifications, &decl.temp_id);
        create_discussion(store, state, room_id, run_id, &decl.temp_id, &decl.title, seed, touched)?;
    }

    for classification in &response.classifications {
        let Some(message) = window.messages.iter().find(|m| m.id.as_i64() == classification.message_id) else {
            warn!(message_id = classification.message_id, "classification referenced a message outside this window");
            continue;
        };

        for assignment in &classification.assignments {
            let resolved = resolve_assignment(store, state, room_id, run_id, message, assignment, touched)?;
            let Some(disc_id) = resolved else { continue };

            let disc = &state.active_discussions[&disc_id];
            let windows_since_active = disc.windows_since_active(state.current_window);
            if assignment.confidence >= 0.9 && windows_since_active >= 3 {
                warn!(
                    discussion_id = disc_id.as_i64(),
                    confidence = assignment.confidence,
                    windows_since_active,
                    "high-confidence assignment to a long-dormant discussion"
                );
            }
            if disc.ended {
                warn!(discussion_id = disc_id.as_i64(), "assignment to an already-ended discussion, dropping");
                continue;
            }
            if disc.message_ids.len() >= MAX_MESSAGES_PER_DISCUSSION {
                warn!(discussion_id = disc_id.as_i64(), "discussion hit the per-discussion message cap, dropping assignment");
                continue;
            }
            if disc.message_ids.contains(&message.id) {
                continue;
            }

            store
                .append_discussion_message(disc_id, message.id, assignment.confidence, message.timestamp)
                .map_err(AnalyzerError::Store)?;

            let disc = state.active_discussions.get_mut(&disc_id).unwrap();
            disc.message_ids.push(message.id);
            if message.timestamp > disc.ended_at {
                disc.ended_at = message.timestamp;
            }
            if message.timestamp < disc.started_at {
                disc.started_at = message.timestamp;
            }

            let sender = sender_name(store, message.sender_id)?;
            state.mark_active(disc_id, sender);
            touched.insert(disc_id);
        }
    }

    for raw_id in &response.discussions_ended {
        let id = DiscussionId(*raw_id);
        match state.active_discussions.get_mut(&id) {
            Some(disc) => disc.ended = true,
            None => warn!(discussion_id = raw_id, "discussions_ended referenced an unknown discussion id"),
        }
    }

    state.update_dormancy();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn resolve_assignment(
    store: &ArchiveStore,
    state: &mut AnalyzerState,
    room_id: RoomId,
    run_id: AnalysisRunId,
    message: &Message,
    assignment: &Assignment,
    touched: &mut HashSet<DiscussionId>,
) -> Result<Option<DiscussionId>> {
    match &assignment.discussion_id {
        DiscussionRef::Id(raw) => {
            let id = DiscussionId(*raw);
            if state.active_discussions.contains_key(&id) {
                Ok(Some(id))
            } else {
                warn!(discussion_id = raw, "assignment referenced an unknown discussion id");
                Ok(None)
            }
        }
        DiscussionRef::TempId(temp_id) => {
            if let Some(id) = state.resolve_temp_id(temp_id) {
                return Ok(Some(id));
            }
            match &assignment.title {
                Some(title) => {
                    let id = create_discussion(store, state, room_id, run_id, temp_id, title, Some(message), touched)?;
                    Ok(Some(id))
                }
                None => {
                    warn!(%temp_id, "assignment referenced an unregistered temp_id with no title to create one");
                    Ok(None)
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn create_discussion(
    store: &ArchiveStore,
    state: &mut AnalyzerState,
    room_id: RoomId,
    run_id: AnalysisRunId,
    temp_id: &str,
    title: &str,
    seed: Option<&Message>,
    touched: &mut HashSet<DiscussionId>,
) -> Result<DiscussionId> {
    let started_at = seed.map(|m| m.timestamp).unwrap_or_else(Utc::now);
    let keywords = extract_keywords(title, seed.and_then(|m| m.content.as_deref()).unwrap_or(""));
    let id = store
        .create_discussion(room_id, Some(run_id), title, started_at, started_at)
        .map_err(AnalyzerError::Store)?;
    state.active_discussions.insert(
        id,
        ActiveDiscussion {
            durable_id: id,
            title: title.to_string(),
            message_ids: Vec::new(),
            started_at,
            ended_at: started_at,
            ended: false,
            last_active_window: state.current_window,
            dormant: false,
            topic_keywords: keywords,
            recent_participants: Vec::new(),
        },
    );
    state.register_temp_id(temp_id.to_string(), id);
    touched.insert(id);
    Ok(id)
}

fn first_message_for_temp_id<'a>(
    window: &'a Window,
    classifications: &[MessageClassification],
    temp_id: &str,
) -> Option<&'a Message> {
    classifications
        .iter()
        .find(|c| c.assignments.iter().any(|a| matches!(&a.discussion_id, DiscussionRef::TempId(t) if t == temp_id)))
        .and_then(|c| window.messages.iter().find(|m| m.id.as_i64() == c.message_id))
}

fn sender_name(store: &ArchiveStore, sender_id: Option<PersonId>) -> Result<Option<String>> {
    let Some(id) = sender_id else { return Ok(None) };
    Ok(store
        .get_person(id)
        .map_err(AnalyzerError::Store)?
        .and_then(|p| p.display_name.or(Some(p.external_user_id))))
}

struct InspectHandler<'a> {
    store: &'a ArchiveStore,
    state: &'a Mutex<AnalyzerState>,
}

#[async_trait]
impl ToolHandler for InspectHandler<'_> {
    async fn call(&self, call: &ToolCall) -> Value {
        let Some(raw_id) = call.input.get("discussion_id").and_then(Value::as_i64) else {
            return json!({"error": "missing discussion_id"});
        };
        let id = DiscussionId(raw_id);

        let (title, message_ids) = {
            let state = self.state.lock().unwrap();
            match state.active_discussions.get(&id) {
                Some(d) => (d.title.clone(), d.message_ids.clone()),
                None => return json!({"error": format!("unknown discussion {id}")}),
            }
        };

        let messages = match self.store.get_messages_by_ids(&message_ids) {
            Ok(m) => m,
            Err(e) => return json!({"error": e.to_string()}),
        };

        json!({
            "discussion_id": id.as_i64(),
            "title": title,
            "message_count": messages.len(),
            "messages": messages.iter().map(|m| json!({
                "id": m.id.as_i64(),
                "sender_id": m.sender_id.map(|p| p.as_i64()),
                "content": m.content.as_deref().unwrap_or(""),
                "timestamp": m.timestamp.to_rfc3339(),
            })).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::types::MessageType;
    use chronicle_store::messages::NewMessage;

    fn seeded_store() -> (ArchiveStore, RoomId, PersonId) {
        let store = ArchiveStore::in_memory().unwrap();
        let room = store.upsert_room("room-1", None, true).unwrap();
        let person = store.upsert_person("user-1", Some("Ada")).unwrap();
        (store, room, person)
    }

    fn insert_message(store: &ArchiveStore, room: RoomId, person: PersonId, external_id: &str, content: &str) -> Message {
        let id = store
            .insert_message(&NewMessage {
                external_event_id: external_id.to_string(),
                room_id: Some(room),
                sender_id: Some(person),
                content: Some(content.to_string()),
                reply_to_message_id: None,
                timestamp: Utc::now(),
                message_type: MessageType::Text,
                media_url: None,
            })
            .unwrap();
        store.get_message(id).unwrap().unwrap()
    }

    fn window_with(messages: Vec<Message>) -> Window {
        Window { phase: WindowPhase::New, window_index: 0, messages }
    }

    #[test]
    fn new_discussion_declaration_creates_and_registers_temp_id() {
        let (store, room, person) = seeded_store();
        let msg = insert_message(&store, room, person, "m1", "let's plan the trip");
        let window = window_with(vec![msg.clone()]);
        let mut state = AnalyzerState::new();
        let mut touched = HashSet::new();

        let response = WindowResponse {
            classifications: vec![MessageClassification {
                message_id: msg.id.as_i64(),
                assignments: vec![Assignment {
                    discussion_id: DiscussionRef::TempId("t1".into()),
                    title: None,
                    confidence: 0.9,
                }],
            }],
            discussions_ended: vec![],
            new_discussions: vec![NewDiscussionDecl { temp_id: "t1".into(), title: "Trip planning".into() }],
        };

        apply_window_response(&store, &mut state, room, AnalysisRunId(1), &window, response, &mut touched).unwrap();

        assert_eq!(touched.len(), 1);
        let id = state.resolve_temp_id("t1").unwrap();
        let disc = &state.active_discussions[&id];
        assert_eq!(disc.title, "Trip planning");
        assert_eq!(disc.message_ids, vec![msg.id]);
        assert_eq!(disc.recent_participants, vec!["Ada".to_string()]);
    }

    #[test]
    fn per_discussion_message_cap_drops_further_assignments() {
        let (store, room, person) = seeded_store();
        let msg = insert_message(&store, room, person, "m1", "still going");
        let window = window_with(vec![msg.clone()]);
        let mut state = AnalyzerState::new();

        let discussion_id = store
            .create_discussion(room, None, "Long running", Utc::now(), Utc::now())
            .unwrap();
        state.active_discussions.insert(
            discussion_id,
            ActiveDiscussion {
                durable_id: discussion_id,
                title: "Long running".into(),
                message_ids: (0..MAX_MESSAGES_PER_DISCUSSION as i64).map(MessageId).collect(),
                started_at: Utc::now(),
                ended_at: Utc::now(),
                ended: false,
                last_active_window: 0,
                dormant: false,
                topic_keywords: vec![],
                recent_participants: vec![],
            },
        );

        let response = WindowResponse {
            classifications: vec![MessageClassification {
                message_id: msg.id.as_i64(),
                assignments: vec![Assignment {
                    discussion_id: DiscussionRef::Id(discussion_id.as_i64()),
                    title: None,
                    confidence: 0.95,
                }],
            }],
            discussions_ended: vec![],
            new_discussions: vec![],
        };

        let mut touched = HashSet::new();
        apply_window_response(&store, &mut state, room, AnalysisRunId(1), &window, response, &mut touched).unwrap();

        assert_eq!(state.active_discussions[&discussion_id].message_ids.len(), MAX_MESSAGES_PER_DISCUSSION);
    }

    #[test]
    fn discussions_ended_marks_the_matching_discussion() {
        let (store, room, _person) = seeded_store();
        let discussion_id = store.create_discussion(room, None, "Wrapping up", Utc::now(), Utc::now()).unwrap();
        let mut state = AnalyzerState::new();
        state.active_discussions.insert(
            discussion_id,
            ActiveDiscussion {
                durable_id: discussion_id,
                title: "Wrapping up".into(),
                message_ids: vec![],
                started_at: Utc::now(),
                ended_at: Utc::now(),
                ended: false,
                last_active_window: 0,
                dormant: false,
                topic_keywords: vec![],
                recent_participants: vec![],
            },
        );

        let response = WindowResponse {
            classifications: vec![],
            discussions_ended: vec![discussion_id.as_i64()],
            new_discussions: vec![],
        };
        let window = window_with(vec![]);
        let mut touched = HashSet::new();
        apply_window_response(&store, &mut state, room, AnalysisRunId(1), &window, response, &mut touched).unwrap();

        assert!(state.active_discussions[&discussion_id].ended);
    }
}
