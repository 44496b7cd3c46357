use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use chronicle_core::types::{AnalysisRunId, MessageId, RoomId, RunMode, RunStatus};
use chronicle_store::ArchiveStore;
use tracing::warn;

use crate::error::{Result, RunsError};
use crate::types::{JobKind, Liveness, STALE_AFTER_SECS};

/// Process-wide run controller: one per process, injected into every
/// component that starts or observes long-running jobs (§9: "initialize
/// once at process start; never accessed by ambient lookup").
pub struct RunController {
    store: Arc<ArchiveStore>,
    analysis_running: Mutex<HashSet<RoomId>>,
    topic_classification_running: AtomicBool,
    reindex_running: AtomicBool,
}

impl RunController {
    pub fn new(store: Arc<ArchiveStore>) -> Self {
        Self {
            store,
            analysis_running: Mutex::new(HashSet::new()),
            topic_classification_running: AtomicBool::new(false),
            reindex_running: AtomicBool::new(false),
        }
    }

    /// Start an analysis run for `room_id`. Fails with `CONFLICT` if one is
    /// already active for this room.
    pub fn start_analysis(
        &self,
        room_id: RoomId,
        mode: RunMode,
        start_message_id: Option<MessageId>,
        end_message_id: Option<MessageId>,
        context_start_message_id: Option<MessageId>,
        total_windows: Option<i64>,
    ) -> Result<AnalysisRunId> {
        let mut running = self.analysis_running.lock().unwrap();
        if running.contains(&room_id) {
            return Err(RunsError::Conflict(format!(
                "analysis already running for room {room_id}"
            )));
        }
        let run_id = self.store.create_run(
            room_id,
            mode,
            start_message_id,
            end_message_id,
            context_start_message_id,
            total_windows,
        )?;
        running.insert(room_id);
        Ok(run_id)
    }

    pub fn finish_analysis(&self, room_id: RoomId, run_id: AnalysisRunId, status: RunStatus, error: Option<&str>) {
        if let Err(e) = self.store.mark_run_terminal(run_id, status, error) {
            warn!(%run_id, "failed to mark analysis run terminal: {e}");
        }
        self.analysis_running.lock().unwrap().remove(&room_id);
    }

    /// Reports the room's run status, rewriting a stale `running` record to
    /// `failed` first if the in-memory flag has gone missing (§4.9, §8:
    /// "Stale detection fires iff status=running ∧ ¬in_memory_flag ∧ age >
    /// 2 min").
    pub fn analysis_liveness(&self, room_id: RoomId) -> Result<Liveness> {
        let running = self.store.running_runs()?;
        let Some(run) = running.into_iter().find(|r| r.room_id == room_id) else {
            return Ok(Liveness::Idle);
        };
        let flag_set = self.analysis_running.lock().unwrap().contains(&room_id);
        if flag_set {
            return Ok(Liveness::Running);
        }
        let age = Utc::now().signed_duration_since(run.started_at).num_seconds();
        if age > STALE_AFTER_SECS {
            self.store.mark_run_terminal(
                run.id,
                RunStatus::Failed,
                Some("stale: no heartbeat within 2 minutes"),
            )?;
            return Ok(Liveness::WasStale);
        }
        Ok(Liveness::Running)
    }

    pub fn try_start_topic_classification(&self) -> Result<()> {
        if self
            .topic_classification_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunsError::Conflict("topic classification already running".into()));
        }
        Ok(())
    }

    pub fn finish_topic_classification(&self) {
        self.topic_classification_running.store(false, Ordering::SeqCst);
    }

    pub fn try_start_reindex(&self) -> Result<()> {
        if self
            .reindex_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RunsError::Conflict("reindex already running".into()));
        }
        Ok(())
    }

    pub fn finish_reindex(&self) {
        self.reindex_running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self, kind: JobKind) -> bool {
        match kind {
            JobKind::Analysis(room_id) => self.analysis_running.lock().unwrap().contains(&room_id),
            JobKind::TopicClassification => self.topic_classification_running.load(Ordering::SeqCst),
            JobKind::Reindex => self.reindex_running.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RunController {
        RunController::new(Arc::new(ArchiveStore::in_memory().unwrap()))
    }

    #[test]
    fn second_start_for_same_room_conflicts() {
        let ctl = controller();
        let room = ctl.store.upsert_room("r1", None, false).unwrap();
        ctl.start_analysis(room, RunMode::Full, None, None, None, Some(1)).unwrap();
        let second = ctl.start_analysis(room, RunMode::Full, None, None, None, Some(1));
        assert!(matches!(second, Err(RunsError::Conflict(_))));
    }

    #[test]
    fn finishing_clears_the_flag_for_a_new_start() {
        let ctl = controller();
        let room = ctl.store.upsert_room("r1", None, false).unwrap();
        let run_id = ctl.start_analysis(room, RunMode::Full, None, None, None, Some(1)).unwrap();
        ctl.finish_analysis(room, run_id, RunStatus::Completed, None);
        assert!(ctl.start_analysis(room, RunMode::Full, None, None, None, Some(1)).is_ok());
    }

    #[test]
    fn topic_classification_single_flights_globally() {
        let ctl = controller();
        ctl.try_start_topic_classification().unwrap();
        assert!(ctl.try_start_topic_classification().is_err());
        ctl.finish_topic_classification();
        assert!(ctl.try_start_topic_classification().is_ok());
    }
}
