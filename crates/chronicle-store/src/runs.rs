use std::str::FromStr;

use chronicle_core::types::{AnalysisRunId, MessageId, RoomId, RunMode, RunStatus};

use crate::error::Result;
use crate::manager::ArchiveStore;
use crate::types::AnalysisRun;

impl ArchiveStore {
    pub fn create_run(
        &self,
        room_id: RoomId,
        mode: RunMode,
        start_message_id: Option<MessageId>,
        end_message_id: Option<MessageId>,
        context_start_message_id: Option<MessageId>,
        total_windows: Option<i64>,
    ) -> Result<AnalysisRunId> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO analysis_runs
                (room_id, started_at, status, windows_processed, total_windows,
                 discussions_found, tokens_used, mode, start_message_id, end_message_id,
                 context_start_message_id, new_messages_count, context_messages_count)
             VALUES (?1, ?2, 'running', 0, ?3, 0, 0, ?4, ?5, ?6, ?7, 0, 0)",
            rusqlite::params![
                room_id.0,
                now,
                total_windows,
                mode.to_string(),
                start_message_id.map(|m| m.0),
                end_message_id.map(|m| m.0),
                context_start_message_id.map(|m| m.0),
            ],
        )?;
        Ok(AnalysisRunId(db.last_insert_rowid()))
    }

    pub fn get_run(&self, id: AnalysisRunId) -> Result<Option<AnalysisRun>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, room_id, started_at, completed_at, status, windows_processed,
                    total_windows, discussions_found, tokens_used, error, mode,
                    start_message_id, end_message_id, context_start_message_id,
                    new_messages_count, context_messages_count
             FROM analysis_runs WHERE id = ?1",
            rusqlite::params![id.0],
            row_to_run,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    pub fn update_run_progress(
        &self,
        id: AnalysisRunId,
        windows_processed: i64,
        discussions_found: i64,
        tokens_used_delta: i64,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE analysis_runs SET
                windows_processed = ?1,
                discussions_found = ?2,
                tokens_used = tokens_used + ?3
             WHERE id = ?4",
            rusqlite::params![windows_processed, discussions_found, tokens_used_delta, id.0],
        )?;
        Ok(())
    }

    pub fn mark_run_terminal(&self, id: AnalysisRunId, status: RunStatus, error: Option<&str>) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "UPDATE analysis_runs SET status = ?1, completed_at = ?2, error = ?3 WHERE id = ?4",
            rusqlite::params![status.to_string(), now, error, id.0],
        )?;
        Ok(())
    }

    pub fn is_run_active_for_room(&self, room_id: RoomId) -> Result<bool> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM analysis_runs WHERE room_id = ?1 AND status = 'running'",
            rusqlite::params![room_id.0],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Runs recorded `running` in the database, for stale-run detection
    /// against the process's in-memory set of actually-running room ids.
    pub fn running_runs(&self) -> Result<Vec<AnalysisRun>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, room_id, started_at, completed_at, status, windows_processed,
                    total_windows, discussions_found, tokens_used, error, mode,
                    start_message_id, end_message_id, context_start_message_id,
                    new_messages_count, context_messages_count
             FROM analysis_runs WHERE status = 'running'",
        )?;
        let rows = stmt.query_map([], row_to_run)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent run for a room regardless of status — what `GetAnalysisStatus`
    /// reports.
    pub fn most_recent_run_for_room(&self, room_id: RoomId) -> Result<Option<AnalysisRun>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, room_id, started_at, completed_at, status, windows_processed,
                    total_windows, discussions_found, tokens_used, error, mode,
                    start_message_id, end_message_id, context_start_message_id,
                    new_messages_count, context_messages_count
             FROM analysis_runs
             WHERE room_id = ?1
             ORDER BY started_at DESC
             LIMIT 1",
            rusqlite::params![room_id.0],
            row_to_run,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    /// Most recent successfully completed run for a room, used to find the
    /// incremental cut point (`end_message_id`).
    pub fn most_recent_completed_run(&self, room_id: RoomId) -> Result<Option<AnalysisRun>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, room_id, started_at, completed_at, status, windows_processed,
                    total_windows, discussions_found, tokens_used, error, mode,
                    start_message_id, end_message_id, context_start_message_id,
                    new_messages_count, context_messages_count
             FROM analysis_runs
             WHERE room_id = ?1 AND status = 'completed'
             ORDER BY completed_at DESC
             LIMIT 1",
            rusqlite::params![room_id.0],
            row_to_run,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRun> {
    let started: String = row.get(2)?;
    let completed: Option<String> = row.get(3)?;
    let status: String = row.get(4)?;
    let mode: String = row.get(10)?;
    Ok(AnalysisRun {
        id: AnalysisRunId(row.get(0)?),
        room_id: RoomId(row.get(1)?),
        started_at: chrono::DateTime::parse_from_rfc3339(&started)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        completed_at: completed
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc)),
        status: RunStatus::from_str(&status).unwrap_or(RunStatus::Failed),
        windows_processed: row.get(5)?,
        total_windows: row.get(6)?,
        discussions_found: row.get(7)?,
        tokens_used: row.get(8)?,
        error: row.get(9)?,
        mode: RunMode::from_str(&mode).unwrap_or(RunMode::Full),
        start_message_id: row.get::<_, Option<i64>>(11)?.map(MessageId),
        end_message_id: row.get::<_, Option<i64>>(12)?.map(MessageId),
        context_start_message_id: row.get::<_, Option<i64>>(13)?.map(MessageId),
        new_messages_count: row.get(14)?,
        context_messages_count: row.get(15)?,
    })
}
