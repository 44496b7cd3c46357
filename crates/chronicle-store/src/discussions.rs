use chronicle_core::types::{AnalysisRunId, DiscussionId, MessageId, PersonId, RoomId};

use crate::error::Result;
use crate::manager::ArchiveStore;
use crate::types::Discussion;

impl ArchiveStore {
    pub fn create_discussion(
        &self,
        room_id: RoomId,
        analysis_run_id: Option<AnalysisRunId>,
        title: &str,
        started_at: chrono::DateTime<chrono::Utc>,
        ended_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<DiscussionId> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO discussions
                (room_id, analysis_run_id, title, started_at, ended_at, message_count, participant_count)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0)",
            rusqlite::params![
                room_id.0,
                analysis_run_id.map(|r| r.0),
                title,
                started_at.to_rfc3339(),
                ended_at.to_rfc3339(),
            ],
        )?;
        let id = DiscussionId(db.last_insert_rowid());
        sync_discussion_fts(&db, id, title, None)?;
        Ok(id)
    }

    pub fn get_discussion(&self, id: DiscussionId) -> Result<Option<Discussion>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, room_id, analysis_run_id, title, summary, started_at, ended_at,
                    message_count, participant_count
             FROM discussions WHERE id = ?1",
            rusqlite::params![id.0],
            row_to_discussion,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    pub fn set_discussion_summary(&self, id: DiscussionId, summary: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE discussions SET summary = ?1 WHERE id = ?2",
            rusqlite::params![summary, id.0],
        )?;
        let title: String = db.query_row(
            "SELECT title FROM discussions WHERE id = ?1",
            rusqlite::params![id.0],
            |row| row.get(0),
        )?;
        sync_discussion_fts(&db, id, &title, Some(summary))?;
        Ok(())
    }

    /// Idempotent on `(discussion_id, message_id)`: the first assignment
    /// wins and a repeated identical assignment is a no-op. A later
    /// assignment of the same message to a *different* discussion adds a
    /// second edge rather than overwriting this one. Bumps `ended_at`
    /// forward and `started_at` backward to keep the span monotone, and
    /// refreshes `message_count`/`participant_count`.
    pub fn append_discussion_message(
        &self,
        discussion_id: DiscussionId,
        message_id: MessageId,
        confidence: f64,
        message_timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO discussion_messages (discussion_id, message_id, confidence)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(discussion_id, message_id) DO NOTHING",
            rusqlite::params![discussion_id.0, message_id.0, confidence],
        )?;
        let ts = message_timestamp.to_rfc3339();
        db.execute(
            "UPDATE discussions SET
                started_at = MIN(started_at, ?1),
                ended_at   = MAX(ended_at, ?1)
             WHERE id = ?2",
            rusqlite::params![ts, discussion_id.0],
        )?;
        recompute_discussion_counts(&db, discussion_id)?;
        Ok(())
    }

    /// All discussions for a room, most recently ended first — used by the
    /// topic classifier and by incremental catch-up to find still-open
    /// discussions near the analysis cut point.
    pub fn discussions_for_room(&self, room_id: RoomId, limit: usize) -> Result<Vec<Discussion>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, room_id, analysis_run_id, title, summary, started_at, ended_at,
                    message_count, participant_count
             FROM discussions
             WHERE room_id = ?1
             ORDER BY ended_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![room_id.0, limit as i64], row_to_discussion)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn message_ids_for_discussion(&self, discussion_id: DiscussionId) -> Result<Vec<MessageId>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT message_id FROM discussion_messages WHERE discussion_id = ?1 ORDER BY message_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![discussion_id.0], |row| {
            Ok(MessageId(row.get(0)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All discussions with id greater than `after_id`, ascending — used by
    /// bulk reindex.
    pub fn list_discussions_after(&self, after_id: i64, limit: usize) -> Result<Vec<Discussion>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, room_id, analysis_run_id, title, summary, started_at, ended_at,
                    message_count, participant_count
             FROM discussions WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![after_id, limit as i64], row_to_discussion)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Distinct display names of people who sent a message assigned to this
    /// discussion — used by the hybrid searcher's participant-name keyword
    /// match (§4.8).
    pub fn discussion_participant_names(&self, discussion_id: DiscussionId) -> Result<Vec<String>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT DISTINCT p.display_name
             FROM discussion_messages dm
             JOIN messages m ON m.id = dm.message_id
             JOIN people p ON p.id = m.sender_id
             WHERE dm.discussion_id = ?1 AND p.display_name IS NOT NULL",
        )?;
        let rows = stmt.query_map(rusqlite::params![discussion_id.0], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// All discussions containing at least one message from `person_id` —
    /// the person-through-discussion search fallback (§4.8, §9: "asymmetric
    /// ... only boosts discussions from person matches").
    pub fn discussions_for_person(&self, person_id: PersonId) -> Result<Vec<DiscussionId>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT DISTINCT dm.discussion_id
             FROM discussion_messages dm
             JOIN messages m ON m.id = dm.message_id
             WHERE m.sender_id = ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![person_id.0], |row| {
            Ok(DiscussionId(row.get(0)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn search_discussions_keyword(&self, query: &str, limit: usize) -> Result<Vec<(DiscussionId, f64)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT rowid, bm25(discussions_fts) AS rank
             FROM discussions_fts
             WHERE discussions_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![query, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        let raw: Vec<(i64, f64)> = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        let max_abs = raw.iter().map(|(_, r)| r.abs()).fold(0.0f64, f64::max);
        Ok(raw
            .into_iter()
            .map(|(id, rank)| {
                let score = if max_abs > 0.0 { rank.abs() / max_abs } else { 0.0 };
                (DiscussionId(id), score)
            })
            .collect())
    }
}

fn recompute_discussion_counts(db: &rusqlite::Connection, id: DiscussionId) -> rusqlite::Result<()> {
    db.execute(
        "UPDATE discussions SET
            message_count = (SELECT COUNT(*) FROM discussion_messages WHERE discussion_id = ?1),
            participant_count = (
                SELECT COUNT(DISTINCT m.sender_id)
                FROM discussion_messages dm
                JOIN messages m ON m.id = dm.message_id
                WHERE dm.discussion_id = ?1 AND m.sender_id IS NOT NULL
            )
         WHERE id = ?1",
        rusqlite::params![id.0],
    )?;
    Ok(())
}

fn sync_discussion_fts(
    db: &rusqlite::Connection,
    id: DiscussionId,
    title: &str,
    summary: Option<&str>,
) -> rusqlite::Result<()> {
    db.execute(
        "INSERT INTO discussions_fts(discussions_fts, rowid, title, summary) VALUES('delete', ?1, ?2, ?3)",
        rusqlite::params![id.0, title, summary],
    )
    .ok();
    db.execute(
        "INSERT INTO discussions_fts(rowid, title, summary) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.0, title, summary],
    )?;
    Ok(())
}

fn row_to_discussion(row: &rusqlite::Row<'_>) -> rusqlite::Result<Discussion> {
    let started: String = row.get(5)?;
    let ended: String = row.get(6)?;
    Ok(Discussion {
        id: DiscussionId(row.get(0)?),
        room_id: RoomId(row.get(1)?),
        analysis_run_id: row.get::<_, Option<i64>>(2)?.map(AnalysisRunId),
        title: row.get(3)?,
        summary: row.get(4)?,
        started_at: chrono::DateTime::parse_from_rfc3339(&started)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        ended_at: chrono::DateTime::parse_from_rfc3339(&ended)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        message_count: row.get(7)?,
        participant_count: row.get(8)?,
    })
}
