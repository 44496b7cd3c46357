use std::fmt::Write as _;
use std::str::FromStr;

use chronicle_core::types::{MessageId, MessageType, PersonId, RoomId};

use crate::error::Result;
use crate::manager::ArchiveStore;
use crate::types::{Message, MessageCursor};

impl ArchiveStore {
    /// Idempotent on `external_event_id`. Immutable after insert.
    pub fn insert_message(&self, msg: &NewMessage) -> Result<MessageId> {
        let db = self.db.lock().unwrap();
        let ts = msg.timestamp.to_rfc3339();
        db.execute(
            "INSERT INTO messages
                (external_event_id, room_id, sender_id, content, reply_to_message_id,
                 timestamp, message_type, media_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(external_event_id) DO NOTHING",
            rusqlite::params![
                msg.external_event_id,
                msg.room_id.map(|r| r.0),
                msg.sender_id.map(|p| p.0),
                msg.content,
                msg.reply_to_message_id.map(|m| m.0),
                ts,
                msg.message_type.to_string(),
                msg.media_url,
            ],
        )?;
        let id: i64 = db.query_row(
            "SELECT id FROM messages WHERE external_event_id = ?1",
            rusqlite::params![msg.external_event_id],
            |row| row.get(0),
        )?;

        if let Some(content) = &msg.content {
            sync_message_fts(&db, MessageId(id), content)?;
        }

        Ok(MessageId(id))
    }

    pub fn get_message(&self, id: MessageId) -> Result<Option<Message>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages WHERE id = ?1",
            rusqlite::params![id.0],
            row_to_message,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    pub fn get_message_by_external_id(&self, external_event_id: &str) -> Result<Option<Message>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages WHERE external_event_id = ?1",
            rusqlite::params![external_event_id],
            row_to_message,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    pub fn get_messages_by_ids(&self, ids: &[MessageId]) -> Result<Vec<Message>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let db = self.db.lock().unwrap();
        let mut placeholders = String::new();
        for (i, _) in ids.iter().enumerate() {
            if i > 0 {
                placeholders.push(',');
            }
            let _ = write!(placeholders, "?{}", i + 1);
        }
        let sql = format!(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages WHERE id IN ({placeholders})
             ORDER BY timestamp, id"
        );
        let mut stmt = db.prepare(&sql)?;
        let params: Vec<i64> = ids.iter().map(|m| m.0).collect();
        let rows = stmt.query_map(rusqlite::params_from_iter(params), row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Eligible messages for windowing: non-empty content, ordered by `(timestamp, id)`.
    pub fn scan_room_messages(&self, room_id: RoomId, cursor: MessageCursor) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages
             WHERE room_id = ?1 AND content IS NOT NULL AND trim(content) != ''
               AND (?2 IS NULL OR id > ?2)
             ORDER BY timestamp, id
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![room_id.0, cursor.after_id.map(|m| m.0), cursor.limit as i64],
            row_to_message,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Count of eligible (non-empty content) messages in a room.
    pub fn count_eligible_messages(&self, room_id: RoomId) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE room_id = ?1 AND content IS NOT NULL AND trim(content) != ''",
            rusqlite::params![room_id.0],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Eligible messages strictly newer than `cut`, ordered ascending — the
    /// "new phase" of incremental analysis.
    pub fn messages_after(&self, room_id: RoomId, cut: MessageId, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages
             WHERE room_id = ?1 AND id > ?2 AND content IS NOT NULL AND trim(content) != ''
             ORDER BY timestamp, id
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![room_id.0, cut.0, limit as i64],
            row_to_message,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Up to `limit` eligible messages ending at (and including) `cut`,
    /// oldest-to-newest — the "context phase" of incremental analysis.
    pub fn messages_ending_at(&self, room_id: RoomId, cut: MessageId, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages
             WHERE room_id = ?1 AND id <= ?2 AND content IS NOT NULL AND trim(content) != ''
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![room_id.0, cut.0, limit as i64],
            row_to_message,
        )?;
        let mut out = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        out.reverse();
        Ok(out)
    }

    /// All eligible messages, any room, with id greater than `after_id` —
    /// used by bulk reindex.
    pub fn list_messages_after_for_reindex(&self, after_id: i64, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, external_event_id, room_id, sender_id, content, reply_to_message_id,
                    timestamp, message_type, media_url
             FROM messages
             WHERE id > ?1 AND content IS NOT NULL AND trim(content) != ''
             ORDER BY id
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![after_id, limit as i64], row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn search_messages_keyword(&self, query: &str, limit: usize) -> Result<Vec<(MessageId, f64)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT rowid, bm25(messages_fts) AS rank
             FROM messages_fts
             WHERE messages_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![query, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
        })?;
        let raw: Vec<(i64, f64)> = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        // bm25() is negative and unbounded; normalise to [0,1] by dividing by batch max magnitude.
        let max_abs = raw.iter().map(|(_, r)| r.abs()).fold(0.0f64, f64::max);
        Ok(raw
            .into_iter()
            .map(|(id, rank)| {
                let score = if max_abs > 0.0 { rank.abs() / max_abs } else { 0.0 };
                (MessageId(id), score)
            })
            .collect())
    }
}

pub struct NewMessage {
    pub external_event_id: String,
    pub room_id: Option<RoomId>,
    pub sender_id: Option<PersonId>,
    pub content: Option<String>,
    pub reply_to_message_id: Option<MessageId>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message_type: MessageType,
    pub media_url: Option<String>,
}

fn sync_message_fts(db: &rusqlite::Connection, id: MessageId, content: &str) -> rusqlite::Result<()> {
    db.execute(
        "INSERT INTO messages_fts(messages_fts, rowid, content) VALUES('delete', ?1, ?2)",
        rusqlite::params![id.0, content],
    )
    .ok();
    db.execute(
        "INSERT INTO messages_fts(rowid, content) VALUES (?1, ?2)",
        rusqlite::params![id.0, content],
    )?;
    Ok(())
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let ts: String = row.get(6)?;
    let mt: String = row.get(7)?;
    Ok(Message {
        id: MessageId(row.get(0)?),
        external_event_id: row.get(1)?,
        room_id: row.get::<_, Option<i64>>(2)?.map(RoomId),
        sender_id: row.get::<_, Option<i64>>(3)?.map(PersonId),
        content: row.get(4)?,
        reply_to_message_id: row.get::<_, Option<i64>>(5)?.map(MessageId),
        timestamp: chrono::DateTime::parse_from_rfc3339(&ts)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        message_type: MessageType::from_str(&mt).unwrap_or(MessageType::Text),
        media_url: row.get(8)?,
    })
}
