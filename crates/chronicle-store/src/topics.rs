use chronicle_core::types::{DiscussionId, RoomId, TopicId};

use crate::error::Result;
use crate::manager::ArchiveStore;
use crate::types::Topic;

/// Cycled when a new topic needs a color and none was supplied.
pub const TOPIC_COLORS: [&str; 10] = [
    "#6366f1", // Indigo
    "#f43f5e", // Rose
    "#f59e0b", // Amber
    "#10b981", // Emerald
    "#0ea5e9", // Sky
    "#8b5cf6", // Violet
    "#14b8a6", // Teal
    "#f97316", // Orange
    "#ec4899", // Pink
    "#06b6d4", // Cyan
];

impl ArchiveStore {
    pub fn list_topics(&self, room_id: RoomId) -> Result<Vec<Topic>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, room_id, name, description, color FROM topics WHERE room_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(rusqlite::params![room_id.0], row_to_topic)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Create or update a topic by case-insensitive `(room_id, name)`. The
    /// color is assigned from [`TOPIC_COLORS`], cycling by the number of
    /// topics already present in the room, when a new row is created.
    pub fn upsert_topic(&self, room_id: RoomId, name: &str, description: Option<&str>) -> Result<TopicId> {
        let db = self.db.lock().unwrap();
        let existing: Option<i64> = db
            .query_row(
                "SELECT id FROM topics WHERE room_id = ?1 AND name = ?2 COLLATE NOCASE",
                rusqlite::params![room_id.0, name],
                |row| row.get(0),
            )
            .ok();

        if let Some(id) = existing {
            db.execute(
                "UPDATE topics SET description = ?1 WHERE id = ?2",
                rusqlite::params![description, id],
            )?;
            sync_topic_fts(&db, TopicId(id), name, description)?;
            return Ok(TopicId(id));
        }

        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM topics WHERE room_id = ?1",
            rusqlite::params![room_id.0],
            |row| row.get(0),
        )?;
        let color = TOPIC_COLORS[(count as usize) % TOPIC_COLORS.len()];
        db.execute(
            "INSERT INTO topics (room_id, name, description, color) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![room_id.0, name, description, color],
        )?;
        let id = TopicId(db.last_insert_rowid());
        sync_topic_fts(&db, id, name, description)?;
        Ok(id)
    }

    /// Replace all topic links for `discussion_id` with the given topic set,
    /// resolving each name via [`upsert_topic`] first. Callers clear the full
    /// `discussion_topics` table once per classification run, so this only
    /// needs to insert.
    pub fn link_discussion_topics(&self, discussion_id: DiscussionId, topic_ids: &[TopicId]) -> Result<()> {
        let db = self.db.lock().unwrap();
        for topic_id in topic_ids {
            db.execute(
                "INSERT INTO discussion_topics (discussion_id, topic_id)
                 VALUES (?1, ?2)
                 ON CONFLICT(discussion_id, topic_id) DO NOTHING",
                rusqlite::params![discussion_id.0, topic_id.0],
            )?;
        }
        Ok(())
    }

    pub fn clear_discussion_topic_links_for_room(&self, room_id: RoomId) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "DELETE FROM discussion_topics
             WHERE discussion_id IN (SELECT id FROM discussions WHERE room_id = ?1)",
            rusqlite::params![room_id.0],
        )?;
        Ok(())
    }

    /// Delete topics left with no linked discussions after a reclassification.
    pub fn delete_orphan_topics(&self, room_id: RoomId) -> Result<u64> {
        let db = self.db.lock().unwrap();
        let orphan_ids: Vec<i64> = {
            let mut stmt = db.prepare(
                "SELECT id FROM topics
                 WHERE room_id = ?1
                   AND id NOT IN (SELECT topic_id FROM discussion_topics)",
            )?;
            let rows = stmt.query_map(rusqlite::params![room_id.0], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        for id in &orphan_ids {
            db.execute("DELETE FROM topics WHERE id = ?1", rusqlite::params![id])?;
            db.execute(
                "INSERT INTO topics_fts(topics_fts, rowid, name, description) VALUES('delete', ?1, '', '')",
                rusqlite::params![id],
            )
            .ok();
        }
        Ok(orphan_ids.len() as u64)
    }

    pub fn get_topic(&self, id: TopicId) -> Result<Option<Topic>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, room_id, name, description, color FROM topics WHERE id = ?1",
            rusqlite::params![id.0],
            row_to_topic,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    /// All topics with id greater than `after_id`, ascending — used by bulk
    /// reindex.
    pub fn list_topics_after(&self, after_id: i64, limit: usize) -> Result<Vec<Topic>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, room_id, name, description, color FROM topics WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![after_id, limit as i64], row_to_topic)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn search_topics_keyword(&self, query: &str, limit: usize) -> Result<Vec<(TopicId, f64)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT rowid, bm25(topics_fts) AS rank
             FROM topics_fts
             WHERE topics_fts MATCH ?1
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
                (TopicId(id), score)
            })
            .collect())
    }
}

fn sync_topic_fts(
    db: &rusqlite::Connection,
    id: TopicId,
    name: &str,
    description: Option<&str>,
) -> rusqlite::Result<()> {
    db.execute(
        "INSERT INTO topics_fts(topics_fts, rowid, name, description) VALUES('delete', ?1, ?2, ?3)",
        rusqlite::params![id.0, name, description],
    )
    .ok();
    db.execute(
        "INSERT INTO topics_fts(rowid, name, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.0, name, description],
    )?;
    Ok(())
}

fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: TopicId(row.get(0)?),
        room_id: RoomId(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_cycle_wraps_past_ten_topics() {
        for i in 0..25usize {
            let _ = TOPIC_COLORS[i % TOPIC_COLORS.len()];
        }
    }
}
