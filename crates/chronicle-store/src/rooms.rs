use chronicle_core::types::{PersonId, RoomId};

use crate::error::Result;
use crate::manager::ArchiveStore;
use crate::types::Room;

impl ArchiveStore {
    /// Create on first sighting, identity by `external_room_id`.
    pub fn upsert_room(&self, external_room_id: &str, name: Option<&str>, is_group: bool) -> Result<RoomId> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO rooms (external_room_id, name, is_group, display_order)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(external_room_id) DO NOTHING",
            rusqlite::params![external_room_id, name, is_group],
        )?;
        let id: i64 = db.query_row(
            "SELECT id FROM rooms WHERE external_room_id = ?1",
            rusqlite::params![external_room_id],
            |row| row.get(0),
        )?;
        Ok(RoomId(id))
    }

    pub fn get_room(&self, id: RoomId) -> Result<Option<Room>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, external_room_id, name, is_group, display_order FROM rooms WHERE id = ?1",
            rusqlite::params![id.0],
            row_to_room,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    /// Bump `(first_seen_at, last_seen_at, message_count)` for a `(room, person)`
    /// pair, creating the row on first sighting. Maintained incrementally on ingest.
    pub fn touch_room_member(
        &self,
        room_id: RoomId,
        person_id: PersonId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let at_str = at.to_rfc3339();
        db.execute(
            "INSERT INTO room_members (room_id, person_id, first_seen_at, last_seen_at, message_count)
             VALUES (?1, ?2, ?3, ?3, 1)
             ON CONFLICT(room_id, person_id) DO UPDATE SET
                first_seen_at = MIN(first_seen_at, excluded.first_seen_at),
                last_seen_at  = MAX(last_seen_at, excluded.last_seen_at),
                message_count = message_count + 1",
            rusqlite::params![room_id.0, person_id.0, at_str],
        )?;
        Ok(())
    }
}

fn row_to_room(row: &rusqlite::Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: RoomId(row.get(0)?),
        external_room_id: row.get(1)?,
        name: row.get(2)?,
        is_group: row.get::<_, i64>(3)? != 0,
        display_order: row.get(4)?,
    })
}
