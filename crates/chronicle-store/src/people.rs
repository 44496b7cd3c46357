use chrono::Utc;
use chronicle_core::types::PersonId;

use crate::error::{Result, StoreError};
use crate::manager::ArchiveStore;
use crate::types::Person;

impl ArchiveStore {
    /// Create on first sighting, identity by `external_user_id`. Idempotent:
    /// calling again for the same external id is a no-op and returns the
    /// existing row's id.
    pub fn upsert_person(&self, external_user_id: &str, display_name: Option<&str>) -> Result<PersonId> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO people (external_user_id, display_name, ai_summary_message_count)
             VALUES (?1, ?2, 0)
             ON CONFLICT(external_user_id) DO NOTHING",
            rusqlite::params![external_user_id, display_name],
        )?;
        let id: i64 = db.query_row(
            "SELECT id FROM people WHERE external_user_id = ?1",
            rusqlite::params![external_user_id],
            |row| row.get(0),
        )?;
        Ok(PersonId(id))
    }

    pub fn get_person(&self, id: PersonId) -> Result<Option<Person>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, external_user_id, display_name, avatar_url, external_profile_url,
                    external_name, notes, ai_summary, ai_summary_generated_at,
                    ai_summary_message_count
             FROM people WHERE id = ?1",
            rusqlite::params![id.0],
            row_to_person,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(StoreError::from(other)),
        })
    }

    pub fn set_notes(&self, id: PersonId, notes: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE people SET notes = ?1 WHERE id = ?2",
            rusqlite::params![notes, id.0],
        )?;
        Ok(())
    }

    /// Regenerate the AI-authored personality summary for a person.
    pub fn set_ai_summary(&self, id: PersonId, summary: &str, message_count: i64) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "UPDATE people
             SET ai_summary = ?1, ai_summary_generated_at = ?2, ai_summary_message_count = ?3
             WHERE id = ?4",
            rusqlite::params![summary, now, message_count, id.0],
        )?;
        // Sync FTS: delete old row, insert new snapshot.
        sync_people_fts(&db, id)?;
        Ok(())
    }

    /// All people with id greater than `after_id`, ascending — used by bulk
    /// reindex to page across the whole table regardless of room.
    pub fn list_people_after(&self, after_id: i64, limit: usize) -> Result<Vec<Person>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, external_user_id, display_name, avatar_url, external_profile_url,
                    external_name, notes, ai_summary, ai_summary_generated_at,
                    ai_summary_message_count
             FROM people WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![after_id, limit as i64], row_to_person)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn search_people_by_substring(&self, needle: &str, limit: usize) -> Result<Vec<(Person, f64)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, external_user_id, display_name, avatar_url, external_profile_url,
                    external_name, notes, ai_summary, ai_summary_generated_at,
                    ai_summary_message_count
             FROM people
             WHERE (display_name IS NOT NULL AND display_name LIKE ?1)
                OR (ai_summary IS NOT NULL AND ai_summary LIKE ?1)
             LIMIT ?2",
        )?;
        let pattern = format!("%{needle}%");
        let needle_lower = needle.to_lowercase();
        let rows = stmt.query_map(rusqlite::params![pattern, limit as i64], row_to_person)?;
        let mut out = Vec::new();
        for row in rows {
            let person = row?;
            let score = keyword_score(&person, &needle_lower);
            out.push((person, score));
        }
        Ok(out)
    }
}

fn keyword_score(person: &Person, needle_lower: &str) -> f64 {
    if person
        .display_name
        .as_deref()
        .map(|n| n.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
    {
        1.0
    } else if person
        .ai_summary
        .as_deref()
        .map(|s| s.to_lowercase().contains(needle_lower))
        .unwrap_or(false)
    {
        0.7
    } else {
        0.0
    }
}

fn sync_people_fts(db: &rusqlite::Connection, id: PersonId) -> rusqlite::Result<()> {
    let (display_name, ai_summary): (Option<String>, Option<String>) = db.query_row(
        "SELECT display_name, ai_summary FROM people WHERE id = ?1",
        rusqlite::params![id.0],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    db.execute(
        "INSERT INTO people_fts(people_fts, rowid, display_name, ai_summary)
         VALUES('delete', ?1, ?2, ?3)",
        rusqlite::params![id.0, display_name, ai_summary],
    )
    .ok();
    db.execute(
        "INSERT INTO people_fts(rowid, display_name, ai_summary) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.0, display_name, ai_summary],
    )?;
    Ok(())
}

fn row_to_person(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    let generated_at: Option<String> = row.get(8)?;
    Ok(Person {
        id: PersonId(row.get(0)?),
        external_user_id: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        external_profile_url: row.get(4)?,
        external_name: row.get(5)?,
        notes: row.get(6)?,
        ai_summary: row.get(7)?,
        ai_summary_generated_at: generated_at
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        ai_summary_message_count: row.get(9)?,
    })
}
