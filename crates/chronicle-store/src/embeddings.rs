use std::str::FromStr;

use chronicle_core::types::EntityKind;

use crate::error::Result;
use crate::manager::ArchiveStore;
use crate::types::Embedding;
use crate::vector;

impl ArchiveStore {
    /// Upsert by `(entity_type, entity_id)`. Overwrites any prior embedding
    /// for the same entity — callers decide whether to skip via
    /// [`content_hash_for`] before calling this.
    pub fn upsert_embedding(
        &self,
        entity_type: EntityKind,
        entity_id: i64,
        content_hash: &str,
        vec: &[f32],
    ) -> Result<()> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        let blob = vector::encode(vec);
        db.execute(
            "INSERT INTO embeddings (entity_type, entity_id, content_hash, vector, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                vector = excluded.vector,
                created_at = excluded.created_at",
            rusqlite::params![entity_type.to_string(), entity_id, content_hash, blob, now],
        )?;
        Ok(())
    }

    /// The stored content hash for an entity, if it has been embedded
    /// before — callers skip re-embedding when this matches the current
    /// content hash.
    pub fn content_hash_for(&self, entity_type: EntityKind, entity_id: i64) -> Result<Option<String>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT content_hash FROM embeddings WHERE entity_type = ?1 AND entity_id = ?2",
            rusqlite::params![entity_type.to_string(), entity_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    pub fn get_embedding(&self, entity_type: EntityKind, entity_id: i64) -> Result<Option<Embedding>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT id, entity_type, entity_id, content_hash, vector, created_at
             FROM embeddings WHERE entity_type = ?1 AND entity_id = ?2",
            rusqlite::params![entity_type.to_string(), entity_id],
            row_to_embedding,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other.into()),
        })
    }

    /// Brute-force kNN: decode every stored vector of `entity_type` and score
    /// against `query`, keeping matches at or above `threshold`. There is no
    /// vector index; callers are expected to bound `limit`.
    pub fn knn_embeddings(
        &self,
        entity_type: EntityKind,
        query: &[f32],
        threshold: f64,
        limit: usize,
    ) -> Result<Vec<(i64, f64)>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT entity_id, vector FROM embeddings WHERE entity_type = ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![entity_type.to_string()], |row| {
            let entity_id: i64 = row.get(0)?;
            let blob: Vec<u8> = row.get(1)?;
            Ok((entity_id, blob))
        })?;

        let mut scored: Vec<(i64, f64)> = Vec::new();
        for row in rows {
            let (entity_id, blob) = row?;
            let candidate = vector::decode(&blob);
            let score = vector::cosine_similarity(query, &candidate);
            if score >= threshold {
                scored.push((entity_id, score));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn count_embeddings(&self, entity_type: EntityKind) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE entity_type = ?1",
            rusqlite::params![entity_type.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_embedding(row: &rusqlite::Row<'_>) -> rusqlite::Result<Embedding> {
    let kind: String = row.get(1)?;
    let blob: Vec<u8> = row.get(4)?;
    let created: String = row.get(5)?;
    Ok(Embedding {
        id: chronicle_core::types::EmbeddingId(row.get(0)?),
        entity_type: EntityKind::from_str(&kind).unwrap_or(EntityKind::Message),
        entity_id: row.get(2)?,
        content_hash: row.get(3)?,
        vector: vector::decode(&blob),
        created_at: chrono::DateTime::parse_from_rfc3339(&created)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}
