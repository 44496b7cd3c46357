use rusqlite::{Connection, Result};

/// Initialise the archive schema. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_people_table(conn)?;
    create_rooms_table(conn)?;
    create_messages_table(conn)?;
    create_room_members_table(conn)?;
    create_analysis_runs_table(conn)?;
    create_discussions_table(conn)?;
    create_discussion_messages_table(conn)?;
    create_topics_table(conn)?;
    create_discussion_topics_table(conn)?;
    create_embeddings_table(conn)?;
    create_fts_indices(conn)?;
    Ok(())
}

fn create_people_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS people (
            id                         INTEGER PRIMARY KEY AUTOINCREMENT,
            external_user_id           TEXT NOT NULL UNIQUE,
            display_name               TEXT,
            avatar_url                 TEXT,
            external_profile_url       TEXT,
            external_name              TEXT,
            notes                      TEXT,
            ai_summary                 TEXT,
            ai_summary_generated_at    TEXT,
            ai_summary_message_count   INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn create_rooms_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS rooms (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            external_room_id TEXT NOT NULL UNIQUE,
            name             TEXT,
            is_group         INTEGER NOT NULL DEFAULT 0,
            display_order    INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn create_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            external_event_id    TEXT NOT NULL UNIQUE,
            room_id              INTEGER REFERENCES rooms(id),
            sender_id            INTEGER REFERENCES people(id),
            content              TEXT,
            reply_to_message_id  INTEGER REFERENCES messages(id),
            timestamp            TEXT NOT NULL,
            message_type         TEXT NOT NULL DEFAULT 'text',
            media_url            TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_messages_room_order
            ON messages(room_id, timestamp, id);",
    )
}

fn create_room_members_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS room_members (
            room_id        INTEGER NOT NULL REFERENCES rooms(id),
            person_id      INTEGER NOT NULL REFERENCES people(id),
            first_seen_at  TEXT NOT NULL,
            last_seen_at   TEXT NOT NULL,
            message_count  INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (room_id, person_id)
        );",
    )
}

fn create_analysis_runs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS analysis_runs (
            id                         INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id                    INTEGER NOT NULL REFERENCES rooms(id),
            started_at                 TEXT NOT NULL,
            completed_at               TEXT,
            status                     TEXT NOT NULL DEFAULT 'running',
            windows_processed          INTEGER NOT NULL DEFAULT 0,
            total_windows              INTEGER,
            discussions_found          INTEGER NOT NULL DEFAULT 0,
            tokens_used                INTEGER NOT NULL DEFAULT 0,
            error                      TEXT,
            mode                       TEXT NOT NULL DEFAULT 'full',
            start_message_id           INTEGER REFERENCES messages(id),
            end_message_id             INTEGER REFERENCES messages(id),
            context_start_message_id   INTEGER REFERENCES messages(id),
            new_messages_count         INTEGER NOT NULL DEFAULT 0,
            context_messages_count     INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_runs_room_status
            ON analysis_runs(room_id, status);",
    )
}

fn create_discussions_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS discussions (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id           INTEGER NOT NULL REFERENCES rooms(id),
            analysis_run_id   INTEGER REFERENCES analysis_runs(id),
            title             TEXT NOT NULL,
            summary           TEXT,
            started_at        TEXT NOT NULL,
            ended_at          TEXT NOT NULL,
            message_count     INTEGER NOT NULL DEFAULT 0,
            participant_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_discussions_room
            ON discussions(room_id, ended_at);",
    )
}

fn create_discussion_messages_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS discussion_messages (
            discussion_id INTEGER NOT NULL REFERENCES discussions(id),
            message_id    INTEGER NOT NULL REFERENCES messages(id),
            confidence    REAL NOT NULL DEFAULT 1.0,
            PRIMARY KEY (discussion_id, message_id)
        );
        CREATE INDEX IF NOT EXISTS idx_discussion_messages_message
            ON discussion_messages(message_id);",
    )
}

fn create_topics_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS topics (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            room_id     INTEGER NOT NULL REFERENCES rooms(id),
            name        TEXT NOT NULL,
            description TEXT,
            color       TEXT NOT NULL DEFAULT '#999999',
            UNIQUE(room_id, name COLLATE NOCASE)
        );",
    )
}

fn create_discussion_topics_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS discussion_topics (
            discussion_id INTEGER NOT NULL REFERENCES discussions(id),
            topic_id      INTEGER NOT NULL REFERENCES topics(id),
            PRIMARY KEY (discussion_id, topic_id)
        );",
    )
}

fn create_embeddings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS embeddings (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type   TEXT NOT NULL,
            entity_id     INTEGER NOT NULL,
            content_hash  TEXT NOT NULL,
            vector        BLOB NOT NULL,
            created_at    TEXT NOT NULL,
            UNIQUE(entity_type, entity_id)
        );
        CREATE INDEX IF NOT EXISTS idx_embeddings_kind
            ON embeddings(entity_type);",
    )
}

/// FTS5 external-content tables for keyword scoring (§4.8). `content=''`
/// means rows are not duplicated from the base table — synced manually on
/// every write via a delete+insert pair.
fn create_fts_indices(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts
            USING fts5(content, content='messages', content_rowid='id');
        CREATE VIRTUAL TABLE IF NOT EXISTS discussions_fts
            USING fts5(title, summary, content='discussions', content_rowid='id');
        CREATE VIRTUAL TABLE IF NOT EXISTS people_fts
            USING fts5(display_name, ai_summary, content='people', content_rowid='id');
        CREATE VIRTUAL TABLE IF NOT EXISTS topics_fts
            USING fts5(name, description, content='topics', content_rowid='id');",
    )
}
