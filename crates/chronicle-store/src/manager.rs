use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::Result;

/// Thread-safe handle onto the archive's SQLite connection.
///
/// Every long-running job (analysis, topic classification, reindex) opens
/// its own `ArchiveStore` over the same file so a job never blocks request
/// handling on the same mutex (§5: each long job owns its own database
/// handle for the duration of the run).
pub struct ArchiveStore {
    pub(crate) db: Mutex<Connection>,
}

impl ArchiveStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }
}
