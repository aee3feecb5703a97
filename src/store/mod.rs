pub(crate) mod faq;
pub(crate) mod json;

pub(crate) use faq::FaqStore;
pub(crate) use json::JsonStore;

use rusqlite::Connection;
use std::path::Path;

use crate::error::AppError;

/// Open the bot database, creating the schema on first use.
pub(crate) fn open_db(path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS faq (
            key TEXT PRIMARY KEY,
            contents TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY,
            action TEXT NOT NULL,
            target_id TEXT NOT NULL DEFAULT '',
            detail TEXT NOT NULL DEFAULT '',
            timestamp INTEGER NOT NULL
        );",
    )?;
    Ok(conn)
}
