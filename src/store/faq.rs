use rusqlite::OptionalExtension;
use std::path::PathBuf;

use super::open_db;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FaqEntry {
    pub(crate) key: String,
    pub(crate) contents: String,
    pub(crate) updated_at: i64,
}

/// FAQ entries keyed by an exact string. Callers normalize case.
pub(crate) struct FaqStore {
    db: PathBuf,
}

impl FaqStore {
    pub(crate) fn new(db: PathBuf) -> Self {
        Self { db }
    }

    pub(crate) fn get(&self, key: &str) -> Result<Option<FaqEntry>, AppError> {
        let conn = open_db(&self.db)?;
        let entry = conn
            .query_row(
                "SELECT key, contents, updated_at FROM faq WHERE key = ?1",
                rusqlite::params![key],
                |row| {
                    Ok(FaqEntry {
                        key: row.get(0)?,
                        contents: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Insert or overwrite. Last write wins.
    pub(crate) fn set(&self, key: &str, contents: &str) -> Result<(), AppError> {
        let conn = open_db(&self.db)?;
        conn.execute(
            "INSERT INTO faq (key, contents, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET contents = excluded.contents, updated_at = excluded.updated_at",
            rusqlite::params![key, contents, crate::helpers::epoch_now()],
        )?;
        Ok(())
    }

    /// Returns whether an entry was removed.
    pub(crate) fn delete(&self, key: &str) -> Result<bool, AppError> {
        let conn = open_db(&self.db)?;
        let n = conn.execute("DELETE FROM faq WHERE key = ?1", rusqlite::params![key])?;
        Ok(n > 0)
    }

    pub(crate) fn keys(&self) -> Result<Vec<String>, AppError> {
        let conn = open_db(&self.db)?;
        let mut stmt = conn.prepare("SELECT key FROM faq ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
