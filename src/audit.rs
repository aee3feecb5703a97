use serde::Serialize;
use std::path::Path;
use tracing::error;

use crate::error::AppError;
use crate::store::open_db;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AuditEntry {
    pub(crate) action: String,
    pub(crate) target_id: String,
    pub(crate) detail: String,
    pub(crate) timestamp: i64,
}

/// Append to the audit trail. Best-effort: failures are logged only.
pub(crate) fn log_action(db: &Path, action: &str, target_id: &str, detail: &str) {
    let conn = match open_db(db) {
        Ok(conn) => conn,
        Err(e) => {
            error!("Audit log unavailable: {e}");
            return;
        }
    };
    let ts = crate::helpers::epoch_now();
    if let Err(e) = conn.execute(
        "INSERT INTO audit_log (action, target_id, detail, timestamp) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![action, target_id, detail, ts],
    ) {
        error!("Audit log write failed: {e}");
    }
}

/// Newest entries first.
pub(crate) fn recent_actions(db: &Path, limit: usize) -> Result<Vec<AuditEntry>, AppError> {
    let conn = open_db(db)?;
    let mut stmt = conn.prepare(
        "SELECT action, target_id, detail, timestamp FROM audit_log ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![limit as i64], |row| {
            Ok(AuditEntry {
                action: row.get(0)?,
                target_id: row.get(1)?,
                detail: row.get(2)?,
                timestamp: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_action_and_retrieve() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("bot.db");
        log_action(&db, "denied", "100", "#aql");
        let actions = recent_actions(&db, 10).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action, "denied");
        assert_eq!(actions[0].target_id, "100");
        assert_eq!(actions[0].detail, "#aql");
        assert!(actions[0].timestamp > 0);
    }

    #[test]
    fn test_recent_actions_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("bot.db");
        log_action(&db, "first", "", "");
        log_action(&db, "second", "", "");
        let actions = recent_actions(&db, 10).unwrap();
        assert_eq!(actions[0].action, "second");
        assert_eq!(actions[1].action, "first");
    }

    #[test]
    fn test_recent_actions_limit() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("bot.db");
        for i in 0..5 {
            log_action(&db, &format!("a{i}"), "", "");
        }
        assert_eq!(recent_actions(&db, 3).unwrap().len(), 3);
    }

    #[test]
    fn test_log_action_unwritable_path_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        log_action(&blocker.join("bot.db"), "x", "", "");
    }
}
