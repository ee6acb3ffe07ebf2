use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{AuditLog, LogStatus};

use crate::db::{code_column, opt_uuid_column, uuid_column, DbPool};

const LOG_SELECT: &str = "SELECT l.id, l.user_id,
            CASE WHEN u.id IS NULL THEN NULL ELSE TRIM(u.first_name || ' ' || u.last_name) END,
            l.action, l.timestamp, l.status
     FROM audit_logs l LEFT JOIN users u ON u.id = l.user_id";

fn map_log(row: &Row<'_>) -> rusqlite::Result<AuditLog> {
    Ok(AuditLog {
        id: uuid_column(row, 0)?,
        user_id: opt_uuid_column(row, 1)?,
        user_name: row.get(2)?,
        action: row.get(3)?,
        timestamp: row.get(4)?,
        status: code_column(row, 5, LogStatus::parse)?,
    })
}

/// Append-only audit trail
pub struct AuditLogRepository {
    pool: DbPool,
}

impl AuditLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an entry; `user_id = None` marks a system event
    pub fn create(&self, user_id: Option<&Uuid>, action: &str, status: LogStatus) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO audit_logs (id, user_id, action, timestamp, status) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                user_id.map(|id| id.to_string()),
                action,
                Utc::now(),
                status.as_str(),
            ],
        )
        .context("Failed to write audit log")?;
        Ok(())
    }

    /// Action and status of the user's most recent entry
    pub fn latest_for_user(&self, user_id: &Uuid) -> Result<Option<(String, LogStatus)>> {
        let conn = self.pool.get()?;
        let latest = conn
            .query_row(
                "SELECT action, status FROM audit_logs WHERE user_id = ?1
                 ORDER BY timestamp DESC, rowid DESC LIMIT 1",
                [user_id.to_string()],
                |row| Ok((row.get(0)?, code_column(row, 1, LogStatus::parse)?)),
            )
            .optional()?;
        Ok(latest)
    }

    /// Newest first
    pub fn list(&self, user_id: Option<&Uuid>, status: Option<LogStatus>, limit: i64) -> Result<Vec<AuditLog>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR l.user_id = ?1) AND (?2 IS NULL OR l.status = ?2)
             ORDER BY l.timestamp DESC, l.rowid DESC LIMIT ?3",
            LOG_SELECT
        ))?;
        let logs = stmt
            .query_map(
                rusqlite::params![user_id.map(|id| id.to_string()), status.map(|s| s.as_str()), limit],
                map_log,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use dojo_types::Role;

    #[test]
    fn test_latest_and_filters() {
        let db = test_db();
        let user = seed_user(&db, "a@x.io", Role::Admin);
        let repo = AuditLogRepository::new(db.pool.clone());

        assert!(repo.latest_for_user(&user).unwrap().is_none());
        repo.create(Some(&user), "Accessed /classes [GET] (Route: /classes)", LogStatus::Success).unwrap();
        repo.create(Some(&user), "Deleted in /classes/x [DELETE]", LogStatus::Failure).unwrap();
        repo.create(None, "Order expired", LogStatus::Success).unwrap();

        let (action, status) = repo.latest_for_user(&user).unwrap().unwrap();
        assert_eq!(action, "Deleted in /classes/x [DELETE]");
        assert_eq!(status, LogStatus::Failure);

        assert_eq!(repo.list(None, None, 100).unwrap().len(), 3);
        assert_eq!(repo.list(Some(&user), None, 100).unwrap().len(), 2);
        let failures = repo.list(None, Some(LogStatus::Failure), 100).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].user_name.as_deref(), Some("Test User"));

        let system = repo.list(None, Some(LogStatus::Success), 100).unwrap();
        assert!(system.iter().any(|l| l.user_id.is_none() && l.user_name.is_none()));
    }
}
