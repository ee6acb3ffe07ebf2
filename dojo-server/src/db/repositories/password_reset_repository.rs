use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::db::{uuid_column, DbPool};

/// One-time password reset tokens
pub struct PasswordResetRepository {
    pool: DbPool,
}

impl PasswordResetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Issue a token valid for `ttl`
    pub fn create(&self, user_id: &Uuid, ttl: Duration) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO password_resets (token, user_id, created_at, expires_at, used) VALUES (?1, ?2, ?3, ?4, 0)",
            rusqlite::params![token, user_id.to_string(), now, now + ttl],
        )
        .context("Failed to create password reset token")?;
        Ok(token)
    }

    /// Mark an unused, unexpired token as used and return its owner
    pub fn consume(&self, token: &str) -> Result<Option<Uuid>> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let row: Option<(Uuid, DateTime<Utc>)> = tx
            .query_row(
                "SELECT user_id, expires_at FROM password_resets WHERE token = ?1 AND used = 0",
                [token],
                |row| Ok((uuid_column(row, 0)?, row.get(1)?)),
            )
            .optional()?;

        let user_id = match row {
            Some((user_id, expires_at)) if expires_at > Utc::now() => user_id,
            _ => return Ok(None),
        };

        tx.execute("UPDATE password_resets SET used = 1 WHERE token = ?1", [token])?;
        tx.commit().context("Failed to consume password reset token")?;
        Ok(Some(user_id))
    }
}
