use crate::db::{opt_uuid_column, uuid_column, Database};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Identity carried by a session token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Account that logged in
    pub user_id: Uuid,
    /// Dependent the guardian is currently acting for, if any
    pub acting_user_id: Option<Uuid>,
}

impl SessionIdentity {
    /// The account requests are performed as
    pub fn effective_user_id(&self) -> Uuid {
        self.acting_user_id.unwrap_or(self.user_id)
    }
}

/// Database-backed session manager for persistent authentication
///
/// Manages user sessions with token-based authentication, including:
/// - Session creation with UUID v4 tokens
/// - Session validation with expiry checking
/// - Acting on behalf of a dependent account
/// - Session deletion (logout)
/// - Automatic cleanup of expired sessions
#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    ttl: Duration,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(db: Database, ttl_days: i64) -> Self {
        Self {
            db,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Create a new session for a user and return its token
    pub fn create_session(&self, user_id: Uuid) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + self.ttl;

        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![token, user_id.to_string(), created_at, expires_at],
        )
        .context("Failed to create session")?;

        tracing::info!("Created session for user {}", user_id);
        Ok(token)
    }

    /// Validate a session token and return who it belongs to
    ///
    /// Expired sessions are deleted on sight.
    pub fn validate_session(&self, token: &str) -> Result<SessionIdentity> {
        let conn = self.db.connection()?;

        let (user_id, acting_user_id, expires_at): (Uuid, Option<Uuid>, DateTime<Utc>) = conn
            .query_row(
                "SELECT user_id, acting_user_id, expires_at FROM sessions WHERE token = ?1",
                rusqlite::params![token],
                |row| Ok((uuid_column(row, 0)?, opt_uuid_column(row, 1)?, row.get(2)?)),
            )
            .context("Session not found")?;
        drop(conn);

        if Utc::now() > expires_at {
            self.delete_session(token)?;
            anyhow::bail!("Session has expired");
        }

        Ok(SessionIdentity {
            user_id,
            acting_user_id,
        })
    }

    /// Act as another account (a dependent) within this session; `None` switches back
    pub fn set_acting_user(&self, token: &str, acting_user_id: Option<Uuid>) -> Result<()> {
        let conn = self.db.connection()?;
        let rows = conn
            .execute(
                "UPDATE sessions SET acting_user_id = ?1 WHERE token = ?2",
                rusqlite::params![acting_user_id.map(|id| id.to_string()), token],
            )
            .context("Failed to switch session account")?;
        if rows == 0 {
            anyhow::bail!("Session not found");
        }
        Ok(())
    }

    /// Delete a session (logout)
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.db.connection()?;
        let rows_affected = conn
            .execute(
                "DELETE FROM sessions WHERE token = ?1",
                rusqlite::params![token],
            )
            .context("Failed to delete session")?;

        if rows_affected > 0 {
            tracing::info!("Deleted session");
        }

        Ok(())
    }

    /// Remove every session of a user (after a password change)
    pub fn delete_user_sessions(&self, user_id: &Uuid) -> Result<usize> {
        let conn = self.db.connection()?;
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE user_id = ?1",
                [user_id.to_string()],
            )
            .context("Failed to delete user sessions")?;
        Ok(rows)
    }

    /// Clean up expired sessions from the database
    ///
    /// Returns the number of sessions deleted.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.db.connection()?;

        let rows_affected = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                rusqlite::params![Utc::now()],
            )
            .context("Failed to cleanup expired sessions")?;

        if rows_affected > 0 {
            tracing::info!("Cleaned up {} expired sessions", rows_affected);
        }

        Ok(rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440099";
    const CHILD_ID: &str = "550e8400-e29b-41d4-a716-446655440100";

    fn setup_test_db() -> Database {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize database");

        let conn = db.connection().expect("Failed to get connection");
        for (id, email) in [(USER_ID, "parent@dojo.test"), (CHILD_ID, "kid@dojo.test")] {
            conn.execute(
                "INSERT INTO users (id, username, email, first_name, last_name, date_joined)
                 VALUES (?1, ?2, ?2, 'Test', 'User', ?3)",
                rusqlite::params![id, email, Utc::now()],
            )
            .expect("Failed to create test user");
        }

        db
    }

    fn user_id() -> Uuid {
        Uuid::parse_str(USER_ID).unwrap()
    }

    #[test]
    fn test_create_and_validate_session() {
        let manager = SessionManager::new(setup_test_db(), 30);

        let token = manager.create_session(user_id()).expect("Failed to create session");
        assert!(Uuid::parse_str(&token).is_ok(), "Token should be a valid UUID");

        let identity = manager.validate_session(&token).expect("Failed to validate session");
        assert_eq!(identity.user_id, user_id());
        assert_eq!(identity.effective_user_id(), user_id());
    }

    #[test]
    fn test_validate_invalid_session() {
        let manager = SessionManager::new(setup_test_db(), 30);
        assert!(manager.validate_session("invalid-token").is_err());
    }

    #[test]
    fn test_acting_user_switch_and_back() {
        let manager = SessionManager::new(setup_test_db(), 30);
        let child = Uuid::parse_str(CHILD_ID).unwrap();
        let token = manager.create_session(user_id()).unwrap();

        manager.set_acting_user(&token, Some(child)).unwrap();
        let identity = manager.validate_session(&token).unwrap();
        assert_eq!(identity.user_id, user_id());
        assert_eq!(identity.effective_user_id(), child);

        manager.set_acting_user(&token, None).unwrap();
        assert_eq!(manager.validate_session(&token).unwrap().effective_user_id(), user_id());
    }

    #[test]
    fn test_delete_session() {
        let manager = SessionManager::new(setup_test_db(), 30);
        let token = manager.create_session(user_id()).unwrap();
        manager.delete_session(&token).expect("Failed to delete session");
        assert!(manager.validate_session(&token).is_err(), "Session should be invalid after deletion");
    }

    #[test]
    fn test_cleanup_expired_sessions() {
        let db = setup_test_db();
        let manager = SessionManager::new(db.clone(), 30);
        let token = manager.create_session(user_id()).unwrap();

        let conn = db.connection().expect("Failed to get connection");
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE token = ?2",
            rusqlite::params![Utc::now() - Duration::days(1), token],
        )
        .expect("Failed to expire session");
        drop(conn);

        let cleaned = manager.cleanup_expired_sessions().expect("Failed to cleanup");
        assert_eq!(cleaned, 1);
        assert!(manager.validate_session(&token).is_err());
    }

    #[test]
    fn test_delete_user_sessions() {
        let manager = SessionManager::new(setup_test_db(), 30);
        let t1 = manager.create_session(user_id()).unwrap();
        let t2 = manager.create_session(user_id()).unwrap();
        assert_ne!(t1, t2);
        assert_eq!(manager.delete_user_sessions(&user_id()).unwrap(), 2);
    }
}
