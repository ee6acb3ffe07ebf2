use anyhow::{Context, Result};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::path::Path;
use std::time::Duration;

use super::schema::{DEMO_DATA, SCHEMA};
use crate::password::hash_password;

/// SQLite in-memory database identifier
const MEMORY_DB_PATH: &str = ":memory:";

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Database wrapper with connection pooling support
#[derive(Clone)]
pub struct Database {
    pub pool: DbPool,
}

impl Database {
    /// Create a new database connection pool
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager = Self::create_connection_manager(path)?;
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .context("Failed to create database connection pool")?;
        Ok(Self { pool })
    }

    /// Create appropriate connection manager based on path
    ///
    /// `:memory:` becomes a uniquely named shared-cache database so that
    /// every pooled connection sees the same data.
    fn create_connection_manager<P: AsRef<Path>>(path: P) -> Result<SqliteConnectionManager> {
        let path_str = path.as_ref().to_string_lossy();
        let trimmed_path = path_str.trim();

        let manager = if trimmed_path.eq_ignore_ascii_case(MEMORY_DB_PATH) {
            let uri = format!("file:dojo-{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
            SqliteConnectionManager::file(uri).with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
        } else {
            SqliteConnectionManager::file(path)
        };

        Ok(manager.with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.busy_timeout(Duration::from_secs(5))
        }))
    }

    /// Create an in-memory database pool (useful for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_DB_PATH)
    }

    /// Initialize the database schema
    pub fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(())
    }

    /// Seed the database with demo accounts, classes and items.
    ///
    /// Every demo account uses the password `dojo123`.
    pub fn seed_demo_data(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(DEMO_DATA)
            .context("Failed to seed demo data")?;

        let hash = hash_password("dojo123");
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE password_hash IS NULL AND responsible_id IS NULL AND id LIKE '00000000-0000-4000-8000-%'",
            [hash],
        )
        .context("Failed to set demo passwords")?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool
            .get()
            .context("Failed to get database connection from pool")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_creation() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("Failed to get connection");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .expect("Failed to prepare statement");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("Failed to query tables")
            .collect::<Result<Vec<_>, _>>()
            .expect("Failed to collect tables");

        for table in [
            "users",
            "sessions",
            "classes",
            "enrollments",
            "attendance_requests",
            "graduations",
            "graduation_date_changes",
            "lesson_plans",
            "lesson_plan_items",
            "rankings",
            "ranking_positions",
            "goals",
            "items",
            "orders",
            "audit_logs",
            "password_resets",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_pooled_connections_share_memory_database() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let first = db.connection().expect("first connection");
        let second = db.connection().expect("second connection");
        first
            .execute(
                "INSERT INTO items (id, name, kind, price_cents, stock) VALUES ('i1', 'Kimono', 'KIMONO', 35000, 3)",
                [],
            )
            .expect("insert");
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_separate_memory_databases_are_isolated() {
        let a = Database::in_memory().expect("db a");
        a.initialize().expect("init a");
        a.seed_demo_data().expect("seed a");

        let b = Database::in_memory().expect("db b");
        b.initialize().expect("init b");

        let conn = b.connection().expect("conn");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_seed_demo_data_sets_passwords() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");
        db.seed_demo_data().expect("Failed to seed");
        // Seeding twice is harmless
        db.seed_demo_data().expect("Failed to re-seed");

        let conn = db.connection().expect("conn");
        let missing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE password_hash IS NULL AND responsible_id IS NULL",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(missing, 0);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("first");
        db.initialize().expect("second");
    }

    #[test]
    fn test_sessions_table_tracks_acting_user() {
        let db = Database::in_memory().expect("Failed to create database");
        db.initialize().expect("Failed to initialize schema");

        let conn = db.connection().expect("conn");
        let mut stmt = conn.prepare("PRAGMA table_info(sessions)").expect("pragma");
        let columns: Vec<String> = stmt
            .query_map([], |row| row.get(1))
            .expect("columns")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect");
        assert!(columns.contains(&"acting_user_id".to_string()));
    }
}
