mod user_repository;
mod class_repository;
mod attendance_repository;
mod graduation_repository;
mod lesson_plan_repository;
mod ranking_repository;
mod goal_repository;
mod item_repository;
mod order_repository;
mod audit_log_repository;
mod password_reset_repository;

pub use user_repository::{NewUser, ProfileUpdate, UserRepository};
pub use class_repository::ClassRepository;
pub use attendance_repository::{AttendanceFilter, AttendanceRepository};
pub use graduation_repository::GraduationRepository;
pub use lesson_plan_repository::LessonPlanRepository;
pub use ranking_repository::RankingRepository;
pub use goal_repository::GoalRepository;
pub use item_repository::ItemRepository;
pub use order_repository::{OrderRepository, EXPIRATION_REASON};
pub use audit_log_repository::AuditLogRepository;
pub use password_reset_repository::PasswordResetRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::db::Database;
    use dojo_types::Role;

    pub fn test_db() -> Database {
        let db = Database::in_memory().expect("Failed to create test database");
        db.initialize().expect("Failed to initialize database");
        db
    }

    /// Insert an active user named "Test User" and return its id
    pub fn seed_user(db: &Database, email: &str, role: Role) -> Uuid {
        seed_named_user(db, email, "Test", "User", role)
    }

    pub fn seed_named_user(db: &Database, email: &str, first: &str, last: &str, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let conn = db.connection().expect("Failed to get connection");
        conn.execute(
            "INSERT INTO users (id, username, email, first_name, last_name, role, status, is_active, date_joined)
             VALUES (?1, ?2, ?2, ?3, ?4, ?5, 'ACTIVE', 1, ?6)",
            rusqlite::params![id.to_string(), email, first, last, role.as_str(), Utc::now()],
        )
        .expect("Failed to create test user");
        id
    }

    /// Insert an active class taught by `instructor` and return its id
    pub fn seed_class(db: &Database, name: &str, instructor: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        let conn = db.connection().expect("Failed to get connection");
        conn.execute(
            "INSERT INTO classes (id, name, description, instructor_id, active, created_at)
             VALUES (?1, ?2, '', ?3, 1, ?4)",
            rusqlite::params![id.to_string(), name, instructor.to_string(), Utc::now()],
        )
        .expect("Failed to create test class");
        id
    }
}
