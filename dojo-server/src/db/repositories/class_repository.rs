use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{ClassRequest, Enrollment, ReviewStatus, TrainingClass};

use crate::db::{code_column, opt_uuid_column, uuid_column, DbPool};

const CLASS_SELECT: &str = "SELECT c.id, c.name, c.description, c.instructor_id,
            TRIM(u.first_name || ' ' || u.last_name), c.active, c.created_at
     FROM classes c LEFT JOIN users u ON u.id = c.instructor_id";

const ENROLLMENT_SELECT: &str = "SELECT e.id, e.class_id, c.name, e.student_id,
            TRIM(u.first_name || ' ' || u.last_name), e.status, e.requested_at, e.approved_at
     FROM enrollments e
     JOIN classes c ON c.id = e.class_id
     JOIN users u ON u.id = e.student_id";

fn map_class(row: &Row<'_>) -> rusqlite::Result<TrainingClass> {
    Ok(TrainingClass {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        instructor_id: opt_uuid_column(row, 3)?,
        instructor_name: row.get(4)?,
        active: row.get::<_, i32>(5)? == 1,
        created_at: row.get(6)?,
    })
}

fn map_enrollment(row: &Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: uuid_column(row, 0)?,
        class_id: uuid_column(row, 1)?,
        class_name: row.get(2)?,
        student_id: uuid_column(row, 3)?,
        student_name: row.get(4)?,
        status: code_column(row, 5, ReviewStatus::parse)?,
        requested_at: row.get(6)?,
        approved_at: row.get(7)?,
    })
}

/// Classes (training groups) and the enrollments into them
pub struct ClassRepository {
    pool: DbPool,
}

impl ClassRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, req: &ClassRequest, instructor_id: Uuid) -> Result<TrainingClass> {
        let id = Uuid::new_v4();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO classes (id, name, description, instructor_id, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.to_string(),
                    req.name.trim(),
                    req.description.trim(),
                    instructor_id.to_string(),
                    req.active,
                    Utc::now(),
                ],
            )
            .context("Failed to create class")?;
        }
        self.get_by_id(&id)?.context("Class vanished right after insert")
    }

    pub fn update(&self, class_id: &Uuid, req: &ClassRequest, instructor_id: Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE classes SET name = ?1, description = ?2, active = ?3, instructor_id = ?4 WHERE id = ?5",
                rusqlite::params![
                    req.name.trim(),
                    req.description.trim(),
                    req.active,
                    instructor_id.to_string(),
                    class_id.to_string(),
                ],
            )
            .context("Failed to update class")?;
        Ok(rows > 0)
    }

    pub fn delete(&self, class_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM classes WHERE id = ?1", [class_id.to_string()])
            .context("Failed to delete class")?;
        Ok(rows > 0)
    }

    pub fn get_by_id(&self, class_id: &Uuid) -> Result<Option<TrainingClass>> {
        let conn = self.pool.get()?;
        let class = conn
            .query_row(
                &format!("{} WHERE c.id = ?1", CLASS_SELECT),
                [class_id.to_string()],
                map_class,
            )
            .optional()?;
        Ok(class)
    }

    /// All classes ordered by name; `active_only` hides inactive ones
    pub fn list(&self, active_only: bool) -> Result<Vec<TrainingClass>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 = 0 OR c.active = 1) ORDER BY c.name",
            CLASS_SELECT
        ))?;
        let classes = stmt
            .query_map([active_only], map_class)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(classes)
    }

    /// Record a pending enrollment request
    pub fn request_enrollment(&self, class_id: &Uuid, student_id: &Uuid) -> Result<Enrollment> {
        let id = Uuid::new_v4();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO enrollments (id, class_id, student_id, status, requested_at)
                 VALUES (?1, ?2, ?3, 'PENDING', ?4)",
                rusqlite::params![
                    id.to_string(),
                    class_id.to_string(),
                    student_id.to_string(),
                    Utc::now(),
                ],
            )
            .context("Failed to request enrollment")?;
        }
        self.get_enrollment(&id)?
            .context("Enrollment vanished right after insert")
    }

    pub fn get_enrollment(&self, enrollment_id: &Uuid) -> Result<Option<Enrollment>> {
        let conn = self.pool.get()?;
        let enrollment = conn
            .query_row(
                &format!("{} WHERE e.id = ?1", ENROLLMENT_SELECT),
                [enrollment_id.to_string()],
                map_enrollment,
            )
            .optional()?;
        Ok(enrollment)
    }

    /// Approve or reject a pending enrollment. Returns false if it was not pending.
    pub fn decide_enrollment(&self, enrollment_id: &Uuid, status: ReviewStatus) -> Result<bool> {
        let conn = self.pool.get()?;
        let approved_at = (status == ReviewStatus::Approved).then(Utc::now);
        let rows = conn
            .execute(
                "UPDATE enrollments SET status = ?1, approved_at = ?2
                 WHERE id = ?3 AND status = 'PENDING'",
                rusqlite::params![status.as_str(), approved_at, enrollment_id.to_string()],
            )
            .context("Failed to update enrollment")?;
        Ok(rows > 0)
    }

    pub fn enrollments_for_student(&self, student_id: &Uuid) -> Result<Vec<Enrollment>> {
        self.query_enrollments("e.student_id = ?1", &student_id.to_string())
    }

    pub fn enrollments_for_class(&self, class_id: &Uuid) -> Result<Vec<Enrollment>> {
        self.query_enrollments("e.class_id = ?1", &class_id.to_string())
    }

    pub fn enrollments_with_status(&self, status: ReviewStatus) -> Result<Vec<Enrollment>> {
        self.query_enrollments("e.status = ?1", status.as_str())
    }

    pub fn count_enrollments(&self, status: ReviewStatus) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM enrollments WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_enrollments(&self, filter: &str, value: &str) -> Result<Vec<Enrollment>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE {} ORDER BY e.requested_at DESC",
            ENROLLMENT_SELECT, filter
        ))?;
        let enrollments = stmt
            .query_map([value], map_enrollment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(enrollments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use crate::db::is_unique_violation;
    use dojo_types::Role;

    fn class_req(name: &str, active: bool) -> ClassRequest {
        ClassRequest {
            name: name.to_string(),
            description: String::new(),
            active,
            instructor_id: None,
        }
    }

    #[test]
    fn test_create_and_list_classes() {
        let db = test_db();
        let instructor = seed_user(&db, "prof@x.io", Role::Instructor);
        let repo = ClassRepository::new(db.pool.clone());

        let adults = repo.create(&class_req("Adults", true), instructor).unwrap();
        repo.create(&class_req("Archived", false), instructor).unwrap();

        assert_eq!(adults.instructor_name.as_deref(), Some("Test User"));
        assert_eq!(repo.list(false).unwrap().len(), 2);
        let active = repo.list(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Adults");
    }

    #[test]
    fn test_enrollment_is_unique_and_decided_once() {
        let db = test_db();
        let instructor = seed_user(&db, "prof@x.io", Role::Instructor);
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let repo = ClassRepository::new(db.pool.clone());
        let class = repo.create(&class_req("Kids", true), instructor).unwrap();

        let enrollment = repo.request_enrollment(&class.id, &student).unwrap();
        assert_eq!(enrollment.status, ReviewStatus::Pending);

        let dup = repo.request_enrollment(&class.id, &student).unwrap_err();
        assert!(is_unique_violation(&dup));

        assert!(repo.decide_enrollment(&enrollment.id, ReviewStatus::Approved).unwrap());
        assert!(!repo.decide_enrollment(&enrollment.id, ReviewStatus::Rejected).unwrap());

        let stored = repo.get_enrollment(&enrollment.id).unwrap().unwrap();
        assert_eq!(stored.status, ReviewStatus::Approved);
        assert!(stored.approved_at.is_some());
        assert_eq!(repo.enrollments_for_class(&class.id).unwrap().len(), 1);
        assert_eq!(repo.count_enrollments(ReviewStatus::Pending).unwrap(), 0);
    }
}
