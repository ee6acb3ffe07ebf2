use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{Belt, Graduation, GraduationDateChange, ReviewStatus};

use crate::db::{code_column, opt_uuid_column, uuid_column, DbPool};

const GRADUATION_COLUMNS: &str = "id, student_id, belt, degree, graduation_date, notified";

const DATE_CHANGE_SELECT: &str = "SELECT d.id, d.graduation_id, g.student_id, d.new_date, d.reason,
            d.status, d.rejection_reason, d.requested_at, d.processed_by, d.processed_at
     FROM graduation_date_changes d
     JOIN graduations g ON g.id = d.graduation_id";

fn map_graduation(row: &Row<'_>) -> rusqlite::Result<Graduation> {
    Ok(Graduation {
        id: uuid_column(row, 0)?,
        student_id: uuid_column(row, 1)?,
        belt: code_column(row, 2, Belt::parse)?,
        degree: row.get(3)?,
        graduation_date: row.get(4)?,
        notified: row.get::<_, i32>(5)? == 1,
    })
}

fn map_date_change(row: &Row<'_>) -> rusqlite::Result<GraduationDateChange> {
    Ok(GraduationDateChange {
        id: uuid_column(row, 0)?,
        graduation_id: uuid_column(row, 1)?,
        student_id: uuid_column(row, 2)?,
        new_date: row.get(3)?,
        reason: row.get(4)?,
        status: code_column(row, 5, ReviewStatus::parse)?,
        rejection_reason: row.get(6)?,
        requested_at: row.get(7)?,
        processed_by: opt_uuid_column(row, 8)?,
        processed_at: row.get(9)?,
    })
}

/// Belt graduations and requests to correct their dates
pub struct GraduationRepository {
    pool: DbPool,
}

impl GraduationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(
        &self,
        student_id: &Uuid,
        belt: Belt,
        degree: i32,
        graduation_date: NaiveDate,
    ) -> Result<Graduation> {
        let id = Uuid::new_v4();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO graduations (id, student_id, belt, degree, graduation_date, notified)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                rusqlite::params![
                    id.to_string(),
                    student_id.to_string(),
                    belt.as_str(),
                    degree,
                    graduation_date,
                ],
            )
            .context("Failed to create graduation")?;
        }
        self.get_by_id(&id)?
            .context("Graduation vanished right after insert")
    }

    pub fn get_by_id(&self, graduation_id: &Uuid) -> Result<Option<Graduation>> {
        let conn = self.pool.get()?;
        let graduation = conn
            .query_row(
                &format!("SELECT {} FROM graduations WHERE id = ?1", GRADUATION_COLUMNS),
                [graduation_id.to_string()],
                map_graduation,
            )
            .optional()?;
        Ok(graduation)
    }

    /// A student's graduations, newest first
    pub fn history(&self, student_id: &Uuid) -> Result<Vec<Graduation>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM graduations WHERE student_id = ?1
             ORDER BY graduation_date DESC, degree DESC",
            GRADUATION_COLUMNS
        ))?;
        let graduations = stmt
            .query_map([student_id.to_string()], map_graduation)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(graduations)
    }

    pub fn current(&self, student_id: &Uuid) -> Result<Option<Graduation>> {
        Ok(self.history(student_id)?.into_iter().next())
    }

    /// Overwrite belt and degree of an existing graduation
    pub fn update_rank(&self, graduation_id: &Uuid, belt: Belt, degree: i32) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE graduations SET belt = ?1, degree = ?2 WHERE id = ?3",
            rusqlite::params![belt.as_str(), degree, graduation_id.to_string()],
        )
        .context("Failed to update graduation")?;
        Ok(())
    }

    pub fn mark_notified(&self, student_id: &Uuid) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE graduations SET notified = 1 WHERE student_id = ?1 AND notified = 0",
                [student_id.to_string()],
            )
            .context("Failed to mark graduations notified")?;
        Ok(rows)
    }

    pub fn count_unnotified(&self, student_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM graduations WHERE student_id = ?1 AND notified = 0",
            [student_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn has_pending_date_change(&self, graduation_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM graduation_date_changes WHERE graduation_id = ?1 AND status = 'PENDING'",
            [graduation_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn request_date_change(
        &self,
        graduation_id: &Uuid,
        new_date: NaiveDate,
        reason: &str,
    ) -> Result<GraduationDateChange> {
        let id = Uuid::new_v4();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO graduation_date_changes (id, graduation_id, new_date, reason, status, requested_at)
                 VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)",
                rusqlite::params![
                    id.to_string(),
                    graduation_id.to_string(),
                    new_date,
                    reason.trim(),
                    Utc::now(),
                ],
            )
            .context("Failed to request date change")?;
        }
        self.get_date_change(&id)?
            .context("Date change vanished right after insert")
    }

    pub fn get_date_change(&self, change_id: &Uuid) -> Result<Option<GraduationDateChange>> {
        let conn = self.pool.get()?;
        let change = conn
            .query_row(
                &format!("{} WHERE d.id = ?1", DATE_CHANGE_SELECT),
                [change_id.to_string()],
                map_date_change,
            )
            .optional()?;
        Ok(change)
    }

    pub fn list_date_changes(&self, status: Option<ReviewStatus>) -> Result<Vec<GraduationDateChange>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR d.status = ?1) ORDER BY d.requested_at DESC",
            DATE_CHANGE_SELECT
        ))?;
        let changes = stmt
            .query_map([status.map(|s| s.as_str())], map_date_change)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(changes)
    }

    /// Approve or reject a pending date change; approval rewrites the
    /// graduation date in the same transaction. Returns false if the
    /// request was not pending.
    pub fn decide_date_change(
        &self,
        change_id: &Uuid,
        status: ReviewStatus,
        rejection_reason: Option<&str>,
        processed_by: &Uuid,
    ) -> Result<bool> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let pending: Option<(String, NaiveDate)> = tx
            .query_row(
                "SELECT graduation_id, new_date FROM graduation_date_changes
                 WHERE id = ?1 AND status = 'PENDING'",
                [change_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((graduation_id, new_date)) = pending else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE graduation_date_changes
             SET status = ?1, rejection_reason = ?2, processed_by = ?3, processed_at = ?4
             WHERE id = ?5",
            rusqlite::params![
                status.as_str(),
                rejection_reason,
                processed_by.to_string(),
                Utc::now(),
                change_id.to_string(),
            ],
        )?;

        if status == ReviewStatus::Approved {
            tx.execute(
                "UPDATE graduations SET graduation_date = ?1 WHERE id = ?2",
                rusqlite::params![new_date, graduation_id],
            )?;
        }

        tx.commit().context("Failed to decide date change")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_unique_violation;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use dojo_types::Role;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_history_newest_first_and_unique() {
        let db = test_db();
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let repo = GraduationRepository::new(db.pool.clone());

        repo.create(&student, Belt::White, 1, day(1, 10)).unwrap();
        repo.create(&student, Belt::Blue, 0, day(6, 1)).unwrap();
        let dup = repo.create(&student, Belt::Blue, 0, day(7, 1)).unwrap_err();
        assert!(is_unique_violation(&dup));

        let history = repo.history(&student).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(repo.current(&student).unwrap().unwrap().belt, Belt::Blue);

        assert_eq!(repo.count_unnotified(&student).unwrap(), 2);
        repo.mark_notified(&student).unwrap();
        assert_eq!(repo.count_unnotified(&student).unwrap(), 0);
    }

    #[test]
    fn test_degree_out_of_range_rejected_by_schema() {
        let db = test_db();
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let repo = GraduationRepository::new(db.pool.clone());
        assert!(repo.create(&student, Belt::Black, 7, day(1, 1)).is_err());
    }

    #[test]
    fn test_approved_date_change_rewrites_date() {
        let db = test_db();
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let repo = GraduationRepository::new(db.pool.clone());

        let grad = repo.create(&student, Belt::Gray, 2, day(3, 3)).unwrap();
        let change = repo.request_date_change(&grad.id, day(2, 20), "typo").unwrap();
        assert_eq!(change.student_id, student);
        assert!(repo.has_pending_date_change(&grad.id).unwrap());

        assert!(repo
            .decide_date_change(&change.id, ReviewStatus::Approved, None, &prof)
            .unwrap());
        assert!(!repo
            .decide_date_change(&change.id, ReviewStatus::Rejected, Some("late"), &prof)
            .unwrap());

        let grad = repo.get_by_id(&grad.id).unwrap().unwrap();
        assert_eq!(grad.graduation_date, day(2, 20));
        assert!(!repo.has_pending_date_change(&grad.id).unwrap());
    }

    #[test]
    fn test_rejected_date_change_keeps_date() {
        let db = test_db();
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let repo = GraduationRepository::new(db.pool.clone());

        let grad = repo.create(&student, Belt::Gray, 2, day(3, 3)).unwrap();
        let change = repo.request_date_change(&grad.id, day(2, 20), "typo").unwrap();
        repo.decide_date_change(&change.id, ReviewStatus::Rejected, Some("no proof"), &prof)
            .unwrap();

        let stored = repo.get_date_change(&change.id).unwrap().unwrap();
        assert_eq!(stored.status, ReviewStatus::Rejected);
        assert_eq!(stored.rejection_reason.as_deref(), Some("no proof"));
        assert_eq!(repo.get_by_id(&grad.id).unwrap().unwrap().graduation_date, day(3, 3));
    }
}
