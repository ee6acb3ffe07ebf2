use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{AttendanceRequest, AttendanceStatus, ClassType};

use crate::db::{code_column, is_unique_violation, opt_uuid_column, uuid_column, DbPool};

const ATTENDANCE_SELECT: &str = "SELECT a.id, a.student_id, TRIM(u.first_name || ' ' || u.last_name),
            a.class_id, c.name, a.attendance_date, a.class_type, a.reason, a.status,
            a.rejection_reason, a.processed_at, a.processed_by, a.notified
     FROM attendance_requests a
     JOIN users u ON u.id = a.student_id
     JOIN classes c ON c.id = a.class_id";

fn map_attendance(row: &Row<'_>) -> rusqlite::Result<AttendanceRequest> {
    Ok(AttendanceRequest {
        id: uuid_column(row, 0)?,
        student_id: uuid_column(row, 1)?,
        student_name: row.get(2)?,
        class_id: uuid_column(row, 3)?,
        class_name: row.get(4)?,
        attendance_date: row.get(5)?,
        class_type: code_column(row, 6, ClassType::parse)?,
        reason: row.get(7)?,
        status: code_column(row, 8, AttendanceStatus::parse)?,
        rejection_reason: row.get(9)?,
        processed_at: row.get(10)?,
        processed_by: opt_uuid_column(row, 11)?,
        notified: row.get::<_, i32>(12)? == 1,
    })
}

/// Filters for staff listings and reports
#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub student_id: Option<Uuid>,
    pub class_id: Option<Uuid>,
    pub status: Option<AttendanceStatus>,
    pub processed_by: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

pub struct AttendanceRepository {
    pool: DbPool,
}

impl AttendanceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a pending request.
    ///
    /// Returns `None` when the student already has a request for the same
    /// class, date and class type.
    pub fn create(
        &self,
        student_id: &Uuid,
        class_id: &Uuid,
        date: NaiveDate,
        class_type: ClassType,
        reason: &str,
    ) -> Result<Option<AttendanceRequest>> {
        let id = Uuid::new_v4();
        let inserted = {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO attendance_requests (id, student_id, class_id, attendance_date, class_type, reason, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING')",
                rusqlite::params![
                    id.to_string(),
                    student_id.to_string(),
                    class_id.to_string(),
                    date,
                    class_type.as_str(),
                    reason.trim(),
                ],
            )
            .context("Failed to create attendance request")
        };

        match inserted {
            Ok(_) => self.get_by_id(&id),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_by_id(&self, request_id: &Uuid) -> Result<Option<AttendanceRequest>> {
        let conn = self.pool.get()?;
        let request = conn
            .query_row(
                &format!("{} WHERE a.id = ?1", ATTENDANCE_SELECT),
                [request_id.to_string()],
                map_attendance,
            )
            .optional()?;
        Ok(request)
    }

    /// Newest date first
    pub fn list(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRequest>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR a.student_id = ?1)
               AND (?2 IS NULL OR a.class_id = ?2)
               AND (?3 IS NULL OR a.status = ?3)
               AND (?4 IS NULL OR a.processed_by = ?4)
               AND (?5 IS NULL OR a.attendance_date >= ?5)
               AND (?6 IS NULL OR a.attendance_date <= ?6)
             ORDER BY a.attendance_date DESC, c.name",
            ATTENDANCE_SELECT
        ))?;

        let requests = stmt
            .query_map(
                rusqlite::params![
                    filter.student_id.map(|id| id.to_string()),
                    filter.class_id.map(|id| id.to_string()),
                    filter.status.map(|s| s.as_str()),
                    filter.processed_by.map(|id| id.to_string()),
                    filter.from,
                    filter.to,
                ],
                map_attendance,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(requests)
    }

    /// Cancel a student's own pending request
    pub fn cancel(&self, request_id: &Uuid, student_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE attendance_requests SET status = 'CANCELLED'
                 WHERE id = ?1 AND student_id = ?2 AND status = 'PENDING'",
                [request_id.to_string(), student_id.to_string()],
            )
            .context("Failed to cancel attendance request")?;
        Ok(rows > 0)
    }

    /// Approve or reject a pending request
    pub fn process(
        &self,
        request_id: &Uuid,
        status: AttendanceStatus,
        rejection_reason: &str,
        processed_by: &Uuid,
    ) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE attendance_requests
                 SET status = ?1, rejection_reason = ?2, processed_by = ?3, processed_at = ?4
                 WHERE id = ?5 AND status = 'PENDING'",
                rusqlite::params![
                    status.as_str(),
                    rejection_reason.trim(),
                    processed_by.to_string(),
                    Utc::now(),
                    request_id.to_string(),
                ],
            )
            .context("Failed to process attendance request")?;
        Ok(rows > 0)
    }

    /// Flag the student's approved requests as seen
    pub fn mark_notified(&self, student_id: &Uuid) -> Result<usize> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE attendance_requests SET notified = 1
                 WHERE student_id = ?1 AND status = 'APPROVED' AND notified = 0",
                [student_id.to_string()],
            )
            .context("Failed to mark attendance notified")?;
        Ok(rows)
    }

    pub fn count_unnotified_approved(&self, student_id: &Uuid) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM attendance_requests
             WHERE student_id = ?1 AND status = 'APPROVED' AND notified = 0",
            [student_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count_with_status(&self, status: AttendanceStatus) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM attendance_requests WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Distinct approved attendance dates per student within a window,
    /// optionally restricted to one class
    pub fn approved_counts(
        &self,
        from: NaiveDate,
        to: Option<NaiveDate>,
        class_id: Option<&Uuid>,
    ) -> Result<Vec<(Uuid, i64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT student_id, COUNT(DISTINCT attendance_date) FROM attendance_requests
             WHERE status = 'APPROVED'
               AND attendance_date >= ?1
               AND (?2 IS NULL OR attendance_date <= ?2)
               AND (?3 IS NULL OR class_id = ?3)
             GROUP BY student_id",
        )?;
        let counts = stmt
            .query_map(
                rusqlite::params![from, to, class_id.map(|id| id.to_string())],
                |row| Ok((uuid_column(row, 0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_class, seed_user, test_db};
    use dojo_types::Role;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_duplicate_request_is_skipped() {
        let db = test_db();
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let class = seed_class(&db, "Adults", prof);
        let repo = AttendanceRepository::new(db.pool.clone());

        let first = repo.create(&student, &class, date(3), ClassType::Gi, "late").unwrap();
        assert!(first.is_some());
        let again = repo.create(&student, &class, date(3), ClassType::Gi, "late").unwrap();
        assert!(again.is_none());
        let other_type = repo.create(&student, &class, date(3), ClassType::NoGi, "late").unwrap();
        assert!(other_type.is_some());
    }

    #[test]
    fn test_cancel_only_own_pending() {
        let db = test_db();
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let other = seed_user(&db, "other@x.io", Role::Student);
        let class = seed_class(&db, "Adults", prof);
        let repo = AttendanceRepository::new(db.pool.clone());

        let req = repo
            .create(&student, &class, date(4), ClassType::Both, "r")
            .unwrap()
            .unwrap();
        assert!(!repo.cancel(&req.id, &other).unwrap());
        assert!(repo.cancel(&req.id, &student).unwrap());
        assert!(!repo.cancel(&req.id, &student).unwrap());
        assert!(!repo
            .process(&req.id, AttendanceStatus::Approved, "", &prof)
            .unwrap());
    }

    #[test]
    fn test_process_and_notify() {
        let db = test_db();
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let class = seed_class(&db, "Adults", prof);
        let repo = AttendanceRepository::new(db.pool.clone());

        let a = repo.create(&student, &class, date(5), ClassType::Gi, "r").unwrap().unwrap();
        let b = repo.create(&student, &class, date(6), ClassType::Gi, "r").unwrap().unwrap();
        assert!(repo.process(&a.id, AttendanceStatus::Approved, "", &prof).unwrap());
        assert!(repo.process(&b.id, AttendanceStatus::Rejected, "no show", &prof).unwrap());

        let processed = repo
            .list(&AttendanceFilter { processed_by: Some(prof), ..Default::default() })
            .unwrap();
        assert_eq!(processed.len(), 2);
        assert_eq!(processed[0].attendance_date, date(6));
        assert_eq!(processed[0].rejection_reason, "no show");

        assert_eq!(repo.count_unnotified_approved(&student).unwrap(), 1);
        assert_eq!(repo.mark_notified(&student).unwrap(), 1);
        assert_eq!(repo.count_unnotified_approved(&student).unwrap(), 0);
    }

    #[test]
    fn test_approved_counts_use_distinct_dates() {
        let db = test_db();
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let class = seed_class(&db, "Adults", prof);
        let repo = AttendanceRepository::new(db.pool.clone());

        for (d, t) in [(3, ClassType::Gi), (3, ClassType::NoGi), (10, ClassType::Gi)] {
            let r = repo.create(&student, &class, date(d), t, "r").unwrap().unwrap();
            repo.process(&r.id, AttendanceStatus::Approved, "", &prof).unwrap();
        }

        let counts = repo.approved_counts(date(1), Some(date(31)), None).unwrap();
        assert_eq!(counts, vec![(student, 2)]);
        let early = repo.approved_counts(date(1), Some(date(5)), Some(&class)).unwrap();
        assert_eq!(early, vec![(student, 1)]);
    }
}
