use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{Goal, GoalRequest};

use crate::db::{uuid_column, DbPool};

const GOAL_COLUMNS: &str = "id, instructor_id, title, start_date, end_date, target_classes, \
     minimum_classes, minimum_frequency_pct";

fn map_goal(row: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: uuid_column(row, 0)?,
        instructor_id: uuid_column(row, 1)?,
        title: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        target_classes: row.get(5)?,
        minimum_classes: row.get(6)?,
        minimum_frequency_pct: row.get(7)?,
    })
}

pub struct GoalRepository {
    pool: DbPool,
}

impl GoalRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, req: &GoalRequest, instructor_id: &Uuid) -> Result<Goal> {
        let goal = Goal {
            id: Uuid::new_v4(),
            instructor_id: *instructor_id,
            title: req.title.trim().to_string(),
            start_date: req.start_date,
            end_date: req.end_date,
            target_classes: req.target_classes,
            minimum_classes: req.minimum_classes,
            minimum_frequency_pct: req.minimum_frequency_pct,
        };
        let conn = self.pool.get()?;
        conn.execute(
            &format!("INSERT INTO goals ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", GOAL_COLUMNS),
            rusqlite::params![
                goal.id.to_string(),
                goal.instructor_id.to_string(),
                goal.title,
                goal.start_date,
                goal.end_date,
                goal.target_classes,
                goal.minimum_classes,
                goal.minimum_frequency_pct,
            ],
        )
        .context("Failed to create goal")?;
        Ok(goal)
    }

    pub fn update(&self, goal_id: &Uuid, req: &GoalRequest) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE goals SET title = ?1, start_date = ?2, end_date = ?3, target_classes = ?4,
                        minimum_classes = ?5, minimum_frequency_pct = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    req.title.trim(),
                    req.start_date,
                    req.end_date,
                    req.target_classes,
                    req.minimum_classes,
                    req.minimum_frequency_pct,
                    goal_id.to_string(),
                ],
            )
            .context("Failed to update goal")?;
        Ok(rows > 0)
    }

    pub fn delete(&self, goal_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM goals WHERE id = ?1", [goal_id.to_string()])
            .context("Failed to delete goal")?;
        Ok(rows > 0)
    }

    pub fn get_by_id(&self, goal_id: &Uuid) -> Result<Option<Goal>> {
        let conn = self.pool.get()?;
        let goal = conn
            .query_row(
                &format!("SELECT {} FROM goals WHERE id = ?1", GOAL_COLUMNS),
                [goal_id.to_string()],
                map_goal,
            )
            .optional()?;
        Ok(goal)
    }

    /// Newest start first
    pub fn list(&self) -> Result<Vec<Goal>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM goals ORDER BY start_date DESC, title",
            GOAL_COLUMNS
        ))?;
        let goals = stmt
            .query_map([], map_goal)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(goals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use chrono::NaiveDate;
    use dojo_types::Role;

    fn req(title: &str, month: u32) -> GoalRequest {
        GoalRequest {
            title: title.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, month, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, month, 28).unwrap(),
            target_classes: 12,
            minimum_classes: 8,
            minimum_frequency_pct: 60,
        }
    }

    #[test]
    fn test_crud_and_ordering() {
        let db = test_db();
        let prof = seed_user(&db, "prof@x.io", Role::Instructor);
        let repo = GoalRepository::new(db.pool.clone());

        let jan = repo.create(&req("January", 1), &prof).unwrap();
        repo.create(&req("February", 2), &prof).unwrap();

        let titles: Vec<_> = repo.list().unwrap().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, vec!["February", "January"]);

        let mut changed = req("January (revised)", 1);
        changed.target_classes = 10;
        assert!(repo.update(&jan.id, &changed).unwrap());
        assert_eq!(repo.get_by_id(&jan.id).unwrap().unwrap().target_classes, 10);

        assert!(repo.delete(&jan.id).unwrap());
        assert!(!repo.delete(&jan.id).unwrap());
    }
}
