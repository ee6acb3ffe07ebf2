use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{LessonPlan, LessonPlanItem, LessonPlanItemRequest, LessonPlanRequest};

use crate::db::{opt_uuid_column, uuid_column, DbPool};

const PLAN_COLUMNS: &str =
    "id, title, description, instructor_id, start_date, end_date, class_id, active, created_at";

fn map_plan(row: &Row<'_>) -> rusqlite::Result<LessonPlan> {
    Ok(LessonPlan {
        id: uuid_column(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        instructor_id: uuid_column(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        class_id: opt_uuid_column(row, 6)?,
        active: row.get::<_, i32>(7)? == 1,
        created_at: row.get(8)?,
        items: Vec::new(),
    })
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<LessonPlanItem> {
    Ok(LessonPlanItem {
        id: uuid_column(row, 0)?,
        plan_id: uuid_column(row, 1)?,
        topic: row.get(2)?,
        lesson_date: row.get(3)?,
        position: row.get(4)?,
    })
}

pub struct LessonPlanRepository {
    pool: DbPool,
}

impl LessonPlanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, req: &LessonPlanRequest, instructor_id: &Uuid) -> Result<LessonPlan> {
        let id = Uuid::new_v4();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO lesson_plans (id, title, description, instructor_id, start_date, end_date, class_id, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    id.to_string(),
                    req.title.trim(),
                    req.description.trim(),
                    instructor_id.to_string(),
                    req.start_date,
                    req.end_date,
                    req.class_id.map(|c| c.to_string()),
                    req.active,
                    Utc::now(),
                ],
            )
            .context("Failed to create lesson plan")?;
        }
        self.get_by_id(&id)?
            .context("Lesson plan vanished right after insert")
    }

    pub fn update(&self, plan_id: &Uuid, req: &LessonPlanRequest) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE lesson_plans SET title = ?1, description = ?2, start_date = ?3,
                        end_date = ?4, class_id = ?5, active = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    req.title.trim(),
                    req.description.trim(),
                    req.start_date,
                    req.end_date,
                    req.class_id.map(|c| c.to_string()),
                    req.active,
                    plan_id.to_string(),
                ],
            )
            .context("Failed to update lesson plan")?;
        Ok(rows > 0)
    }

    pub fn delete(&self, plan_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM lesson_plans WHERE id = ?1", [plan_id.to_string()])
            .context("Failed to delete lesson plan")?;
        Ok(rows > 0)
    }

    /// Plan with its items
    pub fn get_by_id(&self, plan_id: &Uuid) -> Result<Option<LessonPlan>> {
        let conn = self.pool.get()?;
        let plan = conn
            .query_row(
                &format!("SELECT {} FROM lesson_plans WHERE id = ?1", PLAN_COLUMNS),
                [plan_id.to_string()],
                map_plan,
            )
            .optional()?;
        drop(conn);

        match plan {
            Some(mut plan) => {
                plan.items = self.items(plan_id)?;
                Ok(Some(plan))
            }
            None => Ok(None),
        }
    }

    /// Plans without items, most recent start first
    pub fn list(&self, class_id: Option<&Uuid>) -> Result<Vec<LessonPlan>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lesson_plans WHERE (?1 IS NULL OR class_id = ?1)
             ORDER BY start_date DESC, title",
            PLAN_COLUMNS
        ))?;
        let plans = stmt
            .query_map([class_id.map(|c| c.to_string())], map_plan)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    pub fn items(&self, plan_id: &Uuid) -> Result<Vec<LessonPlanItem>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, plan_id, topic, lesson_date, position FROM lesson_plan_items
             WHERE plan_id = ?1 ORDER BY lesson_date, position",
        )?;
        let items = stmt
            .query_map([plan_id.to_string()], map_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn add_item(&self, plan_id: &Uuid, req: &LessonPlanItemRequest) -> Result<LessonPlanItem> {
        let item = LessonPlanItem {
            id: Uuid::new_v4(),
            plan_id: *plan_id,
            topic: req.topic.trim().to_string(),
            lesson_date: req.lesson_date,
            position: req.position,
        };
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO lesson_plan_items (id, plan_id, topic, lesson_date, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                item.id.to_string(),
                plan_id.to_string(),
                item.topic,
                item.lesson_date,
                item.position,
            ],
        )
        .context("Failed to add lesson plan item")?;
        Ok(item)
    }

    pub fn update_item(&self, plan_id: &Uuid, item_id: &Uuid, req: &LessonPlanItemRequest) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE lesson_plan_items SET topic = ?1, lesson_date = ?2, position = ?3
                 WHERE id = ?4 AND plan_id = ?5",
                rusqlite::params![
                    req.topic.trim(),
                    req.lesson_date,
                    req.position,
                    item_id.to_string(),
                    plan_id.to_string(),
                ],
            )
            .context("Failed to update lesson plan item")?;
        Ok(rows > 0)
    }

    pub fn delete_item(&self, plan_id: &Uuid, item_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "DELETE FROM lesson_plan_items WHERE id = ?1 AND plan_id = ?2",
                [item_id.to_string(), plan_id.to_string()],
            )
            .context("Failed to delete lesson plan item")?;
        Ok(rows > 0)
    }
}
