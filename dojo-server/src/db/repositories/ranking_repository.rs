use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{Ranking, RankingKind, RankingPosition, RankingRequest};

use crate::db::{code_column, opt_uuid_column, uuid_column, DbPool};

const RANKING_COLUMNS: &str = "id, title, kind, class_id, start_date, end_date, active, created_at";

fn map_ranking(row: &Row<'_>) -> rusqlite::Result<Ranking> {
    Ok(Ranking {
        id: uuid_column(row, 0)?,
        title: row.get(1)?,
        kind: code_column(row, 2, RankingKind::parse)?,
        class_id: opt_uuid_column(row, 3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
        active: row.get::<_, i32>(6)? == 1,
        created_at: row.get(7)?,
        positions: Vec::new(),
    })
}

pub struct RankingRepository {
    pool: DbPool,
}

impl RankingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, req: &RankingRequest) -> Result<Ranking> {
        let id = Uuid::new_v4();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO rankings (id, title, kind, class_id, start_date, end_date, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.to_string(),
                    req.title.trim(),
                    req.kind.as_str(),
                    req.class_id.map(|c| c.to_string()),
                    req.start_date,
                    req.end_date,
                    req.active,
                    Utc::now(),
                ],
            )
            .context("Failed to create ranking")?;
        }
        self.get_by_id(&id)?.context("Ranking vanished right after insert")
    }

    /// Ranking with its positions in order
    pub fn get_by_id(&self, ranking_id: &Uuid) -> Result<Option<Ranking>> {
        let conn = self.pool.get()?;
        let ranking = conn
            .query_row(
                &format!("SELECT {} FROM rankings WHERE id = ?1", RANKING_COLUMNS),
                [ranking_id.to_string()],
                map_ranking,
            )
            .optional()?;
        drop(conn);

        match ranking {
            Some(mut ranking) => {
                ranking.positions = self.positions(ranking_id)?;
                Ok(Some(ranking))
            }
            None => Ok(None),
        }
    }

    pub fn list(&self, active_only: bool) -> Result<Vec<Ranking>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rankings WHERE (?1 = 0 OR active = 1) ORDER BY start_date DESC, title",
            RANKING_COLUMNS
        ))?;
        let rankings = stmt
            .query_map([active_only], map_ranking)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rankings)
    }

    pub fn delete(&self, ranking_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM rankings WHERE id = ?1", [ranking_id.to_string()])
            .context("Failed to delete ranking")?;
        Ok(rows > 0)
    }

    pub fn positions(&self, ranking_id: &Uuid) -> Result<Vec<RankingPosition>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.ranking_id, p.student_id, TRIM(u.first_name || ' ' || u.last_name), p.position, p.score
             FROM ranking_positions p JOIN users u ON u.id = p.student_id
             WHERE p.ranking_id = ?1
             ORDER BY p.position, u.first_name, u.last_name",
        )?;
        let positions = stmt
            .query_map([ranking_id.to_string()], |row| {
                Ok(RankingPosition {
                    ranking_id: uuid_column(row, 0)?,
                    student_id: uuid_column(row, 1)?,
                    student_name: row.get(2)?,
                    position: row.get(3)?,
                    score: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(positions)
    }

    /// Insert or move a single student's position
    pub fn set_position(&self, ranking_id: &Uuid, student_id: &Uuid, position: i32, score: f64) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO ranking_positions (ranking_id, student_id, position, score)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (ranking_id, student_id) DO UPDATE SET position = excluded.position, score = excluded.score",
            rusqlite::params![ranking_id.to_string(), student_id.to_string(), position, score],
        )
        .context("Failed to set ranking position")?;
        Ok(())
    }

    /// Replace every position of a ranking atomically
    pub fn replace_positions(&self, ranking_id: &Uuid, positions: &[(Uuid, i32, f64)]) -> Result<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM ranking_positions WHERE ranking_id = ?1",
            [ranking_id.to_string()],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO ranking_positions (ranking_id, student_id, position, score) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (student_id, position, score) in positions {
                stmt.execute(rusqlite::params![
                    ranking_id.to_string(),
                    student_id.to_string(),
                    position,
                    score,
                ])?;
            }
        }
        tx.commit().context("Failed to replace ranking positions")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_named_user, test_db};
    use chrono::NaiveDate;
    use dojo_types::Role;

    #[test]
    fn test_positions_replace_and_upsert() {
        let db = test_db();
        let ana = seed_named_user(&db, "ana@x.io", "Ana", "Lima", Role::Student);
        let bia = seed_named_user(&db, "bia@x.io", "Bia", "Reis", Role::Student);
        let repo = RankingRepository::new(db.pool.clone());

        let ranking = repo
            .create(&RankingRequest {
                title: "March".to_string(),
                kind: RankingKind::Championship,
                class_id: None,
                start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                end_date: None,
                active: true,
            })
            .unwrap();

        repo.replace_positions(&ranking.id, &[(ana, 2, 3.0), (bia, 1, 5.0)]).unwrap();
        let positions = repo.get_by_id(&ranking.id).unwrap().unwrap().positions;
        assert_eq!(positions[0].student_name, "Bia Reis");
        assert_eq!(positions[1].position, 2);

        repo.set_position(&ranking.id, &ana, 1, 9.5).unwrap();
        let positions = repo.positions(&ranking.id).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].student_name, "Ana Lima");
        assert_eq!(positions[0].score, 9.5);
    }
}
