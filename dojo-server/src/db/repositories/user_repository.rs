use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{GearSize, Role, User, UserStatus, DEFAULT_PHOTO};

use crate::db::{code_column, opt_code_column, opt_uuid_column, uuid_column, DbPool};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, birthday, role, status, \
     is_active, photo, height_cm, weight_kg, kimono_size, belt_size, whatsapp, responsible_id, date_joined";

/// Fields needed to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<NaiveDate>,
    pub whatsapp: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: Option<String>,
    pub responsible_id: Option<Uuid>,
}

/// Editable profile fields
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub whatsapp: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub height_cm: Option<i32>,
    pub weight_kg: Option<i32>,
    pub kimono_size: Option<GearSize>,
    pub belt_size: Option<GearSize>,
}

pub struct UserRepository {
    pool: DbPool,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        birthday: row.get(5)?,
        role: code_column(row, 6, Role::parse)?,
        status: code_column(row, 7, UserStatus::parse)?,
        is_active: row.get::<_, i32>(8)? == 1,
        photo: row.get(9)?,
        height_cm: row.get(10)?,
        weight_kg: row.get(11)?,
        kimono_size: opt_code_column(row, 12, GearSize::parse)?,
        belt_size: opt_code_column(row, 13, GearSize::parse)?,
        whatsapp: row.get(14)?,
        responsible_id: opt_uuid_column(row, 15)?,
        date_joined: row.get(16)?,
    })
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a user; the username is the e-mail address
    pub fn create(&self, new_user: &NewUser) -> Result<User> {
        let conn = self.pool.get()?;
        let id = Uuid::new_v4();
        let email = new_user.email.trim().to_lowercase();

        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, first_name, last_name, birthday,
                                role, status, is_active, photo, whatsapp, responsible_id, date_joined)
             VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                id.to_string(),
                email,
                new_user.password_hash,
                new_user.first_name.trim(),
                new_user.last_name.trim(),
                new_user.birthday,
                new_user.role.as_str(),
                new_user.status.as_str(),
                new_user.status == UserStatus::Active,
                DEFAULT_PHOTO,
                new_user.whatsapp,
                new_user.responsible_id.map(|id| id.to_string()),
                Utc::now(),
            ],
        )
        .context("Failed to create user")?;

        drop(conn);
        self.get_by_id(&id)?
            .context("User vanished right after insert")
    }

    /// Get user by ID
    pub fn get_by_id(&self, user_id: &Uuid) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [user_id.to_string()],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Get user by e-mail (case-insensitive)
    pub fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                [email.trim().to_lowercase()],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Stored password hash; `None` for accounts without a usable password
    pub fn password_hash(&self, user_id: &Uuid) -> Result<Option<String>> {
        let conn = self.pool.get()?;
        let hash: Option<Option<String>> = conn
            .query_row(
                "SELECT password_hash FROM users WHERE id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash.flatten())
    }

    pub fn set_password(&self, user_id: &Uuid, password_hash: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            [password_hash, &user_id.to_string()],
        )
        .context("Failed to update password")?;
        Ok(())
    }

    /// List users, optionally filtered by role and status, ordered by name
    pub fn list(&self, role: Option<Role>, status: Option<UserStatus>) -> Result<Vec<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users
             WHERE (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY first_name, last_name",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map(
                rusqlite::params![role.map(|r| r.as_str()), status.map(|s| s.as_str())],
                map_user,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    /// Accounts registered with this user as their guardian
    pub fn dependents(&self, guardian_id: &Uuid) -> Result<Vec<User>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE responsible_id = ?1 ORDER BY first_name, last_name",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([guardian_id.to_string()], map_user)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn count(&self, role: Option<Role>, status: Option<UserStatus>) -> Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR status = ?2)",
            rusqlite::params![role.map(|r| r.as_str()), status.map(|s| s.as_str())],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Whether another account already uses this e-mail
    pub fn email_in_use(&self, email: &str, exclude: Option<&Uuid>) -> Result<bool> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 AND (?2 IS NULL OR id != ?2)",
            rusqlite::params![email.trim().to_lowercase(), exclude.map(|id| id.to_string())],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_profile(&self, user_id: &Uuid, update: &ProfileUpdate) -> Result<()> {
        let conn = self.pool.get()?;
        let email = update.email.trim().to_lowercase();
        conn.execute(
            "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, username = ?3,
                    whatsapp = ?4, birthday = ?5, height_cm = ?6, weight_kg = ?7,
                    kimono_size = ?8, belt_size = ?9
             WHERE id = ?10",
            rusqlite::params![
                update.first_name.trim(),
                update.last_name.trim(),
                email,
                update.whatsapp,
                update.birthday,
                update.height_cm,
                update.weight_kg,
                update.kimono_size.map(|s| s.as_str()),
                update.belt_size.map(|s| s.as_str()),
                user_id.to_string(),
            ],
        )
        .context("Failed to update profile")?;
        Ok(())
    }

    /// Change the account status; `is_active` follows it
    pub fn set_status(&self, user_id: &Uuid, status: UserStatus) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE users SET status = ?1, is_active = ?2 WHERE id = ?3",
                rusqlite::params![status.as_str(), status == UserStatus::Active, user_id.to_string()],
            )
            .context("Failed to update user status")?;
        Ok(rows > 0)
    }

    pub fn set_role(&self, user_id: &Uuid, role: Role) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                rusqlite::params![role.as_str(), user_id.to_string()],
            )
            .context("Failed to update user role")?;
        Ok(rows > 0)
    }

    pub fn set_photo(&self, user_id: &Uuid, photo: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET photo = ?1 WHERE id = ?2",
            [photo, &user_id.to_string()],
        )
        .context("Failed to update photo")?;
        Ok(())
    }
}
