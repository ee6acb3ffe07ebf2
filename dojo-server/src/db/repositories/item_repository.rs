use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use dojo_types::{Item, ItemKind, ItemRequest};

use crate::db::{code_column, uuid_column, DbPool};

fn map_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        kind: code_column(row, 2, ItemKind::parse)?,
        price_cents: row.get(3)?,
        stock: row.get(4)?,
    })
}

/// Equipment and fee catalogue
pub struct ItemRepository {
    pool: DbPool,
}

impl ItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, req: &ItemRequest) -> Result<Item> {
        let item = Item {
            id: Uuid::new_v4(),
            name: req.name.trim().to_string(),
            kind: req.kind,
            price_cents: req.price_cents,
            stock: req.stock,
        };
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO items (id, name, kind, price_cents, stock) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                item.id.to_string(),
                item.name,
                item.kind.as_str(),
                item.price_cents,
                item.stock,
            ],
        )
        .context("Failed to create item")?;
        Ok(item)
    }

    pub fn update(&self, item_id: &Uuid, req: &ItemRequest) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE items SET name = ?1, kind = ?2, price_cents = ?3, stock = ?4 WHERE id = ?5",
                rusqlite::params![
                    req.name.trim(),
                    req.kind.as_str(),
                    req.price_cents,
                    req.stock,
                    item_id.to_string(),
                ],
            )
            .context("Failed to update item")?;
        Ok(rows > 0)
    }

    pub fn delete(&self, item_id: &Uuid) -> Result<bool> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM items WHERE id = ?1", [item_id.to_string()])
            .context("Failed to delete item")?;
        Ok(rows > 0)
    }

    pub fn get_by_id(&self, item_id: &Uuid) -> Result<Option<Item>> {
        let conn = self.pool.get()?;
        let item = conn
            .query_row(
                "SELECT id, name, kind, price_cents, stock FROM items WHERE id = ?1",
                [item_id.to_string()],
                map_item,
            )
            .optional()?;
        Ok(item)
    }

    /// Whole catalogue, or only items with stock left
    pub fn list(&self, in_stock_only: bool) -> Result<Vec<Item>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, kind, price_cents, stock FROM items
             WHERE (?1 = 0 OR stock > 0)
             ORDER BY kind, name",
        )?;
        let items = stmt
            .query_map([in_stock_only], map_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}
