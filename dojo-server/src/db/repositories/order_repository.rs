use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, Row, Transaction};
use uuid::Uuid;

use dojo_types::{ExpiredOrder, Order, OrderStatus};

use crate::db::{code_column, opt_uuid_column, uuid_column, DbPool};
use crate::error::{invalid, DomainError, DomainResult};

/// Cancellation reason recorded by the expiration sweep
pub const EXPIRATION_REASON: &str = "Expired awaiting fulfilment";

const ORDER_SELECT: &str = "SELECT o.id, o.student_id, TRIM(u.first_name || ' ' || u.last_name),
            o.item_id, i.name, o.quantity, o.status, o.requested_at, o.approved_at,
            o.approved_by, o.rejection_reason, o.cancellation_reason, o.final_value_cents
     FROM orders o
     JOIN users u ON u.id = o.student_id
     JOIN items i ON i.id = o.item_id";

fn map_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: uuid_column(row, 0)?,
        student_id: uuid_column(row, 1)?,
        student_name: row.get(2)?,
        item_id: uuid_column(row, 3)?,
        item_name: row.get(4)?,
        quantity: row.get(5)?,
        status: code_column(row, 6, OrderStatus::parse)?,
        requested_at: row.get(7)?,
        approved_at: row.get(8)?,
        approved_by: opt_uuid_column(row, 9)?,
        rejection_reason: row.get(10)?,
        cancellation_reason: row.get(11)?,
        final_value_cents: row.get(12)?,
    })
}

fn load_order(tx: &Transaction<'_>, order_id: &Uuid) -> DomainResult<Order> {
    tx.query_row(
        &format!("{} WHERE o.id = ?1", ORDER_SELECT),
        [order_id.to_string()],
        map_order,
    )
    .optional()?
    .ok_or(DomainError::NotFound("Order"))
}

fn restore_stock(tx: &Transaction<'_>, item_id: &Uuid, quantity: i32) -> rusqlite::Result<usize> {
    tx.execute(
        "UPDATE items SET stock = COALESCE(stock, 0) + ?1 WHERE id = ?2",
        rusqlite::params![quantity, item_id.to_string()],
    )
}

/// Orders for catalogue items. Every state change that touches stock
/// runs inside a single transaction.
pub struct OrderRepository {
    pool: DbPool,
}

impl OrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Place a pending order and reserve the stock for it
    pub fn place_order(&self, student_id: &Uuid, item_id: &Uuid, quantity: i32) -> DomainResult<Order> {
        if quantity < 1 {
            return invalid("Quantity must be at least 1.");
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let stock: Option<i32> = tx
            .query_row(
                "SELECT stock FROM items WHERE id = ?1",
                [item_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(DomainError::NotFound("Item"))?;

        let available = match stock {
            Some(s) if s > 0 => s,
            _ => return invalid("Item is out of stock."),
        };
        if quantity > available {
            return Err(DomainError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        tx.execute(
            "UPDATE items SET stock = stock - ?1 WHERE id = ?2",
            rusqlite::params![quantity, item_id.to_string()],
        )?;

        let order_id = Uuid::new_v4();
        tx.execute(
            "INSERT INTO orders (id, student_id, item_id, quantity, status, requested_at)
             VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)",
            rusqlite::params![
                order_id.to_string(),
                student_id.to_string(),
                item_id.to_string(),
                quantity,
                Utc::now(),
            ],
        )?;

        let order = load_order(&tx, &order_id)?;
        tx.commit().context("Failed to place order")?;

        tracing::info!(
            "Order {} placed: {} x {} ({} left)",
            order.id,
            quantity,
            order.item_name,
            available - quantity
        );
        Ok(order)
    }

    /// Move an order to `to`.
    ///
    /// Rejection needs a reason and, like cancellation, returns the
    /// reserved quantity to stock. Approval prices the order.
    pub fn transition(
        &self,
        order_id: &Uuid,
        to: OrderStatus,
        actor_id: &Uuid,
        reason: Option<&str>,
    ) -> DomainResult<Order> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let order = load_order(&tx, order_id)?;

        if !order.status.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                from: order.status.to_string(),
                to: to.to_string(),
            });
        }

        match to {
            OrderStatus::Approved => {
                let price: Option<i64> = tx.query_row(
                    "SELECT price_cents FROM items WHERE id = ?1",
                    [order.item_id.to_string()],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "UPDATE orders SET status = ?1, approved_by = ?2, approved_at = ?3, final_value_cents = ?4
                     WHERE id = ?5",
                    rusqlite::params![
                        to.as_str(),
                        actor_id.to_string(),
                        Utc::now(),
                        price.map(|p| p * i64::from(order.quantity)),
                        order_id.to_string(),
                    ],
                )?;
            }
            OrderStatus::Rejected => {
                let Some(reason) = reason else {
                    return invalid("A rejection reason is required.");
                };
                tx.execute(
                    "UPDATE orders SET status = ?1, rejection_reason = ?2 WHERE id = ?3",
                    rusqlite::params![to.as_str(), reason, order_id.to_string()],
                )?;
                restore_stock(&tx, &order.item_id, order.quantity)?;
            }
            OrderStatus::Cancelled => {
                tx.execute(
                    "UPDATE orders SET status = ?1, cancellation_reason = ?2 WHERE id = ?3",
                    rusqlite::params![to.as_str(), reason, order_id.to_string()],
                )?;
                restore_stock(&tx, &order.item_id, order.quantity)?;
            }
            _ => {
                tx.execute(
                    "UPDATE orders SET status = ?1 WHERE id = ?2",
                    rusqlite::params![to.as_str(), order_id.to_string()],
                )?;
            }
        }

        let updated = load_order(&tx, order_id)?;
        tx.commit().context("Failed to update order")?;

        tracing::info!("Order {} moved from {} to {}", order_id, order.status, to);
        Ok(updated)
    }

    /// Cancel every pending order requested more than `days` before `now`
    /// and return the reserved stock.
    pub fn expire_pending(&self, now: DateTime<Utc>, days: i64) -> DomainResult<Vec<ExpiredOrder>> {
        let cutoff = now - Duration::days(days);

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let candidates: Vec<(Uuid, Uuid, String, i32, DateTime<Utc>)> = {
            let mut stmt = tx.prepare(
                "SELECT o.id, o.item_id, i.name, o.quantity, o.requested_at
                 FROM orders o JOIN items i ON i.id = o.item_id
                 WHERE o.status = 'PENDING'
                 ORDER BY o.requested_at",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        uuid_column(row, 0)?,
                        uuid_column(row, 1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut expired = Vec::new();
        for (order_id, item_id, item_name, quantity, requested_at) in candidates {
            if requested_at >= cutoff {
                continue;
            }
            tx.execute(
                "UPDATE orders SET status = 'CANCELLED', cancellation_reason = ?1 WHERE id = ?2",
                rusqlite::params![EXPIRATION_REASON, order_id.to_string()],
            )?;
            restore_stock(&tx, &item_id, quantity)?;
            expired.push(ExpiredOrder {
                order_id,
                item_name,
                quantity_returned: quantity,
            });
        }

        tx.commit().context("Failed to expire pending orders")?;
        Ok(expired)
    }

    pub fn get_by_id(&self, order_id: &Uuid) -> anyhow::Result<Option<Order>> {
        let conn = self.pool.get()?;
        let order = conn
            .query_row(
                &format!("{} WHERE o.id = ?1", ORDER_SELECT),
                [order_id.to_string()],
                map_order,
            )
            .optional()?;
        Ok(order)
    }

    /// Newest first, optionally restricted to a student, a status and a period
    pub fn list(
        &self,
        student_id: Option<&Uuid>,
        status: Option<OrderStatus>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Order>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 IS NULL OR o.student_id = ?1) AND (?2 IS NULL OR o.status = ?2)
             ORDER BY o.requested_at DESC",
            ORDER_SELECT
        ))?;
        let orders = stmt
            .query_map(
                rusqlite::params![student_id.map(|id| id.to_string()), status.map(|s| s.as_str())],
                map_order,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(orders
            .into_iter()
            .filter(|o| from.map_or(true, |f| o.requested_at >= f))
            .filter(|o| to.map_or(true, |t| o.requested_at <= t))
            .collect())
    }

    pub fn count_with_status(&self, status: OrderStatus) -> anyhow::Result<i64> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use crate::db::repositories::ItemRepository;
    use crate::db::Database;
    use dojo_types::{ItemKind, ItemRequest, Role};

    struct Fixture {
        db: Database,
        student: Uuid,
        staff: Uuid,
        item: Uuid,
    }

    fn fixture(stock: Option<i32>) -> Fixture {
        let db = test_db();
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let staff = seed_user(&db, "prof@x.io", Role::Instructor);
        let item = ItemRepository::new(db.pool.clone())
            .create(&ItemRequest {
                name: "Kimono".to_string(),
                kind: ItemKind::Kimono,
                price_cents: Some(40000),
                stock,
            })
            .unwrap()
            .id;
        Fixture { db, student, staff, item }
    }

    fn stock(f: &Fixture) -> Option<i32> {
        ItemRepository::new(f.db.pool.clone())
            .get_by_id(&f.item)
            .unwrap()
            .unwrap()
            .stock
    }

    fn backdate(f: &Fixture, order_id: &Uuid, days: i64) {
        let conn = f.db.connection().unwrap();
        conn.execute(
            "UPDATE orders SET requested_at = ?1 WHERE id = ?2",
            rusqlite::params![Utc::now() - Duration::days(days), order_id.to_string()],
        )
        .unwrap();
    }

    #[test]
    fn test_place_order_reserves_stock() {
        let f = fixture(Some(10));
        let repo = OrderRepository::new(f.db.pool.clone());
        let order = repo.place_order(&f.student, &f.item, 1).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.item_name, "Kimono");
        assert_eq!(stock(&f), Some(9));
    }

    #[test]
    fn test_quantity_validation_messages() {
        let f = fixture(Some(5));
        let repo = OrderRepository::new(f.db.pool.clone());

        let err = repo.place_order(&f.student, &f.item, 10).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Requested quantity (10) exceeds available stock (5)."
        );
        let err = repo.place_order(&f.student, &f.item, 0).unwrap_err();
        assert_eq!(err.to_string(), "Quantity must be at least 1.");
        assert_eq!(stock(&f), Some(5));
    }

    #[test]
    fn test_untracked_stock_is_not_orderable() {
        let f = fixture(None);
        let repo = OrderRepository::new(f.db.pool.clone());
        assert!(matches!(
            repo.place_order(&f.student, &f.item, 1),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_full_lifecycle_prices_order() {
        let f = fixture(Some(3));
        let repo = OrderRepository::new(f.db.pool.clone());
        let order = repo.place_order(&f.student, &f.item, 2).unwrap();

        let approved = repo
            .transition(&order.id, OrderStatus::Approved, &f.staff, None)
            .unwrap();
        assert_eq!(approved.final_value_cents, Some(80000));
        assert_eq!(approved.approved_by, Some(f.staff));

        repo.transition(&order.id, OrderStatus::AwaitingDelivery, &f.staff, None).unwrap();
        let finished = repo.transition(&order.id, OrderStatus::Finished, &f.staff, None).unwrap();
        assert_eq!(finished.status, OrderStatus::Finished);
        assert_eq!(stock(&f), Some(1));

        let err = repo
            .transition(&order.id, OrderStatus::Cancelled, &f.student, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn test_reject_requires_reason_and_restores_stock() {
        let f = fixture(Some(4));
        let repo = OrderRepository::new(f.db.pool.clone());
        let order = repo.place_order(&f.student, &f.item, 3).unwrap();
        repo.transition(&order.id, OrderStatus::Approved, &f.staff, None).unwrap();

        assert!(matches!(
            repo.transition(&order.id, OrderStatus::Rejected, &f.staff, Some("  ")),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(stock(&f), Some(1));

        let rejected = repo
            .transition(&order.id, OrderStatus::Rejected, &f.staff, Some("Out of size"))
            .unwrap();
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Out of size"));
        assert_eq!(stock(&f), Some(4));
    }

    #[test]
    fn test_cancel_restores_stock() {
        let f = fixture(Some(2));
        let repo = OrderRepository::new(f.db.pool.clone());
        let order = repo.place_order(&f.student, &f.item, 2).unwrap();
        assert_eq!(stock(&f), Some(0));
        repo.transition(&order.id, OrderStatus::Cancelled, &f.student, None).unwrap();
        assert_eq!(stock(&f), Some(2));
    }

    #[test]
    fn test_expire_pending_only_touches_old_orders() {
        let f = fixture(Some(10));
        let repo = OrderRepository::new(f.db.pool.clone());
        let old = repo.place_order(&f.student, &f.item, 2).unwrap();
        let recent = repo.place_order(&f.student, &f.item, 3).unwrap();
        backdate(&f, &old.id, 16);
        assert_eq!(stock(&f), Some(5));

        let expired = repo.expire_pending(Utc::now(), 15).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].order_id, old.id);
        assert_eq!(expired[0].item_name, "Kimono");
        assert_eq!(expired[0].quantity_returned, 2);

        let old = repo.get_by_id(&old.id).unwrap().unwrap();
        assert_eq!(old.status, OrderStatus::Cancelled);
        assert_eq!(old.cancellation_reason.as_deref(), Some(EXPIRATION_REASON));
        assert_eq!(
            repo.get_by_id(&recent.id).unwrap().unwrap().status,
            OrderStatus::Pending
        );
        assert_eq!(stock(&f), Some(7));

        assert!(repo.expire_pending(Utc::now(), 15).unwrap().is_empty());
    }
}
