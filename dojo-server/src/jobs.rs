use chrono::Utc;

use dojo_types::{ExpiredOrder, LogStatus};

use crate::audit;
use crate::db::repositories::OrderRepository;
use crate::db::Database;
use crate::error::DomainResult;

/// Cancel pending orders older than `days`, return their stock and record
/// one system audit entry per cancelled order.
pub fn expire_pending_orders(db: &Database, days: i64) -> DomainResult<Vec<ExpiredOrder>> {
    let expired = OrderRepository::new(db.pool.clone()).expire_pending(Utc::now(), days)?;

    for order in &expired {
        let message = format!(
            "Order #{} for \"{}\" cancelled. {} unit(s) returned to stock.",
            order.order_id, order.item_name, order.quantity_returned
        );
        tracing::info!("{}", message);
        audit::record_system(db, &message, LogStatus::Success);
    }

    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_user, test_db};
    use crate::db::repositories::{AuditLogRepository, ItemRepository};
    use chrono::Duration;
    use dojo_types::{ItemKind, ItemRequest, Role};

    #[test]
    fn test_expiry_writes_system_audit_entries() {
        let db = test_db();
        let student = seed_user(&db, "kid@x.io", Role::Student);
        let item = ItemRepository::new(db.pool.clone())
            .create(&ItemRequest {
                name: "Kimono".to_string(),
                kind: ItemKind::Kimono,
                price_cents: Some(40000),
                stock: Some(10),
            })
            .unwrap();
        let order = OrderRepository::new(db.pool.clone())
            .place_order(&student, &item.id, 2)
            .unwrap();
        db.connection()
            .unwrap()
            .execute(
                "UPDATE orders SET requested_at = ?1 WHERE id = ?2",
                rusqlite::params![Utc::now() - Duration::days(20), order.id.to_string()],
            )
            .unwrap();

        let expired = expire_pending_orders(&db, 15).unwrap();
        assert_eq!(expired.len(), 1);

        let logs = AuditLogRepository::new(db.pool.clone()).list(None, None, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].user_id.is_none());
        assert_eq!(
            logs[0].action,
            format!("Order #{} for \"Kimono\" cancelled. 2 unit(s) returned to stock.", order.id)
        );
    }
}
