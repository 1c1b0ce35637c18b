use std::collections::HashMap;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{
    Coordinates, Order, OrderEvent, OrderLine, OrderStatus, PaymentStatus,
};
use crate::domain::ports::{OrderChange, OrderFilter, OrderRepository, UpdatedOrder};
use crate::schema::{couriers, delivery_outbox, order_lines, orders, restaurants};

use super::models::{
    NewOrderLineRow, NewOrderRow, NewOutboxEventRow, OrderChangeset, OrderLineRow, OrderRow,
};

// ── Row mapping ───────────────────────────────────────────────────────────────

fn to_domain(
    row: OrderRow,
    restaurant_owner_id: Uuid,
    lines: Vec<OrderLineRow>,
) -> Result<Order, DomainError> {
    let status = row
        .status
        .parse::<OrderStatus>()
        .map_err(|_| DomainError::Internal(format!("stored status '{}' is unknown", row.status)))?;
    let payment_status = row.payment_status.parse::<PaymentStatus>().map_err(|_| {
        DomainError::Internal(format!(
            "stored payment status '{}' is unknown",
            row.payment_status
        ))
    })?;
    let coordinates = match (row.latitude, row.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Ok(Order {
        id: row.id,
        client_id: row.client_id,
        restaurant_id: row.restaurant_id,
        restaurant_owner_id,
        courier_id: row.courier_id,
        lines: lines
            .into_iter()
            .map(|l| OrderLine {
                dish_id: l.dish_id,
                name: l.name,
                unit_price: l.unit_price,
                images: l.images,
                quantity: l.quantity,
            })
            .collect(),
        address: row.address,
        coordinates,
        note: row.note,
        status,
        payment_status,
        estimated_minutes: row.estimated_minutes,
        total: row.total,
        service_fee: row.service_fee,
        left_kitchen_at: row.left_kitchen_at,
        delivered_at: row.delivered_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn changeset(order: &Order) -> OrderChangeset {
    OrderChangeset {
        courier_id: order.courier_id,
        status: order.status.as_str().to_string(),
        payment_status: order.payment_status.as_str().to_string(),
        estimated_minutes: order.estimated_minutes,
        left_kitchen_at: order.left_kitchen_at,
        delivered_at: order.delivered_at,
        updated_at: order.updated_at,
    }
}

/// Outbox rows are written on the caller's connection so they share its
/// transaction.
fn write_events(conn: &mut PgConnection, events: &[OrderEvent]) -> QueryResult<()> {
    if events.is_empty() {
        return Ok(());
    }
    let rows: Vec<NewOutboxEventRow> = events
        .iter()
        .map(|e| NewOutboxEventRow {
            id: Uuid::new_v4(),
            aggregate_type: OrderEvent::AGGREGATE_TYPE.to_string(),
            aggregate_id: e.order_id().to_string(),
            event_type: e.event_type().to_string(),
            payload: e.payload(),
        })
        .collect();
    diesel::insert_into(delivery_outbox::table)
        .values(&rows)
        .execute(conn)?;
    Ok(())
}

fn load_lines(conn: &mut PgConnection, order_id: Uuid) -> QueryResult<Vec<OrderLineRow>> {
    order_lines::table
        .filter(order_lines::order_id.eq(order_id))
        .order(order_lines::position.asc())
        .select(OrderLineRow::as_select())
        .load(conn)
}

/// Adds one completed delivery to the courier profile of `courier_user_id`.
fn credit_courier(conn: &mut PgConnection, courier_user_id: Uuid) -> Result<i32, DomainError> {
    let profile = couriers::table.filter(couriers::user_id.eq(courier_user_id));
    diesel::update(profile)
        .set((
            couriers::completed_deliveries.eq(couriers::completed_deliveries + 1),
            couriers::updated_at.eq(Utc::now()),
        ))
        .returning(couriers::completed_deliveries)
        .get_result::<i32>(conn)
        .optional()?
        .ok_or_else(|| {
            DomainError::Conflict(format!("no courier profile for user {courier_user_id}"))
        })
}

fn update_order(conn: &mut PgConnection, order: &Order) -> Result<(), DomainError> {
    let updated = diesel::update(orders::table.find(order.id))
        .set(&changeset(order))
        .execute(conn)?;
    if updated == 0 {
        return Err(DomainError::NotFound("Order"));
    }
    Ok(())
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderRepository for DieselOrderRepository {
    fn insert(&self, order: &Order, events: &[OrderEvent]) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    id: order.id,
                    client_id: order.client_id,
                    restaurant_id: order.restaurant_id,
                    courier_id: order.courier_id,
                    address: order.address.clone(),
                    latitude: order.coordinates.map(|c| c.latitude),
                    longitude: order.coordinates.map(|c| c.longitude),
                    note: order.note.clone(),
                    status: order.status.as_str().to_string(),
                    payment_status: order.payment_status.as_str().to_string(),
                    estimated_minutes: order.estimated_minutes,
                    total: order.total.clone(),
                    service_fee: order.service_fee.clone(),
                    created_at: order.created_at,
                    updated_at: order.updated_at,
                })
                .execute(conn)?;

            let new_lines: Vec<NewOrderLineRow> = order
                .lines
                .iter()
                .enumerate()
                .map(|(position, l)| NewOrderLineRow {
                    id: Uuid::new_v4(),
                    order_id: order.id,
                    dish_id: l.dish_id,
                    position: position as i32,
                    name: l.name.clone(),
                    unit_price: l.unit_price.clone(),
                    images: l.images.clone(),
                    quantity: l.quantity,
                })
                .collect();
            diesel::insert_into(order_lines::table)
                .values(&new_lines)
                .execute(conn)?;

            write_events(conn, events)?;
            Ok(())
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let found = orders::table
            .inner_join(restaurants::table)
            .filter(orders::id.eq(id))
            .select((OrderRow::as_select(), restaurants::owner_id))
            .first::<(OrderRow, Uuid)>(&mut conn)
            .optional()?;

        let Some((order, owner_id)) = found else {
            return Ok(None);
        };

        let lines = load_lines(&mut conn, order.id)?;
        to_domain(order, owner_id, lines).map(Some)
    }

    fn update(
        &self,
        id: Uuid,
        change: &mut OrderChange<'_>,
    ) -> Result<UpdatedOrder, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // The row lock serializes writers of this order until commit.
            let row = orders::table
                .find(id)
                .select(OrderRow::as_select())
                .for_update()
                .first::<OrderRow>(conn)
                .optional()?
                .ok_or(DomainError::NotFound("Order"))?;
            let owner_id = restaurants::table
                .find(row.restaurant_id)
                .select(restaurants::owner_id)
                .first::<Uuid>(conn)?;
            let lines = load_lines(conn, id)?;
            let mut order = to_domain(row, owner_id, lines)?;

            let update = change(&mut order)?;
            let courier_completed_deliveries = match update.credit_courier {
                Some(courier_user_id) => Some(credit_courier(conn, courier_user_id)?),
                None => None,
            };
            update_order(conn, &order)?;
            write_events(conn, &update.events)?;

            Ok(UpdatedOrder {
                order,
                courier_completed_deliveries,
            })
        })
    }

    fn delete(&self, id: Uuid) -> Result<bool, DomainError> {
        let mut conn = self.pool.get()?;
        let deleted = diesel::delete(orders::table.find(id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn list(&self, filter: OrderFilter) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let mut query = orders::table
            .inner_join(restaurants::table)
            .select((OrderRow::as_select(), restaurants::owner_id))
            .order(orders::created_at.desc())
            .into_boxed();
        query = match filter {
            OrderFilter::All => query,
            OrderFilter::Client(id) => query.filter(orders::client_id.eq(id)),
            OrderFilter::Restaurant(id) => query.filter(orders::restaurant_id.eq(id)),
            OrderFilter::Courier(id) => query.filter(orders::courier_id.eq(id)),
        };
        let rows: Vec<(OrderRow, Uuid)> = query.load(&mut conn)?;

        let ids: Vec<Uuid> = rows.iter().map(|(o, _)| o.id).collect();
        let mut lines_by_order: HashMap<Uuid, Vec<OrderLineRow>> = HashMap::new();
        for line in order_lines::table
            .filter(order_lines::order_id.eq_any(ids))
            .order((order_lines::order_id, order_lines::position.asc()))
            .select(OrderLineRow::as_select())
            .load(&mut conn)?
        {
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        rows.into_iter()
            .map(|(order, owner_id)| {
                let lines = lines_by_order.remove(&order.id).unwrap_or_default();
                to_domain(order, owner_id, lines)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::mpsc;
    use std::time::Duration;

    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use diesel::prelude::*;
    use uuid::Uuid;

    use super::DieselOrderRepository;
    use crate::domain::errors::DomainError;
    use crate::domain::order::{
        Order, OrderEvent, OrderLine, OrderStatus, PaymentStatus, TransitionPolicy,
    };
    use crate::domain::ports::{OrderFilter, OrderRepository, OrderUpdate};
    use crate::infrastructure::models::OutboxEventRow;
    use crate::infrastructure::test_db::{setup_db, Seed};
    use crate::schema::delivery_outbox;

    fn new_order(seed: &Seed) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            client_id: seed.client_id,
            restaurant_id: seed.restaurant_id,
            restaurant_owner_id: seed.owner_id,
            courier_id: None,
            lines: vec![OrderLine {
                dish_id: seed.dish_id,
                name: "Brik".into(),
                unit_price: BigDecimal::from_str("4.50").expect("valid decimal"),
                images: vec!["brik.jpg".into()],
                quantity: 3,
            }],
            address: "Rue de Rome, Tunis".into(),
            coordinates: None,
            note: Some("sans harissa".into()),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            estimated_minutes: None,
            total: BigDecimal::from_str("45.00").expect("valid decimal"),
            service_fee: BigDecimal::from_str("1.50").expect("valid decimal"),
            left_kitchen_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn outbox_types(pool: &crate::db::DbPool, order_id: Uuid) -> Vec<String> {
        let mut conn = pool.get().expect("Failed to get connection");
        delivery_outbox::table
            .filter(delivery_outbox::aggregate_id.eq(order_id.to_string()))
            .order(delivery_outbox::created_at.asc())
            .select(OutboxEventRow::as_select())
            .load(&mut conn)
            .expect("query failed")
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn insert_and_find_by_id_roundtrip() {
        let (_container, pool) = setup_db().await;
        let seed = Seed::insert(&pool);
        let repo = DieselOrderRepository::new(pool.clone());
        let order = new_order(&seed);

        repo.insert(&order, &[OrderEvent::placed(&order, "Dar El Jeld")])
            .expect("insert failed");

        let found = repo
            .find_by_id(order.id)
            .expect("find failed")
            .expect("order should exist");
        assert_eq!(found.client_id, seed.client_id);
        assert_eq!(found.restaurant_owner_id, seed.owner_id);
        assert_eq!(found.status, OrderStatus::Pending);
        assert_eq!(found.lines.len(), 1);
        assert_eq!(found.lines[0].images, vec!["brik.jpg".to_string()]);
        assert_eq!(found.total, BigDecimal::from_str("45.00").unwrap());
        assert_eq!(outbox_types(&pool, order.id), vec!["OrderPlaced"]);
    }

    fn confirm(order: &mut Order) -> Result<OrderUpdate, DomainError> {
        let (courier, events) = order.confirm_payment(TransitionPolicy::Permissive, Utc::now())?;
        Ok(OrderUpdate::delivered_by(courier, events))
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn update_writes_status_and_outbox_together() {
        let (_container, pool) = setup_db().await;
        let seed = Seed::insert(&pool);
        let repo = DieselOrderRepository::new(pool.clone());
        let order = new_order(&seed);
        repo.insert(&order, &[]).expect("insert failed");

        let updated = repo
            .update(order.id, &mut |o| {
                let events =
                    o.change_status(OrderStatus::EnRoute, TransitionPolicy::Permissive, Utc::now())?;
                Ok(OrderUpdate::with_events(events))
            })
            .expect("update failed");

        assert_eq!(updated.courier_completed_deliveries, None);
        let found = repo.find_by_id(order.id).unwrap().unwrap();
        assert_eq!(found.status, OrderStatus::EnRoute);
        assert_eq!(found.note.as_deref(), Some("sans harissa"));
        assert_eq!(outbox_types(&pool, order.id), vec!["DeliveryEnRoute"]);
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn update_of_unknown_order_is_not_found() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOrderRepository::new(pool);

        let err = repo
            .update(Uuid::new_v4(), &mut |_| Ok(OrderUpdate::default()))
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound("Order")));
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn delivery_is_credited_once() {
        let (_container, pool) = setup_db().await;
        let seed = Seed::insert(&pool);
        let repo = DieselOrderRepository::new(pool.clone());
        let mut order = new_order(&seed);
        order.courier_id = Some(seed.courier_id);
        repo.insert(&order, &[]).expect("insert failed");

        let first = repo.update(order.id, &mut confirm).unwrap();
        let second = repo.update(order.id, &mut confirm).unwrap_err();

        assert_eq!(first.courier_completed_deliveries, Some(1));
        assert!(matches!(second, DomainError::Conflict(_)));
        let found = repo.find_by_id(order.id).unwrap().unwrap();
        assert_eq!(found.payment_status, PaymentStatus::Paid);
        assert_eq!(found.status, OrderStatus::Delivered);
        assert_eq!(outbox_types(&pool, order.id), vec!["OrderDelivered"]);
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn missing_courier_profile_rolls_back() {
        let (_container, pool) = setup_db().await;
        let seed = Seed::insert(&pool);
        let repo = DieselOrderRepository::new(pool.clone());
        let mut order = new_order(&seed);
        // The client has no courier profile.
        order.courier_id = Some(seed.client_id);
        repo.insert(&order, &[]).expect("insert failed");

        let err = repo.update(order.id, &mut confirm).unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        let found = repo.find_by_id(order.id).unwrap().unwrap();
        assert_eq!(found.payment_status, PaymentStatus::Unpaid);
        assert_eq!(found.status, OrderStatus::Pending);
        assert!(outbox_types(&pool, order.id).is_empty());
    }

    /// A status write that holds the row while payment is confirmed must not
    /// put the order back to unpaid once both have committed.
    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn concurrent_status_change_keeps_confirmed_payment() {
        let (_container, pool) = setup_db().await;
        let seed = Seed::insert(&pool);
        let repo = DieselOrderRepository::new(pool.clone());
        let mut order = new_order(&seed);
        order.courier_id = Some(seed.courier_id);
        order.status = OrderStatus::EnRoute;
        repo.insert(&order, &[]).expect("insert failed");

        let (locked_tx, locked_rx) = mpsc::channel();
        let status_repo = DieselOrderRepository::new(pool.clone());
        let order_id = order.id;
        let status_writer = std::thread::spawn(move || {
            status_repo.update(order_id, &mut |o| {
                let _ = locked_tx.send(());
                std::thread::sleep(Duration::from_millis(300));
                let events =
                    o.change_status(OrderStatus::Arrived, TransitionPolicy::Permissive, Utc::now())?;
                Ok(OrderUpdate::with_events(events))
            })
        });

        locked_rx.recv().expect("status writer did not start");
        let paid = repo.update(order.id, &mut confirm).expect("confirm failed");
        status_writer
            .join()
            .expect("status writer panicked")
            .expect("status update failed");

        assert_eq!(paid.courier_completed_deliveries, Some(1));
        let found = repo.find_by_id(order.id).unwrap().unwrap();
        assert_eq!(found.payment_status, PaymentStatus::Paid);
        assert_eq!(found.status, OrderStatus::Delivered);
        assert_eq!(outbox_types(&pool, order.id), vec!["OrderDelivered"]);
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn list_filters_and_delete() {
        let (_container, pool) = setup_db().await;
        let seed = Seed::insert(&pool);
        let repo = DieselOrderRepository::new(pool);

        let first = new_order(&seed);
        let mut second = new_order(&seed);
        second.courier_id = Some(seed.courier_id);
        repo.insert(&first, &[]).unwrap();
        repo.insert(&second, &[]).unwrap();

        assert_eq!(repo.list(OrderFilter::All).unwrap().len(), 2);
        assert_eq!(repo.list(OrderFilter::Client(seed.client_id)).unwrap().len(), 2);
        assert_eq!(
            repo.list(OrderFilter::Restaurant(seed.restaurant_id)).unwrap().len(),
            2
        );
        let assigned = repo.list(OrderFilter::Courier(seed.courier_id)).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].lines.len(), 1);

        assert!(repo.delete(first.id).unwrap());
        assert!(!repo.delete(first.id).unwrap());
        assert!(repo.find_by_id(first.id).unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires a container runtime"]
    async fn find_by_id_returns_none_for_unknown_id() {
        let (_container, pool) = setup_db().await;
        let repo = DieselOrderRepository::new(pool);

        let result = repo
            .find_by_id(Uuid::new_v4())
            .expect("find should not error");

        assert!(result.is_none());
    }
}
